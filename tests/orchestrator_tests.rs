use std::fs;
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use burnin::config::{Config, KeysConfig, ScriptConfig};
use burnin::orchestrator::{Orchestrator, Phase};
use burnin::runner::{RunnerKind, TestStatus};

fn temp_workspace(name: &str) -> PathBuf {
    let ts = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("time")
        .as_nanos();
    let root = std::env::temp_dir().join(format!("burnin-orch-{name}-{ts}"));
    fs::create_dir_all(&root).expect("mkdir workspace");
    root
}

fn write_script(root: &PathBuf, name: &str, body: &str) -> String {
    let path = root.join(name);
    fs::write(&path, body).expect("write script");
    path.to_string_lossy().into_owned()
}

fn script_entry(path: String, type_decl: &str) -> ScriptConfig {
    ScriptConfig {
        path,
        args: String::new(),
        type_decl: type_decl.to_owned(),
        max_logs: 0,
        output: false,
        output_res: String::new(),
        keys: KeysConfig::default(),
    }
}

fn run_to_final(orchestrator: &mut Orchestrator, timeout: Duration) {
    orchestrator.start_all();
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        let _ = orchestrator.next_event_timeout(Duration::from_millis(100));
        orchestrator.observe();
        if orchestrator.phase() == Phase::Final {
            return;
        }
    }
    panic!("orchestrator never reached the final phase");
}

#[test]
fn mixed_outcomes_aggregate_to_one() {
    let root = temp_workspace("mixed");
    let config = Config {
        background_scripts: vec![
            script_entry(write_script(&root, "pass.sh", "exit 0\n"), "script"),
            script_entry(write_script(&root, "fail.sh", "exit 2\n"), "script"),
        ],
        interactive_scripts: vec![script_entry(
            write_script(&root, "also-pass.sh", "exit 0\n"),
            "script",
        )],
    };
    let mut orchestrator = Orchestrator::from_config(&config);
    run_to_final(&mut orchestrator, Duration::from_secs(15));
    assert_eq!(orchestrator.exit_code(), 1);
}

#[test]
fn all_passing_aggregates_to_zero() {
    let root = temp_workspace("all-pass");
    let config = Config {
        background_scripts: vec![
            script_entry(write_script(&root, "a.sh", "exit 0\n"), "script"),
            script_entry(write_script(&root, "b.sh", "exit 0\n"), "script"),
        ],
        interactive_scripts: Vec::new(),
    };
    let mut orchestrator = Orchestrator::from_config(&config);
    run_to_final(&mut orchestrator, Duration::from_secs(15));
    assert_eq!(orchestrator.exit_code(), 0);
}

#[test]
fn info_failure_does_not_block_completion_or_flip_the_code() {
    let root = temp_workspace("info");
    let config = Config {
        background_scripts: vec![
            script_entry(write_script(&root, "pass.sh", "exit 0\n"), "script"),
            script_entry(
                write_script(&root, "info-fail.sh", "exit 9\n"),
                "script, info",
            ),
        ],
        interactive_scripts: Vec::new(),
    };
    let mut orchestrator = Orchestrator::from_config(&config);
    run_to_final(&mut orchestrator, Duration::from_secs(15));
    assert_eq!(orchestrator.exit_code(), 0);
}

#[test]
fn still_running_info_runner_is_stopped_at_final() {
    let root = temp_workspace("info-running");
    let config = Config {
        background_scripts: vec![
            script_entry(write_script(&root, "quick.sh", "exit 0\n"), "script"),
            script_entry(
                write_script(&root, "monitor.sh", "sleep 30\n"),
                "script, info",
            ),
        ],
        interactive_scripts: Vec::new(),
    };
    let mut orchestrator = Orchestrator::from_config(&config);
    run_to_final(&mut orchestrator, Duration::from_secs(15));
    assert_eq!(orchestrator.exit_code(), 0);

    // The stopped monitor eventually reports a (discarded) failure without
    // disturbing the frozen aggregate.
    let deadline = Instant::now() + Duration::from_secs(10);
    loop {
        let monitor = orchestrator
            .runner(RunnerKind::Background, 1)
            .expect("monitor slot");
        if monitor.status().is_terminal() {
            break;
        }
        assert!(Instant::now() < deadline, "info runner was never stopped");
        thread::sleep(Duration::from_millis(50));
    }
    assert_eq!(orchestrator.exit_code(), 0);
}

#[test]
fn restart_isolates_the_other_slots() {
    let root = temp_workspace("restart");
    let config = Config {
        background_scripts: vec![
            script_entry(write_script(&root, "steady.sh", "echo steady-done\nexit 0\n"), "script"),
            script_entry(
                write_script(&root, "flaky.sh", "sleep 0.5\nexit 5\n"),
                "script",
            ),
        ],
        interactive_scripts: Vec::new(),
    };
    let mut orchestrator = Orchestrator::from_config(&config);
    run_to_final(&mut orchestrator, Duration::from_secs(15));
    assert_eq!(orchestrator.exit_code(), 1);

    let (before, _) = orchestrator.views();
    assert_eq!(before[0].status, TestStatus::Passed);
    assert_eq!(before[1].status, TestStatus::Failed);

    orchestrator.restart_slot(RunnerKind::Background, 1);
    orchestrator.observe();
    assert_eq!(orchestrator.phase(), Phase::Running);

    let (after, _) = orchestrator.views();
    assert_eq!(after[0].status, TestStatus::Passed);
    assert_eq!(after[0].code, before[0].code);
    assert_eq!(after[0].lines, before[0].lines);
    assert_ne!(after[1].status, TestStatus::Failed);

    // The restarted slot converges to a fresh terminal state again.
    let deadline = Instant::now() + Duration::from_secs(15);
    while Instant::now() < deadline {
        let _ = orchestrator.next_event_timeout(Duration::from_millis(100));
        orchestrator.observe();
        if orchestrator.phase() == Phase::Final {
            break;
        }
    }
    assert_eq!(orchestrator.phase(), Phase::Final);
    assert_eq!(orchestrator.exit_code(), 1);
}

#[test]
fn restart_all_rebuilds_every_slot() {
    let root = temp_workspace("restart-all");
    let config = Config {
        background_scripts: vec![script_entry(
            write_script(&root, "once.sh", "exit 4\n"),
            "script",
        )],
        interactive_scripts: Vec::new(),
    };
    let mut orchestrator = Orchestrator::from_config(&config);
    run_to_final(&mut orchestrator, Duration::from_secs(15));
    assert_eq!(orchestrator.exit_code(), 1);

    orchestrator.restart_all();
    assert_eq!(orchestrator.phase(), Phase::Running);
    run_to_final(&mut orchestrator, Duration::from_secs(15));
    assert_eq!(orchestrator.exit_code(), 1);

    orchestrator.shutdown_with_progress(Duration::from_secs(3), |_| {});
}
