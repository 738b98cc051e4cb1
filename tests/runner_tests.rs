use std::fs;
use std::path::PathBuf;
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use burnin::config::{KeysConfig, ScriptSpec};
use burnin::runner::{Notifier, RunnerKind, TestRunner, TestStatus};

fn temp_script(name: &str, body: &str) -> String {
    let ts = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("time")
        .as_nanos();
    let dir: PathBuf = std::env::temp_dir().join(format!("burnin-runner-{name}-{ts}"));
    fs::create_dir_all(&dir).expect("mkdir workspace");
    let path = dir.join("test.sh");
    fs::write(&path, body).expect("write script");
    path.to_string_lossy().into_owned()
}

fn script_spec(path: &str) -> ScriptSpec {
    ScriptSpec {
        path: path.to_owned(),
        args: Vec::new(),
        base_type: "script".to_owned(),
        curses: false,
        info: false,
        max_logs: 50,
        output: true,
        pane_rows: 10,
        pane_cols: 40,
        keys: KeysConfig::default(),
    }
}

// Notifications into a dropped receiver are ignored, so the tests can
// poll runner state directly instead of draining a channel.
fn test_notifier() -> Notifier {
    let (tx, _rx) = mpsc::channel();
    Notifier::new(tx)
}

fn wait_terminal(runner: &TestRunner, timeout: Duration) -> TestStatus {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        let status = runner.status();
        if status.is_terminal() {
            return status;
        }
        thread::sleep(Duration::from_millis(25));
    }
    runner.status()
}

fn wait_for_line(runner: &TestRunner, needle: &str, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if runner
            .view()
            .lines
            .iter()
            .any(|line| line.contains(needle))
        {
            return true;
        }
        thread::sleep(Duration::from_millis(25));
    }
    false
}

#[test]
fn passing_script_reaches_passed_with_captured_output() {
    let path = temp_script("pass", "printf 'battery ok\\n'\nexit 0\n");
    let runner = TestRunner::from_spec(RunnerKind::Background, 0, script_spec(&path));
    runner.start(&test_notifier());

    assert_eq!(wait_terminal(&runner, Duration::from_secs(10)), TestStatus::Passed);
    assert_eq!(runner.code(), 0);
    assert!(wait_for_line(&runner, "battery ok", Duration::from_secs(5)));
    let view = runner.view();
    assert!(view.finished_elapsed.is_some());
}

#[test]
fn failing_script_records_its_exit_code() {
    let path = temp_script("fail", "echo degraded 1>&2\nexit 3\n");
    let runner = TestRunner::from_spec(RunnerKind::Background, 0, script_spec(&path));
    runner.start(&test_notifier());

    assert_eq!(wait_terminal(&runner, Duration::from_secs(10)), TestStatus::Failed);
    assert_eq!(runner.code(), 3);
    assert!(wait_for_line(&runner, "degraded", Duration::from_secs(5)));
}

#[test]
fn unknown_declared_type_is_a_launch_failure() {
    let mut spec = script_spec("./never-spawned.sh");
    spec.base_type = "applet".to_owned();
    let runner = TestRunner::from_spec(RunnerKind::Background, 0, spec);
    runner.start(&test_notifier());

    assert_eq!(wait_terminal(&runner, Duration::from_secs(5)), TestStatus::Failed);
    assert_eq!(runner.code(), -1);
}

#[test]
fn bounded_log_retains_only_the_most_recent_lines() {
    let path = temp_script(
        "bounded",
        "i=1\nwhile [ $i -le 20 ]; do echo line-$i; i=$((i+1)); done\n",
    );
    let mut spec = script_spec(&path);
    spec.max_logs = 5;
    let runner = TestRunner::from_spec(RunnerKind::Background, 0, spec);
    runner.start(&test_notifier());

    assert_eq!(wait_terminal(&runner, Duration::from_secs(10)), TestStatus::Passed);
    assert!(wait_for_line(&runner, "line-20", Duration::from_secs(5)));
    let lines = runner.view().lines;
    assert_eq!(lines.len(), 5);
    assert_eq!(
        lines,
        vec!["line-16", "line-17", "line-18", "line-19", "line-20"]
    );
}

#[test]
fn input_is_forwarded_to_the_child() {
    let path = temp_script(
        "input",
        "IFS= read -r line\nprintf 'seen:%s\\n' \"$line\"\n",
    );
    let runner = TestRunner::from_spec(RunnerKind::Interactive, 0, script_spec(&path));
    runner.start(&test_notifier());

    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        match runner.write_input(b"ping\n") {
            Ok(()) => break,
            Err(_) if Instant::now() < deadline => thread::sleep(Duration::from_millis(25)),
            Err(err) => panic!("input never became writable: {err}"),
        }
    }

    assert_eq!(wait_terminal(&runner, Duration::from_secs(10)), TestStatus::Passed);
    assert!(wait_for_line(&runner, "seen:ping", Duration::from_secs(5)));
}

#[test]
fn stop_terminates_a_long_running_child() {
    let path = temp_script("stop", "sleep 30\n");
    let runner = TestRunner::from_spec(RunnerKind::Background, 0, script_spec(&path));
    runner.start(&test_notifier());

    thread::sleep(Duration::from_millis(200));
    runner.stop();
    // Safe to repeat on an already-stopped runner.
    runner.stop();

    assert_eq!(wait_terminal(&runner, Duration::from_secs(10)), TestStatus::Failed);
    assert_eq!(runner.code(), -1);
}

#[test]
fn observed_statuses_never_regress() {
    let path = temp_script("monotone", "sleep 0.3\nexit 0\n");
    let runner = TestRunner::from_spec(RunnerKind::Background, 0, script_spec(&path));
    assert_eq!(runner.status(), TestStatus::Waiting);
    runner.start(&test_notifier());

    let mut observed = Vec::new();
    let deadline = Instant::now() + Duration::from_secs(10);
    while Instant::now() < deadline {
        let status = runner.status();
        if observed.last() != Some(&status) {
            observed.push(status);
        }
        if status.is_terminal() {
            break;
        }
        thread::sleep(Duration::from_millis(10));
    }

    let canonical = [TestStatus::Waiting, TestStatus::Running, TestStatus::Passed];
    let mut cursor = canonical.iter();
    for status in &observed {
        assert!(
            cursor.any(|expected| expected == status),
            "status sequence regressed: {observed:?}"
        );
    }
    assert_eq!(observed.last(), Some(&TestStatus::Passed));
}

#[test]
fn curses_child_runs_under_a_real_pty() {
    let path = temp_script(
        "pty",
        "if [ -t 1 ]; then printf '\\033[2J\\033[1;1HPTY-LIVE'; exit 0; else exit 7; fi\n",
    );
    let mut spec = script_spec(&path);
    spec.curses = true;
    spec.pane_rows = 5;
    spec.pane_cols = 30;
    let runner = TestRunner::from_spec(RunnerKind::Interactive, 0, spec);
    runner.start(&test_notifier());

    assert_eq!(wait_terminal(&runner, Duration::from_secs(10)), TestStatus::Passed);
    assert!(wait_for_line(&runner, "PTY-LIVE", Duration::from_secs(5)));
    let view = runner.view();
    // Screen snapshots are always the full configured grid.
    assert_eq!(view.lines.len(), 5);
    assert!(view.lines.iter().all(|line| line.chars().count() == 30));
}
