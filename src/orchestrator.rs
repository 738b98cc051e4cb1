use std::sync::mpsc::{self, Receiver, Sender};
use std::time::{Duration, Instant};

use crate::config::{Config, ScriptSpec};
use crate::runner::{Notifier, RunnerKind, RunnerView, TestRunner, TestStatus};

/// Session-level state. `Final` is entered once every non-info runner has a
/// terminal status; a restart re-enters `Running`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Running,
    Final,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownProgress {
    SendingTerm,
    Waiting,
    ForceKilling,
    Complete { total: usize, forced: usize },
}

/// Owns every runner slot plus the one notification channel their threads
/// feed. All slot mutation happens on the UI thread that also drains the
/// channel, so slot replacement needs no extra locking.
pub struct Orchestrator {
    bg_specs: Vec<ScriptSpec>,
    int_specs: Vec<ScriptSpec>,
    background: Vec<TestRunner>,
    interactive: Vec<TestRunner>,
    events_tx: Sender<()>,
    events_rx: Receiver<()>,
    phase: Phase,
    final_code: i32,
}

impl Orchestrator {
    pub fn from_config(config: &Config) -> Self {
        let bg_specs: Vec<ScriptSpec> = config
            .background_scripts
            .iter()
            .map(ScriptSpec::resolve)
            .collect();
        let int_specs: Vec<ScriptSpec> = config
            .interactive_scripts
            .iter()
            .map(ScriptSpec::resolve)
            .collect();
        let background = build_runners(RunnerKind::Background, &bg_specs);
        let interactive = build_runners(RunnerKind::Interactive, &int_specs);
        let (events_tx, events_rx) = mpsc::channel();
        Self {
            bg_specs,
            int_specs,
            background,
            interactive,
            events_tx,
            events_rx,
            phase: Phase::Running,
            final_code: 0,
        }
    }

    pub fn notifier(&self) -> Notifier {
        Notifier::new(self.events_tx.clone())
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn total_runners(&self) -> usize {
        self.background.len() + self.interactive.len()
    }

    pub fn start_all(&self) {
        let notifier = self.notifier();
        for runner in self.background.iter().chain(self.interactive.iter()) {
            runner.start(&notifier);
        }
    }

    /// Blocks for at most `timeout` waiting for the next change wakeup.
    pub fn next_event_timeout(&self, timeout: Duration) -> bool {
        self.events_rx.recv_timeout(timeout).is_ok()
    }

    pub fn runner(&self, kind: RunnerKind, index: usize) -> Option<&TestRunner> {
        match kind {
            RunnerKind::Background => self.background.get(index),
            RunnerKind::Interactive => self.interactive.get(index),
        }
    }

    pub fn all_runners(&self) -> impl Iterator<Item = &TestRunner> {
        self.background.iter().chain(self.interactive.iter())
    }

    pub fn views(&self) -> (Vec<RunnerView>, Vec<RunnerView>) {
        (
            self.background.iter().map(TestRunner::view).collect(),
            self.interactive.iter().map(TestRunner::view).collect(),
        )
    }

    /// Re-evaluates completion over the current snapshot. Called after
    /// every drained notification; a mid-restart runner is Waiting/Running
    /// again and simply keeps (or returns) the session in `Running`.
    pub fn observe(&mut self) {
        let done = self.all_done();
        match self.phase {
            Phase::Running if done => {
                self.final_code = self.aggregate_code();
                // Info runners may outlive the session they decorate.
                for runner in self.all_runners() {
                    if runner.spec().info && !runner.status().is_terminal() {
                        runner.stop();
                    }
                }
                self.phase = Phase::Final;
            }
            Phase::Final if !done => {
                self.phase = Phase::Running;
            }
            _ => {}
        }
    }

    pub fn all_done(&self) -> bool {
        all_tests_done(
            self.all_runners()
                .map(|runner| (runner.spec().info, runner.status())),
        )
    }

    pub fn aggregate_code(&self) -> i32 {
        aggregate_exit_code(
            self.all_runners()
                .map(|runner| (runner.spec().info, runner.status())),
        )
    }

    /// The process exit code: frozen at the Running -> Final transition so
    /// that stopping leftover info runners cannot change it.
    pub fn exit_code(&self) -> i32 {
        match self.phase {
            Phase::Final => self.final_code,
            Phase::Running => self.aggregate_code(),
        }
    }

    /// Stops the old instance and replaces the slot with a fresh runner
    /// built from the original config entry. The old instance's threads
    /// wind down against their own discarded state.
    pub fn restart_slot(&mut self, kind: RunnerKind, index: usize) {
        let spec = match kind {
            RunnerKind::Background => self.bg_specs.get(index),
            RunnerKind::Interactive => self.int_specs.get(index),
        };
        let Some(spec) = spec.cloned() else {
            return;
        };
        let replacement = TestRunner::from_spec(kind, index, spec);
        let notifier = self.notifier();
        let slot = match kind {
            RunnerKind::Background => &mut self.background[index],
            RunnerKind::Interactive => &mut self.interactive[index],
        };
        slot.stop();
        *slot = replacement;
        slot.start(&notifier);
    }

    pub fn restart_all(&mut self) {
        self.stop_all();
        self.background = build_runners(RunnerKind::Background, &self.bg_specs);
        self.interactive = build_runners(RunnerKind::Interactive, &self.int_specs);
        self.phase = Phase::Running;
        self.final_code = 0;
        self.start_all();
    }

    pub fn stop_all(&self) {
        for runner in self.all_runners() {
            runner.stop();
        }
    }

    /// Teacher-style graceful teardown: TERM everything, wait out the
    /// grace period, then force-kill stragglers.
    pub fn shutdown_with_progress<F>(&self, timeout: Duration, mut on_progress: F)
    where
        F: FnMut(ShutdownProgress),
    {
        on_progress(ShutdownProgress::SendingTerm);
        self.stop_all();

        on_progress(ShutdownProgress::Waiting);
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if self.all_runners().all(runner_wound_down) {
                on_progress(ShutdownProgress::Complete {
                    total: self.total_runners(),
                    forced: 0,
                });
                return;
            }
            std::thread::sleep(Duration::from_millis(40));
        }

        on_progress(ShutdownProgress::ForceKilling);
        let mut forced = 0usize;
        for runner in self.all_runners() {
            if !runner_wound_down(runner) {
                runner.force_stop();
                forced += 1;
            }
        }
        on_progress(ShutdownProgress::Complete {
            total: self.total_runners(),
            forced,
        });
    }
}

fn runner_wound_down(runner: &TestRunner) -> bool {
    matches!(runner.status(), TestStatus::Waiting) || runner.status().is_terminal()
}

fn build_runners(kind: RunnerKind, specs: &[ScriptSpec]) -> Vec<TestRunner> {
    specs
        .iter()
        .enumerate()
        .map(|(index, spec)| TestRunner::from_spec(kind, index, spec.clone()))
        .collect()
}

/// 0 iff every non-info outcome is Passed; info outcomes never count.
pub fn aggregate_exit_code<I>(outcomes: I) -> i32
where
    I: IntoIterator<Item = (bool, TestStatus)>,
{
    for (info, status) in outcomes {
        if !info && status == TestStatus::Failed {
            return 1;
        }
    }
    0
}

/// Every non-info outcome has reached a terminal state.
pub fn all_tests_done<I>(outcomes: I) -> bool
where
    I: IntoIterator<Item = (bool, TestStatus)>,
{
    outcomes
        .into_iter()
        .all(|(info, status)| info || status.is_terminal())
}
