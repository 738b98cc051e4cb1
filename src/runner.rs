use std::collections::VecDeque;
use std::io::{self, ErrorKind, Read, Write};
#[cfg(unix)]
use std::os::unix::process::CommandExt;
use std::process::{Child as PlainChild, Command as ProcessCommand, Stdio};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

#[cfg(unix)]
use nix::sys::signal::{kill, Signal};
#[cfg(unix)]
use nix::unistd::{setpgid, Pid};
use portable_pty::{native_pty_system, CommandBuilder, MasterPty, PtySize};

use crate::config::ScriptSpec;
use crate::screen::VirtualScreen;

const WAIT_POLL: Duration = Duration::from_millis(40);
const READ_CHUNK: usize = 2048;

// Oversized so curses children never clip themselves; the virtual screen
// clamps their output to the configured pane.
const PTY_ROWS: u16 = 1000;
const PTY_COLS: u16 = 2000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerKind {
    Background,
    Interactive,
}

impl RunnerKind {
    pub fn label(self) -> &'static str {
        match self {
            RunnerKind::Background => "background",
            RunnerKind::Interactive => "interactive",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestStatus {
    Waiting,
    Running,
    Passed,
    Failed,
}

impl TestStatus {
    pub fn label(self) -> &'static str {
        match self {
            TestStatus::Waiting => "WAITING",
            TestStatus::Running => "RUNNING",
            TestStatus::Passed => "PASSED",
            TestStatus::Failed => "FAILED",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, TestStatus::Passed | TestStatus::Failed)
    }
}

#[derive(Debug)]
pub enum RunnerError {
    UnknownType {
        path: String,
        type_decl: String,
    },
    Spawn {
        path: String,
        error: io::Error,
    },
    Pty {
        path: String,
        message: String,
    },
    InputUnavailable {
        path: String,
    },
    InputWrite {
        path: String,
        error: io::Error,
    },
}

impl std::fmt::Display for RunnerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunnerError::UnknownType { path, type_decl } => {
                write!(f, "test `{path}` declares unknown type `{type_decl}`")
            }
            RunnerError::Spawn { path, error } => {
                write!(f, "failed to spawn test `{path}`: {error}")
            }
            RunnerError::Pty { path, message } => {
                write!(f, "failed to allocate pty for test `{path}`: {message}")
            }
            RunnerError::InputUnavailable { path } => {
                write!(f, "test `{path}` has no open input stream")
            }
            RunnerError::InputWrite { path, error } => {
                write!(f, "failed writing input to test `{path}`: {error}")
            }
        }
    }
}

impl std::error::Error for RunnerError {}

/// Wakeup channel into the UI update loop. Carries no payload: observable
/// state lives behind each runner's lock and is re-read on every tick.
#[derive(Clone)]
pub struct Notifier {
    tx: Sender<()>,
}

impl Notifier {
    pub fn new(tx: Sender<()>) -> Self {
        Self { tx }
    }

    pub fn notify(&self) {
        let _ = self.tx.send(());
    }
}

/// Bounded plain-text log for non-curses runners. Chunks are normalized
/// (`\r\n`/`\r` -> `\n`) and reassembled across partial writes; once the
/// line count exceeds the limit the oldest lines are dropped.
#[derive(Debug)]
pub struct LineLog {
    lines: VecDeque<String>,
    max_lines: usize,
    open_line: bool,
}

impl LineLog {
    pub fn new(max_lines: usize) -> Self {
        Self {
            lines: VecDeque::new(),
            max_lines: max_lines.max(1),
            open_line: false,
        }
    }

    pub fn append_chunk(&mut self, chunk: &str) {
        if chunk.is_empty() {
            return;
        }
        let normalized = chunk.replace("\r\n", "\n").replace('\r', "\n");
        let ends_with_newline = normalized.ends_with('\n');
        let mut segments: Vec<&str> = normalized.split('\n').collect();
        if ends_with_newline {
            segments.pop();
        }
        for (idx, segment) in segments.iter().enumerate() {
            if idx == 0 && self.open_line {
                match self.lines.back_mut() {
                    Some(last) => last.push_str(segment),
                    None => self.lines.push_back((*segment).to_owned()),
                }
            } else {
                self.lines.push_back((*segment).to_owned());
            }
        }
        self.open_line = !ends_with_newline;
        while self.lines.len() > self.max_lines {
            self.lines.pop_front();
        }
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

enum RunnerOutput {
    Log(LineLog),
    Screen(VirtualScreen),
}

impl RunnerOutput {
    fn ingest(&mut self, bytes: &[u8]) {
        match self {
            RunnerOutput::Log(log) => log.append_chunk(&String::from_utf8_lossy(bytes)),
            RunnerOutput::Screen(screen) => screen.write(bytes),
        }
    }

    fn lines(&self) -> Vec<String> {
        match self {
            RunnerOutput::Log(log) => log.lines(),
            RunnerOutput::Screen(screen) => screen.lines(),
        }
    }
}

enum ChildHandle {
    Plain(PlainChild),
    Pty(Box<dyn portable_pty::Child + Send + Sync>),
}

impl ChildHandle {
    fn try_wait_code(&mut self) -> io::Result<Option<i32>> {
        match self {
            ChildHandle::Plain(child) => Ok(child.try_wait()?.map(plain_exit_code)),
            ChildHandle::Pty(child) => Ok(child.try_wait()?.map(|status| {
                if status.success() {
                    0
                } else {
                    status.exit_code() as i32
                }
            })),
        }
    }

    fn terminate(&mut self) {
        match self {
            ChildHandle::Plain(child) => {
                #[cfg(unix)]
                let _ = signal_process_group(child, Signal::SIGTERM);
                #[cfg(not(unix))]
                let _ = child.kill();
            }
            ChildHandle::Pty(child) => {
                let _ = child.kill();
            }
        }
    }

    fn force_kill(&mut self) {
        match self {
            ChildHandle::Plain(child) => {
                #[cfg(unix)]
                let _ = signal_process_group(child, Signal::SIGKILL);
                let _ = child.kill();
            }
            ChildHandle::Pty(child) => {
                let _ = child.kill();
            }
        }
    }
}

// A signal death carries no exit code; report the internal-failure code.
fn plain_exit_code(status: std::process::ExitStatus) -> i32 {
    status.code().unwrap_or(-1)
}

#[cfg(unix)]
fn signal_process_group(child: &mut PlainChild, signal: Signal) -> Result<(), nix::Error> {
    let pid = child.id() as i32;
    if pid > 0 {
        kill(Pid::from_raw(-pid), signal)
    } else {
        Ok(())
    }
}

struct RunnerState {
    status: TestStatus,
    code: i32,
    started_at: Option<Instant>,
    finished_at: Option<Instant>,
    duration: Duration,
    output: RunnerOutput,
    child: Option<ChildHandle>,
    input: Option<Box<dyn Write + Send>>,
    pty_master: Option<Box<dyn MasterPty + Send>>,
}

/// Read-only snapshot of one runner, taken under its lock, for the render
/// and routing paths.
#[derive(Debug, Clone)]
pub struct RunnerView {
    pub kind: RunnerKind,
    pub config_index: usize,
    pub path: String,
    pub status: TestStatus,
    pub code: i32,
    pub info: bool,
    pub curses: bool,
    pub output_pane: bool,
    pub pane_rows: usize,
    pub pane_cols: usize,
    pub keys: crate::config::KeysConfig,
    pub duration: Duration,
    pub finished_elapsed: Option<Duration>,
    pub lines: Vec<String>,
}

/// One launched instance of a configured test. A restart never reuses an
/// instance: the orchestrator builds a fresh runner from the same config
/// slot and discards this one, so a stale completion can only ever touch
/// its own abandoned state.
pub struct TestRunner {
    kind: RunnerKind,
    config_index: usize,
    spec: ScriptSpec,
    shared: Arc<Mutex<RunnerState>>,
}

impl TestRunner {
    pub fn from_spec(kind: RunnerKind, config_index: usize, spec: ScriptSpec) -> Self {
        let output = if spec.curses {
            RunnerOutput::Screen(VirtualScreen::new(spec.pane_rows, spec.pane_cols.max(1)))
        } else {
            RunnerOutput::Log(LineLog::new(spec.max_logs))
        };
        Self {
            kind,
            config_index,
            spec,
            shared: Arc::new(Mutex::new(RunnerState {
                status: TestStatus::Waiting,
                code: -1,
                started_at: None,
                finished_at: None,
                duration: Duration::ZERO,
                output,
                child: None,
                input: None,
                pty_master: None,
            })),
        }
    }

    pub fn kind(&self) -> RunnerKind {
        self.kind
    }

    pub fn config_index(&self) -> usize {
        self.config_index
    }

    pub fn spec(&self) -> &ScriptSpec {
        &self.spec
    }

    pub fn status(&self) -> TestStatus {
        self.shared.lock().expect("runner lock").status
    }

    pub fn code(&self) -> i32 {
        self.shared.lock().expect("runner lock").code
    }

    /// Waiting -> Running, then spawn the child plus its drain and wait
    /// threads. Launch problems surface as Failed/-1 through the notifier,
    /// exactly like any later status change.
    pub fn start(&self, notifier: &Notifier) {
        {
            let mut state = self.shared.lock().expect("runner lock");
            if state.status != TestStatus::Waiting {
                return;
            }
            state.status = TestStatus::Running;
            state.started_at = Some(Instant::now());
        }
        notifier.notify();

        let launch = match self.launch_plan() {
            Ok(launch) => launch,
            Err(_) => {
                self.finish(-1, notifier);
                return;
            }
        };
        let spawned = if self.spec.curses {
            self.spawn_pty(&launch, notifier)
        } else {
            self.spawn_piped(&launch, notifier)
        };
        if spawned.is_err() {
            self.finish(-1, notifier);
            return;
        }
        self.spawn_wait_thread(notifier.clone());
    }

    /// Idempotent; safe on an already-terminated runner and concurrently
    /// with start. Closing the input/master handles unblocks any reader
    /// still parked on the descriptor.
    pub fn stop(&self) {
        let mut state = self.shared.lock().expect("runner lock");
        if let Some(child) = state.child.as_mut() {
            child.terminate();
        }
        state.input = None;
        state.pty_master = None;
    }

    pub fn force_stop(&self) {
        let mut state = self.shared.lock().expect("runner lock");
        if let Some(child) = state.child.as_mut() {
            child.force_kill();
        }
        state.input = None;
        state.pty_master = None;
    }

    pub fn write_input(&self, bytes: &[u8]) -> Result<(), RunnerError> {
        let mut state = self.shared.lock().expect("runner lock");
        let Some(writer) = state.input.as_mut() else {
            return Err(RunnerError::InputUnavailable {
                path: self.spec.path.clone(),
            });
        };
        writer
            .write_all(bytes)
            .and_then(|_| writer.flush())
            .map_err(|error| RunnerError::InputWrite {
                path: self.spec.path.clone(),
                error,
            })
    }

    pub fn view(&self) -> RunnerView {
        let state = self.shared.lock().expect("runner lock");
        let duration = match (state.status, state.started_at) {
            (TestStatus::Running, Some(started)) => started.elapsed(),
            _ => state.duration,
        };
        RunnerView {
            kind: self.kind,
            config_index: self.config_index,
            path: self.spec.path.clone(),
            status: state.status,
            code: state.code,
            info: self.spec.info,
            curses: self.spec.curses,
            output_pane: self.spec.output,
            pane_rows: self.spec.pane_rows,
            pane_cols: self.spec.pane_cols,
            keys: self.spec.keys.clone(),
            duration,
            finished_elapsed: state.finished_at.map(|finished| finished.elapsed()),
            lines: state.output.lines(),
        }
    }

    fn launch_plan(&self) -> Result<(String, Vec<String>), RunnerError> {
        match self.spec.base_type.as_str() {
            "script" => {
                let mut args = Vec::with_capacity(self.spec.args.len() + 1);
                args.push(self.spec.path.clone());
                args.extend(self.spec.args.iter().cloned());
                Ok(("sh".to_owned(), args))
            }
            "binary" => Ok((self.spec.path.clone(), self.spec.args.clone())),
            _ => Err(RunnerError::UnknownType {
                path: self.spec.path.clone(),
                type_decl: self.spec.base_type.clone(),
            }),
        }
    }

    fn spawn_piped(
        &self,
        launch: &(String, Vec<String>),
        notifier: &Notifier,
    ) -> Result<(), RunnerError> {
        let (program, args) = launch;
        let mut command = ProcessCommand::new(program);
        command
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        #[cfg(unix)]
        unsafe {
            command.pre_exec(|| {
                setpgid(Pid::from_raw(0), Pid::from_raw(0))
                    .map_err(|error| io::Error::new(ErrorKind::Other, error.to_string()))
            });
        }
        let mut child = command.spawn().map_err(|error| RunnerError::Spawn {
            path: self.spec.path.clone(),
            error,
        })?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let stdin = child.stdin.take();
        {
            let mut state = self.shared.lock().expect("runner lock");
            state.child = Some(ChildHandle::Plain(child));
            state.input = stdin.map(|pipe| Box::new(pipe) as Box<dyn Write + Send>);
        }
        if let Some(stream) = stdout {
            self.spawn_drain_thread(Box::new(stream), notifier.clone());
        }
        if let Some(stream) = stderr {
            self.spawn_drain_thread(Box::new(stream), notifier.clone());
        }
        Ok(())
    }

    fn spawn_pty(
        &self,
        launch: &(String, Vec<String>),
        notifier: &Notifier,
    ) -> Result<(), RunnerError> {
        let (program, args) = launch;
        let pty_system = native_pty_system();
        let pair = pty_system
            .openpty(PtySize {
                rows: PTY_ROWS,
                cols: PTY_COLS,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|error| self.pty_error(&error))?;

        let mut command = CommandBuilder::new(program);
        command.args(args);
        // CommandBuilder starts from an empty environment.
        for (key, value) in std::env::vars() {
            command.env(key, value);
        }
        command.env("TERM", "xterm-256color");
        if let Ok(cwd) = std::env::current_dir() {
            command.cwd(cwd);
        }

        let child = pair
            .slave
            .spawn_command(command)
            .map_err(|error| self.pty_error(&error))?;
        drop(pair.slave);
        let writer = pair
            .master
            .take_writer()
            .map_err(|error| self.pty_error(&error))?;
        let reader = pair
            .master
            .try_clone_reader()
            .map_err(|error| self.pty_error(&error))?;
        {
            let mut state = self.shared.lock().expect("runner lock");
            state.child = Some(ChildHandle::Pty(child));
            state.input = Some(writer);
            state.pty_master = Some(pair.master);
        }
        self.spawn_drain_thread(reader, notifier.clone());
        Ok(())
    }

    fn pty_error(&self, error: &dyn std::fmt::Display) -> RunnerError {
        RunnerError::Pty {
            path: self.spec.path.clone(),
            message: error.to_string(),
        }
    }

    fn spawn_drain_thread(&self, mut stream: Box<dyn Read + Send>, notifier: Notifier) {
        let shared = Arc::clone(&self.shared);
        thread::spawn(move || {
            let mut buf = [0u8; READ_CHUNK];
            loop {
                match stream.read(&mut buf) {
                    Ok(0) => break,
                    Ok(n) => {
                        shared.lock().expect("runner lock").output.ingest(&buf[..n]);
                        notifier.notify();
                    }
                    Err(error) if error.kind() == ErrorKind::Interrupted => continue,
                    // Any other read error is end-of-stream for this pipe;
                    // only process exit decides pass/fail.
                    Err(_) => break,
                }
            }
        });
    }

    fn spawn_wait_thread(&self, notifier: Notifier) {
        let shared = Arc::clone(&self.shared);
        thread::spawn(move || loop {
            let waited = {
                let mut state = shared.lock().expect("runner lock");
                let Some(child) = state.child.as_mut() else {
                    break;
                };
                match child.try_wait_code() {
                    Ok(code) => code,
                    Err(_) => Some(-1),
                }
            };
            match waited {
                Some(code) => {
                    finish_shared(&shared, code);
                    notifier.notify();
                    break;
                }
                None => thread::sleep(WAIT_POLL),
            }
        });
    }

    fn finish(&self, code: i32, notifier: &Notifier) {
        finish_shared(&self.shared, code);
        notifier.notify();
    }
}

fn finish_shared(shared: &Arc<Mutex<RunnerState>>, code: i32) {
    let mut state = shared.lock().expect("runner lock");
    if state.status.is_terminal() {
        return;
    }
    state.status = if code == 0 {
        TestStatus::Passed
    } else {
        TestStatus::Failed
    };
    state.code = code;
    let finished = Instant::now();
    state.finished_at = Some(finished);
    if let Some(started) = state.started_at {
        state.duration = finished.saturating_duration_since(started);
    }
    state.child = None;
    state.input = None;
    state.pty_master = None;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_log_keeps_only_last_n_lines() {
        let mut log = LineLog::new(3);
        for i in 0..8 {
            log.append_chunk(&format!("line-{i}\n"));
        }
        assert_eq!(log.len(), 3);
        assert_eq!(log.lines(), vec!["line-5", "line-6", "line-7"]);
    }

    #[test]
    fn line_log_reassembles_partial_chunks() {
        let mut log = LineLog::new(10);
        log.append_chunk("downloading ");
        log.append_chunk("firmware\ndone\n");
        assert_eq!(log.lines(), vec!["downloading firmware", "done"]);
    }

    #[test]
    fn line_log_normalizes_carriage_returns() {
        let mut log = LineLog::new(10);
        log.append_chunk("a\r\nb\rc\n");
        assert_eq!(log.lines(), vec!["a", "b", "c"]);
    }

    #[test]
    fn line_log_minimum_capacity_is_one() {
        let mut log = LineLog::new(0);
        log.append_chunk("first\nsecond\n");
        assert_eq!(log.lines(), vec!["second"]);
    }

    #[test]
    fn status_labels_match_display_contract() {
        assert_eq!(TestStatus::Waiting.label(), "WAITING");
        assert_eq!(TestStatus::Running.label(), "RUNNING");
        assert_eq!(TestStatus::Passed.label(), "PASSED");
        assert_eq!(TestStatus::Failed.label(), "FAILED");
        assert!(!TestStatus::Running.is_terminal());
        assert!(TestStatus::Failed.is_terminal());
    }
}
