use std::io;
use std::time::Duration;

use crossterm::event::{self, Event, KeyEventKind};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnableLineWrap, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::style::{Color, Style};
use ratatui::widgets::Paragraph;
use ratatui::Terminal;

use crate::orchestrator::{Orchestrator, ShutdownProgress};
use crate::runner::{RunnerView, TestStatus};
use crate::ui::{OutputMode, PlainRenderer, Renderer, SummaryCounts, TableSpec, UiError};

mod diagnostics;
mod input;
mod render;
mod tiles;

use diagnostics::RuntimeDiagnostics;
use input::{handle_key, KeyOutcome};
use render::render_ui;
pub(crate) use render::format_duration;
use tiles::{build_tiles, Tile};

const MAX_EVENTS_PER_TICK: usize = 200;
const EVENT_DRAIN_WAIT: Duration = Duration::from_millis(1);
const TICK_WAIT: Duration = Duration::from_millis(150);
const SHUTDOWN_GRACE_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug)]
pub enum TuiError {
    Io(io::Error),
    Ui(UiError),
}

impl std::fmt::Display for TuiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TuiError::Io(err) => write!(f, "{err}"),
            TuiError::Ui(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for TuiError {}

impl From<io::Error> for TuiError {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<UiError> for TuiError {
    fn from(value: UiError) -> Self {
        Self::Ui(value)
    }
}

/// Focus state plus the tile projection rebuilt every tick.
pub(crate) struct UiState {
    pub(crate) tiles: Vec<Tile>,
    pub(crate) focused: usize,
}

impl UiState {
    fn new() -> Self {
        Self {
            tiles: Vec::new(),
            focused: 0,
        }
    }

    pub(crate) fn focused_tile(&self) -> Option<Tile> {
        self.tiles.get(self.focused).copied()
    }
}

type TuiTerminal = Terminal<CrosstermBackend<std::io::Stdout>>;

/// Runs the full-screen session: starts every configured test, drives the
/// render/input loop until quit, then tears the terminal down and prints a
/// plain results summary. Returns the aggregate exit code.
pub fn run_tui(orchestrator: &mut Orchestrator) -> Result<i32, TuiError> {
    let mut terminal = init_terminal()?;
    let mut diagnostics = RuntimeDiagnostics::from_env();
    let mut ui = UiState::new();
    orchestrator.start_all();

    let result: Result<(), TuiError> = loop {
        let mut drained = 0usize;
        while drained < MAX_EVENTS_PER_TICK && orchestrator.next_event_timeout(EVENT_DRAIN_WAIT) {
            drained += 1;
        }
        diagnostics.record_drained(drained);
        orchestrator.observe();

        let (background, interactive) = orchestrator.views();
        ui.tiles = build_tiles(&background, &interactive);
        if !ui.tiles.is_empty() && ui.focused >= ui.tiles.len() {
            ui.focused = ui.tiles.len() - 1;
        }
        diagnostics.record_frame();

        let phase = orchestrator.phase();
        let exit_code = orchestrator.exit_code();
        let draw = terminal.draw(|frame| {
            render_ui(
                frame,
                phase,
                &background,
                &interactive,
                &ui,
                exit_code,
                &diagnostics,
            )
        });
        if let Err(err) = draw {
            break Err(TuiError::Io(err));
        }

        match event::poll(TICK_WAIT) {
            Ok(true) => match event::read() {
                Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => {
                    match handle_key(&key, orchestrator, &mut ui, &mut diagnostics) {
                        KeyOutcome::Quit => break Ok(()),
                        KeyOutcome::Continue => {}
                    }
                }
                Ok(_) => {}
                Err(err) => break Err(TuiError::Io(err)),
            },
            Ok(false) => {}
            Err(err) => break Err(TuiError::Io(err)),
        }
    };

    orchestrator.shutdown_with_progress(SHUTDOWN_GRACE_TIMEOUT, |progress| {
        let label = match progress {
            ShutdownProgress::SendingTerm => "Shutdown: stopping tests...",
            ShutdownProgress::Waiting => "Shutdown: waiting for tests to exit...",
            ShutdownProgress::ForceKilling => "Shutdown: forcing remaining tests to stop...",
            ShutdownProgress::Complete { .. } => "Shutdown: complete.",
        };
        let _ = draw_shutdown_status(&mut terminal, label);
    });

    restore_terminal(&mut terminal)?;
    print_results_summary(orchestrator)?;

    result?;
    Ok(orchestrator.exit_code())
}

fn init_terminal() -> Result<TuiTerminal, io::Error> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;
    Ok(terminal)
}

fn restore_terminal(terminal: &mut TuiTerminal) -> Result<(), io::Error> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, EnableLineWrap)?;
    terminal.show_cursor()?;
    Ok(())
}

fn draw_shutdown_status(terminal: &mut TuiTerminal, status: &str) -> Result<(), io::Error> {
    terminal.draw(|frame| {
        let area = frame.area();
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(1), Constraint::Length(1)])
            .split(area);
        let footer = Paragraph::new(status.to_owned()).style(Style::default().fg(Color::Yellow));
        frame.render_widget(footer, chunks[1]);
    })?;
    Ok(())
}

/// Printed after leaving the alternate screen, so the outcome survives in
/// the scrollback. The headless runner shares it as its final report.
pub(crate) fn print_results_summary(orchestrator: &Orchestrator) -> Result<(), UiError> {
    let (background, interactive) = orchestrator.views();
    let mut views: Vec<&RunnerView> = background.iter().chain(interactive.iter()).collect();
    views.sort_by_key(|view| view.duration);

    let mut renderer = PlainRenderer::stdout(OutputMode::from_env());
    renderer.section("Test Results")?;
    let rows = views
        .iter()
        .map(|view| {
            vec![
                view.path.clone(),
                view.kind.label().to_owned(),
                summary_status(view),
                format_duration(view.duration),
            ]
        })
        .collect();
    renderer.table(&TableSpec::new(
        vec![
            "test".to_owned(),
            "kind".to_owned(),
            "status".to_owned(),
            "time".to_owned(),
        ],
        rows,
    ))?;
    renderer.summary(summary_counts(&views))?;
    renderer.text("")?;
    Ok(())
}

pub(crate) fn summary_status(view: &RunnerView) -> String {
    let status = match view.status {
        TestStatus::Passed => "[PASSED]".to_owned(),
        TestStatus::Failed => format!("[FAILED={}]", view.code),
        other => format!("[{}]", other.label()),
    };
    if view.info {
        format!("{status} (info)")
    } else {
        status
    }
}

pub(crate) fn summary_counts(views: &[&RunnerView]) -> SummaryCounts {
    let mut counts = SummaryCounts {
        ok: 0,
        warn: 0,
        err: 0,
    };
    for view in views {
        match view.status {
            TestStatus::Passed => counts.ok += 1,
            TestStatus::Failed if view.info => counts.warn += 1,
            TestStatus::Failed => counts.err += 1,
            _ => {}
        }
    }
    counts
}
