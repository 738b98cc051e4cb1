use std::time::Duration;

use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::symbols::border;
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::Frame;

use crate::orchestrator::Phase;
use crate::runner::{RunnerView, TestStatus};

use super::diagnostics::RuntimeDiagnostics;
use super::tiles::{arrange_rows, pane_body, tile_content, view_for, TileContent};
use super::UiState;

const CHECKBOX_COLUMN_HEIGHT: usize = 4;
const FINAL_NAME_WIDTH: usize = 22;
const FINAL_STATUS_WIDTH: usize = 12;

pub(super) fn render_ui(
    frame: &mut Frame<'_>,
    phase: Phase,
    background: &[RunnerView],
    interactive: &[RunnerView],
    ui: &UiState,
    exit_code: i32,
    diagnostics: &RuntimeDiagnostics,
) {
    match phase {
        Phase::Final => render_final_screen(frame, background, interactive, exit_code),
        Phase::Running => render_main_screen(frame, background, interactive, ui, diagnostics),
    }
}

fn render_main_screen(
    frame: &mut Frame<'_>,
    background: &[RunnerView],
    interactive: &[RunnerView],
    ui: &UiState,
    diagnostics: &RuntimeDiagnostics,
) {
    let area = frame.area();
    let left_width = ((area.width as usize * 40) / 100).max(20) as u16;
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(left_width), Constraint::Min(10)])
        .split(area);
    render_status_panel(frame, chunks[0], background, interactive, diagnostics);
    render_tile_panel(frame, chunks[1], background, interactive, ui);
}

fn render_status_panel(
    frame: &mut Frame<'_>,
    area: Rect,
    background: &[RunnerView],
    interactive: &[RunnerView],
    diagnostics: &RuntimeDiagnostics,
) {
    let muted = Style::default().fg(Color::DarkGray);
    let mut lines: Vec<Line> = banner_lines();
    lines.push(Line::from(""));

    lines.extend(collapsed_status_lines(
        background,
        interactive,
        TestStatus::Passed,
        "PASSED",
        Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
    ));
    lines.extend(collapsed_status_lines(
        background,
        interactive,
        TestStatus::Failed,
        "FAILED",
        Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
    ));

    lines.push(Line::from(section_separator("RUNNING TESTS")));
    lines.push(Line::from("===> background:"));
    for rendered in columnize("[ ]", &running_paths(background), CHECKBOX_COLUMN_HEIGHT) {
        lines.push(Line::from(rendered));
    }
    lines.push(Line::from("===> interactive:"));
    for rendered in columnize("[ ]", &running_paths(interactive), CHECKBOX_COLUMN_HEIGHT) {
        lines.push(Line::from(rendered));
    }

    lines.push(Line::from(""));
    for hint in [
        "Press [ctrl+q] or [ESC] to quit | [ctrl+r] restarts ALL tests",
        "[ctrl+<-]/[ctrl+->] switch pane focus",
        "[ctrl+e] or [ctrl+<restart>] restarts the focused test",
    ] {
        lines.push(Line::from(Span::styled(hint, muted)));
    }

    let custom = custom_key_lines(background, interactive);
    if !custom.is_empty() {
        lines.push(Line::from(""));
        for rendered in custom {
            lines.push(Line::from(Span::styled(rendered, muted)));
        }
    }

    if diagnostics.enabled() {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            diagnostics.status_line(),
            Style::default().fg(Color::Yellow),
        )));
    }

    let panel = Paragraph::new(lines).block(panel_block(Some(" BURNIN "), true, Color::Cyan));
    frame.render_widget(panel, area);
}

fn render_tile_panel(
    frame: &mut Frame<'_>,
    area: Rect,
    background: &[RunnerView],
    interactive: &[RunnerView],
    ui: &UiState,
) {
    let panel = panel_block(None, false, Color::DarkGray);
    let inner = panel.inner(area);
    frame.render_widget(panel, area);

    let contents: Vec<TileContent> = ui
        .tiles
        .iter()
        .enumerate()
        .filter_map(|(idx, tile)| {
            view_for(*tile, background, interactive)
                .map(|view| tile_content(view, idx == ui.focused))
        })
        .collect();

    let mut y = inner.y;
    for row in arrange_rows(contents, inner.width as usize) {
        if y >= inner.y.saturating_add(inner.height) {
            break;
        }
        let row_height = row
            .iter()
            .map(TileContent::rendered_rows)
            .max()
            .unwrap_or(0) as u16;
        let mut x = inner.x;
        for tile in &row {
            let rect = Rect::new(
                x,
                y,
                tile.rendered_cols() as u16,
                tile.rendered_rows() as u16,
            )
            .intersection(inner);
            if rect.width > 2 && rect.height >= 2 {
                render_tile(frame, rect, tile);
            }
            x = x.saturating_add(tile.rendered_cols() as u16 + 2);
        }
        y = y.saturating_add(row_height + 1);
    }
}

fn render_tile(frame: &mut Frame<'_>, area: Rect, tile: &TileContent) {
    let border_color = if tile.selected {
        Color::Cyan
    } else if tile.failed {
        Color::Red
    } else {
        Color::DarkGray
    };
    let title_width = area.width.saturating_sub(2) as usize;
    let title: String = tile.title.chars().take(title_width).collect();
    let title_style = if tile.selected {
        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
    } else {
        Style::default().add_modifier(Modifier::BOLD)
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title_top(Line::from(Span::styled(title, title_style)).left_aligned());
    let body: Vec<Line> = pane_body(tile).into_iter().map(Line::from).collect();
    frame.render_widget(Paragraph::new(body).block(block), area);
}

fn render_final_screen(
    frame: &mut Frame<'_>,
    background: &[RunnerView],
    interactive: &[RunnerView],
    exit_code: i32,
) {
    let mut lines: Vec<Line> = final_banner_lines();
    lines.push(Line::from(""));
    let separator = "=".repeat(FINAL_NAME_WIDTH + FINAL_STATUS_WIDTH + 18);
    lines.push(Line::from(separator.clone()));
    lines.push(Line::from(format!(
        " {} | {} | TIME",
        pad_right("TEST", FINAL_NAME_WIDTH),
        pad_right("STATUS", FINAL_STATUS_WIDTH),
    )));
    lines.push(Line::from(separator.clone()));

    let mut views: Vec<&RunnerView> = background.iter().chain(interactive.iter()).collect();
    views.sort_by_key(|view| view.duration);
    for view in views {
        lines.push(final_row(view));
    }
    lines.push(Line::from(separator));
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        format!(
            "Press [ctrl+q] or [ESC] to quit (exit code {exit_code}) | [ctrl+r] restarts ALL tests"
        ),
        Style::default().fg(Color::DarkGray),
    )));

    let panel = Paragraph::new(lines).block(panel_block(Some(" FINAL RESULTS "), true, Color::Cyan));
    frame.render_widget(panel, frame.area());
}

fn final_row(view: &RunnerView) -> Line<'static> {
    let (status, style) = status_cell(view);
    Line::from(vec![
        Span::raw(format!(" {} | ", pad_right(&view.path, FINAL_NAME_WIDTH))),
        Span::styled(pad_right(&status, FINAL_STATUS_WIDTH), style),
        Span::raw(format!(" | {}", format_duration(view.duration))),
    ])
}

pub(super) fn status_cell(view: &RunnerView) -> (String, Style) {
    match view.status {
        TestStatus::Passed => (
            "[PASSED]".to_owned(),
            Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
        ),
        TestStatus::Failed => (
            format!("[FAILED={}]", view.code),
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        ),
        other => (
            format!("[{}]", other.label()),
            Style::default().fg(Color::DarkGray),
        ),
    }
}

fn collapsed_status_lines(
    background: &[RunnerView],
    interactive: &[RunnerView],
    status: TestStatus,
    caption: &str,
    style: Style,
) -> Vec<Line<'static>> {
    let names: Vec<String> = background
        .iter()
        .chain(interactive.iter())
        .filter(|view| view.status == status)
        .map(|view| view.path.clone())
        .collect();
    if names.is_empty() {
        return Vec::new();
    }
    let mut lines = vec![Line::from(section_separator(caption))];
    for rendered in columnize("[x]", &names, CHECKBOX_COLUMN_HEIGHT) {
        lines.push(Line::from(Span::styled(rendered, style)));
    }
    lines
}

fn running_paths(views: &[RunnerView]) -> Vec<String> {
    views
        .iter()
        .filter(|view| view.status == TestStatus::Running)
        .map(|view| view.path.clone())
        .collect()
}

fn section_separator(label: &str) -> String {
    format!("==== {label} ====")
}

/// Per-test tree of the configured ctrl-chord injections, in config order.
fn custom_key_lines(background: &[RunnerView], interactive: &[RunnerView]) -> Vec<String> {
    let mut lines = Vec::new();
    for (caption, views) in [("Background:", background), ("Interactive:", interactive)] {
        let bound: Vec<&RunnerView> = views
            .iter()
            .filter(|view| !view.keys.custom.is_empty())
            .collect();
        if bound.is_empty() {
            continue;
        }
        if lines.is_empty() {
            lines.push("Custom keys:".to_owned());
        }
        lines.push(caption.to_owned());
        for view in bound {
            lines.push(format!("  {}:", view.path));
            for (key, mapped) in &view.keys.custom {
                lines.push(format!("    ctrl+{key} => {}", printable_binding(mapped)));
            }
        }
    }
    lines
}

fn printable_binding(raw: &str) -> String {
    raw.replace('\u{1b}', "\\e")
        .replace('\n', "\\n")
        .replace('\r', "\\r")
        .replace('\t', "\\t")
}

/// Stacks names into columns of `max_per_col` entries rendered side by
/// side, each prefixed with its checkbox marker.
pub(super) fn columnize(prefix: &str, names: &[String], max_per_col: usize) -> Vec<String> {
    if names.is_empty() {
        return Vec::new();
    }
    let columns: Vec<&[String]> = names.chunks(max_per_col.max(1)).collect();
    let height = columns.iter().map(|column| column.len()).max().unwrap_or(0);
    let cell_width = names.iter().map(|name| name.chars().count()).max().unwrap_or(0)
        + prefix.chars().count()
        + 1;
    (0..height)
        .map(|row| {
            columns
                .iter()
                .filter_map(|column| column.get(row))
                .map(|name| pad_right(&format!("{prefix} {name}"), cell_width))
                .collect::<Vec<String>>()
                .join("    ")
                .trim_end()
                .to_owned()
        })
        .collect()
}

pub(super) fn pad_right(text: &str, width: usize) -> String {
    let len = text.chars().count();
    if len >= width {
        return text.to_owned();
    }
    let mut padded = text.to_owned();
    padded.push_str(&" ".repeat(width - len));
    padded
}

pub(crate) fn format_duration(duration: Duration) -> String {
    let seconds = duration.as_secs();
    if seconds >= 3600 {
        format!(
            "{}h{:02}m{:02}s",
            seconds / 3600,
            (seconds % 3600) / 60,
            seconds % 60
        )
    } else if seconds >= 60 {
        format!("{}m{:02}s", seconds / 60, seconds % 60)
    } else {
        format!("{:.1}s", duration.as_secs_f64())
    }
}

fn banner_lines() -> Vec<Line<'static>> {
    let style = Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD);
    [
        r" _                      _ ",
        r"| |__  _   _ _ __ _ __ (_)_ __",
        r"| '_ \| | | | '__| '_ \| | '_ \",
        r"| |_) | |_| | |  | | | | | | | |",
        r"|_.__/ \__,_|_|  |_| |_|_|_| |_|",
        r"",
        r"*****--------  burn it all in  --------*****",
    ]
    .into_iter()
    .map(|line| Line::from(Span::styled(line, style)))
    .collect()
}

fn final_banner_lines() -> Vec<Line<'static>> {
    [
        r" _____ ___ _   _    _    _",
        r"|  ___|_ _| \ | |  / \  | |",
        r"| |_   | ||  \| | / _ \ | |",
        r"|  _|  | || |\  |/ ___ \| |___",
        r"|_|   |___|_| \_/_/   \_\_____|",
        r"",
        r"*****-----------  FINAL RESULTS  -----------*****",
    ]
    .into_iter()
    .map(Line::from)
    .collect()
}

pub(super) fn panel_block<'a>(
    title: Option<&'a str>,
    show_version: bool,
    border_color: Color,
) -> Block<'a> {
    let mut block = Block::default()
        .borders(Borders::ALL)
        .border_set(border::ROUNDED)
        .border_style(Style::default().fg(border_color));
    if let Some(title) = title {
        block = block.title_top(
            Line::from(Span::styled(
                title.to_owned(),
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            ))
            .left_aligned(),
        );
    }
    if show_version {
        let version = format!(" v{} ", env!("CARGO_PKG_VERSION"));
        block = block.title_bottom(
            Line::from(Span::styled(version, Style::default().fg(Color::Blue)))
                .right_aligned(),
        );
    }
    block
}
