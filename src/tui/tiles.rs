use std::time::Duration;

use crate::runner::{RunnerKind, RunnerView, TestStatus};

/// How long a finished test keeps its full output pane before collapsing
/// to a one-line placeholder.
pub const FINISH_GRACE: Duration = Duration::from_secs(3);

pub const MIN_PLAIN_TILE_COLS: usize = 16;
const TILE_BORDER_COLS: usize = 2;
const TILE_GAP: usize = 2;

/// A transient per-render projection: which runner slot backs this pane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tile {
    pub kind: RunnerKind,
    pub index: usize,
}

/// Interactive tiles first, then background, matching the on-screen order.
/// A runner is eligible once it has left Waiting and its config asked for a
/// pane; finished runners stay listed (collapsed after the grace window).
pub fn build_tiles(background: &[RunnerView], interactive: &[RunnerView]) -> Vec<Tile> {
    let mut tiles = Vec::new();
    for (index, view) in interactive.iter().enumerate() {
        if view.output_pane && view.status != TestStatus::Waiting {
            tiles.push(Tile {
                kind: RunnerKind::Interactive,
                index,
            });
        }
    }
    for (index, view) in background.iter().enumerate() {
        if view.output_pane && view.status != TestStatus::Waiting {
            tiles.push(Tile {
                kind: RunnerKind::Background,
                index,
            });
        }
    }
    tiles
}

pub fn view_for<'a>(
    tile: Tile,
    background: &'a [RunnerView],
    interactive: &'a [RunnerView],
) -> Option<&'a RunnerView> {
    match tile.kind {
        RunnerKind::Background => background.get(tile.index),
        RunnerKind::Interactive => interactive.get(tile.index),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileContent {
    pub title: String,
    pub lines: Vec<String>,
    pub content_rows: usize,
    /// Content columns; 0 means flexible, resolved per row by
    /// `arrange_rows`.
    pub content_cols: usize,
    pub fixed_width: bool,
    pub selected: bool,
    pub failed: bool,
}

impl TileContent {
    pub fn rendered_rows(&self) -> usize {
        self.content_rows + 2
    }

    pub fn rendered_cols(&self) -> usize {
        self.content_cols + TILE_BORDER_COLS
    }
}

pub fn tile_content(view: &RunnerView, selected: bool) -> TileContent {
    let collapsed = view.status.is_terminal()
        && view
            .finished_elapsed
            .is_some_and(|elapsed| elapsed >= FINISH_GRACE);
    let (lines, content_rows) = if collapsed {
        (vec![format!("finished: {}", view.status.label())], 1)
    } else {
        (view.lines.clone(), view.pane_rows.max(1))
    };
    let title = if selected {
        format!("[SELECTED] {}", view.path)
    } else {
        view.path.clone()
    };
    let fixed_width = view.curses && !collapsed;
    TileContent {
        title,
        lines,
        content_rows,
        content_cols: if fixed_width { view.pane_cols } else { 0 },
        fixed_width,
        selected,
        failed: view.status == TestStatus::Failed,
    }
}

/// Packs tiles left-to-right into rows that fit `panel_width`, then splits
/// each row's leftover width evenly among its flexible (plain-log) tiles.
/// Every row holds at least one tile regardless of width.
pub fn arrange_rows(tiles: Vec<TileContent>, panel_width: usize) -> Vec<Vec<TileContent>> {
    let panel_width = panel_width.max(MIN_PLAIN_TILE_COLS + TILE_BORDER_COLS);
    // Provisional plain width targets two tiles plus one gap per row; the
    // real width is settled after packing.
    let provisional_plain = ((panel_width.saturating_sub(TILE_GAP)) / 2)
        .saturating_sub(TILE_BORDER_COLS)
        .max(MIN_PLAIN_TILE_COLS);

    let mut rows: Vec<Vec<TileContent>> = Vec::new();
    let mut row: Vec<TileContent> = Vec::new();
    let mut used = 0usize;
    for tile in tiles {
        let rendered = if tile.fixed_width {
            tile.rendered_cols()
        } else {
            provisional_plain + TILE_BORDER_COLS
        };
        if !row.is_empty() && used + TILE_GAP + rendered > panel_width {
            rows.push(std::mem::take(&mut row));
            used = 0;
        }
        used += if row.is_empty() {
            rendered
        } else {
            TILE_GAP + rendered
        };
        row.push(tile);
    }
    if !row.is_empty() {
        rows.push(row);
    }

    for row in &mut rows {
        let fixed_total: usize = row
            .iter()
            .filter(|tile| tile.fixed_width)
            .map(TileContent::rendered_cols)
            .sum();
        let gaps = row.len().saturating_sub(1) * TILE_GAP;
        let flexible = row.iter().filter(|tile| !tile.fixed_width).count();
        if flexible == 0 {
            continue;
        }
        let remaining = panel_width.saturating_sub(fixed_total + gaps);
        let share = (remaining / flexible)
            .saturating_sub(TILE_BORDER_COLS)
            .max(MIN_PLAIN_TILE_COLS);
        for tile in row.iter_mut().filter(|tile| !tile.fixed_width) {
            tile.content_cols = share;
        }
    }
    rows
}

/// The pane body: most recent `content_rows` lines, each truncated to the
/// content width, blank-padded to exactly `content_rows` rows.
pub fn pane_body(tile: &TileContent) -> Vec<String> {
    let skip = tile.lines.len().saturating_sub(tile.content_rows);
    let mut body: Vec<String> = tile
        .lines
        .iter()
        .skip(skip)
        .map(|line| line.chars().take(tile.content_cols).collect())
        .collect();
    while body.len() < tile.content_rows {
        body.push(String::new());
    }
    body
}
