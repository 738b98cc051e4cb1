use std::collections::VecDeque;

/// Parser position within the byte stream. Partial sequences never survive
/// past the end of a `write` chunk; they are dropped, not reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParseState {
    Ground,
    Escape,
    Csi,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EraseMode {
    ToEnd,
    ToStart,
    All,
    Ignore,
}

fn erase_mode(params: &str) -> EraseMode {
    match params.split(';').next().unwrap_or("") {
        "" | "0" => EraseMode::ToEnd,
        "1" => EraseMode::ToStart,
        "2" => EraseMode::All,
        _ => EraseMode::Ignore,
    }
}

/// A fixed rows x cols character grid emulating just enough of a terminal to
/// host curses-style child output: CSI cursor movement, line/screen erase,
/// and scroll-on-overflow. Everything else is consumed without effect.
#[derive(Debug, Clone)]
pub struct VirtualScreen {
    rows: usize,
    cols: usize,
    cells: VecDeque<Vec<char>>,
    cursor_row: usize,
    cursor_col: usize,
    state: ParseState,
    params: String,
}

impl VirtualScreen {
    pub fn new(rows: usize, cols: usize) -> Self {
        let rows = rows.max(1);
        let cols = cols.max(1);
        let cells = (0..rows).map(|_| vec![' '; cols]).collect();
        Self {
            rows,
            cols,
            cells,
            cursor_row: 0,
            cursor_col: 0,
            state: ParseState::Ground,
            params: String::new(),
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn cursor(&self) -> (usize, usize) {
        (self.cursor_row, self.cursor_col)
    }

    pub fn write(&mut self, bytes: &[u8]) {
        let text = String::from_utf8_lossy(bytes);
        for ch in text.chars() {
            self.step(ch);
        }
        // An unterminated escape sequence at the chunk boundary is dropped.
        self.state = ParseState::Ground;
        self.params.clear();
    }

    /// The full grid as newline-joined rows, always exactly rows x cols.
    pub fn render(&self) -> String {
        self.lines().join("\n")
    }

    pub fn lines(&self) -> Vec<String> {
        self.cells
            .iter()
            .map(|row| row.iter().collect::<String>())
            .collect()
    }

    fn step(&mut self, ch: char) {
        match self.state {
            ParseState::Ground => match ch {
                '\u{1b}' => self.state = ParseState::Escape,
                '\n' => self.line_feed(),
                '\r' => self.cursor_col = 0,
                _ => self.put_char(ch),
            },
            ParseState::Escape => {
                if ch == '[' {
                    self.params.clear();
                    self.state = ParseState::Csi;
                } else {
                    // Non-CSI escapes are dropped; the byte after ESC is
                    // reinterpreted as ordinary input.
                    self.state = ParseState::Ground;
                    self.step(ch);
                }
            }
            ParseState::Csi => {
                if ('\u{40}'..='\u{7e}').contains(&ch) {
                    self.dispatch_csi(ch);
                    self.state = ParseState::Ground;
                    self.params.clear();
                } else if ('\u{20}'..='\u{3f}').contains(&ch) {
                    self.params.push(ch);
                } else {
                    // Control byte inside a sequence: abandon it.
                    self.state = ParseState::Ground;
                    self.params.clear();
                    self.step(ch);
                }
            }
        }
    }

    fn dispatch_csi(&mut self, cmd: char) {
        match cmd {
            'J' => self.erase_screen(),
            'K' => self.erase_line(),
            'A' => {
                let n = self.numeric_param(0, 1);
                self.cursor_row = self.cursor_row.saturating_sub(n);
            }
            'B' => {
                let n = self.numeric_param(0, 1);
                self.cursor_row = (self.cursor_row + n).min(self.rows - 1);
            }
            'C' => {
                let n = self.numeric_param(0, 1);
                self.cursor_col = (self.cursor_col + n).min(self.cols - 1);
            }
            'D' => {
                let n = self.numeric_param(0, 1);
                self.cursor_col = self.cursor_col.saturating_sub(n);
            }
            'H' => {
                let row = self.numeric_param(0, 1).saturating_sub(1);
                let col = self.numeric_param(1, 1).saturating_sub(1);
                self.cursor_row = row.min(self.rows - 1);
                self.cursor_col = col.min(self.cols - 1);
            }
            _ => {}
        }
    }

    fn numeric_param(&self, index: usize, default: usize) -> usize {
        match self.params.split(';').nth(index) {
            Some("") | None => default,
            Some(raw) => raw.parse::<usize>().unwrap_or(default),
        }
    }

    fn erase_screen(&mut self) {
        match erase_mode(&self.params) {
            EraseMode::ToEnd => {
                for row in self.cursor_row..self.rows {
                    self.cells[row].fill(' ');
                }
            }
            EraseMode::ToStart => {
                for row in 0..=self.cursor_row {
                    self.cells[row].fill(' ');
                }
            }
            EraseMode::All => {
                for row in self.cells.iter_mut() {
                    row.fill(' ');
                }
                self.cursor_row = 0;
                self.cursor_col = 0;
            }
            EraseMode::Ignore => {}
        }
    }

    fn erase_line(&mut self) {
        let mode = erase_mode(&self.params);
        let col = self.cursor_col;
        let row = &mut self.cells[self.cursor_row];
        match mode {
            EraseMode::ToEnd => row[col..].fill(' '),
            EraseMode::ToStart => row[..=col].fill(' '),
            EraseMode::All => row.fill(' '),
            EraseMode::Ignore => {}
        }
    }

    fn put_char(&mut self, ch: char) {
        self.cells[self.cursor_row][self.cursor_col] = ch;
        self.cursor_col += 1;
        if self.cursor_col >= self.cols {
            self.cursor_col = 0;
            self.cursor_row += 1;
            if self.cursor_row >= self.rows {
                self.scroll();
                self.cursor_row = self.rows - 1;
            }
        }
    }

    fn line_feed(&mut self) {
        self.cursor_row += 1;
        self.cursor_col = 0;
        if self.cursor_row >= self.rows {
            self.scroll();
            self.cursor_row = self.rows - 1;
        }
    }

    fn scroll(&mut self) {
        self.cells.pop_front();
        self.cells.push_back(vec![' '; self.cols]);
    }
}
