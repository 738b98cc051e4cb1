use std::fmt::{Display, Formatter};

use crate::ui::widgets::{MessageBlock, NoticeLevel, StepState, SummaryCounts, TableSpec};

pub type UiResult<T> = Result<T, UiError>;

#[derive(Debug)]
pub enum UiError {
    Io(std::io::Error),
}

impl Display for UiError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            UiError::Io(error) => write!(f, "{error}"),
        }
    }
}

impl std::error::Error for UiError {}

impl From<std::io::Error> for UiError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

pub trait SpinnerHandle {
    fn set_message(&self, message: &str);
    fn finish_success(&self, message: &str);
    fn finish_error(&self, message: &str);
}

/// Plain (non-TUI) output surface: CLI errors, the post-session results
/// report, and the headless runner all print through this.
pub trait Renderer {
    fn text(&mut self, body: &str) -> UiResult<()>;
    fn section(&mut self, title: &str) -> UiResult<()>;
    fn notice(&mut self, level: NoticeLevel, body: &str) -> UiResult<()>;
    fn error_block(&mut self, block: &MessageBlock) -> UiResult<()>;
    fn step(&mut self, label: &str, state: StepState) -> UiResult<()>;
    fn summary(&mut self, counts: SummaryCounts) -> UiResult<()>;
    fn table(&mut self, spec: &TableSpec) -> UiResult<()>;
    fn spinner(&mut self, label: &str) -> UiResult<Box<dyn SpinnerHandle>>;
}
