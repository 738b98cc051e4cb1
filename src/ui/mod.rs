pub mod plain_renderer;
pub mod progress;
pub mod renderer;
pub mod table;
pub mod theme;
pub mod widgets;

pub use plain_renderer::PlainRenderer;
pub use renderer::{Renderer, SpinnerHandle, UiError, UiResult};
pub use theme::OutputMode;
pub use widgets::{MessageBlock, NoticeLevel, StepState, SummaryCounts, TableSpec};
