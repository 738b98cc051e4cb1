use std::time::Duration;

use crate::orchestrator::{Orchestrator, Phase};
use crate::tui::print_results_summary;
use crate::ui::{NoticeLevel, OutputMode, PlainRenderer, Renderer, UiError};

const POLL_WAIT: Duration = Duration::from_millis(200);
const SHUTDOWN_GRACE_TIMEOUT: Duration = Duration::from_secs(3);

/// Runs the whole session without a terminal UI: launch everything, wait
/// for completion, print the results table. Meant for CI and piped
/// invocations where the live view cannot render. Interactive tests still
/// run; they just have no keyboard attached.
pub fn run_headless(orchestrator: &mut Orchestrator) -> Result<i32, UiError> {
    let mut renderer = PlainRenderer::stdout(OutputMode::from_env());
    let total = orchestrator.total_runners();
    if total == 0 {
        renderer.notice(NoticeLevel::Warning, "no tests configured")?;
        return Ok(0);
    }

    let spinner = renderer.spinner(&format!("Running {total} tests"))?;
    orchestrator.start_all();

    let mut finished_seen = 0usize;
    loop {
        let _ = orchestrator.next_event_timeout(POLL_WAIT);
        orchestrator.observe();
        let finished = orchestrator
            .all_runners()
            .filter(|runner| runner.status().is_terminal())
            .count();
        if finished != finished_seen {
            finished_seen = finished;
            spinner.set_message(&format!("Running tests ({finished}/{total} finished)"));
        }
        if orchestrator.phase() == Phase::Final {
            break;
        }
    }

    orchestrator.shutdown_with_progress(SHUTDOWN_GRACE_TIMEOUT, |_| {});
    let exit_code = orchestrator.exit_code();
    if exit_code == 0 {
        spinner.finish_success("All tests finished");
    } else {
        spinner.finish_error("Some tests failed");
    }
    print_results_summary(orchestrator)?;
    Ok(exit_code)
}
