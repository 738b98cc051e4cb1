use std::collections::VecDeque;
use std::time::Instant;

use crossterm::event::KeyEvent;

use crate::runner::RunnerKind;

const MAX_TRACE_LINES: usize = 48;

/// Env-gated runtime counters for debugging session behavior without a
/// log file. Enabled with `BURNIN_TUI_DIAGNOSTICS=1`; disabled, every
/// recorder is a no-op.
#[derive(Debug, Clone)]
pub(crate) struct RuntimeDiagnostics {
    enabled: bool,
    started_at: Instant,
    frame_count: usize,
    keypress_count: usize,
    drained_events: usize,
    custom_chord_hits: usize,
    restarts: usize,
    dropped_keys: usize,
    traces: VecDeque<String>,
}

impl RuntimeDiagnostics {
    pub(crate) fn from_env() -> Self {
        let enabled = std::env::var("BURNIN_TUI_DIAGNOSTICS")
            .ok()
            .is_some_and(|value| value == "1" || value.eq_ignore_ascii_case("true"));
        Self {
            enabled,
            started_at: Instant::now(),
            frame_count: 0,
            keypress_count: 0,
            drained_events: 0,
            custom_chord_hits: 0,
            restarts: 0,
            dropped_keys: 0,
            traces: VecDeque::new(),
        }
    }

    pub(crate) fn enabled(&self) -> bool {
        self.enabled
    }

    pub(crate) fn status_line(&self) -> String {
        format!(
            "diag {}ms frames={} keys={} events={} restarts={} dropped={}",
            self.started_at.elapsed().as_millis(),
            self.frame_count,
            self.keypress_count,
            self.drained_events,
            self.restarts,
            self.dropped_keys,
        )
    }

    pub(crate) fn record_frame(&mut self) {
        if !self.enabled {
            return;
        }
        self.frame_count = self.frame_count.saturating_add(1);
    }

    pub(crate) fn record_drained(&mut self, count: usize) {
        if !self.enabled {
            return;
        }
        self.drained_events = self.drained_events.saturating_add(count);
    }

    pub(crate) fn record_keypress(&mut self, key: &KeyEvent) {
        if !self.enabled {
            return;
        }
        self.keypress_count = self.keypress_count.saturating_add(1);
        self.push_trace(format!(
            "key code={:?} modifiers={:?}",
            key.code, key.modifiers
        ));
    }

    pub(crate) fn record_custom_chord(&mut self, name: &str) {
        if !self.enabled {
            return;
        }
        self.custom_chord_hits = self.custom_chord_hits.saturating_add(1);
        self.push_trace(format!("custom-chord key={name}"));
    }

    pub(crate) fn record_restart(&mut self, kind: RunnerKind, index: usize) {
        if !self.enabled {
            return;
        }
        self.restarts = self.restarts.saturating_add(1);
        self.push_trace(format!("restart kind={} slot={index}", kind.label()));
    }

    pub(crate) fn record_dropped_key(&mut self, key: &KeyEvent) {
        if !self.enabled {
            return;
        }
        self.dropped_keys = self.dropped_keys.saturating_add(1);
        self.push_trace(format!("dropped code={:?}", key.code));
    }

    fn push_trace(&mut self, line: String) {
        self.traces.push_back(line);
        while self.traces.len() > MAX_TRACE_LINES {
            self.traces.pop_front();
        }
    }
}
