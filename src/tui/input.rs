use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::orchestrator::Orchestrator;
use crate::runner::TestStatus;

use super::diagnostics::RuntimeDiagnostics;
use super::UiState;

pub(crate) enum KeyOutcome {
    Continue,
    Quit,
}

/// Priority chain per key event, first match consumes it:
/// custom chords (all runners) > focused restart > focus chords > global
/// restart/quit > pane navigation > raw forwarding to the focused child.
pub(crate) fn handle_key(
    key: &KeyEvent,
    orchestrator: &mut Orchestrator,
    ui: &mut UiState,
    diagnostics: &mut RuntimeDiagnostics,
) -> KeyOutcome {
    diagnostics.record_keypress(key);
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    let chord = if ctrl { chord_name(key.code) } else { None };

    if let Some(name) = chord.as_deref() {
        if route_custom_chord(orchestrator, name) {
            diagnostics.record_custom_chord(name);
            return KeyOutcome::Continue;
        }
    }

    // ctrl+e, or the focused tile's own restart chord.
    if let Some(name) = chord.as_deref() {
        if let Some(tile) = ui.focused_tile() {
            let restart_binding = orchestrator
                .runner(tile.kind, tile.index)
                .map(|runner| runner.spec().keys.restart.clone());
            if let Some(binding) = restart_binding {
                if name == "e" || (!binding.is_empty() && binding == name) {
                    orchestrator.restart_slot(tile.kind, tile.index);
                    diagnostics.record_restart(tile.kind, tile.index);
                    return KeyOutcome::Continue;
                }
            }
        }
    }

    // Focus chords switch the selected tile, nothing else.
    if let Some(name) = chord.as_deref() {
        let target = ui.tiles.iter().position(|tile| {
            orchestrator
                .runner(tile.kind, tile.index)
                .map(|runner| {
                    let focus = &runner.spec().keys.focus;
                    !focus.is_empty() && focus == name
                })
                .unwrap_or(false)
        });
        if let Some(index) = target {
            ui.focused = index;
            return KeyOutcome::Continue;
        }
    }

    if ctrl && matches!(key.code, KeyCode::Char('r')) {
        orchestrator.restart_all();
        ui.focused = 0;
        return KeyOutcome::Continue;
    }
    if matches!(key.code, KeyCode::Esc)
        || (ctrl && matches!(key.code, KeyCode::Char('q') | KeyCode::Char('c')))
    {
        return KeyOutcome::Quit;
    }

    if ctrl && matches!(key.code, KeyCode::Right) {
        if !ui.tiles.is_empty() {
            ui.focused = (ui.focused + 1) % ui.tiles.len();
        }
        return KeyOutcome::Continue;
    }
    if ctrl && matches!(key.code, KeyCode::Left) {
        if !ui.tiles.is_empty() {
            ui.focused = (ui.focused + ui.tiles.len() - 1) % ui.tiles.len();
        }
        return KeyOutcome::Continue;
    }

    // Anything unmodified goes to the focused tile's child, if running.
    if !ctrl {
        if let Some(tile) = ui.focused_tile() {
            if let Some(runner) = orchestrator.runner(tile.kind, tile.index) {
                if runner.status() == TestStatus::Running {
                    if let Some(bytes) = key_to_child_bytes(key.code) {
                        let _ = runner.write_input(&bytes);
                        return KeyOutcome::Continue;
                    }
                }
            }
        }
    }

    diagnostics.record_dropped_key(key);
    KeyOutcome::Continue
}

/// Custom chords fire on every running runner that binds them, focused or
/// not; several runners may share one physical key. Returns whether any
/// runner consumed the chord.
pub(crate) fn route_custom_chord(orchestrator: &Orchestrator, name: &str) -> bool {
    let mut matched = false;
    for runner in orchestrator.all_runners() {
        if runner.status() != TestStatus::Running {
            continue;
        }
        if let Some(mapped) = runner.spec().keys.custom.get(name) {
            let _ = runner.write_input(mapped.as_bytes());
            matched = true;
        }
    }
    matched
}

/// Binding names are single characters held under ctrl.
fn chord_name(code: KeyCode) -> Option<String> {
    match code {
        KeyCode::Char(c) => Some(c.to_ascii_lowercase().to_string()),
        _ => None,
    }
}

/// Translates a key to the byte sequence an xterm-flavored child expects.
/// Printables pass through literally; unmapped keys yield None.
pub(crate) fn key_to_child_bytes(code: KeyCode) -> Option<Vec<u8>> {
    let mapped: &[u8] = match code {
        KeyCode::Enter => b"\r",
        KeyCode::Backspace => b"\x08",
        KeyCode::Tab => b"\t",
        KeyCode::Esc => b"\x1b",
        KeyCode::Up => b"\x1b[A",
        KeyCode::Down => b"\x1b[B",
        KeyCode::Right => b"\x1b[C",
        KeyCode::Left => b"\x1b[D",
        KeyCode::Home => b"\x1b[H",
        KeyCode::End => b"\x1b[F",
        KeyCode::PageUp => b"\x1b[5~",
        KeyCode::PageDown => b"\x1b[6~",
        KeyCode::Delete => b"\x1b[3~",
        KeyCode::Insert => b"\x1b[2~",
        KeyCode::F(n) => {
            return function_key_bytes(n);
        }
        KeyCode::Char(c) => {
            let mut buf = [0u8; 4];
            return Some(c.encode_utf8(&mut buf).as_bytes().to_vec());
        }
        _ => return None,
    };
    Some(mapped.to_vec())
}

fn function_key_bytes(n: u8) -> Option<Vec<u8>> {
    let mapped: &[u8] = match n {
        1 => b"\x1bOP",
        2 => b"\x1bOQ",
        3 => b"\x1bOR",
        4 => b"\x1bOS",
        5 => b"\x1b[15~",
        6 => b"\x1b[17~",
        7 => b"\x1b[18~",
        8 => b"\x1b[19~",
        9 => b"\x1b[20~",
        10 => b"\x1b[21~",
        11 => b"\x1b[23~",
        12 => b"\x1b[24~",
        _ => return None,
    };
    Some(mapped.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, KeysConfig, ScriptConfig};
    use crate::orchestrator::Orchestrator;
    use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

    #[test]
    fn shared_custom_chord_reaches_every_bound_runner() {
        let ts = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("time")
            .as_nanos();
        let dir = std::env::temp_dir().join(format!("burnin-chord-{ts}"));
        std::fs::create_dir_all(&dir).expect("mkdir workspace");
        let path = dir.join("echoer.sh");
        std::fs::write(&path, "IFS= read -r line\nprintf 'got:%s\\n' \"$line\"\n")
            .expect("write script");
        let path = path.to_string_lossy().into_owned();

        let mut keys = KeysConfig::default();
        keys.custom.insert("t".to_owned(), "ping\n".to_owned());
        let entry = ScriptConfig {
            path,
            args: String::new(),
            type_decl: "script".to_owned(),
            max_logs: 0,
            output: true,
            output_res: String::new(),
            keys,
        };
        let config = Config {
            background_scripts: vec![entry.clone()],
            interactive_scripts: vec![entry],
        };
        let orchestrator = Orchestrator::from_config(&config);
        // start_all spawns synchronously, so both children are Running with
        // open stdin by the time it returns.
        orchestrator.start_all();
        assert!(route_custom_chord(&orchestrator, "t"));
        assert!(!route_custom_chord(&orchestrator, "z"));

        let deadline = Instant::now() + Duration::from_secs(10);
        loop {
            let echoed = orchestrator
                .all_runners()
                .filter(|runner| {
                    runner
                        .view()
                        .lines
                        .iter()
                        .any(|line| line.contains("got:ping"))
                })
                .count();
            if echoed == 2 {
                break;
            }
            assert!(
                Instant::now() < deadline,
                "chord output missing from a bound runner"
            );
            let _ = orchestrator.next_event_timeout(Duration::from_millis(50));
        }
        orchestrator.stop_all();
    }

    #[test]
    fn chord_names_are_lowercase_chars_only() {
        assert_eq!(chord_name(KeyCode::Char('T')), Some("t".to_owned()));
        assert_eq!(chord_name(KeyCode::Char('3')), Some("3".to_owned()));
        assert_eq!(chord_name(KeyCode::Right), None);
        assert_eq!(chord_name(KeyCode::F(5)), None);
    }

    #[test]
    fn printables_forward_literally() {
        assert_eq!(key_to_child_bytes(KeyCode::Char('a')), Some(b"a".to_vec()));
        assert_eq!(key_to_child_bytes(KeyCode::Char(' ')), Some(b" ".to_vec()));
        assert_eq!(key_to_child_bytes(KeyCode::Char('7')), Some(b"7".to_vec()));
    }

    #[test]
    fn named_keys_map_to_standard_sequences() {
        assert_eq!(key_to_child_bytes(KeyCode::Enter), Some(b"\r".to_vec()));
        assert_eq!(key_to_child_bytes(KeyCode::Up), Some(b"\x1b[A".to_vec()));
        assert_eq!(key_to_child_bytes(KeyCode::Left), Some(b"\x1b[D".to_vec()));
        assert_eq!(key_to_child_bytes(KeyCode::End), Some(b"\x1b[F".to_vec()));
        assert_eq!(
            key_to_child_bytes(KeyCode::PageDown),
            Some(b"\x1b[6~".to_vec())
        );
        assert_eq!(
            key_to_child_bytes(KeyCode::Insert),
            Some(b"\x1b[2~".to_vec())
        );
    }

    #[test]
    fn function_keys_cover_f1_through_f12() {
        assert_eq!(key_to_child_bytes(KeyCode::F(1)), Some(b"\x1bOP".to_vec()));
        assert_eq!(
            key_to_child_bytes(KeyCode::F(12)),
            Some(b"\x1b[24~".to_vec())
        );
        assert_eq!(key_to_child_bytes(KeyCode::F(13)), None);
    }

    #[test]
    fn unmapped_keys_are_dropped() {
        assert_eq!(key_to_child_bytes(KeyCode::CapsLock), None);
        assert_eq!(key_to_child_bytes(KeyCode::NumLock), None);
    }
}
