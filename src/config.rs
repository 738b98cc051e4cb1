use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::Deserialize;

pub const DEFAULT_PANE_ROWS: usize = 10;
pub const DEFAULT_PANE_COLS: usize = 40;
pub const DEFAULT_MAX_LOGS: usize = 5;

/// Key bindings a config entry may attach to its test. `custom` maps a
/// ctrl-chord key name to a literal byte string injected into the child's
/// input stream; insertion order is preserved for the help panel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct KeysConfig {
    #[serde(default)]
    pub focus: String,
    #[serde(default)]
    pub restart: String,
    #[serde(default)]
    pub custom: IndexMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ScriptConfig {
    pub path: String,
    #[serde(default)]
    pub args: String,
    /// Comma-separated: first token `script` or `binary`, later tokens may
    /// add `curses` (PTY + screen emulation) and/or `info` (advisory only).
    #[serde(rename = "type", default)]
    pub type_decl: String,
    #[serde(default)]
    pub max_logs: usize,
    #[serde(default)]
    pub output: bool,
    /// `"<rows>x<cols>"`; cols may be `*` (default width) or `S` (zero
    /// width) for non-curses panes.
    #[serde(default)]
    pub output_res: String,
    #[serde(default)]
    pub keys: KeysConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub background_scripts: Vec<ScriptConfig>,
    #[serde(default)]
    pub interactive_scripts: Vec<ScriptConfig>,
}

#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        error: io::Error,
    },
    Parse {
        path: PathBuf,
        error: serde_json::Error,
    },
    InvalidOutputRes {
        value: String,
        reason: String,
    },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io { path, error } => {
                write!(f, "failed to read config `{}`: {error}", path.display())
            }
            ConfigError::Parse { path, error } => {
                write!(f, "failed to parse config `{}`: {error}", path.display())
            }
            ConfigError::InvalidOutputRes { value, reason } => {
                write!(f, "invalid output_res `{value}`: {reason}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let raw = fs::read_to_string(path).map_err(|error| ConfigError::Io {
        path: path.to_path_buf(),
        error,
    })?;
    serde_json::from_str(&raw).map_err(|error| ConfigError::Parse {
        path: path.to_path_buf(),
        error,
    })
}

/// A config entry resolved into launch-ready form. The base type token is
/// kept as a raw string: an unrecognized value is a per-runner launch
/// failure at start time, not a config-load failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptSpec {
    pub path: String,
    pub args: Vec<String>,
    pub base_type: String,
    pub curses: bool,
    pub info: bool,
    pub max_logs: usize,
    pub output: bool,
    pub pane_rows: usize,
    pub pane_cols: usize,
    pub keys: KeysConfig,
}

impl ScriptSpec {
    pub fn resolve(config: &ScriptConfig) -> Self {
        let (base_type, curses, info) = split_type_decl(&config.type_decl);
        let (pane_rows, pane_cols) = parse_output_res(&config.output_res, curses)
            .unwrap_or((DEFAULT_PANE_ROWS, DEFAULT_PANE_COLS));
        let max_logs = if config.max_logs == 0 {
            DEFAULT_MAX_LOGS
        } else {
            config.max_logs
        };
        Self {
            path: config.path.clone(),
            args: split_args(&config.args),
            base_type,
            curses,
            info,
            max_logs,
            output: config.output,
            pane_rows,
            pane_cols,
            keys: config.keys.clone(),
        }
    }
}

pub fn split_args(raw: &str) -> Vec<String> {
    raw.split_whitespace().map(str::to_owned).collect()
}

/// Splits `"script, curses, info"` into the base token plus modifier flags.
/// Unknown modifier tokens are ignored.
pub fn split_type_decl(raw: &str) -> (String, bool, bool) {
    let mut tokens = raw.split(',').map(str::trim);
    let base = tokens.next().unwrap_or("").to_owned();
    let mut curses = false;
    let mut info = false;
    for token in tokens {
        if token.eq_ignore_ascii_case("curses") {
            curses = true;
        } else if token.eq_ignore_ascii_case("info") {
            info = true;
        }
    }
    (base, curses, info)
}

/// Parses `"<rows>x<cols>"`. Curses panes require a literal numeric width;
/// non-curses panes accept `*` (default width) and `S` (zero width), and
/// fall back to the default width for anything else.
pub fn parse_output_res(raw: &str, curses: bool) -> Result<(usize, usize), ConfigError> {
    let value: String = raw.chars().filter(|ch| !ch.is_whitespace()).collect();
    if value.is_empty() {
        return Ok((DEFAULT_PANE_ROWS, DEFAULT_PANE_COLS));
    }

    let Some((rows_part, cols_part)) = value.split_once('x') else {
        return Err(ConfigError::InvalidOutputRes {
            value,
            reason: "expected <rows>x<cols>".to_owned(),
        });
    };
    let rows = rows_part
        .parse::<usize>()
        .map_err(|_| ConfigError::InvalidOutputRes {
            value: value.clone(),
            reason: format!("non-numeric height `{rows_part}`"),
        })?;

    if curses {
        let cols = cols_part
            .parse::<usize>()
            .map_err(|_| ConfigError::InvalidOutputRes {
                value: value.clone(),
                reason: format!("curses panes require a numeric width, got `{cols_part}`"),
            })?;
        return Ok((rows, cols));
    }

    if cols_part == "*" {
        return Ok((rows, DEFAULT_PANE_COLS));
    }
    if cols_part.eq_ignore_ascii_case("s") {
        return Ok((rows, 0));
    }
    Ok((rows, cols_part.parse::<usize>().unwrap_or(DEFAULT_PANE_COLS)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_decl_splits_base_and_modifiers() {
        assert_eq!(
            split_type_decl("script"),
            ("script".to_owned(), false, false)
        );
        assert_eq!(
            split_type_decl("binary, curses"),
            ("binary".to_owned(), true, false)
        );
        assert_eq!(
            split_type_decl("script, curses, info"),
            ("script".to_owned(), true, true)
        );
        assert_eq!(
            split_type_decl("binary,info"),
            ("binary".to_owned(), false, true)
        );
        assert_eq!(split_type_decl(""), (String::new(), false, false));
    }

    #[test]
    fn output_res_defaults_when_empty() {
        assert_eq!(
            parse_output_res("", false).expect("empty res"),
            (DEFAULT_PANE_ROWS, DEFAULT_PANE_COLS)
        );
    }

    #[test]
    fn output_res_parses_sentinels_for_plain_panes() {
        assert_eq!(parse_output_res("8x*", false).expect("star"), (8, 40));
        assert_eq!(parse_output_res("8xS", false).expect("sentinel"), (8, 0));
        assert_eq!(parse_output_res("8xs", false).expect("sentinel"), (8, 0));
        assert_eq!(parse_output_res("8x60", false).expect("numeric"), (8, 60));
        assert_eq!(
            parse_output_res("8xjunk", false).expect("fallback width"),
            (8, DEFAULT_PANE_COLS)
        );
    }

    #[test]
    fn output_res_requires_numeric_width_for_curses() {
        assert_eq!(parse_output_res("12x48", true).expect("numeric"), (12, 48));
        assert!(parse_output_res("12x*", true).is_err());
        assert!(parse_output_res("12xS", true).is_err());
    }

    #[test]
    fn output_res_rejects_malformed_shapes() {
        assert!(parse_output_res("12", false).is_err());
        assert!(parse_output_res("axb", false).is_err());
    }

    #[test]
    fn output_res_tolerates_embedded_spaces() {
        assert_eq!(
            parse_output_res(" 10 x 40 ", false).expect("spaced"),
            (10, 40)
        );
    }

    #[test]
    fn spec_resolution_applies_defaults() {
        let config = ScriptConfig {
            path: "./ram_test.sh".to_owned(),
            args: "--loops 3  --verbose".to_owned(),
            type_decl: "script, info".to_owned(),
            max_logs: 0,
            output: true,
            output_res: "bogus".to_owned(),
            keys: KeysConfig::default(),
        };
        let spec = ScriptSpec::resolve(&config);
        assert_eq!(spec.base_type, "script");
        assert!(!spec.curses);
        assert!(spec.info);
        assert_eq!(spec.max_logs, DEFAULT_MAX_LOGS);
        assert_eq!(spec.args, vec!["--loops", "3", "--verbose"]);
        assert_eq!((spec.pane_rows, spec.pane_cols), (10, 40));
    }

    #[test]
    fn config_parses_both_script_arrays() {
        let raw = r#"{
            "background_scripts": [
                {"path": "./battery.sh", "type": "script", "output": true, "output_res": "6x*"}
            ],
            "interactive_scripts": [
                {
                    "path": "./usb_test",
                    "type": "binary, curses",
                    "output": true,
                    "output_res": "12x48",
                    "keys": {"focus": "u", "restart": "y", "custom": {"t": "start\n"}}
                }
            ]
        }"#;
        let config: Config = serde_json::from_str(raw).expect("parse config");
        assert_eq!(config.background_scripts.len(), 1);
        assert_eq!(config.interactive_scripts.len(), 1);
        let interactive = &config.interactive_scripts[0];
        assert_eq!(interactive.keys.focus, "u");
        assert_eq!(
            interactive.keys.custom.get("t").map(String::as_str),
            Some("start\n")
        );
    }

    #[test]
    fn config_rejects_entry_without_path() {
        let raw = r#"{"background_scripts": [{"type": "script"}]}"#;
        assert!(serde_json::from_str::<Config>(raw).is_err());
    }

    #[test]
    fn custom_keys_keep_config_order() {
        let raw = r#"{"custom": {"z": "1", "a": "2", "m": "3"}}"#;
        let keys: KeysConfig = serde_json::from_str(raw).expect("parse keys");
        let order: Vec<&str> = keys.custom.keys().map(String::as_str).collect();
        assert_eq!(order, vec!["z", "a", "m"]);
    }
}
