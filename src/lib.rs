pub mod config;
pub mod headless;
pub mod orchestrator;
pub mod runner;
pub mod screen;
pub mod tui;
pub mod ui;

use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Run(RunArgs),
    Help,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunArgs {
    pub config_path: Option<PathBuf>,
    pub headless: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliParseError {
    MissingConfigValue,
    UnknownArgument(String),
}

impl std::fmt::Display for CliParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliParseError::MissingConfigValue => write!(f, "--config requires a value"),
            CliParseError::UnknownArgument(arg) => write!(f, "unknown argument: {arg}"),
        }
    }
}

impl std::error::Error for CliParseError {}

pub fn parse_command<I>(args: I) -> Result<Command, CliParseError>
where
    I: IntoIterator<Item = String>,
{
    let mut args = args.into_iter();
    let mut run = RunArgs::default();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                let Some(path) = args.next() else {
                    return Err(CliParseError::MissingConfigValue);
                };
                run.config_path = Some(PathBuf::from(path));
            }
            "--headless" => {
                run.headless = true;
            }
            "--help" | "-h" => return Ok(Command::Help),
            other => return Err(CliParseError::UnknownArgument(other.to_owned())),
        }
    }

    Ok(Command::Run(run))
}

pub fn print_usage() {
    eprintln!(
        "burnin\n\nUSAGE:\n  burnin [--config <PATH>] [--headless]\n\nOPTIONS:\n  --config <PATH>   Configuration file (default: config.json)\n  --headless        Run without the live terminal UI (implied off a TTY)\n  -h, --help        Print help\n\nThe configuration lists background and interactive diagnostic programs;\nburnin runs them all, multiplexes their output into panes, and exits 0\nonly when every non-info test passes.\n"
    );
}
