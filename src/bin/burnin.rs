use std::io::IsTerminal;
use std::path::PathBuf;

use burnin::config::load_config;
use burnin::headless::run_headless;
use burnin::orchestrator::Orchestrator;
use burnin::tui::run_tui;
use burnin::ui::{MessageBlock, OutputMode, PlainRenderer, Renderer};
use burnin::{parse_command, print_usage, Command};

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let output_mode = OutputMode::from_env();
    let cmd = match parse_command(args) {
        Ok(cmd) => cmd,
        Err(err) => {
            let mut renderer = PlainRenderer::stderr(output_mode);
            let _ = renderer.error_block(
                &MessageBlock::new("Invalid command arguments", err.to_string())
                    .with_hint("Run `burnin --help` to see supported flags"),
            );
            print_usage();
            std::process::exit(2);
        }
    };

    let run = match cmd {
        Command::Help => {
            print_usage();
            return;
        }
        Command::Run(run) => run,
    };

    let config_path = run
        .config_path
        .unwrap_or_else(|| PathBuf::from("config.json"));
    let config = match load_config(&config_path) {
        Ok(config) => config,
        Err(err) => {
            let mut renderer = PlainRenderer::stderr(output_mode);
            let _ = renderer.error_block(
                &MessageBlock::new("Failed to load configuration", err.to_string())
                    .with_hint("Pass an explicit path with `burnin --config <PATH>`"),
            );
            std::process::exit(2);
        }
    };

    let mut orchestrator = Orchestrator::from_config(&config);
    let headless = run.headless || !std::io::stdout().is_terminal();
    let session = if headless {
        run_headless(&mut orchestrator).map_err(|err| err.to_string())
    } else {
        run_tui(&mut orchestrator).map_err(|err| err.to_string())
    };

    match session {
        Ok(exit_code) => std::process::exit(exit_code),
        Err(message) => {
            let mut renderer = PlainRenderer::stderr(output_mode);
            let _ = renderer.error_block(&MessageBlock::new("Session failed", message));
            std::process::exit(1);
        }
    }
}
