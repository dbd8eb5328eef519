//! clipdeck - browse and play Pexels videos from the terminal
//!
//! # Usage
//!
//! ```bash
//! clipdeck popular
//! clipdeck search "city night" --json
//! clipdeck play 856479
//! ```

use clap::Parser;

use clipdeck::cli::{Cli, Command, ExitCode, Output};
use clipdeck::commands;
use clipdeck::config::Config;
use clipdeck::logging;

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    run_cli(cli).await.into()
}

/// Run CLI command and return exit code
async fn run_cli(cli: Cli) -> ExitCode {
    let output = Output::new(&cli);

    let config = match &cli.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    };
    let config = match config {
        Ok(config) => config,
        Err(e) => return output.error(format!("{:#}", e), ExitCode::InvalidArgs),
    };

    // Logging is optional; commands still run without a writable data dir
    let _log_guard = match Config::data_dir() {
        Some(dir) => match logging::init_logging(&logging::log_dir(&dir)) {
            Ok(guard) => Some(guard),
            Err(e) => {
                output.info(format!("Logging disabled: {}", e));
                None
            }
        },
        None => None,
    };

    match cli.command {
        Command::Popular(cmd) => commands::popular_cmd(cmd, &config, &output).await,

        Command::Search(cmd) => commands::search_cmd(cmd, &config, &output).await,

        Command::Info(cmd) => commands::info_cmd(cmd, &config, &output).await,

        Command::Cached(cmd) => commands::cached_cmd(cmd, &config, &output).await,

        Command::Play(cmd) => commands::play_cmd(cmd, &config, &output).await,
    }
}
