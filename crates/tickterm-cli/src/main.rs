mod cli;
mod error;
mod output;
mod session;

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tickterm_core::{Orchestrator, Settings};

use crate::cli::{Cli, Command};
use crate::error::CliError;

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    init_tracing();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("error: {error}");
            ExitCode::from(error.exit_code())
        }
    }
}

/// Logs go to stderr so stdout carries payloads only.
fn init_tracing() {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).ok();
}

async fn run() -> Result<(), CliError> {
    let cli = Cli::parse();
    let settings = cli.apply(Settings::from_env());
    tracing::debug!(?settings, "starting");

    let orchestrator = Arc::new(Orchestrator::from_settings(&settings).await);

    match cli.command {
        None | Some(Command::Shell) => session::run(orchestrator, cli.format, cli.pretty).await,
        Some(Command::Run(args)) => {
            let envelope = orchestrator.execute(&args.joined()).await?;
            output::render(&envelope, cli.format, cli.pretty)
        }
    }
}
