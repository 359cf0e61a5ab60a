//! CLI argument definitions for tickterm.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `shell` (default) | Interactive session reading one command per line |
//! | `run <LINE>...` | Execute a single terminal command and exit |
//!
//! # Global Options
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `--format` | `text` | Output format (text, json) |
//! | `--pretty` | `false` | Pretty-print JSON output |
//! | `--mock` | `false` | Serve deterministic offline data |
//! | `--watchlist-path` | `$HOME/.tickterm/watchlists.json` | Watchlist file |
//! | `--chart-width` / `--chart-height` | `60` / `12` | Chart grid size |
//!
//! # Examples
//!
//! ```bash
//! tickterm --mock
//! tickterm run Q AAPL
//! tickterm --format json --pretty run GP MSFT 6M
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use tickterm_core::Settings;

/// Terminal market dashboard: quotes, charts, statements, yields and news.
#[derive(Debug, Parser)]
#[command(
    name = "tickterm",
    author,
    version,
    about = "Terminal market dashboard",
    long_about = "tickterm answers terse terminal commands (Q AAPL, GP MSFT 1Y, WEI, WB) \
with live market data.\n\
\n\
Provider keys are read from TICKTERM_FMP_API_KEY and TICKTERM_FRED_API_KEY \
(or a .env file). Use --mock to run without keys.\n\
\n\
Type HELP inside the shell for the command list."
)]
pub struct Cli {
    /// Output format for payloads.
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Pretty-print JSON output with indentation.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    /// Serve deterministic offline data instead of calling providers.
    #[arg(long, global = true, default_value_t = false)]
    pub mock: bool,

    /// Watchlist file location.
    #[arg(long, global = true, value_name = "PATH")]
    pub watchlist_path: Option<PathBuf>,

    /// Chart width in columns.
    #[arg(long, global = true, value_name = "N")]
    pub chart_width: Option<usize>,

    /// Chart height in rows.
    #[arg(long, global = true, value_name = "N")]
    pub chart_height: Option<usize>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

impl Cli {
    /// Layers command-line overrides on top of environment settings.
    pub fn apply(&self, settings: Settings) -> Settings {
        let mut settings = settings.with_mock_mode(self.mock);
        if let Some(path) = &self.watchlist_path {
            settings.watchlist_path = path.clone();
        }
        if let Some(width) = self.chart_width {
            settings.chart_width = width;
        }
        if let Some(height) = self.chart_height {
            settings.chart_height = height;
        }
        settings
    }
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable terminal text.
    Text,
    /// One JSON display envelope per result.
    Json,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Interactive session; one terminal command per line, EXIT to leave.
    Shell,

    /// Execute one terminal command and exit.
    ///
    /// # Examples
    ///
    ///   tickterm run Q AAPL
    ///   tickterm run IS MSFT 5 Q
    Run(RunArgs),
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Command line words, e.g. `GP AAPL 1Y`.
    #[arg(required = true, num_args = 1.., trailing_var_arg = true, allow_hyphen_values = true)]
    pub line: Vec<String>,
}

impl RunArgs {
    pub fn joined(&self) -> String {
        self.line.join(" ")
    }
}
