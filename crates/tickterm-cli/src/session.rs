//! Interactive line session.
//!
//! Each command runs as its own task so the prompt stays responsive. Finished
//! envelopes come back over a channel and are printed only while they are the
//! newest request issued for their display region. Errors from watchlist edits
//! are always reported, superseded or not.

use std::collections::HashMap;
use std::io::{IsTerminal, Write};
use std::sync::Arc;

use tickterm_core::command;
use tickterm_core::{DisplayEnvelope, DisplayRegion, Orchestrator, OrchestratorError};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use crate::cli::OutputFormat;
use crate::error::CliError;
use crate::output;

struct Finished {
    sequence: u64,
    region: DisplayRegion,
    mutates: bool,
    result: Result<DisplayEnvelope, OrchestratorError>,
}

/// What the session does with a finished request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Render,
    ReportError,
    Discard,
}

impl Finished {
    fn outcome(&self, ledger: &RegionLedger) -> Outcome {
        let current = ledger.is_current(self.region, self.sequence);
        match &self.result {
            Ok(_) if current => Outcome::Render,
            Err(_) if current || self.mutates => Outcome::ReportError,
            _ => Outcome::Discard,
        }
    }
}

/// Tracks the newest request per region.
#[derive(Debug, Default)]
pub struct RegionLedger {
    next: u64,
    latest: HashMap<DisplayRegion, u64>,
}

impl RegionLedger {
    pub fn issue(&mut self, region: DisplayRegion) -> u64 {
        self.next += 1;
        self.latest.insert(region, self.next);
        self.next
    }

    pub fn is_current(&self, region: DisplayRegion, sequence: u64) -> bool {
        self.latest.get(&region) == Some(&sequence)
    }
}

pub async fn run(
    orchestrator: Arc<Orchestrator>,
    format: OutputFormat,
    pretty: bool,
) -> Result<(), CliError> {
    let interactive = std::io::stdin().is_terminal();
    let (tx, mut rx) = mpsc::unbounded_channel::<Finished>();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut ledger = RegionLedger::default();
    let mut in_flight = 0_usize;
    let mut input_open = true;

    if interactive {
        println!("tickterm {} - type HELP for commands, EXIT to quit", env!("CARGO_PKG_VERSION"));
        prompt()?;
    }

    while input_open || in_flight > 0 {
        tokio::select! {
            line = lines.next_line(), if input_open => {
                let Some(line) = line? else {
                    input_open = false;
                    continue;
                };
                let line = line.trim();
                if line.eq_ignore_ascii_case("exit") || line.eq_ignore_ascii_case("quit") {
                    break;
                }
                if line.is_empty() {
                    if interactive {
                        prompt()?;
                    }
                    continue;
                }

                match command::parse(line) {
                    Ok(request) => {
                        let region = request.region();
                        let mutates = request.mutates();
                        let sequence = ledger.issue(region);
                        let orchestrator = orchestrator.clone();
                        let tx = tx.clone();
                        in_flight += 1;
                        tokio::spawn(async move {
                            let result = orchestrator.run(request).await;
                            // the receiver only goes away when the session ends
                            let _ = tx.send(Finished {
                                sequence,
                                region,
                                mutates,
                                result,
                            });
                        });
                    }
                    Err(error) => {
                        eprintln!("error: {error}");
                        if interactive {
                            prompt()?;
                        }
                    }
                }
            }
            Some(finished) = rx.recv() => {
                in_flight -= 1;
                match (finished.outcome(&ledger), finished.result) {
                    (Outcome::Render, Ok(envelope)) => output::render(&envelope, format, pretty)?,
                    (Outcome::ReportError, Err(error)) => eprintln!("error: {error}"),
                    _ => {
                        tracing::debug!(
                            region = finished.region.as_str(),
                            sequence = finished.sequence,
                            "discarding superseded result"
                        );
                        continue;
                    }
                }
                if interactive {
                    prompt()?;
                }
            }
        }
    }

    Ok(())
}

fn prompt() -> Result<(), CliError> {
    let mut stdout = std::io::stdout();
    write!(stdout, "tickterm> ")?;
    stdout.flush()?;
    Ok(())
}
