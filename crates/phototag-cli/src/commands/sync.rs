//! Sync command - Replay posts queued while offline
//!
//! Provides the `phototag sync` CLI command which:
//! 1. Checks that the photo server answers (unless `--force`)
//! 2. Replays every queued post once, in order
//! 3. Reports what was synced, dropped or abandoned

use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;
use phototag_sync::engine::ReplayReport;
use tracing::info;

use super::Session;
use crate::output::{get_formatter, OutputFormat, OutputFormatter};

/// Replay queued posts
#[derive(Debug, Args)]
pub struct SyncCommand {
    /// Replay even if the server does not answer the liveness probe
    #[arg(long)]
    pub force: bool,
}

impl SyncCommand {
    pub async fn execute(&self, config_path: &Path, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let session = Session::open(config_path).await?;

        let pending = session.engine.pending().await.len();
        if pending == 0 {
            session.close().await;
            if format.is_json() {
                formatter.print_json(&serde_json::to_value(ReplayReport::default())?);
            } else {
                formatter.success("Nothing to sync");
            }
            return Ok(());
        }

        if !self.force && !session.engine.is_server_reachable().await {
            session.close().await;
            let message = format!("Server unreachable; {} post(s) remain queued", pending);
            if format.is_json() {
                let report = ReplayReport {
                    still_offline: true,
                    remaining: pending,
                    ..Default::default()
                };
                formatter.print_json(&serde_json::to_value(report)?);
            } else {
                formatter.warn(&message);
            }
            return Ok(());
        }

        info!(pending, force = self.force, "Starting manual sync");
        let result = match session.engine.get_tags().await {
            Ok(_) => session.engine.replay().await,
            Err(e) => Err(e),
        };
        session.close().await;
        let report = result.context("Replay failed")?;

        if format.is_json() {
            formatter.print_json(&serde_json::to_value(&report)?);
        } else {
            print_report(&report, &*formatter);
        }
        Ok(())
    }
}

fn print_report(report: &ReplayReport, formatter: &dyn OutputFormatter) {
    if report.still_offline {
        formatter.warn("Server unreachable; stopped early");
    } else if let Some(reason) = &report.halted {
        formatter.error(&format!("Stopped early: {}", reason));
    } else {
        formatter.success("Sync complete");
    }
    formatter.field("Synced", &report.synced.to_string());
    if report.dropped > 0 {
        formatter.field("Dropped", &report.dropped.to_string());
    }
    if report.abandoned > 0 {
        formatter.field("Rejected", &report.abandoned.to_string());
    }
    formatter.field("Still queued", &report.remaining.to_string());
}
