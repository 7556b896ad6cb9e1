//! Status command - Display synchronization status
//!
//! Shows the identity in use, how many posts and photos are held locally,
//! the pending queue and whether the network and server are reachable.

use std::path::Path;

use anyhow::Result;
use clap::Args;
use phototag_sync::engine::EngineStatus;

use super::Session;
use crate::output::{get_formatter, OutputFormat, OutputFormatter};

/// Show synchronization status
#[derive(Debug, Args)]
pub struct StatusCommand {
    /// Also ask the server whether it answers
    #[arg(long)]
    pub check_server: bool,
}

impl StatusCommand {
    pub async fn execute(&self, config_path: &Path, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let session = Session::open(config_path).await?;
        let status = session.engine.status().await;
        let name = session
            .engine
            .profile()
            .await
            .ok()
            .flatten()
            .map(|profile| profile.display_name());
        let server = if self.check_server {
            Some(session.engine.is_server_reachable().await)
        } else {
            None
        };
        session.close().await;

        if format.is_json() {
            let mut json = serde_json::to_value(&status)?;
            if let Some(obj) = json.as_object_mut() {
                if let Some(reachable) = server {
                    obj.insert("server_reachable".into(), reachable.into());
                }
                if let Some(name) = &name {
                    obj.insert("user_name".into(), name.as_str().into());
                }
            }
            formatter.print_json(&json);
            return Ok(());
        }

        print_status(&status, name.as_deref(), server, &*formatter);
        Ok(())
    }
}

fn print_status(
    status: &EngineStatus,
    name: Option<&str>,
    server: Option<bool>,
    formatter: &dyn OutputFormatter,
) {
    match (&status.user_id, name) {
        (Some(user), Some(name)) => formatter.success(&format!("Signed in as {} ({})", name, user)),
        (Some(user), None) => formatter.success(&format!("Signed in as {}", user)),
        (None, _) => formatter.warn("Not signed in; run 'phototag login <email>'"),
    }

    if status.tags_loaded {
        formatter.field(
            "Posts",
            &format!("{} live, {} slots", status.live_slots, status.allocated_slots),
        );
    } else {
        formatter.field("Posts", "not loaded yet");
    }
    formatter.field("Cached photos", &status.cached_photos.to_string());
    formatter.field("Network", if status.network_available { "up" } else { "down" });
    let check = if status.server_check_armed { "armed" } else { "idle" };
    formatter.field(
        "Server check",
        &format!("{} (every {}s)", check, status.server_check_interval_secs),
    );
    if let Some(reachable) = server {
        formatter.field("Server", if reachable { "reachable" } else { "unreachable" });
    }
    formatter.field(
        "Last replay",
        &status
            .last_replay
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "never (this session)".to_string()),
    );

    formatter.field("Pending", &status.pending.len().to_string());
    for item in &status.pending {
        formatter.info(&format!("  slot {} ({})", item.id, item.operation));
    }
}
