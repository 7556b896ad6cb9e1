//! Post commands - Publish, update and delete posts
//!
//! The local change is applied first; the command then waits for the
//! server. If the server is unreachable the change stays applied and is
//! queued for `phototag sync` or the daemon to replay.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use phototag_sync::engine::{MutationHandle, MutationOutcome, MutationStatus, PhotoChange};
use tracing::info;

use super::{describe_status, Session};
use crate::output::{get_formatter, OutputFormat};
use crate::photo;

/// Publish a new post
#[derive(Debug, Args)]
pub struct PublishCommand {
    /// Image file to upload (re-encoded as JPEG)
    pub photo: PathBuf,
    /// Post description
    #[arg(short, long, default_value = "")]
    pub description: String,
    /// Location as "latitude,longitude"
    #[arg(short, long, default_value = "")]
    pub location: String,
    /// Comma-separated names of people in the photo
    #[arg(short, long, default_value = "")]
    pub people: String,
}

impl PublishCommand {
    pub async fn execute(&self, config_path: &Path, format: OutputFormat) -> Result<()> {
        let payload = photo::encode_file(&self.photo)?;
        info!(photo = %self.photo.display(), "Encoded photo");

        let session = Session::open(config_path).await?;
        let result = async {
            session.engine.get_tags().await?;
            let handle = session
                .engine
                .publish(payload, &self.description, &self.location, &self.people)
                .await?;
            settle(handle).await
        }
        .await;
        session.close().await;

        report("Publish", result.context("Failed to publish post")?, format)
    }
}

/// Change an existing post
///
/// Fields that are not given keep their current value.
#[derive(Debug, Args)]
pub struct UpdateCommand {
    /// Slot of the post
    pub slot: usize,
    /// New description
    #[arg(short, long)]
    pub description: Option<String>,
    /// New image file
    #[arg(long)]
    pub photo: Option<PathBuf>,
    /// New location
    #[arg(short, long)]
    pub location: Option<String>,
    /// New people list
    #[arg(short, long)]
    pub people: Option<String>,
}

impl UpdateCommand {
    pub async fn execute(&self, config_path: &Path, format: OutputFormat) -> Result<()> {
        let change = match &self.photo {
            Some(path) => PhotoChange::Replace(photo::encode_file(path)?),
            None => PhotoChange::Keep,
        };

        let session = Session::open(config_path).await?;
        let result = async {
            let tags = session.engine.get_tags().await?;
            let current = tags.require_entry(self.slot)?;
            if current.is_deleted() && change == PhotoChange::Keep {
                anyhow::bail!(
                    "Post {} is deleted; give --photo to reuse the slot",
                    self.slot
                );
            }
            let handle = session
                .engine
                .update(
                    self.slot,
                    self.description.as_deref().unwrap_or(&current.description),
                    change,
                    self.location.as_deref().unwrap_or(&current.location),
                    self.people.as_deref().unwrap_or(&current.people),
                )
                .await?;
            settle(handle).await
        }
        .await;
        session.close().await;

        report("Update", result.context("Failed to update post")?, format)
    }
}

/// Delete a post
#[derive(Debug, Args)]
pub struct DeleteCommand {
    /// Slot of the post
    pub slot: usize,
}

impl DeleteCommand {
    pub async fn execute(&self, config_path: &Path, format: OutputFormat) -> Result<()> {
        let session = Session::open(config_path).await?;
        let result = async {
            session.engine.get_tags().await?;
            let handle = session.engine.delete(self.slot).await?;
            settle(handle).await
        }
        .await;
        session.close().await;

        report("Delete", result.context("Failed to delete post")?, format)
    }
}

async fn settle(handle: MutationHandle) -> Result<MutationOutcome> {
    Ok(handle.outcome().await?)
}

/// Prints the outcome; a rejection makes the command fail
fn report(action: &str, outcome: MutationOutcome, format: OutputFormat) -> Result<()> {
    let formatter = get_formatter(format);
    let rejected = matches!(outcome.status, MutationStatus::RolledBack(_));

    if format.is_json() {
        let json = serde_json::to_value(&outcome).context("Failed to serialize outcome")?;
        formatter.print_json(&json);
    } else {
        let message = format!(
            "{} of post {}: {}",
            action,
            outcome.slot,
            describe_status(&outcome.status)
        );
        match &outcome.status {
            MutationStatus::Synced => formatter.success(&message),
            MutationStatus::Queued(_) => {
                formatter.warn(&message);
                formatter.info("Run 'phototag sync' or start phototagd to retry.");
            }
            MutationStatus::RolledBack(_) => formatter.error(&message),
        }
    }

    if rejected {
        anyhow::bail!("{} was rejected by the server", action);
    }
    Ok(())
}
