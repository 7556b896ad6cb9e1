//! Tags and photos commands - Read the user's posts
//!
//! `phototag tags` lists live posts from the local snapshot, fetching the
//! tag set from the server on first use. `phototag photos` lists cached
//! photos, downloading missing ones when online, and can export them.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use phototag_core::domain::TagSet;
use phototag_sync::SyncError;
use tracing::info;

use super::Session;
use crate::output::{get_formatter, OutputFormat};
use crate::photo;

/// List posts
#[derive(Debug, Args)]
pub struct TagsCommand {
    /// Include deleted slots
    #[arg(long)]
    pub all: bool,
}

impl TagsCommand {
    pub async fn execute(&self, config_path: &Path, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let session = Session::open(config_path).await?;
        let result = session.engine.get_tags().await;
        session.close().await;
        let tags = result.context("Failed to load tags")?;

        let rows = tag_rows(&tags, self.all);
        if format.is_json() {
            formatter.print_json(&serde_json::json!({
                "user": tags.id,
                "number_of_tags": tags.number_of_tags(),
                "posts": rows,
            }));
            return Ok(());
        }

        if rows.is_empty() {
            formatter.info("No posts yet. Use 'phototag publish <photo>' to add one.");
            return Ok(());
        }
        formatter.success(&format!("{} post(s) for {}", tags.live_count(), tags.id));
        for (slot, entry) in tags.entries() {
            if entry.is_deleted() && !self.all {
                continue;
            }
            let marker = if entry.is_deleted() { " (deleted)" } else { "" };
            formatter.info(&format!("[{}] {}{}", slot, entry.description, marker));
            if !entry.location.is_empty() {
                formatter.field("  Location", &entry.location);
            }
            if !entry.people.is_empty() {
                formatter.field("  People", &entry.people);
            }
        }
        Ok(())
    }
}

/// JSON rows for the posts in `tags`
fn tag_rows(tags: &TagSet, include_deleted: bool) -> Vec<serde_json::Value> {
    tags.entries()
        .filter(|(_, entry)| include_deleted || !entry.is_deleted())
        .map(|(slot, entry)| {
            serde_json::json!({
                "slot": slot,
                "description": entry.description,
                "photo": entry.photo,
                "location": entry.location,
                "people": entry.people,
                "deleted": entry.is_deleted(),
            })
        })
        .collect()
}

/// List or export photos
#[derive(Debug, Args)]
pub struct PhotosCommand {
    /// Write each photo as `<file name>.jpg` into this directory
    #[arg(long)]
    pub export: Option<PathBuf>,
}

impl PhotosCommand {
    pub async fn execute(&self, config_path: &Path, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let session = Session::open(config_path).await?;
        let result: Result<_, SyncError> = async {
            session.engine.get_tags().await?;
            session.engine.get_photos().await
        }
        .await;
        let expected = session.engine.status().await.live_slots;
        session.close().await;
        let photos = result.context("Failed to load photos")?;

        if let Some(dir) = &self.export {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
            for (name, payload) in photos.iter() {
                photo::write_file(payload, &dir.join(format!("{}.jpg", name)))?;
            }
            info!(count = photos.len(), dir = %dir.display(), "Exported photos");
        }

        let missing = expected.saturating_sub(photos.len());
        if format.is_json() {
            let names: Vec<&String> = photos.keys().collect();
            formatter.print_json(&serde_json::json!({
                "photos": names,
                "missing": missing,
                "exported_to": self.export.as_ref().map(|d| d.display().to_string()),
            }));
            return Ok(());
        }

        formatter.success(&format!("{} photo(s) cached", photos.len()));
        for (name, payload) in photos.iter() {
            formatter.field(name, &format!("{} base64 chars", payload.as_str().len()));
        }
        if missing > 0 {
            formatter.warn(&format!(
                "{} photo(s) not available offline; run again when online",
                missing
            ));
        }
        if let Some(dir) = &self.export {
            formatter.info(&format!("Exported to {}", dir.display()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags() -> TagSet {
        TagSet::from_json(
            br#"{"id":"u1_","numberOfTags":"2","tagId":["0","1"],
                 "tagDes":["beach","gone"],"tagPhoto":["u1_0","na"],
                 "tagLocation":["",""],"tagPeopleName":["",""]}"#,
        )
        .unwrap()
    }

    #[test]
    fn test_tag_rows_skip_deleted() {
        let rows = tag_rows(&tags(), false);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["slot"], 0);
        assert_eq!(rows[0]["photo"], "u1_0");
    }

    #[test]
    fn test_tag_rows_all() {
        let rows = tag_rows(&tags(), true);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1]["deleted"], true);
    }
}
