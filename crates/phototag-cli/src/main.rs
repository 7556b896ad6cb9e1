//! PhotoTag CLI - Command-line interface for PhotoTag
//!
//! Provides commands for:
//! - Signing in and out of the photo server
//! - Listing tags and cached photos
//! - Publishing, updating and deleting posts
//! - Replaying posts queued while offline
//! - Viewing sync status and configuration

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod output;
mod photo;

use commands::{
    account::{LoginCommand, LogoutCommand},
    config::ConfigCommand,
    posts::{DeleteCommand, PublishCommand, UpdateCommand},
    status::StatusCommand,
    sync::SyncCommand,
    tags::{PhotosCommand, TagsCommand},
};
use output::OutputFormat;

#[derive(Debug, Parser)]
#[command(name = "phototag", version, about = "Offline-aware photo tagging client")]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Use alternate config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Sign in to the photo server
    Login(LoginCommand),
    /// Sign out and forget the stored user id
    Logout(LogoutCommand),
    /// List the posts in the tag set
    Tags(TagsCommand),
    /// List or export cached photos, downloading missing ones
    Photos(PhotosCommand),
    /// Publish a new post
    Publish(PublishCommand),
    /// Change an existing post
    Update(UpdateCommand),
    /// Delete a post
    Delete(DeleteCommand),
    /// Replay posts queued while offline
    Sync(SyncCommand),
    /// Show synchronization status
    Status(StatusCommand),
    /// View and manage configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

/// Log level for the `-v` count
fn verbosity_filter(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity_filter(cli.verbose)));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let format = OutputFormat::from_flag(cli.json);
    let config_path = cli
        .config
        .unwrap_or_else(phototag_core::config::Config::default_path);

    match cli.command {
        Commands::Login(cmd) => cmd.execute(&config_path, format).await,
        Commands::Logout(cmd) => cmd.execute(&config_path, format).await,
        Commands::Tags(cmd) => cmd.execute(&config_path, format).await,
        Commands::Photos(cmd) => cmd.execute(&config_path, format).await,
        Commands::Publish(cmd) => cmd.execute(&config_path, format).await,
        Commands::Update(cmd) => cmd.execute(&config_path, format).await,
        Commands::Delete(cmd) => cmd.execute(&config_path, format).await,
        Commands::Sync(cmd) => cmd.execute(&config_path, format).await,
        Commands::Status(cmd) => cmd.execute(&config_path, format).await,
        Commands::Config(cmd) => cmd.execute(&config_path, format).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_verbosity_filter() {
        assert_eq!(verbosity_filter(0), "warn");
        assert_eq!(verbosity_filter(2), "debug");
        assert_eq!(verbosity_filter(9), "trace");
    }

    #[test]
    fn test_parse_publish() {
        let cli = Cli::try_parse_from([
            "phototag",
            "--json",
            "publish",
            "beach.jpg",
            "--description",
            "beach day",
            "--location",
            "10.0,20.0",
        ])
        .unwrap();
        assert!(cli.json);
        match cli.command {
            Commands::Publish(cmd) => {
                assert_eq!(cmd.photo, PathBuf::from("beach.jpg"));
                assert_eq!(cmd.description, "beach day");
                assert_eq!(cmd.location, "10.0,20.0");
                assert_eq!(cmd.people, "");
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_login() {
        let cli = Cli::try_parse_from(["phototag", "login", "ann@example.com"]).unwrap();
        match cli.command {
            Commands::Login(cmd) => {
                assert_eq!(cmd.email, "ann@example.com");
                assert!(cmd.password.is_none());
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_update_keeps_unset_fields() {
        let cli = Cli::try_parse_from(["phototag", "update", "2", "--people", "ann"]).unwrap();
        match cli.command {
            Commands::Update(cmd) => {
                assert_eq!(cmd.slot, 2);
                assert_eq!(cmd.people.as_deref(), Some("ann"));
                assert!(cmd.description.is_none());
                assert!(cmd.photo.is_none());
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
