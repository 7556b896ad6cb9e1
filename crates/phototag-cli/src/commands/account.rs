//! Account commands - Sign in and out of the photo server
//!
//! `phototag login` exchanges an email and password for the user's id and
//! stores it where the daemon and the other commands pick it up.
//! `phototag logout` forgets it again.

use std::io::BufRead;
use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;
use phototag_core::config::Config;
use phototag_core::domain::Credentials;
use tracing::info;

use super::Session;
use crate::output::{get_formatter, OutputFormat};

/// Sign in to the photo server
#[derive(Debug, Args)]
pub struct LoginCommand {
    /// Account email
    pub email: String,
    /// Password; read from the first line of stdin when omitted
    #[arg(long)]
    pub password: Option<String>,
}

impl LoginCommand {
    pub async fn execute(&self, config_path: &Path, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let password = match &self.password {
            Some(password) => password.clone(),
            None => read_password_line(std::io::stdin().lock())?,
        };
        let credentials = Credentials::new(self.email.as_str(), &password)?;

        let session = Session::open(config_path).await?;
        let result = session.engine.login(&credentials).await;
        session.close().await;
        let profile = result.context("Sign-in failed")?;
        info!(user = %profile.id, "Signed in");

        let overridden = Config::load_or_default(config_path)
            .account
            .user_id
            .filter(|configured| *configured != profile.id);

        if format.is_json() {
            formatter.print_json(&serde_json::to_value(&profile)?);
        } else {
            formatter.success(&format!(
                "Signed in as {} ({})",
                profile.display_name(),
                profile.id
            ));
        }
        if let Some(configured) = overridden {
            formatter.warn(&format!(
                "account.user_id is set to '{}' in the configuration and takes precedence",
                configured
            ));
        }
        Ok(())
    }
}

/// Sign out and forget the stored user id
#[derive(Debug, Args)]
pub struct LogoutCommand;

impl LogoutCommand {
    pub async fn execute(&self, config_path: &Path, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let session = Session::open(config_path).await?;
        let result = session.engine.logout().await;
        session.close().await;
        result.context("Sign-out failed")?;

        if format.is_json() {
            formatter.print_json(&serde_json::json!({ "signed_in": false }));
        } else {
            formatter.success("Signed out");
        }
        Ok(())
    }
}

fn read_password_line(mut input: impl BufRead) -> Result<String> {
    let mut line = String::new();
    input
        .read_line(&mut line)
        .context("Failed to read password from stdin")?;
    let password = line.trim_end_matches(['\r', '\n']);
    if password.is_empty() {
        anyhow::bail!("No password given; pass --password or pipe it on stdin");
    }
    Ok(password.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_password_line() {
        let input = std::io::Cursor::new("s3cret pass\r\nignored\n");
        assert_eq!(read_password_line(input).unwrap(), "s3cret pass");
    }

    #[test]
    fn test_read_password_line_empty() {
        assert!(read_password_line(std::io::Cursor::new("")).is_err());
        assert!(read_password_line(std::io::Cursor::new("\n")).is_err());
    }
}
