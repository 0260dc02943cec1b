//! Command-line interface definition.

use std::path::PathBuf;

use chrono::{DateTime, FixedOffset, NaiveDate};
use clap::{Parser, Subcommand};

/// calsync - Google Calendar from the terminal
#[derive(Debug, Parser)]
#[command(name = "calsync")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, short, env = "CALSYNC_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable debug output
    #[arg(long, short = 'v')]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Sign in to Google Calendar in the browser
    Auth {
        /// OAuth client ID (from Google Cloud Console)
        #[arg(long, env = "GOOGLE_CLIENT_ID")]
        client_id: Option<String>,

        /// OAuth client secret (from Google Cloud Console)
        #[arg(long, env = "GOOGLE_CLIENT_SECRET")]
        client_secret: Option<String>,

        /// Path to Google Cloud Console credentials JSON file
        ///
        /// Alternative to providing client_id and client_secret separately.
        /// Credentials given on the command line are saved to config.toml.
        #[arg(long, env = "GOOGLE_CREDENTIALS_FILE")]
        credentials_file: Option<PathBuf>,
    },

    /// Sign out and revoke the stored token
    Signout,

    /// Show sign-in status
    Status,

    /// List the events of a calendar view
    Events {
        /// View to show: month, week, day or agenda
        #[arg(long)]
        view: Option<String>,

        /// Day the view is anchored on (YYYY-MM-DD), today by default
        #[arg(long)]
        date: Option<NaiveDate>,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Create an event with a Google Meet link
    Create {
        /// Start time (RFC 3339, e.g. 2024-03-15T10:00:00+01:00)
        #[arg(long)]
        start: DateTime<FixedOffset>,

        /// End time (RFC 3339)
        #[arg(long)]
        end: DateTime<FixedOffset>,

        /// Event title
        #[arg(long)]
        title: String,
    },

    /// Configuration commands
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Configuration actions.
#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Dump current configuration
    Dump,

    /// Validate configuration
    Validate,

    /// Show configuration and store paths
    Path,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_events_command() {
        let cli = Cli::parse_from(["calsync", "events", "--view", "week", "--date", "2024-03-15"]);
        match cli.command {
            Command::Events { view, date, json } => {
                assert_eq!(view.as_deref(), Some("week"));
                assert_eq!(date, NaiveDate::from_ymd_opt(2024, 3, 15));
                assert!(!json);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn parse_create_command() {
        let cli = Cli::parse_from([
            "calsync",
            "--debug",
            "create",
            "--start",
            "2024-03-15T10:00:00Z",
            "--end",
            "2024-03-15T11:00:00+00:00",
            "--title",
            "Sync",
        ]);
        assert!(cli.debug);
        match cli.command {
            Command::Create { start, end, title } => {
                assert_eq!(title, "Sync");
                assert_eq!((end - start).num_minutes(), 60);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn rejects_invalid_date() {
        assert!(Cli::try_parse_from(["calsync", "events", "--date", "15/03/2024"]).is_err());
    }
}
