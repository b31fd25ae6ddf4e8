//! Command line definition.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use folio_core::DocumentId;

#[derive(Debug, Parser)]
#[command(name = "folio")]
#[command(about = "Offline-first document sync")]
#[command(version)]
pub struct Cli {
    /// Path to sync.toml (defaults to the platform config directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print the current sync status
    Status,

    /// Upload every pending document, then download remote changes
    Sync,

    /// Upload documents (all pending ones when no id is given)
    Upload {
        /// Local document id(s)
        ids: Vec<DocumentId>,
    },

    /// Download remote changes since the last sync
    Download,

    /// Load pending documents into the queue and drain until each one is
    /// uploaded or has used all its retries
    Drain,

    /// List uploads that used all their retries
    Failures,

    /// Log in to the remote server
    #[command(arg_required_else_help = true)]
    Login {
        #[arg(long)]
        email: String,

        /// Password (falls back to FOLIO_PASSWORD)
        #[arg(long, env = "FOLIO_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Clear the stored credentials
    Logout,

    /// Write a backup bundle
    Export {
        /// Output file (stdout when omitted)
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Restore a backup bundle
    Import {
        /// Bundle written by `folio export`
        file: PathBuf,
    },

    /// Move a failed document back to pending and queue it
    Retry {
        /// Local document id
        id: DocumentId,
    },

    /// Run the connectivity probe and queue drain until Ctrl-C
    Run,

    /// Inspect or write sync.toml
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Print the effective configuration (file, FOLIO_* overrides, defaults)
    Show,

    /// Write the effective configuration to sync.toml
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_upload_ids() {
        let cli = Cli::try_parse_from(["folio", "upload", "1", "2"]).unwrap();
        match cli.command {
            Command::Upload { ids } => assert_eq!(ids, vec![1, 2]),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_global_config() {
        let cli = Cli::try_parse_from(["folio", "status", "--config", "/tmp/sync.toml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/sync.toml")));
        assert!(matches!(cli.command, Command::Status));
    }

    #[test]
    fn test_parse_login() {
        let cli = Cli::try_parse_from([
            "folio",
            "login",
            "--email",
            "ops@example.com",
            "--password",
            "pw",
        ])
        .unwrap();
        match cli.command {
            Command::Login { email, password } => {
                assert_eq!(email, "ops@example.com");
                assert_eq!(password, "pw");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_config_init() {
        let cli = Cli::try_parse_from(["folio", "config", "init", "--force"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Config {
                action: ConfigAction::Init { force: true }
            }
        ));

        let cli = Cli::try_parse_from(["folio", "config", "show"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Config {
                action: ConfigAction::Show
            }
        ));
        assert!(Cli::try_parse_from(["folio", "config"]).is_err());
    }

    #[test]
    fn test_parse_failures_and_drain() {
        let cli = Cli::try_parse_from(["folio", "failures"]).unwrap();
        assert!(matches!(cli.command, Command::Failures));

        let cli = Cli::try_parse_from(["folio", "drain"]).unwrap();
        assert!(matches!(cli.command, Command::Drain));
    }

    #[test]
    fn test_retry_requires_numeric_id() {
        assert!(Cli::try_parse_from(["folio", "retry", "abc"]).is_err());
        assert!(Cli::try_parse_from(["folio", "retry"]).is_err());
    }
}
