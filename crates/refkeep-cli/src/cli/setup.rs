use clap::{ArgAction, Parser, Subcommand};
use refkeep::model::RootKind;
use std::path::PathBuf;

/// Returns the version string, including git hash and commit date for non-release builds.
/// Format: "0.3.0" for releases, "0.3.0@abc1234 2024-01-15 14:30" for dev builds
fn get_version() -> &'static str {
    const VERSION: &str = env!("CARGO_PKG_VERSION");
    const GIT_HASH: &str = env!("GIT_HASH");
    const GIT_COMMIT_DATE: &str = env!("GIT_COMMIT_DATE");
    const IS_RELEASE: &str = env!("IS_RELEASE");

    use std::sync::OnceLock;
    static VERSION_STRING: OnceLock<String> = OnceLock::new();

    VERSION_STRING.get_or_init(|| {
        if IS_RELEASE == "true" || GIT_HASH.is_empty() {
            VERSION.to_string()
        } else {
            format!("{}@{} {}", VERSION, GIT_HASH, GIT_COMMIT_DATE)
        }
    })
}

#[derive(Parser, Debug)]
#[command(name = "refkeep", bin_name = "refkeep", version = get_version())]
#[command(
    about = "Cascade deletes, orphan scans and counter repair for a document store",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Snapshot file, or directory holding store.json
    #[arg(long, global = true, value_name = "PATH")]
    pub store: Option<PathBuf>,

    /// Config file (default: refkeep.toml in the user config directory)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// More log output on stderr (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Delete a user, resolution, topic or journal entry and everything depending on it
    Delete {
        /// user | resolution | topic | journal
        kind: RootKind,
        id: String,
    },

    /// Delete one comment and all replies beneath it
    #[command(name = "delete-comment")]
    DeleteComment {
        kind: RootKind,
        root_id: String,
        comment_id: String,
    },

    /// Close an account on behalf of a verified caller
    #[command(name = "close-account")]
    CloseAccount {
        uid: String,

        /// Uid of the caller requesting the closure
        #[arg(long = "as", value_name = "UID")]
        caller: String,

        /// The caller is an administrator
        #[arg(long)]
        elevated: bool,
    },

    /// Report orphaned records without changing anything
    Scan,

    /// Scan, then delete every orphan found
    Clean {
        /// Actually delete; without this only the preview is shown
        #[arg(short, long)]
        yes: bool,
    },

    /// Recompute commentCount from live comments
    Reconcile {
        kind: RootKind,
        /// A single root; all roots of the kind when omitted
        id: Option<String>,
    },

    /// Show the comment thread of a root
    Thread { kind: RootKind, id: String },

    /// Show the effective configuration
    Config {
        /// Print a commented sample config file instead
        #[arg(long)]
        template: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_delete_with_kind_alias() {
        let cli = Cli::try_parse_from(["refkeep", "delete", "journalEntries", "j1"]).unwrap();
        match cli.command {
            Commands::Delete { kind, id } => {
                assert_eq!(kind, RootKind::JournalEntry);
                assert_eq!(id, "j1");
            }
            other => panic!("Expected Delete, got {:?}", other),
        }
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["refkeep", "scan", "--json", "-vv", "--store", "/tmp/x"])
            .unwrap();
        assert!(cli.json);
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.store, Some(PathBuf::from("/tmp/x")));
    }

    #[test]
    fn close_account_requires_caller() {
        assert!(Cli::try_parse_from(["refkeep", "close-account", "u1"]).is_err());
        let cli =
            Cli::try_parse_from(["refkeep", "close-account", "u1", "--as", "ops", "--elevated"])
                .unwrap();
        assert!(matches!(
            cli.command,
            Commands::CloseAccount { elevated: true, .. }
        ));
    }

    #[test]
    fn rejects_unknown_kind() {
        assert!(Cli::try_parse_from(["refkeep", "delete", "post", "p1"]).is_err());
    }
}
