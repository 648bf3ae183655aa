//! CLI argument definitions using clap
//!
//! Commands:
//! - arcvault init --config <path>
//! - arcvault claim --unit <id>
//! - arcvault put / copy / get / contains / delete
//! - arcvault usage
//! - arcvault transitions

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// arcvault - versioned element archive with ACL transition tracking
#[derive(Parser, Debug)]
#[command(name = "arcvault")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, global = true, default_value = "./arcvault.json")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create the archive, workspace and state directories
    Init,

    /// Claim the next version of a content unit
    Claim {
        #[arg(long)]
        unit: String,
    },

    /// Link a staged source into the archive
    Put {
        #[arg(long)]
        unit: String,
        #[arg(long)]
        version: u64,
        #[arg(long)]
        asset: String,
        /// Source URI, relative to the workspace or `file://`
        #[arg(long)]
        source: String,
        #[arg(long)]
        extension: Option<String>,
    },

    /// Duplicate an element into another version
    Copy {
        #[arg(long)]
        unit: String,
        #[arg(long)]
        asset: String,
        #[arg(long)]
        from_version: u64,
        #[arg(long)]
        to_version: u64,
    },

    /// Write an element's bytes to a file
    Get {
        #[arg(long)]
        unit: String,
        #[arg(long)]
        version: u64,
        #[arg(long)]
        asset: String,
        #[arg(long)]
        output: PathBuf,
    },

    /// Check whether an element exists
    Contains {
        #[arg(long)]
        unit: String,
        #[arg(long)]
        version: u64,
        #[arg(long)]
        asset: String,
    },

    /// Delete one version, or every version when none is given
    Delete {
        #[arg(long)]
        unit: String,
        #[arg(long)]
        version: Option<u64>,
    },

    /// Report disk usage of the archive
    Usage,

    /// List stored ACL transitions
    Transitions {
        /// Only transitions of this episode or series
        #[arg(long)]
        target: Option<String>,
        /// Only transitions not yet done
        #[arg(long)]
        pending: bool,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_put() {
        let cli = Cli::try_parse_from([
            "arcvault", "--config", "/etc/arc.json", "put", "--unit", "U1", "--version", "1",
            "--asset", "a", "--source", "inbox/a.mp4",
        ])
        .unwrap();

        assert_eq!(cli.config, PathBuf::from("/etc/arc.json"));
        match cli.command {
            Command::Put { unit, version, extension, .. } => {
                assert_eq!(unit, "U1");
                assert_eq!(version, 1);
                assert!(extension.is_none());
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_delete_without_version() {
        let cli = Cli::try_parse_from(["arcvault", "delete", "--unit", "U1"]).unwrap();
        assert!(matches!(cli.command, Command::Delete { version: None, .. }));
        assert_eq!(cli.config, PathBuf::from("./arcvault.json"));
    }
}
