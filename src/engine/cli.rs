//! copilot-dr CLI Module
//! Command-line interface for backup and recovery operations

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use super::config::RecoveryConfig;

#[derive(Parser, Debug)]
#[command(name = "copilot-dr")]
#[command(author = "gh_COPILOT Team")]
#[command(version)]
#[command(about = "Checksummed backups and verified restores for Copilot workspaces", long_about = None)]
pub struct Cli {
    /// Workspace to protect (overrides GH_COPILOT_WORKSPACE)
    #[arg(short, long, global = true)]
    pub workspace: Option<PathBuf>,

    /// Backup storage root (overrides GH_COPILOT_BACKUP_ROOT)
    #[arg(short, long, global = true)]
    pub backup_root: Option<PathBuf>,

    /// Audit log file (overrides GH_COPILOT_AUDIT_LOG)
    #[arg(long, global = true)]
    pub audit_log: Option<PathBuf>,

    /// Output format (json for scripting)
    #[arg(short, long, global = true, default_value = "text")]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create a checksummed backup of the workspace
    Backup {
        /// Back up this directory instead of the workspace
        #[arg(short, long)]
        source: Option<PathBuf>,

        /// Gzip level (0-9)
        #[arg(short, long, default_value = "6")]
        compression: u32,
    },

    /// Restore a backup artifact into the workspace
    Restore {
        /// Artifact to restore (needs a sibling .sha256 file)
        path: PathBuf,

        /// Restore into workspace/restored/ instead of in place
        #[arg(long)]
        staged: bool,
    },

    /// Restore production_backup or the newest scheduled backup
    Recover,

    /// Check a backup against its checksum record
    Verify {
        /// Artifact to verify
        path: PathBuf,
    },

    /// List scheduled backups, newest first
    List,

    /// Show audit events
    Audit {
        /// Only events with this name (e.g. restore_failed)
        #[arg(short, long)]
        event: Option<String>,
    },
}

impl Cli {
    /// Environment config with command-line overrides applied
    pub fn resolve_config(&self) -> RecoveryConfig {
        let mut config = RecoveryConfig::from_env();
        if let Some(workspace) = &self.workspace {
            config.workspace_root = workspace.clone();
        }
        if let Some(backup_root) = &self.backup_root {
            config.backup_root = backup_root.clone();
        }
        if let Some(audit_log) = &self.audit_log {
            config.audit_log = audit_log.clone();
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_restore() {
        let cli = Cli::parse_from([
            "copilot-dr",
            "--workspace",
            "/srv/ws",
            "-b",
            "/mnt/bk",
            "restore",
            "/mnt/bk/x-artifact.tar.gz",
            "--staged",
        ]);

        match &cli.command {
            Commands::Restore { path, staged } => {
                assert_eq!(path, &PathBuf::from("/mnt/bk/x-artifact.tar.gz"));
                assert!(*staged);
            }
            other => panic!("unexpected command: {:?}", other),
        }

        let config = cli.resolve_config();
        assert_eq!(config.workspace_root, PathBuf::from("/srv/ws"));
        assert_eq!(config.backup_root, PathBuf::from("/mnt/bk"));
    }

    #[test]
    fn test_parse_backup_defaults() {
        let cli = Cli::parse_from(["copilot-dr", "--format", "json", "backup"]);
        assert_eq!(cli.format, OutputFormat::Json);
        assert!(matches!(
            cli.command,
            Commands::Backup {
                source: None,
                compression: 6
            }
        ));
    }
}
