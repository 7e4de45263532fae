//! Recovery Configuration
//! Resolves the workspace and backup roots once at startup and guards their layout

use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::io;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

pub const WORKSPACE_ENV: &str = "GH_COPILOT_WORKSPACE";
pub const BACKUP_ROOT_ENV: &str = "GH_COPILOT_BACKUP_ROOT";
pub const AUDIT_LOG_ENV: &str = "GH_COPILOT_AUDIT_LOG";

/// Directory name of the default backup root inside the system temp dir
pub const DEFAULT_BACKUP_DIR: &str = "gh_COPILOT_Backups";

/// Source-of-truth snapshot consumed by `perform_recovery`
pub const PRODUCTION_BACKUP_DIR: &str = "production_backup";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Workspace not found: {0}")]
    WorkspaceNotFound(PathBuf),
    #[error("Workspace is not a directory: {0}")]
    WorkspaceNotDirectory(PathBuf),
    #[error("Backup source not found: {0}")]
    SourceNotFound(PathBuf),
    #[error("Backup root {backup_root} resides within workspace {workspace}")]
    BackupInsideWorkspace {
        backup_root: PathBuf,
        workspace: PathBuf,
    },
    #[error("Workspace {workspace} resides within backup root {backup_root}")]
    WorkspaceInsideBackup {
        backup_root: PathBuf,
        workspace: PathBuf,
    },
    #[error("Failed to resolve path {path}: {source}")]
    Resolve {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl ConfigError {
    /// True for the nesting violations between backup root and workspace
    pub fn is_nesting_violation(&self) -> bool {
        matches!(
            self,
            Self::BackupInsideWorkspace { .. } | Self::WorkspaceInsideBackup { .. }
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecoveryConfig {
    /// Live data protected by backups
    pub workspace_root: PathBuf,
    /// Where artifacts and checksum records are stored
    pub backup_root: PathBuf,
    /// Line-delimited JSON audit trail
    #[serde(default = "default_audit_log")]
    pub audit_log: PathBuf,
}

impl RecoveryConfig {
    pub fn new(workspace_root: impl Into<PathBuf>, backup_root: impl Into<PathBuf>) -> Self {
        Self {
            workspace_root: workspace_root.into(),
            backup_root: backup_root.into(),
            audit_log: default_audit_log(),
        }
    }

    pub fn with_audit_log(mut self, audit_log: impl Into<PathBuf>) -> Self {
        self.audit_log = audit_log.into();
        self
    }

    /// Resolve from `GH_COPILOT_*` environment variables, falling back to defaults
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as `from_env`, reading variables through `lookup`
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| {
            lookup(key)
                .filter(|value| !value.trim().is_empty())
                .map(PathBuf::from)
        };

        Self {
            workspace_root: var(WORKSPACE_ENV).unwrap_or_else(|| PathBuf::from(".")),
            backup_root: var(BACKUP_ROOT_ENV).unwrap_or_else(default_backup_root),
            audit_log: var(AUDIT_LOG_ENV).unwrap_or_else(default_audit_log),
        }
    }

    pub fn production_backup_dir(&self) -> PathBuf {
        self.backup_root.join(PRODUCTION_BACKUP_DIR)
    }

    /// The workspace must exist and be a directory
    pub fn ensure_workspace(&self) -> Result<(), ConfigError> {
        let metadata = match std::fs::metadata(&self.workspace_root) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(ConfigError::WorkspaceNotFound(self.workspace_root.clone()));
            }
            Err(source) => {
                return Err(ConfigError::Resolve {
                    path: self.workspace_root.clone(),
                    source,
                });
            }
        };

        if !metadata.is_dir() {
            return Err(ConfigError::WorkspaceNotDirectory(self.workspace_root.clone()));
        }
        Ok(())
    }

    /// Full precondition for any backup or restore. Reads metadata only.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.ensure_workspace()?;
        ensure_disjoint(&self.backup_root, &self.workspace_root)
    }
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self::new(".", default_backup_root())
    }
}

pub fn default_backup_root() -> PathBuf {
    std::env::temp_dir().join(DEFAULT_BACKUP_DIR)
}

pub fn default_audit_log() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("copilot-dr")
        .join("audit.jsonl")
}

/// Fails when `backup_root` equals or lies under `workspace`, or the reverse.
pub fn ensure_disjoint(backup_root: &Path, workspace: &Path) -> Result<(), ConfigError> {
    let backup_root = resolve_path(backup_root)?;
    let workspace = resolve_path(workspace)?;

    if backup_root.starts_with(&workspace) {
        return Err(ConfigError::BackupInsideWorkspace {
            backup_root,
            workspace,
        });
    }
    if workspace.starts_with(&backup_root) {
        return Err(ConfigError::WorkspaceInsideBackup {
            backup_root,
            workspace,
        });
    }
    Ok(())
}

/// Absolute form of `path` with symlinks resolved, even when its tail does not exist yet.
pub fn resolve_path(path: &Path) -> Result<PathBuf, ConfigError> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map_err(|source| ConfigError::Resolve {
                path: path.to_path_buf(),
                source,
            })?
            .join(path)
    };

    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }

    // Canonicalize the deepest existing ancestor and re-attach the rest
    let mut existing = normalized.as_path();
    let mut tail: Vec<OsString> = Vec::new();
    loop {
        if let Ok(canonical) = existing.canonicalize() {
            let mut resolved = canonical;
            for part in tail.iter().rev() {
                resolved.push(part);
            }
            return Ok(resolved);
        }
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                tail.push(name.to_os_string());
                existing = parent;
            }
            _ => return Ok(normalized),
        }
    }
}
