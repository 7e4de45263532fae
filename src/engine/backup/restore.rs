//! Restore Executor
//!
//! Verifies a backup against its checksum record and copies it into the workspace.
//!
//! Each restore moves through explicit stages:
//! `Init -> SafetyCheck -> {Aborted | IntegrityCheck} -> {Aborted | Copying} -> {Success | Failed}`.
//! Nothing under the workspace is written before `Copying`.

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::debug;

use super::archive;
use super::catalog::BackupCatalog;
use super::checksum::{ChecksumVerifier, IntegrityStatus};
use crate::engine::audit::{events, ComplianceLogger};
use crate::engine::config::{self, ConfigError, RecoveryConfig};

/// Sub-directory of the workspace used by `RestoreMode::Staged`
pub const RESTORED_DIR: &str = "restored";

/// Where restored files land
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RestoreMode {
    /// Directly into the workspace root
    #[default]
    InPlace,
    /// Into `workspace/restored/`
    Staged,
}

impl RestoreMode {
    pub fn target_dir(&self, workspace: &Path) -> PathBuf {
        match self {
            Self::InPlace => workspace.to_path_buf(),
            Self::Staged => workspace.join(RESTORED_DIR),
        }
    }
}

/// How strictly the checksum record is enforced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegrityPolicy {
    /// A missing record aborts the restore
    Required,
    /// A missing record is tolerated; a mismatching one still aborts
    IfPresent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestoreStage {
    Init,
    SafetyCheck,
    IntegrityCheck,
    Copying,
    Success,
    Aborted,
    Failed,
}

impl RestoreStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::SafetyCheck => "safety_check",
            Self::IntegrityCheck => "integrity_check",
            Self::Copying => "copying",
            Self::Success => "success",
            Self::Aborted => "aborted",
            Self::Failed => "failed",
        }
    }
}

/// Why a restore did not complete
#[derive(Error, Debug)]
pub enum RestoreFailure {
    #[error(transparent)]
    Configuration(#[from] ConfigError),

    #[error("Backup not found: {0}")]
    BackupNotFound(PathBuf),

    #[error("Checksum file not found: {0}")]
    MissingChecksum(PathBuf),

    #[error("Checksum mismatch for {path}: expected {expected}, got {actual}")]
    HashMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    #[error("IO error during restore: {0}")]
    Io(#[from] io::Error),
}

impl RestoreFailure {
    /// Stable reason code recorded in the audit trail
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Configuration(e) if e.is_nesting_violation() => "nested_backup_root",
            Self::Configuration(_) => "invalid_configuration",
            Self::BackupNotFound(_) => "backup_not_found",
            Self::MissingChecksum(_) => "missing_checksum",
            Self::HashMismatch { .. } => "hash_mismatch",
            Self::Io(_) => "io_error",
        }
    }

    /// Terminal stage: checks abort, copy errors fail
    pub fn terminal_stage(&self) -> RestoreStage {
        match self {
            Self::Io(_) => RestoreStage::Failed,
            _ => RestoreStage::Aborted,
        }
    }

    /// Integrity failures may succeed with an older backup
    pub fn is_integrity_failure(&self) -> bool {
        matches!(self, Self::MissingChecksum(_) | Self::HashMismatch { .. })
    }
}

/// Outcome of a successful restore
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestoreSummary {
    pub source: PathBuf,
    pub target: PathBuf,
    pub files_restored: usize,
    pub bytes_restored: u64,
    /// False when the backup had no checksum record and the policy allowed it
    pub verified: bool,
    pub duration: Duration,
}

pub struct RestoreExecutor {
    config: RecoveryConfig,
    logger: Arc<ComplianceLogger>,
    mode: RestoreMode,
}

impl RestoreExecutor {
    pub fn new(config: RecoveryConfig, logger: Arc<ComplianceLogger>) -> Self {
        Self {
            config,
            logger,
            mode: RestoreMode::default(),
        }
    }

    pub fn with_mode(mut self, mode: RestoreMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn mode(&self) -> RestoreMode {
        self.mode
    }

    /// Restore a backup that must carry a matching `.sha256` record
    pub fn restore(&self, backup_path: &Path) -> Result<RestoreSummary, RestoreFailure> {
        self.restore_with(backup_path, self.mode, IntegrityPolicy::Required)
    }

    /// Restore the expected backup under the configured backup root.
    ///
    /// `production_backup/` is preferred and restored into `workspace/restored/`;
    /// its record is checked when present. Otherwise the newest scheduled
    /// artifact is restored with the executor's mode and a mandatory record.
    pub fn perform_recovery(&self) -> Result<RestoreSummary, RestoreFailure> {
        let backup_root = self.config.backup_root.clone();

        if let Err(e) = self.config.validate() {
            let failure = RestoreFailure::from(e);
            self.report_failure(&backup_root, RestoreStage::SafetyCheck, &failure);
            return Err(failure);
        }

        let production = self.config.production_backup_dir();
        if production.is_dir() {
            return self.restore_with(&production, RestoreMode::Staged, IntegrityPolicy::IfPresent);
        }

        match BackupCatalog::new(&backup_root).latest() {
            Ok(Some(latest)) => self.restore_with(&latest.path, self.mode, IntegrityPolicy::Required),
            Ok(None) => {
                let failure = RestoreFailure::BackupNotFound(backup_root.clone());
                self.report_failure(&backup_root, RestoreStage::IntegrityCheck, &failure);
                Err(failure)
            }
            Err(e) => {
                let failure = RestoreFailure::Io(e);
                self.report_failure(&backup_root, RestoreStage::IntegrityCheck, &failure);
                Err(failure)
            }
        }
    }

    pub fn restore_with(
        &self,
        backup_path: &Path,
        mode: RestoreMode,
        policy: IntegrityPolicy,
    ) -> Result<RestoreSummary, RestoreFailure> {
        let started = Instant::now();
        let mut stage = RestoreStage::Init;
        debug!(source = %backup_path.display(), ?mode, "restore requested");

        match self.run(backup_path, mode, policy, &mut stage, started) {
            Ok(summary) => {
                self.logger.log_event(
                    events::RESTORE_SUCCESS,
                    json!({
                        "source": summary.source.display().to_string(),
                        "target": summary.target.display().to_string(),
                        "files": summary.files_restored,
                        "bytes": summary.bytes_restored,
                        "verified": summary.verified,
                        "duration_ms": summary.duration.as_millis() as u64,
                        "stage": RestoreStage::Success.as_str(),
                    }),
                );
                Ok(summary)
            }
            Err(failure) => {
                self.report_failure(backup_path, stage, &failure);
                Err(failure)
            }
        }
    }

    fn run(
        &self,
        backup_path: &Path,
        mode: RestoreMode,
        policy: IntegrityPolicy,
        stage: &mut RestoreStage,
        started: Instant,
    ) -> Result<RestoreSummary, RestoreFailure> {
        *stage = RestoreStage::SafetyCheck;
        self.config.validate()?;
        let backup_root = match backup_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        config::ensure_disjoint(backup_root, &self.config.workspace_root)?;

        *stage = RestoreStage::IntegrityCheck;
        if !backup_path.exists() {
            return Err(RestoreFailure::BackupNotFound(backup_path.to_path_buf()));
        }
        let verified = match ChecksumVerifier::check(backup_path)? {
            IntegrityStatus::Verified => true,
            IntegrityStatus::MissingChecksum if policy == IntegrityPolicy::IfPresent => false,
            IntegrityStatus::MissingChecksum => {
                return Err(RestoreFailure::MissingChecksum(ChecksumVerifier::checksum_path(
                    backup_path,
                )));
            }
            IntegrityStatus::HashMismatch { expected, actual } => {
                return Err(RestoreFailure::HashMismatch {
                    path: backup_path.to_path_buf(),
                    expected,
                    actual,
                });
            }
        };

        *stage = RestoreStage::Copying;
        let target = mode.target_dir(&self.config.workspace_root);
        let stats = archive::restore_into(backup_path, &target)?;

        *stage = RestoreStage::Success;
        Ok(RestoreSummary {
            source: backup_path.to_path_buf(),
            target,
            files_restored: stats.files,
            bytes_restored: stats.bytes,
            verified,
            duration: started.elapsed(),
        })
    }

    fn report_failure(&self, source: &Path, stage: RestoreStage, failure: &RestoreFailure) {
        self.logger.log_event(
            events::RESTORE_FAILED,
            json!({
                "source": source.display().to_string(),
                "workspace": self.config.workspace_root.display().to_string(),
                "reason": failure.reason(),
                "message": failure.to_string(),
                "failed_at": stage.as_str(),
                "stage": failure.terminal_stage().as_str(),
            }),
        );
    }
}
