//! Backup Scheduler
//!
//! Packs the workspace into a timestamped artifact and records its checksum

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fs::{self, File};
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use super::archive::{self, TransferStats};
use super::catalog::{ARTIFACT_STAMP_FORMAT, ARTIFACT_SUFFIX};
use super::checksum::ChecksumVerifier;
use crate::engine::audit::{events, ComplianceLogger};
use crate::engine::clock::{Clock, SystemClock};
use crate::engine::config::{self, ConfigError, RecoveryConfig};
use crate::engine::error::{RecoveryError, Result};

/// Backup options
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupOptions {
    /// Gzip level (0 = none, 9 = max)
    #[serde(default = "default_compression")]
    pub compression: u32,

    /// Directory to back up instead of the workspace
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<PathBuf>,
}

fn default_compression() -> u32 {
    6
}

impl Default for BackupOptions {
    fn default() -> Self {
        Self {
            compression: default_compression(),
            source: None,
        }
    }
}

/// A freshly scheduled backup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupArtifact {
    pub path: PathBuf,
    pub checksum_path: PathBuf,
    pub checksum: String,
    pub created_at: DateTime<Utc>,
    pub files: usize,
    pub bytes: u64,
}

pub struct BackupScheduler {
    config: RecoveryConfig,
    options: BackupOptions,
    logger: Arc<ComplianceLogger>,
    clock: Arc<dyn Clock>,
}

impl BackupScheduler {
    pub fn new(config: RecoveryConfig, logger: Arc<ComplianceLogger>) -> Self {
        Self {
            config,
            options: BackupOptions::default(),
            logger,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_options(mut self, options: BackupOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Back up the configured source and return the artifact path
    pub fn schedule(&self) -> Result<PathBuf> {
        Ok(self.schedule_artifact()?.path)
    }

    /// Back up the configured source (workspace unless overridden)
    pub fn schedule_artifact(&self) -> Result<BackupArtifact> {
        let source = self
            .options
            .source
            .clone()
            .unwrap_or_else(|| self.config.workspace_root.clone());
        self.schedule_from(&source)
    }

    /// Back up an explicit source directory
    pub fn schedule_from(&self, source: &Path) -> Result<BackupArtifact> {
        if let Err(e) = self.preflight(source) {
            self.logger.log_event(
                events::BACKUP_FAILED,
                json!({
                    "reason": "invalid_configuration",
                    "source": source.display().to_string(),
                    "backup_root": self.config.backup_root.display().to_string(),
                    "message": e.to_string(),
                }),
            );
            return Err(e.into());
        }

        match self.write_artifact(source) {
            Ok(artifact) => {
                self.logger.log_event(
                    events::BACKUP_SCHEDULED,
                    json!({
                        "source": source.display().to_string(),
                        "artifact": artifact.path.display().to_string(),
                        "checksum": artifact.checksum,
                        "files": artifact.files,
                        "bytes": artifact.bytes,
                        "created_at": artifact.created_at.to_rfc3339(),
                    }),
                );
                Ok(artifact)
            }
            Err(e) => {
                self.logger.log_event(
                    events::BACKUP_FAILED,
                    json!({
                        "reason": "io_error",
                        "source": source.display().to_string(),
                        "backup_root": self.config.backup_root.display().to_string(),
                        "message": e.to_string(),
                    }),
                );
                Err(e)
            }
        }
    }

    /// Everything checked here reads metadata only
    fn preflight(&self, source: &Path) -> std::result::Result<(), ConfigError> {
        self.config.validate()?;

        if source != self.config.workspace_root.as_path() {
            if !source.is_dir() {
                return Err(ConfigError::SourceNotFound(source.to_path_buf()));
            }
            config::ensure_disjoint(&self.config.backup_root, source)?;
        }
        Ok(())
    }

    fn write_artifact(&self, source: &Path) -> Result<BackupArtifact> {
        fs::create_dir_all(&self.config.backup_root)?;

        let created_at = self.clock.now();
        let path = self.next_artifact_path(created_at);
        let partial = partial_path(&path);
        debug!(artifact = %path.display(), "packing backup");

        let stats = match pack_to(source, &partial, self.options.compression) {
            Ok(stats) => stats,
            Err(e) => {
                let _ = fs::remove_file(&partial);
                return Err(e.into());
            }
        };
        if let Err(e) = fs::rename(&partial, &path) {
            let _ = fs::remove_file(&partial);
            return Err(e.into());
        }

        // The record is written last; an artifact without one is never valid
        let recorded = ChecksumVerifier::compute(&path)
            .and_then(|digest| ChecksumVerifier::write_record(&path, &digest).map(|p| (digest, p)));
        let (checksum, checksum_path) = match recorded {
            Ok(recorded) => recorded,
            Err(e) => {
                let _ = fs::remove_file(&path);
                return Err(RecoveryError::Io(e));
            }
        };

        Ok(BackupArtifact {
            path,
            checksum_path,
            checksum,
            created_at,
            files: stats.files,
            bytes: stats.bytes,
        })
    }

    /// `<timestamp>-artifact.tar.gz`, with a counter when the name is taken
    fn next_artifact_path(&self, at: DateTime<Utc>) -> PathBuf {
        let stamp = at.format(ARTIFACT_STAMP_FORMAT).to_string();
        let mut candidate = self
            .config
            .backup_root
            .join(format!("{}{}", stamp, ARTIFACT_SUFFIX));

        let mut counter = 1;
        while candidate.exists()
            || ChecksumVerifier::checksum_path(&candidate).exists()
            || partial_path(&candidate).exists()
        {
            candidate = self
                .config
                .backup_root
                .join(format!("{}-{}{}", stamp, counter, ARTIFACT_SUFFIX));
            counter += 1;
        }
        candidate
    }
}

fn partial_path(artifact: &Path) -> PathBuf {
    artifact.with_extension("gz.partial")
}

fn pack_to(source: &Path, dest: &Path, level: u32) -> io::Result<TransferStats> {
    let file = File::create(dest)?;
    let (writer, stats) = archive::pack_dir(source, BufWriter::new(file), level)?;
    let file = writer.into_inner().map_err(|e| e.into_error())?;
    file.sync_all()?;
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::audit::MemoryAuditSink;
    use crate::engine::clock::FixedClock;
    use chrono::TimeZone;
    use tempfile::tempdir;

    fn setup(root: &Path) -> (RecoveryConfig, Arc<MemoryAuditSink>, Arc<ComplianceLogger>) {
        let ws = root.join("ws");
        fs::create_dir_all(ws.join("data")).unwrap();
        fs::write(ws.join("data/records.json"), r#"[1,2,3]"#).unwrap();
        fs::write(ws.join("readme.md"), "# ws").unwrap();

        let sink = Arc::new(MemoryAuditSink::new());
        let logger = Arc::new(ComplianceLogger::new(sink.clone()));
        (RecoveryConfig::new(ws, root.join("bk")), sink, logger)
    }

    #[test]
    fn test_schedule_writes_artifact_and_record() {
        let dir = tempdir().unwrap();
        let (config, sink, logger) = setup(dir.path());
        let scheduler = BackupScheduler::new(config.clone(), logger);

        let artifact = scheduler.schedule_artifact().unwrap();
        assert!(artifact.path.starts_with(&config.backup_root));
        assert!(artifact.path.to_string_lossy().ends_with(ARTIFACT_SUFFIX));
        assert_eq!(artifact.files, 2);

        let record = fs::read_to_string(&artifact.checksum_path).unwrap();
        assert_eq!(record.trim(), artifact.checksum);
        assert!(ChecksumVerifier::verify(&artifact.path, record.trim()).unwrap());
        assert!(!partial_path(&artifact.path).exists());

        let scheduled = sink.events_named(events::BACKUP_SCHEDULED);
        assert_eq!(scheduled.len(), 1);
        assert_eq!(
            scheduled[0].detail_str("artifact"),
            Some(artifact.path.display().to_string().as_str())
        );
        assert_eq!(
            scheduled[0].detail_str("created_at"),
            Some(artifact.created_at.to_rfc3339().as_str())
        );
        assert!(scheduled[0].detail("timestamp").is_none());
    }

    #[test]
    fn test_same_instant_gets_unique_names() {
        let dir = tempdir().unwrap();
        let (config, _sink, logger) = setup(dir.path());
        let at = Utc.with_ymd_and_hms(2026, 10, 19, 8, 30, 0).unwrap();
        let scheduler =
            BackupScheduler::new(config, logger).with_clock(Arc::new(FixedClock(at)));

        let first = scheduler.schedule().unwrap();
        let second = scheduler.schedule().unwrap();
        assert_ne!(first, second);
        assert!(first.ends_with("20261019-083000-000000-artifact.tar.gz"));
        assert!(second.ends_with("20261019-083000-000000-1-artifact.tar.gz"));
    }

    #[test]
    fn test_nested_backup_root_fails_before_writing() {
        let dir = tempdir().unwrap();
        let (config, sink, logger) = setup(dir.path());
        let nested = RecoveryConfig::new(&config.workspace_root, config.workspace_root.join("bk"));
        let scheduler = BackupScheduler::new(nested.clone(), logger);

        let err = scheduler.schedule().unwrap_err();
        assert!(err.is_fatal());
        assert!(!nested.backup_root.exists());
        assert_eq!(sink.events_named(events::BACKUP_FAILED).len(), 1);
    }

    #[test]
    fn test_explicit_source() {
        let dir = tempdir().unwrap();
        let (config, _sink, logger) = setup(dir.path());
        let source = dir.path().join("other");
        fs::create_dir_all(&source).unwrap();
        fs::write(source.join("only.txt"), "x").unwrap();

        let scheduler = BackupScheduler::new(config, logger).with_options(BackupOptions {
            compression: 0,
            source: Some(source),
        });
        let artifact = scheduler.schedule_artifact().unwrap();
        assert_eq!(artifact.files, 1);

        let missing = scheduler.schedule_from(&dir.path().join("absent")).unwrap_err();
        assert!(matches!(missing, RecoveryError::Config(ConfigError::SourceNotFound(_))));
    }

    #[cfg(unix)]
    #[test]
    fn test_directory_link_cycle_is_backed_up() {
        let dir = tempdir().unwrap();
        let (config, sink, logger) = setup(dir.path());
        std::os::unix::fs::symlink(".", config.workspace_root.join("data/loop")).unwrap();

        let artifact = BackupScheduler::new(config, logger).schedule_artifact().unwrap();
        assert_eq!(artifact.files, 2);
        assert!(ChecksumVerifier::verify(&artifact.path, &artifact.checksum).unwrap());
        assert!(sink.events_named(events::BACKUP_FAILED).is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_failed_copy_leaves_no_checksum() {
        let dir = tempdir().unwrap();
        let (config, sink, logger) = setup(dir.path());
        std::os::unix::fs::symlink(
            dir.path().join("vanished"),
            config.workspace_root.join("dangling"),
        )
        .unwrap();

        let scheduler = BackupScheduler::new(config.clone(), logger);
        let err = scheduler.schedule().unwrap_err();
        assert!(matches!(err, RecoveryError::Io(_)));

        let leftovers: Vec<_> = fs::read_dir(&config.backup_root)
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert!(leftovers.is_empty(), "unexpected files: {:?}", leftovers);
        assert_eq!(sink.events_named(events::BACKUP_FAILED).len(), 1);
    }
}
