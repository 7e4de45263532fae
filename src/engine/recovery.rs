//! Disaster Recovery Facade
//!
//! `UnifiedDisasterRecoverySystem` wires the scheduler, executor and logger
//! together. `DisasterRecoveryOrchestrator` is the narrow surface meant for
//! CLI wrappers and schedulers.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::warn;

use super::audit::{AuditSink, ComplianceLogger, JsonlAuditSink};
use super::backup::{
    BackupArtifact, BackupCatalog, BackupOptions, BackupRecord, BackupScheduler, ChecksumVerifier,
    IntegrityStatus, RestoreExecutor, RestoreFailure, RestoreMode, RestoreSummary,
};
use super::clock::{Clock, SystemClock};
use super::config::RecoveryConfig;
use super::error::Result;

pub struct UnifiedDisasterRecoverySystem {
    config: RecoveryConfig,
    logger: Arc<ComplianceLogger>,
    clock: Arc<dyn Clock>,
    scheduler: BackupScheduler,
    executor: RestoreExecutor,
}

impl UnifiedDisasterRecoverySystem {
    pub fn new(config: RecoveryConfig, sink: Arc<dyn AuditSink>) -> Self {
        Self::with_clock(config, sink, Arc::new(SystemClock))
    }

    pub fn with_clock(config: RecoveryConfig, sink: Arc<dyn AuditSink>, clock: Arc<dyn Clock>) -> Self {
        let logger = Arc::new(ComplianceLogger::new(sink).with_clock(clock.clone()));
        let scheduler =
            BackupScheduler::new(config.clone(), logger.clone()).with_clock(clock.clone());
        let executor = RestoreExecutor::new(config.clone(), logger.clone());

        Self {
            config,
            logger,
            clock,
            scheduler,
            executor,
        }
    }

    /// Environment-resolved config with the JSONL audit log it names
    pub fn from_env() -> Self {
        let config = RecoveryConfig::from_env();
        let sink = Arc::new(JsonlAuditSink::new(config.audit_log.clone()));
        Self::new(config, sink)
    }

    pub fn with_backup_options(mut self, options: BackupOptions) -> Self {
        self.scheduler = BackupScheduler::new(self.config.clone(), self.logger.clone())
            .with_clock(self.clock.clone())
            .with_options(options);
        self
    }

    pub fn with_restore_mode(mut self, mode: RestoreMode) -> Self {
        self.executor = RestoreExecutor::new(self.config.clone(), self.logger.clone()).with_mode(mode);
        self
    }

    pub fn config(&self) -> &RecoveryConfig {
        &self.config
    }

    pub fn logger(&self) -> &ComplianceLogger {
        &self.logger
    }

    pub fn schedule_backups(&self) -> Result<PathBuf> {
        self.scheduler.schedule()
    }

    pub fn schedule_backup_artifact(&self) -> Result<BackupArtifact> {
        self.scheduler.schedule_artifact()
    }

    pub fn restore_backup(&self, backup_path: &Path) -> std::result::Result<RestoreSummary, RestoreFailure> {
        self.executor.restore(backup_path)
    }

    pub fn perform_recovery(&self) -> std::result::Result<RestoreSummary, RestoreFailure> {
        self.executor.perform_recovery()
    }

    /// Check an artifact against its record without restoring it
    pub fn verify_backup(&self, backup_path: &Path) -> Result<IntegrityStatus> {
        Ok(ChecksumVerifier::check(backup_path)?)
    }

    pub fn list_backups(&self) -> Result<Vec<BackupRecord>> {
        Ok(BackupCatalog::new(&self.config.backup_root).list()?)
    }
}

pub struct DisasterRecoveryOrchestrator {
    system: UnifiedDisasterRecoverySystem,
}

impl DisasterRecoveryOrchestrator {
    pub fn new(system: UnifiedDisasterRecoverySystem) -> Self {
        Self { system }
    }

    pub fn from_env() -> Self {
        Self::new(UnifiedDisasterRecoverySystem::from_env())
    }

    pub fn system(&self) -> &UnifiedDisasterRecoverySystem {
        &self.system
    }

    /// Schedule one backup; errors are already in the audit trail
    pub fn run_backup_cycle(&self) -> Result<PathBuf> {
        self.system.schedule_backups()
    }

    /// Restore `backup_path`; details of a failure live in the audit trail
    pub fn run_recovery_cycle(&self, backup_path: &Path) -> bool {
        report(self.system.restore_backup(backup_path))
    }

    /// Restore whatever `perform_recovery` selects
    pub fn run_latest_recovery_cycle(&self) -> bool {
        report(self.system.perform_recovery())
    }

    pub fn verify_backup(&self, backup_path: &Path) -> Result<IntegrityStatus> {
        self.system.verify_backup(backup_path)
    }

    pub fn list_backups(&self) -> Result<Vec<BackupRecord>> {
        self.system.list_backups()
    }
}

fn report(outcome: std::result::Result<RestoreSummary, RestoreFailure>) -> bool {
    match outcome {
        Ok(_) => true,
        Err(failure) => {
            warn!(reason = failure.reason(), "recovery cycle failed");
            false
        }
    }
}
