//! Backup and Restore Module
//!
//! Checksummed backup artifacts and verified restores

pub mod archive;
pub mod catalog;
pub mod checksum;
pub mod restore;
pub mod scheduler;

pub use catalog::{BackupCatalog, BackupRecord};
pub use checksum::{ChecksumVerifier, IntegrityStatus};
pub use restore::{
    IntegrityPolicy, RestoreExecutor, RestoreFailure, RestoreMode, RestoreStage, RestoreSummary,
};
pub use scheduler::{BackupArtifact, BackupOptions, BackupScheduler};
