//! copilot-dr - Disaster recovery for Copilot workspaces
//!
//! Scheduled, checksummed backups and verified restores. The backup root
//! must never be nested inside the workspace it protects, nor the reverse.

pub mod engine;

pub use engine::{DisasterRecoveryOrchestrator, RecoveryConfig, UnifiedDisasterRecoverySystem};
