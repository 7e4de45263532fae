//! Audit Module
//!
//! Append-only compliance trail for backup and restore operations

pub mod audit;
pub mod logger;

pub use audit::{events, AuditError, AuditEvent, AuditSink, JsonlAuditSink};
pub use logger::{ComplianceLogger, MemoryAuditSink};
