// copilot-dr engine - Core module structure
pub mod audit;
pub mod backup;
pub mod cli;
pub mod clock;
pub mod config;
pub mod error;
pub mod recovery;

pub use config::RecoveryConfig;
pub use error::{RecoveryError, Result};
pub use recovery::{DisasterRecoveryOrchestrator, UnifiedDisasterRecoverySystem};
