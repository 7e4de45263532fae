//! Recovery Error Types

use std::io;
use thiserror::Error;

use super::config::ConfigError;

#[derive(Error, Debug)]
pub enum RecoveryError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl RecoveryError {
    /// Configuration errors are never worth retrying
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}

pub type Result<T> = std::result::Result<T, RecoveryError>;
