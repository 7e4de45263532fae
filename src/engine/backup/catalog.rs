//! Backup Catalogue
//!
//! Enumerates scheduled artifacts under a backup root

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use super::checksum::ChecksumVerifier;

/// File name suffix of every scheduled artifact
pub const ARTIFACT_SUFFIX: &str = "-artifact.tar.gz";

/// chrono format of the timestamp that starts every artifact name
pub const ARTIFACT_STAMP_FORMAT: &str = "%Y%m%d-%H%M%S-%6f";

/// Length of a name formatted with `ARTIFACT_STAMP_FORMAT`
const STAMP_LEN: usize = 22;

/// Metadata for a scheduled artifact
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupRecord {
    /// Artifact file name, timestamp first
    pub id: String,

    pub path: PathBuf,

    /// Size in bytes
    pub size: u64,

    /// Last modification time of the artifact
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_at: Option<DateTime<Utc>>,

    /// Digest from the `.sha256` record, if present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
}

pub struct BackupCatalog {
    backup_root: PathBuf,
}

impl BackupCatalog {
    pub fn new(backup_root: &Path) -> Self {
        Self {
            backup_root: backup_root.to_path_buf(),
        }
    }

    /// All scheduled artifacts, newest first
    pub fn list(&self) -> io::Result<Vec<BackupRecord>> {
        let mut backups = Vec::new();

        if !self.backup_root.exists() {
            return Ok(backups);
        }

        for entry in fs::read_dir(&self.backup_root)? {
            let entry = entry?;
            let path = entry.path();
            let id = entry.file_name().to_string_lossy().to_string();

            if !id.ends_with(ARTIFACT_SUFFIX) || !path.is_file() {
                continue;
            }

            let metadata = entry.metadata()?;
            backups.push(BackupRecord {
                id,
                size: metadata.len(),
                modified_at: metadata.modified().ok().map(DateTime::<Utc>::from),
                checksum: ChecksumVerifier::read_record(&path)?,
                path,
            });
        }

        backups.sort_by(|a, b| order_key(&b.id).cmp(&order_key(&a.id)));
        Ok(backups)
    }

    /// Newest artifact that has a checksum record
    pub fn latest(&self) -> io::Result<Option<BackupRecord>> {
        Ok(self.list()?.into_iter().find(|b| b.checksum.is_some()))
    }
}

/// `(timestamp, counter)` of an artifact name; `<stamp>-artifact` has counter 0
fn order_key(id: &str) -> (&str, u64) {
    let base = id.strip_suffix(ARTIFACT_SUFFIX).unwrap_or(id);
    match (base.get(..STAMP_LEN), base.get(STAMP_LEN..)) {
        (Some(stamp), Some(rest)) => {
            let counter = rest
                .strip_prefix('-')
                .and_then(|n| n.parse().ok())
                .unwrap_or(0);
            (stamp, counter)
        }
        _ => (base, 0),
    }
}
