//! Checksum Verification
//!
//! SHA-256 digests for backup artifacts and their `.sha256` sibling records.
//!
//! A file artifact hashes to the digest of its bytes. A directory artifact
//! hashes every regular file in sorted relative-path order, each contributing
//! `path || 0x00 || u64_le(len) || bytes`, so re-computation against the stored
//! tree is deterministic.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::{Component, Path, PathBuf};

use super::archive::collect_files;

/// Extension appended to an artifact's file name for its checksum record
pub const CHECKSUM_EXTENSION: &str = "sha256";

/// Result of checking an artifact against its record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum IntegrityStatus {
    Verified,
    MissingChecksum,
    HashMismatch { expected: String, actual: String },
}

impl IntegrityStatus {
    pub fn is_verified(&self) -> bool {
        matches!(self, Self::Verified)
    }
}

pub struct ChecksumVerifier;

impl ChecksumVerifier {
    /// SHA-256 hex digest of a file or directory artifact
    pub fn compute(path: &Path) -> io::Result<String> {
        if fs::metadata(path)?.is_dir() {
            Self::compute_dir(path)
        } else {
            let mut hasher = Sha256::new();
            hash_file(path, &mut hasher)?;
            Ok(hex::encode(hasher.finalize()))
        }
    }

    /// True iff the digest of `path` equals `expected`, ignoring case and
    /// surrounding whitespace. A mismatch is `Ok(false)`.
    pub fn verify(path: &Path, expected: &str) -> io::Result<bool> {
        let actual = Self::compute(path)?;
        Ok(actual.eq_ignore_ascii_case(expected.trim()))
    }

    /// `<artifact>.sha256`, next to the artifact
    pub fn checksum_path(artifact: &Path) -> PathBuf {
        let mut name = artifact
            .file_name()
            .map(OsString::from)
            .unwrap_or_default();
        name.push(".");
        name.push(CHECKSUM_EXTENSION);
        artifact.with_file_name(name)
    }

    /// Recorded digest for `artifact`, or `None` when the record is absent
    pub fn read_record(artifact: &Path) -> io::Result<Option<String>> {
        match fs::read_to_string(Self::checksum_path(artifact)) {
            Ok(content) => Ok(Some(content.trim().to_string())),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Write the record atomically as a single lowercase hex line
    pub fn write_record(artifact: &Path, digest: &str) -> io::Result<PathBuf> {
        let record_path = Self::checksum_path(artifact);
        let temp_path = record_path.with_extension("sha256.tmp");
        let written = fs::write(&temp_path, format!("{}\n", digest.trim().to_lowercase()))
            .and_then(|_| fs::rename(&temp_path, &record_path));
        if let Err(e) = written {
            let _ = fs::remove_file(&temp_path);
            return Err(e);
        }
        Ok(record_path)
    }

    /// Compare an artifact against its sibling record
    pub fn check(artifact: &Path) -> io::Result<IntegrityStatus> {
        let Some(expected) = Self::read_record(artifact)? else {
            return Ok(IntegrityStatus::MissingChecksum);
        };

        let actual = Self::compute(artifact)?;
        if actual.eq_ignore_ascii_case(&expected) {
            Ok(IntegrityStatus::Verified)
        } else {
            Ok(IntegrityStatus::HashMismatch { expected, actual })
        }
    }

    fn compute_dir(dir: &Path) -> io::Result<String> {
        let mut hasher = Sha256::new();

        for relative in collect_files(dir)? {
            let path = dir.join(&relative);
            hasher.update(portable_path(&relative).as_bytes());
            hasher.update([0u8]);
            hasher.update(fs::metadata(&path)?.len().to_le_bytes());
            hash_file(&path, &mut hasher)?;
        }

        Ok(hex::encode(hasher.finalize()))
    }
}

fn hash_file(path: &Path, hasher: &mut Sha256) -> io::Result<()> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);

    let mut buffer = [0u8; 8192];
    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }
    Ok(())
}

/// `/`-joined form of a relative path, identical across platforms
fn portable_path(relative: &Path) -> String {
    relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}
