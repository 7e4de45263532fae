//! Artifact packing and copying helpers

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::{self, File};
use std::io::{self, BufReader, Read, Write};
use std::path::{Path, PathBuf};

/// Totals for a pack, unpack or copy pass
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TransferStats {
    pub files: usize,
    pub bytes: u64,
}

impl TransferStats {
    fn add(&mut self, other: TransferStats) {
        self.files += other.files;
        self.bytes += other.bytes;
    }
}

/// Whether `path` names a tar archive (optionally gzipped)
pub fn is_tar_archive(path: &Path) -> bool {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    name.ends_with(".tar.gz") || name.ends_with(".tgz") || name.ends_with(".tar")
}

fn is_gzip(path: &Path) -> bool {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    name.ends_with(".gz") || name.ends_with(".tgz")
}

/// What a directory entry resolves to once symlinks are taken into account
enum EntryKind {
    Dir,
    File,
    Skip,
}

/// Links to files are followed; links to directories are skipped so a
/// cycle cannot recurse forever. A dangling link is an error.
fn entry_kind(entry: &fs::DirEntry) -> io::Result<EntryKind> {
    let file_type = entry.file_type()?;
    if file_type.is_symlink() {
        let target = fs::metadata(entry.path())?;
        return Ok(if target.is_file() {
            EntryKind::File
        } else {
            EntryKind::Skip
        });
    }

    Ok(if file_type.is_dir() {
        EntryKind::Dir
    } else if file_type.is_file() {
        EntryKind::File
    } else {
        EntryKind::Skip
    })
}

/// Relative paths of every regular file under `root`, sorted
pub fn collect_files(root: &Path) -> io::Result<Vec<PathBuf>> {
    fn walk(root: &Path, dir: &Path, out: &mut Vec<PathBuf>) -> io::Result<()> {
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();

            match entry_kind(&entry)? {
                EntryKind::Dir => walk(root, &path, out)?,
                EntryKind::File => {
                    let relative = path
                        .strip_prefix(root)
                        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
                    out.push(relative.to_path_buf());
                }
                EntryKind::Skip => {}
            }
        }
        Ok(())
    }

    let mut files = Vec::new();
    walk(root, root, &mut files)?;
    files.sort();
    Ok(files)
}

/// Write `src` as a gzipped tar stream into `writer` and hand the writer back
pub fn pack_dir<W: Write>(src: &Path, writer: W, level: u32) -> io::Result<(W, TransferStats)> {
    let encoder = GzEncoder::new(writer, Compression::new(level.min(9)));
    let mut builder = tar::Builder::new(encoder);
    let mut stats = TransferStats::default();

    for relative in collect_files(src)? {
        let mut file = File::open(src.join(&relative))?;
        let len = file.metadata()?.len();
        builder.append_file(&relative, &mut file)?;
        stats.files += 1;
        stats.bytes += len;
    }

    let encoder = builder.into_inner()?;
    let writer = encoder.finish()?;
    Ok((writer, stats))
}

/// Extract a tar(.gz) archive into `dest`, overwriting existing files.
/// Entries escaping `dest` are skipped.
pub fn unpack_archive(archive_path: &Path, dest: &Path) -> io::Result<TransferStats> {
    let file = BufReader::new(File::open(archive_path)?);
    let reader: Box<dyn Read> = if is_gzip(archive_path) {
        Box::new(GzDecoder::new(file))
    } else {
        Box::new(file)
    };

    fs::create_dir_all(dest)?;
    let mut archive = tar::Archive::new(reader);
    archive.set_overwrite(true);

    let mut stats = TransferStats::default();
    for entry in archive.entries()? {
        let mut entry = entry?;
        let is_file = entry.header().entry_type().is_file();
        let size = entry.header().size()?;
        if entry.unpack_in(dest)? && is_file {
            stats.files += 1;
            stats.bytes += size;
        }
    }

    Ok(stats)
}

/// Recursively copy a directory
pub fn copy_dir_recursive(src: &Path, dest: &Path) -> io::Result<TransferStats> {
    let mut stats = TransferStats::default();

    fs::create_dir_all(dest)?;

    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let path = entry.path();
        let dest_path = dest.join(entry.file_name());

        match entry_kind(&entry)? {
            EntryKind::Dir => stats.add(copy_dir_recursive(&path, &dest_path)?),
            EntryKind::File => {
                stats.bytes += fs::copy(&path, &dest_path)?;
                stats.files += 1;
            }
            EntryKind::Skip => {}
        }
    }

    Ok(stats)
}

/// Materialise any supported artifact into `dest`: directories are copied,
/// archives unpacked, and single files copied by name.
pub fn restore_into(artifact: &Path, dest: &Path) -> io::Result<TransferStats> {
    if artifact.is_dir() {
        return copy_dir_recursive(artifact, dest);
    }
    if is_tar_archive(artifact) {
        return unpack_archive(artifact, dest);
    }

    let name = artifact.file_name().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("Artifact has no file name: {}", artifact.display()),
        )
    })?;
    fs::create_dir_all(dest)?;
    let bytes = fs::copy(artifact, dest.join(name))?;
    Ok(TransferStats { files: 1, bytes })
}
