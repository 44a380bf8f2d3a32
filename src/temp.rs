//! Transient artifact store.
//!
//! Every path handed out is wrapped in a [`TransientFile`] guard that deletes the file
//! when dropped, so cleanup runs on every exit path of the scope that allocated it.

use std::fmt::Display;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime};

use crate::error::AppError;

/// Leading token of every artifact name; the stale sweep only touches files carrying it.
pub const ARTIFACT_PREFIX: &str = "vidthumb";

static NEXT_ARTIFACT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Allocates uniquely named paths inside one directory.
#[derive(Debug, Clone)]
pub struct TempFileManager {
    dir: PathBuf,
}

impl Default for TempFileManager {
    fn default() -> Self {
        Self::new(std::env::temp_dir())
    }
}

impl TempFileManager {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Reserves a path without touching the filesystem.
    ///
    /// Uniqueness: nanosecond timestamp + process-wide sequence + caller discriminator.
    /// `extension` is appended verbatim and should already carry its leading dot.
    pub fn allocate(&self, prefix: &str, discriminator: impl Display, extension: &str) -> TransientFile {
        let nanos = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        let seq = NEXT_ARTIFACT_SEQ.fetch_add(1, Ordering::Relaxed);
        let name = format!(
            "{}-{}-{}-{}-{}{}",
            ARTIFACT_PREFIX, prefix, nanos, seq, discriminator, extension
        );
        TransientFile {
            path: self.dir.join(name),
        }
    }

    /// Allocates a path and writes `content` to it. On failure nothing is left on disk.
    pub fn create(
        &self,
        prefix: &str,
        discriminator: impl Display,
        extension: &str,
        content: &[u8],
    ) -> Result<TransientFile, AppError> {
        let file = self.allocate(prefix, discriminator, extension);
        file.write(content)?;
        Ok(file)
    }
}

/// Exclusively owned transient path. Removed on drop.
#[derive(Debug)]
pub struct TransientFile {
    path: PathBuf,
}

impl TransientFile {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write(&self, bytes: &[u8]) -> Result<(), AppError> {
        fs::write(&self.path, bytes).map_err(|e| {
            AppError::file_error(format!(
                "Failed to write temp file {}: {}",
                self.path.display(),
                e
            ))
        })
    }

    pub fn read(&self) -> Result<Vec<u8>, AppError> {
        fs::read(&self.path).map_err(|e| {
            AppError::file_error(format!(
                "Failed to read temp file {}: {}",
                self.path.display(),
                e
            ))
        })
    }

    pub fn file_size(&self) -> Result<u64, AppError> {
        fs::metadata(&self.path).map(|m| m.len()).map_err(|e| {
            AppError::file_error(format!(
                "Failed to stat temp file {}: {}",
                self.path.display(),
                e
            ))
        })
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Best-effort and idempotent: a missing file is not an error.
    pub fn remove(&self) {
        match fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                log::warn!(
                    target: "vidthumb::temp",
                    "Failed to remove temp file {}: {}",
                    self.path.display(),
                    e
                );
            }
        }
    }
}

impl Drop for TransientFile {
    fn drop(&mut self) {
        self.remove();
    }
}

/// Deletes artifacts in `dir` older than `max_age`. Returns the number removed.
/// Run at startup to reclaim files left behind by a process that died mid-request.
pub fn cleanup_stale_artifacts(dir: &Path, max_age: Duration) -> usize {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            log::debug!(
                target: "vidthumb::temp",
                "Skipping stale sweep of {}: {}",
                dir.display(),
                e
            );
            return 0;
        }
    };
    let marker = format!("{}-", ARTIFACT_PREFIX);
    let now = SystemTime::now();
    let mut removed = 0;
    for entry in entries.flatten() {
        let name = entry.file_name();
        if !name.to_string_lossy().starts_with(&marker) {
            continue;
        }
        let Ok(meta) = entry.metadata() else { continue };
        if !meta.is_file() {
            continue;
        }
        let age = meta
            .modified()
            .ok()
            .and_then(|m| now.duration_since(m).ok())
            .unwrap_or_default();
        if age > max_age && fs::remove_file(entry.path()).is_ok() {
            removed += 1;
        }
    }
    if removed > 0 {
        log::info!(
            target: "vidthumb::temp",
            "Removed {} stale artifact(s) from {}",
            removed,
            dir.display()
        );
    }
    removed
}
