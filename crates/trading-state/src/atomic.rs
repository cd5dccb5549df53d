//! Atomic file replacement.
//!
//! Content is written to a sibling `.tmp` file, synced, then renamed over
//! the target, so readers see either the old or the new document.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::Local;
use tracing::{debug, warn};

/// A file that is only ever replaced whole.
#[derive(Debug, Clone)]
pub struct AtomicFile {
    path: PathBuf,
}

impl AtomicFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of the staging file next to the target.
    pub fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    /// Read the whole file, `None` when it does not exist.
    pub fn read(&self) -> io::Result<Option<Vec<u8>>> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Replace the file content.
    pub fn write(&self, bytes: &[u8]) -> io::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let tmp = self.temp_path();
        let result = Self::stage(&tmp, bytes).and_then(|_| fs::rename(&tmp, &self.path));
        if result.is_err() {
            let _ = fs::remove_file(&tmp);
        }
        result
    }

    fn stage(tmp: &Path, bytes: &[u8]) -> io::Result<()> {
        let mut file = File::create(tmp)?;
        file.write_all(bytes)?;
        file.flush()?;
        file.sync_all()
    }

    /// Move the current file aside as `<stem>_corrupt_<timestamp>.<ext>`.
    pub fn quarantine(&self) -> io::Result<PathBuf> {
        let stamp = Local::now().format("%Y%m%d_%H%M%S").to_string();
        let stem = self
            .path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "file".to_string());
        let ext = self
            .path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();

        let mut backup = self.path.with_file_name(format!("{stem}_corrupt_{stamp}{ext}"));
        let mut attempt = 1;
        while backup.exists() {
            backup = self
                .path
                .with_file_name(format!("{stem}_corrupt_{stamp}_{attempt}{ext}"));
            attempt += 1;
        }

        fs::rename(&self.path, &backup)?;
        warn!(
            path = %self.path.display(),
            backup = %backup.display(),
            "Quarantined unreadable file"
        );
        Ok(backup)
    }

    /// Remove a staging file left behind by an interrupted write.
    pub fn remove_stale_temp(&self) -> io::Result<bool> {
        let tmp = self.temp_path();
        match fs::remove_file(&tmp) {
            Ok(()) => {
                debug!(path = %tmp.display(), "Removed stale temporary file");
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }
}
