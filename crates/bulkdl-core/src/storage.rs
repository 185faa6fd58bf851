//! Disk I/O and file lifecycle.
//!
//! Response bodies are streamed into a `.part` file next to the destination
//! and atomically renamed on success. The [`PartFile`] guard removes the
//! partial file on every other exit path.

use anyhow::{Context, Result};
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Temporary file suffix used before atomic rename.
pub const TEMP_SUFFIX: &str = ".part";

/// Path for the temp file: appends `.part` to the final path (e.g. `file.iso` → `file.iso.part`).
pub fn temp_path(final_path: &Path) -> PathBuf {
    let mut o = final_path.as_os_str().to_owned();
    o.push(TEMP_SUFFIX);
    PathBuf::from(o)
}

/// An open `.part` file for one destination.
///
/// Dropping it without calling [`PartFile::finalize`] closes the handle and
/// deletes the partial file.
pub struct PartFile {
    writer: Option<BufWriter<File>>,
    temp_path: PathBuf,
    final_path: PathBuf,
    bytes: u64,
    finalized: bool,
}

impl PartFile {
    /// Create parent directories and open (truncating) `<final_path>.part`.
    pub fn create(final_path: &Path) -> Result<Self> {
        if let Some(parent) = final_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory {}", parent.display()))?;
        }
        let temp_path = temp_path(final_path);
        let file = File::create(&temp_path)
            .with_context(|| format!("failed to create {}", temp_path.display()))?;
        Ok(Self {
            writer: Some(BufWriter::new(file)),
            temp_path,
            final_path: final_path.to_path_buf(),
            bytes: 0,
            finalized: false,
        })
    }

    /// Append a body chunk.
    pub fn write_chunk(&mut self, data: &[u8]) -> io::Result<()> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "part file already closed"))?;
        writer.write_all(data)?;
        self.bytes += data.len() as u64;
        Ok(())
    }

    pub fn temp_path(&self) -> &Path {
        &self.temp_path
    }

    /// Flush, sync and rename the temp file to the final path. Returns bytes written.
    pub fn finalize(mut self) -> Result<u64> {
        if let Some(mut writer) = self.writer.take() {
            writer
                .flush()
                .with_context(|| format!("failed to flush {}", self.temp_path.display()))?;
            writer
                .get_ref()
                .sync_all()
                .with_context(|| format!("failed to sync {}", self.temp_path.display()))?;
        }
        fs::rename(&self.temp_path, &self.final_path).with_context(|| {
            format!(
                "failed to rename {} to {}",
                self.temp_path.display(),
                self.final_path.display()
            )
        })?;
        self.finalized = true;
        Ok(self.bytes)
    }
}

impl Drop for PartFile {
    fn drop(&mut self) {
        if self.finalized {
            return;
        }
        drop(self.writer.take());
        match fs::remove_file(&self.temp_path) {
            Ok(()) => {
                tracing::debug!(path = %self.temp_path.display(), "removed partial file")
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                path = %self.temp_path.display(),
                "could not remove partial file: {}",
                e
            ),
        }
    }
}
