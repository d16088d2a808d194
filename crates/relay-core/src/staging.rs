//! Scoped on-disk staging for incoming uploads.
//!
//! Upload bytes are streamed into a temp file under the staging directory as
//! they arrive. The file is owned by a [`tempfile::TempPath`], so it is
//! removed whenever the owning value is dropped: after a successful relay, on
//! every error return, and when a request future is cancelled mid-flight.

use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempPath;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::error::StagingError;

const TEMP_PREFIX: &str = "relay-upload-";
const DEFAULT_FILENAME: &str = "upload";

/// Directory plus size ceiling shared by all in-flight uploads.
#[derive(Debug, Clone)]
pub struct StagingArea {
    dir: PathBuf,
    max_bytes: u64,
}

impl StagingArea {
    pub fn new(dir: impl Into<PathBuf>, max_bytes: u64) -> Self {
        Self {
            dir: dir.into(),
            max_bytes,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    /// Open a new staged upload for a client-supplied filename.
    pub fn begin(&self, filename: &str) -> Result<StagedUpload, StagingError> {
        std::fs::create_dir_all(&self.dir)?;
        let (file, path) = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .tempfile_in(&self.dir)?
            .into_parts();

        debug!(path = %path.display(), "staging upload");
        Ok(StagedUpload {
            file: tokio::fs::File::from_std(file),
            path,
            filename: client_filename(filename),
            written: 0,
            limit: self.max_bytes,
        })
    }

    /// Stage an in-memory buffer in one go.
    #[cfg(any(test, feature = "stub"))]
    pub async fn stage_bytes(&self, filename: &str, bytes: &[u8]) -> Result<StagedFile, StagingError> {
        let mut upload = self.begin(filename)?;
        upload.write_chunk(bytes).await?;
        upload.finish().await
    }
}

/// An upload that is still being received.
#[derive(Debug)]
pub struct StagedUpload {
    file: tokio::fs::File,
    path: TempPath,
    filename: String,
    written: u64,
    limit: u64,
}

impl StagedUpload {
    /// Append a chunk, failing once the ceiling would be crossed.
    pub async fn write_chunk(&mut self, chunk: &[u8]) -> Result<(), StagingError> {
        let next = self.written + chunk.len() as u64;
        if next > self.limit {
            return Err(StagingError::TooLarge { limit: self.limit });
        }
        self.file.write_all(chunk).await?;
        self.written = next;
        Ok(())
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    pub async fn finish(mut self) -> Result<StagedFile, StagingError> {
        self.file.flush().await?;
        Ok(StagedFile {
            path: self.path,
            filename: self.filename,
            size: self.written,
        })
    }
}

/// A fully received upload, deleted from disk when dropped.
#[derive(Debug)]
pub struct StagedFile {
    path: TempPath,
    filename: String,
    size: u64,
}

impl StagedFile {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Remove the file now and report failures, instead of silently on drop.
    pub fn discard(self) {
        let shown = self.path.display().to_string();
        if let Err(e) = self.path.close() {
            warn!(path = %shown, error = %e, "failed to remove staged upload");
        }
    }

    /// Read the whole file. Only used for inline uploads, which are bounded
    /// by the inline threshold.
    pub async fn read_all(&self) -> io::Result<Vec<u8>> {
        tokio::fs::read(&self.path).await
    }
}

/// Reduce a client-supplied filename to its last path component.
pub fn client_filename(raw: &str) -> String {
    let name = raw
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();
    if name.is_empty() || name == "." || name == ".." {
        DEFAULT_FILENAME.to_owned()
    } else {
        name.to_owned()
    }
}
