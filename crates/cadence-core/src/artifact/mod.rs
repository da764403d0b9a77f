//! Persistence of finished audio, one immutable artifact per job.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::engine::AudioBuffer;
use crate::runtime::types::JobId;

pub mod wav;

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("WAV encoding failed: {0}")]
    Encode(#[from] hound::Error),

    #[error("artifact already exists: {}", .0.display())]
    AlreadyExists(PathBuf),

    #[error("artifact not found: {}", .0.display())]
    Missing(PathBuf),
}

/// Where and how large a persisted artifact is.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredArtifact {
    pub location: PathBuf,
    pub file_size: u64,
}

/// Keyed storage of encoded results. All methods block.
pub trait ResultStore: Send + Sync + 'static {
    /// Encode and write the artifact for `job_id`. Never overwrites.
    fn persist(&self, audio: &AudioBuffer, job_id: &JobId) -> Result<StoredArtifact, ArtifactError>;

    /// Read back the encoded artifact.
    fn open(&self, job_id: &JobId) -> Result<Vec<u8>, ArtifactError>;

    /// Delete the artifact if present.
    fn remove(&self, job_id: &JobId) -> Result<(), ArtifactError>;
}

/// Stores `{root}/{job_id}.wav` files.
///
/// Each artifact is written to a `.part` sibling first and renamed into
/// place, so a reader never sees a half-written file.
#[derive(Debug, Clone)]
pub struct WavFileStore {
    root: PathBuf,
}

impl WavFileStore {
    /// Use `root` as the output directory, creating it if needed.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, ArtifactError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, job_id: &JobId) -> PathBuf {
        self.root.join(format!("{job_id}.wav"))
    }
}

impl ResultStore for WavFileStore {
    fn persist(&self, audio: &AudioBuffer, job_id: &JobId) -> Result<StoredArtifact, ArtifactError> {
        let path = self.path_for(job_id);
        if path.exists() {
            return Err(ArtifactError::AlreadyExists(path));
        }

        let bytes = wav::encode(audio)?;
        let part = path.with_extension("wav.part");
        let written = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&part)
            .and_then(|mut file| {
                file.write_all(&bytes)?;
                file.sync_all()
            })
            .and_then(|()| fs::rename(&part, &path));
        if let Err(err) = written {
            let _ = fs::remove_file(&part);
            return Err(err.into());
        }

        tracing::debug!(path = %path.display(), bytes = bytes.len(), "artifact written");
        Ok(StoredArtifact {
            location: path,
            file_size: bytes.len() as u64,
        })
    }

    fn open(&self, job_id: &JobId) -> Result<Vec<u8>, ArtifactError> {
        let path = self.path_for(job_id);
        fs::read(&path).map_err(|err| match err.kind() {
            io::ErrorKind::NotFound => ArtifactError::Missing(path),
            _ => ArtifactError::Io(err),
        })
    }

    fn remove(&self, job_id: &JobId) -> Result<(), ArtifactError> {
        match fs::remove_file(self.path_for(job_id)) {
            Err(err) if err.kind() != io::ErrorKind::NotFound => Err(err.into()),
            _ => Ok(()),
        }
    }
}
