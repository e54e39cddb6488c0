//! Opaque state persistence boundary.
//!
//! Workflows may hand their final output blob to a store keyed by a
//! caller-provided identifier. The core imposes no structure on the blob.

use std::fs;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("failed to access state store: {0}")]
    Io(#[from] std::io::Error),
}

/// Write/read of an opaque blob keyed by identifier.
pub trait StateStore: Send + Sync {
    fn save(&self, id: &str, blob: &str) -> Result<(), StateError>;
    fn load(&self, id: &str) -> Result<Option<String>, StateError>;
}

/// Filesystem-backed store: one file per identifier under a root directory.
pub struct FsStateStore {
    root: PathBuf,
}

impl FsStateStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, id: &str) -> PathBuf {
        self.root.join(format!("{id}.state"))
    }
}

impl StateStore for FsStateStore {
    fn save(&self, id: &str, blob: &str) -> Result<(), StateError> {
        fs::create_dir_all(&self.root)?;
        fs::write(self.path_for(id), blob)?;
        Ok(())
    }

    fn load(&self, id: &str) -> Result<Option<String>, StateError> {
        match fs::read_to_string(self.path_for(id)) {
            Ok(blob) => Ok(Some(blob)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StateError::Io(e)),
        }
    }
}
