//! Durable storage for the last known position, so a cold start can render something before the
//! first fix.

pub mod error;

use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::debug;

use self::error::StoreError;

/// The single persisted record. Written after every accepted position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LastKnownPosition {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub accuracy: Option<f64>,
    pub captured_at_epoch_ms: u64,
}

pub trait PositionStore: Send + Sync {
    /// `Ok(None)` when nothing has been persisted yet.
    fn load(&self) -> Result<Option<LastKnownPosition>, StoreError>;

    fn save(&self, position: &LastKnownPosition) -> Result<(), StoreError>;
}

/// Stores the record as a JSON document. Writes go to a sibling temp file that is synced and
/// renamed over the target, so readers never observe a torn record.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn temp_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("position");
        self.path
            .with_file_name(format!(".{name}.tmp.{}", std::process::id()))
    }
}

impl PositionStore for JsonFileStore {
    fn load(&self) -> Result<Option<LastKnownPosition>, StoreError> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.io_error(e)),
        };
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    fn save(&self, position: &LastKnownPosition) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(position)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }

        let tmp = self.temp_path();
        let written = write_synced(&tmp, &bytes).and_then(|()| std::fs::rename(&tmp, &self.path));
        if let Err(e) = written {
            if let Err(cleanup) = std::fs::remove_file(&tmp)
                && cleanup.kind() != std::io::ErrorKind::NotFound
            {
                debug!(path = %tmp.display(), error = %cleanup, "Could not remove temp file");
            }
            return Err(self.io_error(e));
        }

        debug!(path = %self.path.display(), "Persisted last known position");
        Ok(())
    }
}

fn write_synced(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut f = std::fs::File::create(path)?;
    f.write_all(bytes)?;
    f.sync_all()
}

/// Process-local store for tests and simulations.
#[derive(Debug, Default)]
pub struct MemoryStore {
    record: Mutex<Option<LastKnownPosition>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_record(position: LastKnownPosition) -> Self {
        Self {
            record: Mutex::new(Some(position)),
        }
    }
}

impl PositionStore for MemoryStore {
    fn load(&self) -> Result<Option<LastKnownPosition>, StoreError> {
        Ok(self.record.lock().expect("store lock poisoned").clone())
    }

    fn save(&self, position: &LastKnownPosition) -> Result<(), StoreError> {
        *self.record.lock().expect("store lock poisoned") = Some(position.clone());
        Ok(())
    }
}
