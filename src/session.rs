//! Durable per-device session slot.
//!
//! Holds the identity id of whoever is logged in on this device. An absent or
//! empty slot means nobody is. The slot is a one-line text file in the data
//! directory:
//!
//! ```text
//! ~/.local/share/larder/
//! ├── larder.db
//! └── session        # identity id, or empty
//! ```

use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::store::{StoreError, StoreResult};

/// Filename for the session slot.
const SESSION_FILE: &str = "session";

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// The current session's identity id, if any.
    async fn load(&self) -> StoreResult<Option<String>>;

    async fn save(&self, identity_id: &str) -> StoreResult<()>;

    async fn clear(&self) -> StoreResult<()>;
}

/// Session slot backed by a file that survives process restarts.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join(SESSION_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn load(&self) -> StoreResult<Option<String>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => {
                let id = content.trim();
                Ok((!id.is_empty()).then(|| id.to_string()))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(self.io_error(e)),
        }
    }

    async fn save(&self, identity_id: &str) -> StoreResult<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.io_error(e))?;
        }

        // Write then rename so a crash never leaves a half-written id
        let temp_path = self.path.with_extension("tmp");
        tokio::fs::write(&temp_path, identity_id)
            .await
            .map_err(|e| self.io_error(e))?;
        tokio::fs::rename(&temp_path, &self.path)
            .await
            .map_err(|e| self.io_error(e))?;

        tracing::debug!(identity_id, "Session saved");
        Ok(())
    }

    async fn clear(&self) -> StoreResult<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.io_error(e)),
        }
    }
}

/// Session slot that lives only as long as the process.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    current: Mutex<Option<String>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self) -> StoreResult<Option<String>> {
        Ok(self.current.lock().unwrap().clone())
    }

    async fn save(&self, identity_id: &str) -> StoreResult<()> {
        *self.current.lock().unwrap() = Some(identity_id.to_string());
        Ok(())
    }

    async fn clear(&self) -> StoreResult<()> {
        *self.current.lock().unwrap() = None;
        Ok(())
    }
}
