//! Profile persistence.
//!
//! The controller treats the store as best-effort: a failed save or load is
//! logged and the session continues with in-memory state. A corrupted
//! profile file is cleared and reported as absent rather than surfaced as
//! an error, so a bad write can never wedge startup.

use async_trait::async_trait;
use chrono::Utc;
use concord_core::types::Profile;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error accessing profile store: {0}")]
    Io(#[from] std::io::Error),

    #[error("profile serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Where saved profiles live between sessions.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Load the saved profile, if any. Corrupted data reads as `None`.
    async fn load(&self) -> Result<Option<Profile>, StorageError>;

    /// Persist the profile, stamping `saved_at`.
    async fn save(&self, profile: &Profile) -> Result<(), StorageError>;

    /// Remove any saved profile. Clearing an empty store succeeds.
    async fn clear(&self) -> Result<(), StorageError>;
}

/// JSON file-backed store.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

#[async_trait]
impl ProfileStore for JsonFileStore {
    async fn load(&self) -> Result<Option<Profile>, StorageError> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_str::<Profile>(&raw) {
            Ok(profile) => Ok(Some(profile)),
            Err(e) => {
                // Unreadable data is dropped so the next save starts clean.
                tracing::warn!(path = %self.path.display(), error = %e, "corrupted profile file, clearing");
                let _ = tokio::fs::remove_file(&self.path).await;
                Ok(None)
            }
        }
    }

    async fn save(&self, profile: &Profile) -> Result<(), StorageError> {
        let mut stamped = profile.clone();
        stamped.saved_at = Some(Utc::now());
        let raw = serde_json::to_string_pretty(&stamped)?;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        tokio::fs::write(&self.path, raw).await?;
        Ok(())
    }

    async fn clear(&self) -> Result<(), StorageError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-memory store for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryStore {
    profile: std::sync::Mutex<Option<Profile>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a profile as if it had been saved by a previous session.
    pub fn with_profile(profile: Profile) -> Self {
        Self {
            profile: std::sync::Mutex::new(Some(profile)),
        }
    }
}

#[async_trait]
impl ProfileStore for MemoryStore {
    async fn load(&self) -> Result<Option<Profile>, StorageError> {
        Ok(self.profile.lock().expect("store lock poisoned").clone())
    }

    async fn save(&self, profile: &Profile) -> Result<(), StorageError> {
        let mut stamped = profile.clone();
        stamped.saved_at = Some(Utc::now());
        *self.profile.lock().expect("store lock poisoned") = Some(stamped);
        Ok(())
    }

    async fn clear(&self) -> Result<(), StorageError> {
        *self.profile.lock().expect("store lock poisoned") = None;
        Ok(())
    }
}
