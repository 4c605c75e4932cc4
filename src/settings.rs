//! Audio settings and persisted storage.
//!
//! A single [`AudioSettings`] record doubles as the process-wide global
//! default and the per-window desired state. Only the global record is
//! persisted; per-window state lives for the window's lifetime.
//!
//! Storage is an external capability behind the [`SettingsStore`] trait.
//! Two implementations ship with the crate:
//!
//! | Store | Backing |
//! |-------|---------|
//! | [`MemoryStore`] | in-process, for tests and embedders with their own persistence |
//! | [`JsonFileStore`] | a single JSON document on disk |

// ============================================================================
// Imports
// ============================================================================

use std::path::PathBuf;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::volume::{DEFAULT_VOLUME, sanitize_volume};

// ============================================================================
// AudioSettings
// ============================================================================

/// Desired volume and mute state.
///
/// `volume` is a percentage in `0..=200`; `muted == true` means the
/// effective applied volume is 0 regardless of `volume`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioSettings {
    /// Volume percentage, `0..=200`.
    pub volume: u16,

    /// Whether audio is muted.
    pub muted: bool,
}

impl AudioSettings {
    /// Creates settings from possibly-dirty persisted values.
    ///
    /// The volume is sanitized through [`sanitize_volume`].
    #[inline]
    #[must_use]
    pub fn sanitized(volume: f64, muted: bool) -> Self {
        Self {
            volume: sanitize_volume(volume),
            muted,
        }
    }
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            volume: DEFAULT_VOLUME,
            muted: false,
        }
    }
}

// ============================================================================
// SettingsStore
// ============================================================================

/// Persisted storage for the global [`AudioSettings`] record.
///
/// Read once at startup, written on every successful volume/mute change.
/// Implementations must tolerate concurrent saves; the engine serializes
/// its own calls but embedders may share the store.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Loads the persisted record, or `None` if nothing was saved yet.
    async fn load(&self) -> Result<Option<AudioSettings>>;

    /// Persists the record, replacing any previous value.
    async fn save(&self, settings: &AudioSettings) -> Result<()>;
}

// ============================================================================
// MemoryStore
// ============================================================================

/// In-process [`SettingsStore`] with no durability.
#[derive(Debug, Default)]
pub struct MemoryStore {
    /// Last saved record.
    record: Mutex<Option<AudioSettings>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-seeded with a record.
    #[inline]
    #[must_use]
    pub fn with_record(settings: AudioSettings) -> Self {
        Self {
            record: Mutex::new(Some(settings)),
        }
    }
}

#[async_trait]
impl SettingsStore for MemoryStore {
    async fn load(&self) -> Result<Option<AudioSettings>> {
        Ok(*self.record.lock())
    }

    async fn save(&self, settings: &AudioSettings) -> Result<()> {
        *self.record.lock() = Some(*settings);
        Ok(())
    }
}

// ============================================================================
// JsonFileStore
// ============================================================================

/// [`SettingsStore`] persisting the record as a JSON document on disk.
#[derive(Debug)]
pub struct JsonFileStore {
    /// Path of the JSON document.
    path: PathBuf,
}

impl JsonFileStore {
    /// Creates a store writing to `path`.
    ///
    /// The file is created on first save; a missing file loads as `None`.
    #[inline]
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl SettingsStore for JsonFileStore {
    async fn load(&self) -> Result<Option<AudioSettings>> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::persistence(e.to_string())),
        };

        let settings: AudioSettings =
            serde_json::from_slice(&bytes).map_err(|e| Error::persistence(e.to_string()))?;

        debug!(path = %self.path.display(), ?settings, "Settings loaded");
        Ok(Some(settings))
    }

    async fn save(&self, settings: &AudioSettings) -> Result<()> {
        let json =
            serde_json::to_vec_pretty(settings).map_err(|e| Error::persistence(e.to_string()))?;

        tokio::fs::write(&self.path, json)
            .await
            .map_err(|e| Error::persistence(e.to_string()))?;

        debug!(path = %self.path.display(), ?settings, "Settings saved");
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = AudioSettings::default();
        assert_eq!(settings.volume, 100);
        assert!(!settings.muted);
    }

    #[test]
    fn test_sanitized_settings() {
        let settings = AudioSettings::sanitized(f64::NAN, true);
        assert_eq!(settings.volume, 100);
        assert!(settings.muted);

        let settings = AudioSettings::sanitized(512.0, false);
        assert_eq!(settings.volume, 200);
    }

    #[tokio::test]
    async fn test_memory_store_roundtrip() {
        let store = MemoryStore::new();
        assert!(store.load().await.expect("load").is_none());

        let record = AudioSettings {
            volume: 60,
            muted: false,
        };
        store.save(&record).await.expect("save");
        assert_eq!(store.load().await.expect("load"), Some(record));
    }

    #[tokio::test]
    async fn test_file_store_missing_file_is_none() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = JsonFileStore::new(dir.path().join("settings.json"));
        assert!(store.load().await.expect("load").is_none());
    }

    #[tokio::test]
    async fn test_file_store_roundtrip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = JsonFileStore::new(dir.path().join("settings.json"));

        let record = AudioSettings {
            volume: 150,
            muted: true,
        };
        store.save(&record).await.expect("save");
        assert_eq!(store.load().await.expect("load"), Some(record));
    }

    #[tokio::test]
    async fn test_file_store_corrupt_file_errors() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("settings.json");
        tokio::fs::write(&path, b"not json").await.expect("write");

        let store = JsonFileStore::new(path);
        let err = store.load().await.unwrap_err();
        assert!(matches!(err, Error::Persistence { .. }));
    }
}
