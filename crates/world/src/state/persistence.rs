use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{info, warn};

use super::store::WorldStateStore;

const SAVE_FORMAT: &str = "dreamlands.save";

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("{action} '{path}': {source}")]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("encode save envelope: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("save '{path}' is corrupt: {reason}")]
    Corrupt { path: PathBuf, reason: String },
    #[error("save '{path}' checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Opaque blob storage for the serialized world state.
pub trait SaveStore {
    fn save(&mut self, blob: &str) -> Result<(), PersistenceError>;
    fn load(&self) -> Result<Option<String>, PersistenceError>;
    fn has_saved_game(&self) -> bool;
    fn delete_saved_game(&mut self) -> Result<(), PersistenceError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveTrigger {
    Interval,
    VisibilityLost,
    CombatResolved,
    Manual,
    Shutdown,
}

impl SaveTrigger {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Interval => "interval",
            Self::VisibilityLost => "visibility_lost",
            Self::CombatResolved => "combat_resolved",
            Self::Manual => "manual",
            Self::Shutdown => "shutdown",
        }
    }
}

/// Serializes `store` into `target`. Failures are logged and reported as
/// `false`; the in-memory state is never affected.
pub fn save_world(
    store: &WorldStateStore,
    target: &mut dyn SaveStore,
    trigger: SaveTrigger,
) -> bool {
    let blob = match store.serialize() {
        Ok(blob) => blob,
        Err(error) => {
            warn!(trigger = trigger.as_str(), error = %error, "save_failed");
            return false;
        }
    };
    match target.save(&blob) {
        Ok(()) => {
            info!(trigger = trigger.as_str(), bytes = blob.len(), "save_written");
            true
        }
        Err(error) => {
            warn!(trigger = trigger.as_str(), error = %error, "save_failed");
            false
        }
    }
}

/// Merges the stored blob into `store`. A missing save, an unreadable save or a
/// blob that fails to decode leaves `store` at its current values.
pub fn load_world(store: &mut WorldStateStore, source: &dyn SaveStore) -> bool {
    let blob = match source.load() {
        Ok(Some(blob)) => blob,
        Ok(None) => {
            info!("no_saved_game");
            return false;
        }
        Err(error) => {
            warn!(error = %error, "load_failed");
            return false;
        }
    };
    match store.deserialize(&blob) {
        Ok(()) => {
            info!(room = store.current_room(), "save_loaded");
            true
        }
        Err(error) => {
            warn!(error = %error, "load_failed");
            false
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct SaveEnvelope {
    format: String,
    checksum_sha256: String,
    payload: String,
}

/// Single-file save slot. Writes go to a sibling temp file that is then
/// renamed over the slot.
#[derive(Debug, Clone)]
pub struct FileSaveStore {
    path: PathBuf,
}

impl FileSaveStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn corrupt(&self, reason: impl Into<String>) -> PersistenceError {
        PersistenceError::Corrupt {
            path: self.path.clone(),
            reason: reason.into(),
        }
    }
}

impl SaveStore for FileSaveStore {
    fn save(&mut self, blob: &str) -> Result<(), PersistenceError> {
        let envelope = SaveEnvelope {
            format: SAVE_FORMAT.to_string(),
            checksum_sha256: sha256_hex(blob.as_bytes()),
            payload: blob.to_string(),
        };
        let text = serde_json::to_string(&envelope).map_err(PersistenceError::Encode)?;
        write_replacing(&self.path, text.as_bytes())
    }

    fn load(&self) -> Result<Option<String>, PersistenceError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(PersistenceError::Io {
                    action: "read save",
                    path: self.path.clone(),
                    source,
                })
            }
        };

        let envelope: SaveEnvelope = serde_json::from_str(&raw)
            .map_err(|error| self.corrupt(format!("envelope: {error}")))?;
        if envelope.format != SAVE_FORMAT {
            return Err(self.corrupt(format!("unexpected format '{}'", envelope.format)));
        }
        let actual = sha256_hex(envelope.payload.as_bytes());
        if actual != envelope.checksum_sha256 {
            return Err(PersistenceError::ChecksumMismatch {
                path: self.path.clone(),
                expected: envelope.checksum_sha256,
                actual,
            });
        }
        Ok(Some(envelope.payload))
    }

    fn has_saved_game(&self) -> bool {
        self.path.is_file()
    }

    fn delete_saved_game(&mut self) -> Result<(), PersistenceError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(PersistenceError::Io {
                action: "delete save",
                path: self.path.clone(),
                source,
            }),
        }
    }
}

/// Keeps the blob in memory only. Used when file saves are switched off.
#[derive(Debug, Clone, Default)]
pub struct MemorySaveStore {
    blob: Option<String>,
    unavailable: bool,
}

impl MemorySaveStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose every save and load fails.
    pub fn unavailable() -> Self {
        Self {
            blob: None,
            unavailable: true,
        }
    }

    pub fn with_blob(blob: impl Into<String>) -> Self {
        Self {
            blob: Some(blob.into()),
            unavailable: false,
        }
    }

    pub fn blob(&self) -> Option<&str> {
        self.blob.as_deref()
    }
}

impl SaveStore for MemorySaveStore {
    fn save(&mut self, blob: &str) -> Result<(), PersistenceError> {
        if self.unavailable {
            return Err(PersistenceError::Unavailable("memory store offline".to_string()));
        }
        self.blob = Some(blob.to_string());
        Ok(())
    }

    fn load(&self) -> Result<Option<String>, PersistenceError> {
        if self.unavailable {
            return Err(PersistenceError::Unavailable("memory store offline".to_string()));
        }
        Ok(self.blob.clone())
    }

    fn has_saved_game(&self) -> bool {
        self.blob.is_some()
    }

    fn delete_saved_game(&mut self) -> Result<(), PersistenceError> {
        self.blob = None;
        Ok(())
    }
}

/// Fires once every `interval_seconds` of simulated time.
#[derive(Debug, Clone)]
pub struct AutosaveTimer {
    interval_seconds: f32,
    elapsed_seconds: f32,
}

impl AutosaveTimer {
    pub fn new(interval_seconds: f32) -> Self {
        Self {
            interval_seconds: interval_seconds.max(f32::EPSILON),
            elapsed_seconds: 0.0,
        }
    }

    pub fn interval_seconds(&self) -> f32 {
        self.interval_seconds
    }

    pub fn tick(&mut self, fixed_dt_seconds: f32) -> bool {
        self.elapsed_seconds += fixed_dt_seconds;
        if self.elapsed_seconds >= self.interval_seconds {
            self.elapsed_seconds -= self.interval_seconds;
            return true;
        }
        false
    }

    pub fn reset(&mut self) {
        self.elapsed_seconds = 0.0;
    }
}

fn write_replacing(path: &Path, bytes: &[u8]) -> Result<(), PersistenceError> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_error("create save dir", parent))?;
    }

    let staging_path = staging_path_for(path);
    fs::write(&staging_path, bytes).map_err(io_error("write save", &staging_path))?;
    if let Err(source) = fs::rename(&staging_path, path) {
        let _ = fs::remove_file(&staging_path);
        return Err(io_error("replace save", path)(source));
    }
    Ok(())
}

fn io_error(action: &'static str, path: &Path) -> impl FnOnce(io::Error) -> PersistenceError {
    let path = path.to_path_buf();
    move |source| PersistenceError::Io {
        action,
        path,
        source,
    }
}

fn staging_path_for(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("save.json");
    path.with_file_name(format!("{file_name}.tmp"))
}

fn sha256_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    let mut output = String::with_capacity(digest.len() * 2);
    for byte in digest.iter() {
        let _ = write!(&mut output, "{byte:02x}");
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::PlayerPatch;

    #[test]
    fn file_store_round_trips_blob() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut slot = FileSaveStore::new(dir.path().join("saves").join("slot.json"));
        assert!(!slot.has_saved_game());
        assert!(slot.load().expect("load").is_none());

        slot.save("{\"player\":{}}").expect("save");
        assert!(slot.has_saved_game());
        assert_eq!(slot.load().expect("load").as_deref(), Some("{\"player\":{}}"));
        assert!(!dir.path().join("saves").join("slot.json.tmp").exists());

        slot.delete_saved_game().expect("delete");
        assert!(!slot.has_saved_game());
        slot.delete_saved_game().expect("delete twice");
    }

    #[test]
    fn tampered_payload_fails_checksum() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("slot.json");
        let mut slot = FileSaveStore::new(&path);
        slot.save("{\"current_room\":\"room2\"}").expect("save");

        let raw = fs::read_to_string(&path).expect("read");
        fs::write(&path, raw.replace("room2", "room3")).expect("tamper");

        assert!(matches!(
            slot.load(),
            Err(PersistenceError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn garbage_file_is_reported_corrupt() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("slot.json");
        fs::write(&path, "not json at all").expect("write");
        let slot = FileSaveStore::new(&path);
        assert!(matches!(slot.load(), Err(PersistenceError::Corrupt { .. })));
    }

    #[test]
    fn load_world_failure_keeps_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("slot.json");
        fs::write(&path, "{").expect("write");

        let mut store = WorldStateStore::new();
        assert!(!load_world(&mut store, &FileSaveStore::new(&path)));
        assert_eq!(store, WorldStateStore::new());
    }

    #[test]
    fn save_world_then_load_world_restores_state() {
        let mut store = WorldStateStore::new();
        store.set_current_room("room2");
        store.set_player(PlayerPatch {
            health: Some(35),
            ..PlayerPatch::default()
        });

        let mut slot = MemorySaveStore::new();
        assert!(save_world(&store, &mut slot, SaveTrigger::Manual));

        let mut restored = WorldStateStore::new();
        assert!(load_world(&mut restored, &slot));
        assert_eq!(restored, store);
    }

    #[test]
    fn unavailable_store_is_non_fatal() {
        let store = WorldStateStore::new();
        let mut slot = MemorySaveStore::unavailable();
        assert!(!save_world(&store, &mut slot, SaveTrigger::Interval));

        let mut target = WorldStateStore::new();
        assert!(!load_world(&mut target, &slot));
        assert_eq!(target, store);
    }

    #[test]
    fn autosave_timer_fires_on_interval() {
        let mut timer = AutosaveTimer::new(1.0);
        let fired: Vec<bool> = (0..5).map(|_| timer.tick(0.25)).collect();
        assert_eq!(fired, [false, false, false, true, false]);

        timer.reset();
        assert!(!timer.tick(0.5));
        assert!(timer.tick(0.5));
    }
}
