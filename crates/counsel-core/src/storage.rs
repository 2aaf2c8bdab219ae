//! Session-scoped key-value storage.
//!
//! # Overview
//!
//! The conversation is mirrored into storage on every change and read back
//! at startup, so a session can be resumed after the client restarts. The
//! storage contract is deliberately tiny: string keys, string values.
//!
//! # File Structure
//!
//! [`FileStorage`] keeps one directory per session:
//!
//! ```text
//! {data_dir}/sessions/{session_id}/{key}.json
//! ```
//!
//! Writes go to `{key}.json.tmp` first and are renamed into place, so an
//! interrupted write never leaves a truncated value behind.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use thiserror::Error;

use crate::conversation::Conversation;
use crate::session::{validate_path_component, SessionId};

/// Storage key for the serialized conversation.
pub const HISTORY_KEY: &str = "chatHistory";

const SESSIONS_DIR: &str = "sessions";

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),
}

/// String key-value storage scoped to a single session.
pub trait SessionStorage: Send + Sync {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove_item(&self, key: &str) -> Result<(), StorageError>;
}

/// In-process storage. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStorage for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        let items = self.items.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(items.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut items = self.items.lock().unwrap_or_else(PoisonError::into_inner);
        items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        let mut items = self.items.lock().unwrap_or_else(PoisonError::into_inner);
        items.remove(key);
        Ok(())
    }
}

/// Directory-backed storage for one session.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    /// Storage for `session` under `data_dir`. The directory is created on
    /// first write.
    pub fn new(data_dir: &Path, session: &SessionId) -> Self {
        Self {
            dir: session_dir(data_dir, session),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn item_path(&self, key: &str) -> Result<PathBuf, StorageError> {
        validate_path_component(key).map_err(|_| StorageError::InvalidKey(key.to_string()))?;
        Ok(self.dir.join(format!("{key}.json")))
    }
}

impl SessionStorage for FileStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.item_path(key)?;
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(fs::read_to_string(path)?))
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let path = self.item_path(key)?;
        fs::create_dir_all(&self.dir)?;

        let temp_path = self.dir.join(format!("{key}.json.tmp"));
        fs::write(&temp_path, value)?;
        fs::rename(&temp_path, &path)?;

        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        let path = self.item_path(key)?;
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }
}

fn session_dir(data_dir: &Path, session: &SessionId) -> PathBuf {
    data_dir.join(SESSIONS_DIR).join(session.as_str())
}

/// List the ids of every session with stored data, sorted.
pub fn list_sessions(data_dir: &Path) -> Result<Vec<SessionId>, StorageError> {
    let root = data_dir.join(SESSIONS_DIR);
    let mut ids = Vec::new();

    if !root.exists() {
        return Ok(ids);
    }

    for entry in fs::read_dir(root)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            ids.push(SessionId(name.to_string()));
        }
    }

    ids.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(ids)
}

/// Remove everything stored for a session. Missing sessions are not an error.
pub fn delete_session(data_dir: &Path, session: &SessionId) -> Result<(), StorageError> {
    let dir = session_dir(data_dir, session);
    if dir.exists() {
        fs::remove_dir_all(dir)?;
    }
    Ok(())
}

/// Reads and writes the conversation under [`HISTORY_KEY`].
#[derive(Clone)]
pub struct HistoryStore {
    storage: Arc<dyn SessionStorage>,
}

impl HistoryStore {
    pub fn new(storage: Arc<dyn SessionStorage>) -> Self {
        Self { storage }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStorage::new()))
    }

    /// Restore the stored conversation.
    ///
    /// A missing entry is an empty conversation. So is an unreadable one; the
    /// problem is logged and the bad value is left for the next save to
    /// overwrite.
    pub fn load(&self) -> Conversation {
        let raw = match self.storage.get_item(HISTORY_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Conversation::new(),
            Err(e) => {
                log::warn!("Failed to read stored conversation: {}", e);
                return Conversation::new();
            }
        };

        match serde_json::from_str(&raw) {
            Ok(conversation) => conversation,
            Err(e) => {
                log::warn!("Discarding unparsable stored conversation: {}", e);
                Conversation::new()
            }
        }
    }

    pub fn save(&self, conversation: &Conversation) -> Result<(), StorageError> {
        let json = serde_json::to_string(conversation)?;
        self.storage.set_item(HISTORY_KEY, &json)
    }
}

impl std::fmt::Debug for HistoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HistoryStore").finish_non_exhaustive()
    }
}

// ============================================================================
// TESTS
// ============================================================================
