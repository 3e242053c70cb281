//! Session Storage - Persistence layer for the session record
//!
//! The record is two keys, the bearer token and the serialized user. Both
//! stores apply a batch as a unit, so a reader never sees one key without
//! the other after a completed write.

use domus_core::{storage_error, DomusResult, SessionStore};
use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Key holding the bearer token
pub const TOKEN_KEY: &str = "session.token";
/// Key holding the JSON-serialized user record
pub const USER_KEY: &str = "session.user";

const SESSION_FILE: &str = "session.json";

/// File-backed session store
///
/// Keeps every key in a single `session.json` map. Writes go to a temporary
/// file that is renamed over the original, with 0600 permissions on unix.
pub struct FileSessionStore {
    storage_dir: PathBuf,
    /// Serializes read-modify-write cycles within the process
    lock: Mutex<()>,
}

impl FileSessionStore {
    /// Create a store rooted at `storage_dir`, creating the directory if needed
    pub fn new<P: AsRef<Path>>(storage_dir: P) -> DomusResult<Self> {
        let storage_dir = storage_dir.as_ref().to_path_buf();

        fs::create_dir_all(&storage_dir).map_err(|e| {
            storage_error!(
                format!("Failed to create session directory {}", storage_dir.display()),
                "file_session_store",
                e
            )
        })?;

        info!("Session storage initialized at: {}", storage_dir.display());

        Ok(Self {
            storage_dir,
            lock: Mutex::new(()),
        })
    }

    /// Path of the backing file
    pub fn file_path(&self) -> PathBuf {
        self.storage_dir.join(SESSION_FILE)
    }

    fn read_map(&self) -> DomusResult<HashMap<String, String>> {
        let path = self.file_path();
        if !path.exists() {
            return Ok(HashMap::new());
        }

        let contents = fs::read_to_string(&path).map_err(|e| {
            storage_error!(
                format!("Failed to read {}", path.display()),
                "file_session_store",
                e
            )
        })?;

        if contents.trim().is_empty() {
            return Ok(HashMap::new());
        }

        serde_json::from_str(&contents).map_err(|e| {
            storage_error!(
                format!("Failed to parse {}", path.display()),
                "file_session_store",
                e
            )
        })
    }

    fn write_map(&self, map: &HashMap<String, String>) -> DomusResult<()> {
        let path = self.file_path();
        let tmp_path = self.storage_dir.join(format!("{}.tmp", SESSION_FILE));

        let contents = serde_json::to_string_pretty(map)?;

        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        let mut file = options.open(&tmp_path).map_err(|e| {
            storage_error!(
                format!("Failed to open {} for writing", tmp_path.display()),
                "file_session_store",
                e
            )
        })?;
        file.write_all(contents.as_bytes())
            .and_then(|_| file.sync_all())
            .map_err(|e| {
                storage_error!(
                    format!("Failed to write {}", tmp_path.display()),
                    "file_session_store",
                    e
                )
            })?;
        drop(file);

        fs::rename(&tmp_path, &path).map_err(|e| {
            storage_error!(
                format!("Failed to replace {}", path.display()),
                "file_session_store",
                e
            )
        })?;

        debug!("Wrote {} session keys to {}", map.len(), path.display());
        Ok(())
    }
}

#[async_trait::async_trait]
impl SessionStore for FileSessionStore {
    async fn get_many(&self, keys: &[&str]) -> DomusResult<Vec<Option<String>>> {
        let _guard = self.lock.lock().await;
        let map = self.read_map()?;
        Ok(keys.iter().map(|key| map.get(*key).cloned()).collect())
    }

    async fn set_many(&self, entries: &[(&str, String)]) -> DomusResult<()> {
        let _guard = self.lock.lock().await;
        let mut map = self.read_map()?;
        for (key, value) in entries {
            map.insert((*key).to_string(), value.clone());
        }
        self.write_map(&map)
    }

    async fn remove_many(&self, keys: &[&str]) -> DomusResult<()> {
        let _guard = self.lock.lock().await;
        let path = self.file_path();
        if !path.exists() {
            return Ok(());
        }

        // An unreadable file is replaced rather than blocking logout
        let mut map = self.read_map().unwrap_or_default();
        let before = map.len();
        for key in keys {
            map.remove(*key);
        }

        if map.is_empty() {
            fs::remove_file(&path).map_err(|e| {
                storage_error!(
                    format!("Failed to remove {}", path.display()),
                    "file_session_store",
                    e
                )
            })?;
            debug!("Removed session file {}", path.display());
            return Ok(());
        }

        if map.len() != before {
            self.write_map(&map)?;
        }
        Ok(())
    }
}

/// In-memory session store for tests and ephemeral runs
#[derive(Default)]
pub struct MemorySessionStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate the store, e.g. to simulate a record left by a previous run
    pub fn with_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            entries: Mutex::new(
                entries
                    .into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}

#[async_trait::async_trait]
impl SessionStore for MemorySessionStore {
    async fn get_many(&self, keys: &[&str]) -> DomusResult<Vec<Option<String>>> {
        let entries = self.entries.lock().await;
        Ok(keys.iter().map(|key| entries.get(*key).cloned()).collect())
    }

    async fn set_many(&self, batch: &[(&str, String)]) -> DomusResult<()> {
        let mut entries = self.entries.lock().await;
        for (key, value) in batch {
            entries.insert((*key).to_string(), value.clone());
        }
        Ok(())
    }

    async fn remove_many(&self, keys: &[&str]) -> DomusResult<()> {
        let mut entries = self.entries.lock().await;
        for key in keys {
            entries.remove(*key);
        }
        Ok(())
    }
}
