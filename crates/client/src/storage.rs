//! Pluggable key-value persistence.
//!
//! Failures are non-propagating by contract: `save` returns whether the write
//! took, `load` returns `None` on any problem. Callers treat persistence as an
//! optimization, never a correctness requirement.
//!
//! The file-backed store keeps one JSON file per key in the platform config
//! directory:
//! - Linux: `~/.config/wsprobe/`
//! - macOS: `~/Library/Application Support/wsprobe/`
//! - Windows: `%APPDATA%\wsprobe\`

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

/// Durable string store keyed by name. All failure modes are swallowed.
pub trait KeyValueStore: Send + Sync {
    fn load(&self, key: &str) -> Option<String>;
    fn save(&self, key: &str, value: &str) -> bool;
    fn remove(&self, key: &str);
}

/// File-per-key store rooted in the platform config directory.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Store under the default `wsprobe` config directory. `None` when no
    /// config directory exists on this platform.
    pub fn new() -> Option<Self> {
        Some(Self {
            dir: dirs::config_dir()?.join("wsprobe"),
        })
    }

    /// Store rooted at an explicit directory (tests use a tempdir).
    pub fn at(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> Option<PathBuf> {
        if !self.dir.exists() {
            std::fs::create_dir_all(&self.dir).ok()?;
        }
        // Sanitize key to be a valid filename
        let safe_key = key.replace(['/', '\\', ':', '*', '?', '"', '<', '>', '|'], "_");
        Some(self.dir.join(format!("{safe_key}.json")))
    }
}

impl KeyValueStore for FileStore {
    fn load(&self, key: &str) -> Option<String> {
        let path = self.path_for(key)?;
        std::fs::read_to_string(path).ok()
    }

    fn save(&self, key: &str, value: &str) -> bool {
        let Some(path) = self.path_for(key) else {
            return false;
        };
        std::fs::write(path, value).is_ok()
    }

    fn remove(&self, key: &str) {
        if let Some(path) = self.path_for(key) {
            let _ = std::fs::remove_file(path);
        }
    }
}

/// In-memory store for tests and ephemeral runs.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn load(&self, key: &str) -> Option<String> {
        self.entries.lock().ok()?.get(key).cloned()
    }

    fn save(&self, key: &str, value: &str) -> bool {
        match self.entries.lock() {
            Ok(mut map) => {
                map.insert(key.to_string(), value.to_string());
                true
            }
            Err(_) => false,
        }
    }

    fn remove(&self, key: &str) {
        if let Ok(mut map) = self.entries.lock() {
            map.remove(key);
        }
    }
}
