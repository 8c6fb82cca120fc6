//! Small persistent key-value store backed by a single JSON file.
//!
//! Values are kept in memory and flushed to disk on `save`. A missing or
//! unreadable file starts out empty rather than failing. An unreadable file
//! is copied aside first so the next `save` cannot lose what was in it.

use log::{debug, error, warn};
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Where an unreadable store is copied before it gets replaced.
pub fn corrupt_backup_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".corrupt");
    PathBuf::from(name)
}

fn preserve_corrupt(path: &Path) {
    let backup = corrupt_backup_path(path);
    match fs::copy(path, &backup) {
        Ok(_) => warn!("Kept a copy of the unreadable store at {:?}", backup),
        Err(e) => error!("Failed to copy unreadable store to {:?}: {}", backup, e),
    }
}

pub struct SettingsStore {
    path: Option<PathBuf>,
    entries: Mutex<Map<String, Value>>,
}

impl SettingsStore {
    /// Open the store at `path`, reading whatever is already there.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<Value>(&contents) {
                Ok(Value::Object(map)) => map,
                Ok(_) => {
                    warn!("Store at {:?} is not a JSON object, starting empty", path);
                    preserve_corrupt(&path);
                    Map::new()
                }
                Err(e) => {
                    warn!("Failed to parse store at {:?}: {}, starting empty", path, e);
                    preserve_corrupt(&path);
                    Map::new()
                }
            },
            Err(_) => {
                debug!("No store at {:?} yet", path);
                Map::new()
            }
        };

        Self {
            path: Some(path),
            entries: Mutex::new(entries),
        }
    }

    /// A store that never touches the disk.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            entries: Mutex::new(Map::new()),
        }
    }

    /// Default location under the user's config directory.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("emoji-translator")
            .join(crate::settings::SETTINGS_STORE_PATH)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.entries.lock().unwrap().get(key).cloned()
    }

    /// Non-blank string value for `key`, trimmed.
    pub fn get_string(&self, key: &str) -> Option<String> {
        self.get(key)
            .and_then(|v| v.as_str().map(|s| s.trim().to_string()))
            .filter(|s| !s.is_empty())
    }

    pub fn set(&self, key: &str, value: Value) {
        self.entries.lock().unwrap().insert(key.to_string(), value);
    }

    pub fn save(&self) -> Result<(), String> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create store directory {:?}: {}", parent, e))?;
        }

        let contents = {
            let entries = self.entries.lock().unwrap();
            serde_json::to_string_pretty(&*entries)
                .map_err(|e| format!("Failed to serialize store: {}", e))?
        };

        fs::write(path, contents).map_err(|e| format!("Failed to write store {:?}: {}", path, e))
    }
}
