//! Shortcut persistence.
//!
//! Handles loading and saving registered shortcuts to/from a JSON file.
//! Format: a version number and a flat list of records, one per action, with
//! key combinations stored in their canonical text form.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use super::keys::KeyParseError;
use super::registry::GlobalShortcutsRegistry;

/// Current file format version.
pub const STORE_VERSION: u32 = 1;

/// One persisted action.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedShortcut {
    pub component: String,
    #[serde(default)]
    pub component_friendly_name: String,
    #[serde(default = "default_context")]
    pub context: String,
    pub action: String,
    #[serde(default)]
    pub friendly_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keys: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_keys: Option<String>,
    #[serde(default)]
    pub active: bool,
}

fn default_context() -> String {
    super::component::DEFAULT_CONTEXT.to_string()
}

fn default_version() -> u32 {
    STORE_VERSION
}

/// The on-disk shortcut file.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShortcutStore {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub shortcuts: Vec<PersistedShortcut>,
}

/// Error that can occur when loading/saving the shortcut file.
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported shortcut file version {0}")]
    UnsupportedVersion(u32),
}

/// A persisted record that could not be restored as saved.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoadWarning {
    #[error("invalid keys '{keys}' for '{component}/{action}': {error}")]
    InvalidKeys {
        component: String,
        action: String,
        keys: String,
        error: KeyParseError,
    },
    #[error("'{keys}' of '{component}/{action}' is already owned by '{owner_component}/{owner_action}', loaded inactive")]
    Collision {
        component: String,
        action: String,
        keys: String,
        owner_component: String,
        owner_action: String,
    },
    #[error("'{component}/{action}' is active in context '{context}' but another context is current, loaded inactive")]
    ContextConflict {
        component: String,
        context: String,
        action: String,
    },
    #[error("duplicate record for '{component}/{context}/{action}', skipped")]
    Duplicate {
        component: String,
        context: String,
        action: String,
    },
}

impl ShortcutStore {
    /// Load the store from a JSON file.
    ///
    /// Returns an empty store if the file doesn't exist.
    pub fn load(path: &Path) -> Result<Self, PersistenceError> {
        if !path.exists() {
            debug!(path = %path.display(), "Shortcut file not found, starting empty");
            return Ok(Self::new());
        }

        let content = fs::read_to_string(path)?;
        let store: Self = serde_json::from_str(&content)?;
        if store.version > STORE_VERSION {
            return Err(PersistenceError::UnsupportedVersion(store.version));
        }
        Ok(store)
    }

    /// Save the store to a JSON file.
    pub fn save(&self, path: &Path) -> Result<(), PersistenceError> {
        // Create parent directories if needed
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        info!(path = %path.display(), shortcuts = self.shortcuts.len(), "Shortcuts saved");
        Ok(())
    }

    pub fn new() -> Self {
        Self {
            version: STORE_VERSION,
            shortcuts: Vec::new(),
        }
    }

    /// Snapshot every shortcut of a registry.
    pub fn from_registry(registry: &GlobalShortcutsRegistry) -> Self {
        Self {
            version: STORE_VERSION,
            shortcuts: registry.snapshot(),
        }
    }

    /// Restore the records into a registry.
    ///
    /// Returns the records that could not be restored as saved (but still
    /// applies every other one).
    pub fn apply_to_registry(&self, registry: &mut GlobalShortcutsRegistry) -> Vec<LoadWarning> {
        registry.load(&self.shortcuts)
    }

    pub fn len(&self) -> usize {
        self.shortcuts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shortcuts.is_empty()
    }
}

/// Get the default path for the shortcut file.
pub fn default_store_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_default().join(".config"))
        .join("global-accel")
        .join("shortcuts.json")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn record(component: &str, action: &str, keys: Option<&str>, active: bool) -> PersistedShortcut {
        PersistedShortcut {
            component: component.to_string(),
            component_friendly_name: component.to_uppercase(),
            context: "default".to_string(),
            action: action.to_string(),
            friendly_name: action.to_string(),
            keys: keys.map(str::to_string),
            default_keys: None,
            active,
        }
    }

    #[test]
    fn test_load_nonexistent_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nonexistent.json");

        let store = ShortcutStore::load(&path).unwrap();
        assert!(store.is_empty());
        assert_eq!(store.version, STORE_VERSION);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("shortcuts.json");

        let mut store = ShortcutStore::new();
        store
            .shortcuts
            .push(record("konsole", "NewTab", Some("Ctrl+Alt+T"), true));
        store.shortcuts.push(record("konsole", "Quit", None, false));
        store.save(&path).unwrap();

        let loaded = ShortcutStore::load(&path).unwrap();
        assert_eq!(loaded, store);
    }

    #[test]
    fn test_json_format() {
        let mut store = ShortcutStore::new();
        store
            .shortcuts
            .push(record("konsole", "NewTab", Some("Ctrl+Alt+T"), true));

        let json = serde_json::to_string_pretty(&store).unwrap();
        assert!(json.contains("\"componentFriendlyName\": \"KONSOLE\""));
        assert!(json.contains("\"keys\": \"Ctrl+Alt+T\""));
        assert!(!json.contains("defaultKeys"));
    }

    #[test]
    fn test_minimal_record_uses_defaults() {
        let json = r#"{"shortcuts":[{"component":"kwin","action":"Overview"}]}"#;
        let store: ShortcutStore = serde_json::from_str(json).unwrap();
        let r = &store.shortcuts[0];
        assert_eq!(store.version, STORE_VERSION);
        assert_eq!(r.context, "default");
        assert_eq!(r.keys, None);
        assert!(!r.active);
    }

    #[test]
    fn test_newer_version_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("shortcuts.json");
        fs::write(&path, r#"{"version": 99, "shortcuts": []}"#).unwrap();

        assert!(matches!(
            ShortcutStore::load(&path),
            Err(PersistenceError::UnsupportedVersion(99))
        ));
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("shortcuts.json");
        fs::write(&path, "{ not json").unwrap();

        assert!(matches!(
            ShortcutStore::load(&path),
            Err(PersistenceError::Json(_))
        ));
    }

    #[test]
    fn test_default_path_ends_with_file_name() {
        let path = default_store_path();
        assert!(path.ends_with("global-accel/shortcuts.json"));
    }
}
