//! Configuration type definitions

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use super::defaults::*;

/// Daemon configuration, read from `config.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Handle bare modifier taps (default: true)
    #[serde(default = "default_modifier_only_enabled")]
    pub modifier_only_enabled: bool,
    /// Modifier-only release window in milliseconds (default: 500)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modifier_only_threshold_ms: Option<u64>,
    /// Key name -> modifier name, e.g. `"CapsLock": "ctrl"`
    #[serde(default = "default_modifier_keys")]
    pub modifier_keys: BTreeMap<String, String>,
    /// Where registered shortcuts are persisted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shortcuts_path: Option<String>,
}

fn default_modifier_only_enabled() -> bool {
    DEFAULT_MODIFIER_ONLY_ENABLED
}

fn default_modifier_keys() -> BTreeMap<String, String> {
    DEFAULT_MODIFIER_KEYS
        .iter()
        .map(|(key, modifier)| (key.to_string(), modifier.to_string()))
        .collect()
}

impl Default for Config {
    fn default() -> Self {
        Config {
            modifier_only_enabled: DEFAULT_MODIFIER_ONLY_ENABLED,
            modifier_only_threshold_ms: None, // Will use DEFAULT_MODIFIER_ONLY_THRESHOLD_MS via getter
            modifier_keys: default_modifier_keys(),
            shortcuts_path: None, // Will use DEFAULT_SHORTCUTS_PATH via getter
        }
    }
}

impl Config {
    /// Returns the modifier-only threshold, or DEFAULT_MODIFIER_ONLY_THRESHOLD_MS if not configured
    pub fn modifier_only_threshold(&self) -> Duration {
        Duration::from_millis(
            self.modifier_only_threshold_ms
                .unwrap_or(DEFAULT_MODIFIER_ONLY_THRESHOLD_MS),
        )
    }

    /// Returns the tilde-expanded shortcut file path
    pub fn shortcuts_path(&self) -> PathBuf {
        let raw = self
            .shortcuts_path
            .as_deref()
            .unwrap_or(DEFAULT_SHORTCUTS_PATH);
        PathBuf::from(shellexpand::tilde(raw).as_ref())
    }
}
