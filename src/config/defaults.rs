//! Default configuration values
//!
//! All constants used throughout the config module are defined here.

/// Maximum time between the first modifier release and the last one for a
/// bare modifier tap to count as a modifier-only shortcut.
pub const DEFAULT_MODIFIER_ONLY_THRESHOLD_MS: u64 = 500;

/// Modifier-only shortcuts are handled unless disabled.
pub const DEFAULT_MODIFIER_ONLY_ENABLED: bool = true;

/// Physical keys treated as modifiers, as `(key name, modifier name)`.
/// AltGr is deliberately absent: it composes characters.
pub const DEFAULT_MODIFIER_KEYS: &[(&str, &str)] = &[
    ("Shift", "shift"),
    ("Control", "ctrl"),
    ("Alt", "alt"),
    ("Meta", "meta"),
];

/// Config file location (tilde-expanded)
pub const DEFAULT_CONFIG_PATH: &str = "~/.config/global-accel/config.json";

/// Persisted shortcuts location (tilde-expanded)
pub const DEFAULT_SHORTCUTS_PATH: &str = "~/.config/global-accel/shortcuts.json";
