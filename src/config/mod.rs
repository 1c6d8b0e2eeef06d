//! Configuration module - Daemon settings
//!
//! This module provides functionality for:
//! - Loading configuration from ~/.config/global-accel/config.json
//! - Default values for all settings
//! - Type definitions for config structures
//!
//! # Module Structure
//!
//! - `defaults` - All default constant values
//! - `types` - Configuration struct definitions
//! - `loader` - File system loading and parsing

mod defaults;
mod loader;
mod types;

pub use defaults::{DEFAULT_MODIFIER_ONLY_THRESHOLD_MS, DEFAULT_SHORTCUTS_PATH};

pub use types::Config;

pub use loader::{load_config, load_config_from};

#[cfg(test)]
pub use defaults::{DEFAULT_CONFIG_PATH, DEFAULT_MODIFIER_KEYS, DEFAULT_MODIFIER_ONLY_ENABLED};

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
