//! global-accel - a global keyboard shortcut registry
//!
//! Components register named actions bound to key combinations; the registry
//! arbitrates ownership of each combination, tracks the keys held on the
//! input device and notifies the owning component when its shortcut fires.

pub mod config;
pub mod error;
pub mod logging;
pub mod service;
pub mod shortcuts;
pub mod stdin_commands;

// OS key grabs (X11 / macOS / Windows)
#[cfg(feature = "global-hotkey")]
pub mod hotkeys;
