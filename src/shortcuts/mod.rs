//! Global shortcut system.
//!
//! This module provides:
//! - The key model and its canonical text form
//! - Components, contexts and shortcut records
//! - The registry that arbitrates key ownership and dispatches input
//! - The modifier-only input state machine
//! - Persistence of registered shortcuts
//!
//! # Architecture
//!
//! Input flows one way: backend -> registry dispatch -> input tracker ->
//! active-key lookup -> owner notification. The backend learns whether each
//! event was consumed.
//!
//! # Example
//!
//! ```ignore
//! use global_accel::shortcuts::{GlobalShortcutsRegistry, ShortcutRequest};
//!
//! let (mut registry, events) = GlobalShortcutsRegistry::new(&config);
//! registry.register_shortcut(
//!     ShortcutRequest::new("konsole", "NewTab").keys("Ctrl+Alt+T".parse()?),
//! )?;
//! ```

mod component;
mod grabber;
mod input;
mod keys;
mod persistence;
mod registry;
mod shortcut;



pub use component::{Component, Context, DEFAULT_CONTEXT};
pub use grabber::{KeyGrabber, NoopGrabber};
pub use input::{InputTracker, ModifierKeyMap, ModifierOnlyState, ReleaseOutcome};
pub use keys::{Key, KeyCode, KeyCombination, KeyParseError, MatchType, Modifiers, MAX_SEQUENCE_LENGTH};
pub use persistence::{
    default_store_path, LoadWarning, PersistedShortcut, PersistenceError, ShortcutStore,
    STORE_VERSION,
};
pub use registry::GlobalShortcutsRegistry;
pub use shortcut::{
    ComponentId, GlobalShortcut, ShortcutEvent, ShortcutEventKind, ShortcutId, ShortcutRequest,
};
