//! Shortcut records, registration requests, and owner notifications.

use serde::Serialize;
use slotmap::new_key_type;

use super::keys::KeyCombination;

new_key_type! {
    /// Handle to a shortcut owned by the registry arena.
    pub struct ShortcutId;
    /// Handle to a component owned by the registry arena.
    pub struct ComponentId;
}

/// A registered global shortcut.
///
/// Fields are only mutated by the registry so that the `active` flag and the
/// active-key table never diverge.
#[derive(Debug, Clone)]
pub struct GlobalShortcut {
    pub(crate) id: ShortcutId,
    pub(crate) component: ComponentId,
    pub(crate) context: String,
    pub(crate) action: String,
    pub(crate) friendly_name: String,
    pub(crate) keys: Option<KeyCombination>,
    pub(crate) default_keys: Option<KeyCombination>,
    pub(crate) active: bool,
    /// Declared by its owner during this session.
    pub(crate) present: bool,
}

impl GlobalShortcut {
    pub fn id(&self) -> ShortcutId {
        self.id
    }

    pub fn component_id(&self) -> ComponentId {
        self.component
    }

    pub fn context(&self) -> &str {
        &self.context
    }

    /// Opaque action identifier, unique within its context.
    pub fn action(&self) -> &str {
        &self.action
    }

    pub fn friendly_name(&self) -> &str {
        &self.friendly_name
    }

    pub fn keys(&self) -> Option<&KeyCombination> {
        self.keys.as_ref()
    }

    pub fn default_keys(&self) -> Option<&KeyCombination> {
        self.default_keys.as_ref()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_present(&self) -> bool {
        self.present
    }
}

/// A registration request from a shortcut owner.
///
/// `keys: None` keeps the keys of an already registered action (or leaves a
/// new action unbound).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShortcutRequest {
    pub component: String,
    pub component_friendly_name: Option<String>,
    pub context: Option<String>,
    pub action: String,
    pub friendly_name: Option<String>,
    pub keys: Option<KeyCombination>,
    pub default_keys: Option<KeyCombination>,
}

impl ShortcutRequest {
    pub fn new(component: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            component_friendly_name: None,
            context: None,
            action: action.into(),
            friendly_name: None,
            keys: None,
            default_keys: None,
        }
    }

    pub fn keys(mut self, keys: KeyCombination) -> Self {
        self.keys = Some(keys);
        self
    }

    pub fn default_keys(mut self, keys: KeyCombination) -> Self {
        self.default_keys = Some(keys);
        self
    }

    pub fn context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn friendly_name(mut self, name: impl Into<String>) -> Self {
        self.friendly_name = Some(name.into());
        self
    }

    pub fn component_friendly_name(mut self, name: impl Into<String>) -> Self {
        self.component_friendly_name = Some(name.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ShortcutEventKind {
    Pressed,
    Released,
}

/// Notification delivered to a shortcut's owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShortcutEvent {
    pub kind: ShortcutEventKind,
    pub component: String,
    pub context: String,
    pub action: String,
}
