//! Components and their contexts.
//!
//! A component groups shortcuts under a unique name. Every component has an
//! implicit `default` context; additional named contexts hold alternative
//! bindings. Exactly one context is current at a time.

use std::collections::HashMap;

use super::shortcut::ShortcutId;

/// Name of the context every component starts with.
pub const DEFAULT_CONTEXT: &str = "default";

/// A named sub-scope of a component.
#[derive(Debug, Clone)]
pub struct Context {
    name: String,
    friendly_name: String,
    /// Registration order, for deterministic enumeration.
    shortcuts: Vec<ShortcutId>,
    by_action: HashMap<String, ShortcutId>,
}

impl Context {
    fn new(name: &str, friendly_name: &str) -> Self {
        Self {
            name: name.to_string(),
            friendly_name: friendly_name.to_string(),
            shortcuts: Vec::new(),
            by_action: HashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn friendly_name(&self) -> &str {
        &self.friendly_name
    }

    pub fn shortcut_ids(&self) -> &[ShortcutId] {
        &self.shortcuts
    }

    pub fn shortcut_by_action(&self, action: &str) -> Option<ShortcutId> {
        self.by_action.get(action).copied()
    }

    pub fn action_names(&self) -> impl Iterator<Item = &str> {
        self.by_action.keys().map(String::as_str)
    }

    pub(crate) fn add(&mut self, action: &str, id: ShortcutId) {
        if self.by_action.insert(action.to_string(), id).is_none() {
            self.shortcuts.push(id);
        }
    }

    pub(crate) fn remove(&mut self, action: &str) -> Option<ShortcutId> {
        let id = self.by_action.remove(action)?;
        self.shortcuts.retain(|s| *s != id);
        Some(id)
    }
}

/// An owner of shortcuts, e.g. an application or a service.
#[derive(Debug, Clone)]
pub struct Component {
    unique_name: String,
    friendly_name: String,
    contexts: Vec<Context>,
    current: usize,
    /// Reachability as reported by the presence probe.
    present: bool,
}

impl Component {
    pub(crate) fn new(unique_name: &str, friendly_name: &str) -> Self {
        Self {
            unique_name: unique_name.to_string(),
            friendly_name: friendly_name.to_string(),
            contexts: vec![Context::new(DEFAULT_CONTEXT, "Default Context")],
            current: 0,
            present: true,
        }
    }

    pub fn unique_name(&self) -> &str {
        &self.unique_name
    }

    pub fn friendly_name(&self) -> &str {
        &self.friendly_name
    }

    pub fn is_present(&self) -> bool {
        self.present
    }

    pub fn contexts(&self) -> &[Context] {
        &self.contexts
    }

    pub fn context_names(&self) -> Vec<&str> {
        self.contexts.iter().map(Context::name).collect()
    }

    pub fn context(&self, name: &str) -> Option<&Context> {
        self.contexts.iter().find(|c| c.name == name)
    }

    pub fn current_context(&self) -> &Context {
        &self.contexts[self.current]
    }

    pub fn is_current(&self, context: &str) -> bool {
        self.contexts[self.current].name == context
    }

    /// Every shortcut of every context.
    pub fn shortcut_ids(&self) -> impl Iterator<Item = ShortcutId> + '_ {
        self.contexts
            .iter()
            .flat_map(|c| c.shortcuts.iter().copied())
    }

    pub(crate) fn set_friendly_name(&mut self, name: &str) {
        self.friendly_name = name.to_string();
    }

    pub(crate) fn set_present(&mut self, present: bool) {
        self.present = present;
    }

    pub(crate) fn context_mut(&mut self, name: &str) -> Option<&mut Context> {
        self.contexts.iter_mut().find(|c| c.name == name)
    }

    /// Get or create the named context.
    pub(crate) fn ensure_context(&mut self, name: &str) -> &mut Context {
        let index = match self.contexts.iter().position(|c| c.name == name) {
            Some(index) => index,
            None => {
                self.contexts.push(Context::new(name, name));
                self.contexts.len() - 1
            }
        };
        &mut self.contexts[index]
    }

    /// Make `name` current. Returns false if the context does not exist.
    pub(crate) fn set_current(&mut self, name: &str) -> bool {
        match self.contexts.iter().position(|c| c.name == name) {
            Some(index) => {
                self.current = index;
                true
            }
            None => false,
        }
    }
}
