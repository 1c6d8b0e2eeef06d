//! Global shortcut registry.
//!
//! Owns every component and shortcut, the active-key table and the input
//! tracker. A key combination is owned by at most one active shortcut; a
//! component may reserve the same combination in several of its contexts,
//! only the one in the current context is active.
//!
//! Shortcuts live in a generational arena. Components, contexts and the
//! active-key table only hold `ShortcutId` handles, so a removed shortcut
//! leaves stale handles that resolve to nothing.

use std::collections::HashMap;
use std::time::Instant;

use async_channel::{Receiver, Sender};
use slotmap::SlotMap;
use tracing::{debug, info, instrument, trace, warn};

use super::component::{Component, DEFAULT_CONTEXT};
use super::grabber::{KeyGrabber, NoopGrabber};
use super::input::{InputTracker, ModifierOnlyState};
use super::keys::{Key, KeyCode, KeyCombination, MatchType};
use super::persistence::{LoadWarning, PersistedShortcut};
use super::shortcut::{
    ComponentId, GlobalShortcut, ShortcutEvent, ShortcutEventKind, ShortcutId, ShortcutRequest,
};
use crate::config::Config;
use crate::debug_panic;
use crate::error::RegistryError;

pub struct GlobalShortcutsRegistry {
    components: SlotMap<ComponentId, Component>,
    /// Creation order, for deterministic lookup and enumeration.
    component_order: Vec<ComponentId>,
    by_name: HashMap<String, ComponentId>,
    shortcuts: SlotMap<ShortcutId, GlobalShortcut>,
    active_keys: HashMap<KeyCombination, ShortcutId>,
    /// Grab reference counts, keyed by the first key of each active combination.
    grabs: HashMap<Key, usize>,
    input: InputTracker,
    last_triggered: Option<ShortcutId>,
    grabber: Box<dyn KeyGrabber>,
    events: Sender<ShortcutEvent>,
}

impl GlobalShortcutsRegistry {
    /// Registry without a key grabber. Owners receive their notifications on
    /// the returned channel.
    pub fn new(config: &Config) -> (Self, Receiver<ShortcutEvent>) {
        Self::with_grabber(config, Box::new(NoopGrabber))
    }

    pub fn with_grabber(
        config: &Config,
        grabber: Box<dyn KeyGrabber>,
    ) -> (Self, Receiver<ShortcutEvent>) {
        let (tx, rx) = async_channel::unbounded();
        (
            Self::with_parts(InputTracker::from_config(config), grabber, tx),
            rx,
        )
    }

    pub fn with_parts(
        input: InputTracker,
        grabber: Box<dyn KeyGrabber>,
        events: Sender<ShortcutEvent>,
    ) -> Self {
        Self {
            components: SlotMap::with_key(),
            component_order: Vec::new(),
            by_name: HashMap::new(),
            shortcuts: SlotMap::with_key(),
            active_keys: HashMap::new(),
            grabs: HashMap::new(),
            input,
            last_triggered: None,
            grabber,
            events,
        }
    }

    // ============================================
    // KEY OWNERSHIP
    // ============================================

    /// Make `id` the owner of `keys` and grab its first key.
    ///
    /// Fails without touching any state if another shortcut owns the
    /// combination, if `keys` is not the shortcut's combination, or if the
    /// shortcut is not eligible (context not current, owner not present).
    pub fn register_key(&mut self, keys: &KeyCombination, id: ShortcutId) -> bool {
        let Some(shortcut) = self.shortcuts.get(id) else {
            return false;
        };
        if keys.is_empty() || shortcut.keys.as_ref() != Some(keys) {
            return false;
        }
        if shortcut.active {
            return self.active_keys.get(keys) == Some(&id);
        }
        if !self.is_eligible(shortcut) {
            trace!(action = %shortcut.action, context = %shortcut.context, "Shortcut not eligible for activation");
            return false;
        }
        if let Some(owner) = self.active_keys.get(keys).and_then(|o| self.shortcuts.get(*o)) {
            debug!(
                keys = %keys,
                action = %shortcut.action,
                owner = %owner.action,
                "Key combination already owned"
            );
            return false;
        }
        if let Some(first) = keys.first() {
            if !self.grab(first) {
                return false;
            }
        }

        self.active_keys.insert(keys.clone(), id);
        if let Some(shortcut) = self.shortcuts.get_mut(id) {
            shortcut.active = true;
        }
        trace!(keys = %keys, "Key combination registered");
        true
    }

    /// Release `keys` if, and only if, `id` is its current owner.
    pub fn unregister_key(&mut self, keys: &KeyCombination, id: ShortcutId) -> bool {
        if self.active_keys.get(keys) != Some(&id) {
            return false;
        }
        self.active_keys.remove(keys);
        if let Some(shortcut) = self.shortcuts.get_mut(id) {
            shortcut.active = false;
        }
        if let Some(first) = keys.first() {
            self.ungrab(first);
        }
        trace!(keys = %keys, "Key combination unregistered");
        true
    }

    /// True if `component` may register `keys` in `context`: no other
    /// component actively owns it, and the component does not already use it
    /// in that same context.
    pub fn is_shortcut_available(
        &self,
        keys: &KeyCombination,
        component: &str,
        context: &str,
    ) -> bool {
        self.check_available(keys, component, context, None).is_ok()
    }

    fn check_available(
        &self,
        keys: &KeyCombination,
        component: &str,
        context: &str,
        exclude: Option<ShortcutId>,
    ) -> Result<(), RegistryError> {
        if let Some(&owner_id) = self.active_keys.get(keys) {
            if Some(owner_id) != exclude {
                if let Some(owner) = self.shortcuts.get(owner_id) {
                    let owner_component = self
                        .components
                        .get(owner.component)
                        .map(Component::unique_name)
                        .unwrap_or_default();
                    if owner_component != component || owner.context == context {
                        return Err(RegistryError::Collision {
                            keys: keys.to_string(),
                            owner_component: owner_component.to_string(),
                            owner_action: owner.action.clone(),
                        });
                    }
                }
            }
        }

        // Two reservations of one combination inside a single context could
        // never both become active.
        let reserved = self
            .component(component)
            .and_then(|c| c.context(context))
            .into_iter()
            .flat_map(|ctx| ctx.shortcut_ids().iter().copied())
            .filter(|id| Some(*id) != exclude)
            .filter_map(|id| self.shortcuts.get(id))
            .find(|s| s.keys.as_ref() == Some(keys));
        if let Some(other) = reserved {
            return Err(RegistryError::Collision {
                keys: keys.to_string(),
                owner_component: component.to_string(),
                owner_action: other.action.clone(),
            });
        }
        Ok(())
    }

    fn is_eligible(&self, shortcut: &GlobalShortcut) -> bool {
        shortcut.present
            && self
                .components
                .get(shortcut.component)
                .is_some_and(|c| c.is_present() && c.is_current(&shortcut.context))
    }

    fn grab(&mut self, key: Key) -> bool {
        let count = self.grabs.get(&key).copied().unwrap_or(0);
        if count == 0 && !self.grabber.grab_key(key, true) {
            warn!(key = %key, "Input backend refused to grab key");
            return false;
        }
        self.grabs.insert(key, count + 1);
        true
    }

    fn ungrab(&mut self, key: Key) {
        match self.grabs.get_mut(&key) {
            Some(count) if *count > 1 => *count -= 1,
            Some(_) => {
                self.grabs.remove(&key);
                if !self.grabber.grab_key(key, false) {
                    warn!(key = %key, "Input backend failed to release grab");
                }
            }
            None => debug_panic!("ungrab of {} without a grab", key),
        }
    }

    fn activate_shortcut(&mut self, id: ShortcutId) -> bool {
        let Some(keys) = self.shortcuts.get(id).and_then(|s| s.keys.clone()) else {
            return false;
        };
        self.register_key(&keys, id)
    }

    /// Returns true if the shortcut was active.
    fn deactivate_shortcut(&mut self, id: ShortcutId) -> bool {
        let Some(shortcut) = self.shortcuts.get(id) else {
            return false;
        };
        if !shortcut.active {
            return false;
        }
        let Some(keys) = shortcut.keys.clone() else {
            debug_panic!("active shortcut '{}' without keys", shortcut.action);
            return false;
        };
        self.unregister_key(&keys, id)
    }

    // ============================================
    // COMPONENTS AND SHORTCUTS
    // ============================================

    /// Get or create a component.
    pub fn create_component(&mut self, unique_name: &str, friendly_name: &str) -> ComponentId {
        if let Some(&id) = self.by_name.get(unique_name) {
            return id;
        }
        let id = self
            .components
            .insert(Component::new(unique_name, friendly_name));
        self.component_order.push(id);
        self.by_name.insert(unique_name.to_string(), id);
        info!(component = unique_name, "Component created");
        id
    }

    /// Remove a component with all its contexts and shortcuts.
    #[instrument(skip(self))]
    pub fn remove_component(&mut self, unique_name: &str) -> bool {
        let Some(cid) = self.by_name.remove(unique_name) else {
            return false;
        };
        self.component_order.retain(|c| *c != cid);
        let Some(component) = self.components.remove(cid) else {
            debug_panic!("component index out of sync for '{}'", unique_name);
            return false;
        };
        let ids: Vec<ShortcutId> = component.shortcut_ids().collect();
        for id in ids {
            self.drop_shortcut(id);
        }
        info!(component = unique_name, "Component removed");
        self.check_consistency();
        true
    }

    fn drop_shortcut(&mut self, id: ShortcutId) {
        self.deactivate_shortcut(id);
        self.shortcuts.remove(id);
        if self.last_triggered == Some(id) {
            self.last_triggered = None;
        }
    }

    /// Register (or re-register) an action.
    ///
    /// On a collision nothing changes and the current owner is reported.
    #[instrument(skip_all, fields(component = %request.component, action = %request.action))]
    pub fn register_shortcut(
        &mut self,
        request: ShortcutRequest,
    ) -> Result<ShortcutId, RegistryError> {
        let context = request
            .context
            .clone()
            .unwrap_or_else(|| DEFAULT_CONTEXT.to_string());
        let existing = self.find_shortcut(&request.component, &context, &request.action);
        let keys = match (&request.keys, existing) {
            (Some(keys), _) => Some(keys.clone()),
            (None, Some(id)) => self.shortcuts.get(id).and_then(|s| s.keys.clone()),
            (None, None) => None,
        };
        if let Some(keys) = &keys {
            self.check_available(keys, &request.component, &context, existing)?;
        }

        let cid = self.create_component(
            &request.component,
            request
                .component_friendly_name
                .as_deref()
                .unwrap_or(request.component.as_str()),
        );
        if let (Some(name), Some(component)) = (
            request.component_friendly_name.as_deref(),
            self.components.get_mut(cid),
        ) {
            component.set_friendly_name(name);
        }

        let id = match existing {
            Some(id) => {
                if self.shortcuts.get(id).is_some_and(|s| s.keys != keys) {
                    self.deactivate_shortcut(id);
                }
                if let Some(shortcut) = self.shortcuts.get_mut(id) {
                    shortcut.keys = keys;
                    shortcut.present = true;
                    if let Some(name) = request.friendly_name {
                        shortcut.friendly_name = name;
                    }
                    if request.default_keys.is_some() {
                        shortcut.default_keys = request.default_keys;
                    }
                }
                id
            }
            None => self.insert_shortcut(
                cid,
                &context,
                &request.action,
                request.friendly_name.as_deref(),
                keys,
                request.default_keys,
            ),
        };

        if self.activate_shortcut(id) {
            info!(context = %context, "Shortcut registered and active");
        } else {
            debug!(context = %context, "Shortcut registered inactive");
        }
        self.check_consistency();
        Ok(id)
    }

    fn insert_shortcut(
        &mut self,
        cid: ComponentId,
        context: &str,
        action: &str,
        friendly_name: Option<&str>,
        keys: Option<KeyCombination>,
        default_keys: Option<KeyCombination>,
    ) -> ShortcutId {
        let id = self.shortcuts.insert_with_key(|id| GlobalShortcut {
            id,
            component: cid,
            context: context.to_string(),
            action: action.to_string(),
            friendly_name: friendly_name.unwrap_or(action).to_string(),
            keys,
            default_keys,
            active: false,
            present: true,
        });
        if let Some(component) = self.components.get_mut(cid) {
            component.ensure_context(context).add(action, id);
        }
        id
    }

    fn find_shortcut(&self, component: &str, context: &str, action: &str) -> Option<ShortcutId> {
        self.component(component)?
            .context(context)?
            .shortcut_by_action(action)
    }

    /// Rebind a shortcut; `None` leaves it unbound.
    pub fn set_shortcut_keys(
        &mut self,
        id: ShortcutId,
        keys: Option<KeyCombination>,
    ) -> Result<(), RegistryError> {
        let Some(shortcut) = self.shortcuts.get(id) else {
            return Err(RegistryError::UnknownShortcut);
        };
        if shortcut.keys == keys {
            return Ok(());
        }
        if let Some(new_keys) = &keys {
            let component = self
                .components
                .get(shortcut.component)
                .map(|c| c.unique_name().to_string())
                .unwrap_or_default();
            let context = shortcut.context.clone();
            self.check_available(new_keys, &component, &context, Some(id))?;
        }

        self.deactivate_shortcut(id);
        if let Some(shortcut) = self.shortcuts.get_mut(id) {
            debug!(action = %shortcut.action, keys = ?keys.as_ref().map(ToString::to_string), "Shortcut rebound");
            shortcut.keys = keys;
        }
        self.activate_shortcut(id);
        self.check_consistency();
        Ok(())
    }

    pub fn set_default_keys(
        &mut self,
        id: ShortcutId,
        keys: Option<KeyCombination>,
    ) -> Result<(), RegistryError> {
        let shortcut = self
            .shortcuts
            .get_mut(id)
            .ok_or(RegistryError::UnknownShortcut)?;
        shortcut.default_keys = keys;
        Ok(())
    }

    /// Remove an action from a component's context.
    pub fn unregister_shortcut(&mut self, component: &str, context: &str, action: &str) -> bool {
        let Some(id) = self
            .by_name
            .get(component)
            .and_then(|cid| self.components.get_mut(*cid))
            .and_then(|c| c.context_mut(context))
            .and_then(|ctx| ctx.remove(action))
        else {
            return false;
        };
        self.drop_shortcut(id);
        info!(component, context, action, "Shortcut unregistered");
        self.check_consistency();
        true
    }

    /// Make `context` current for `component`, creating it if needed.
    #[instrument(skip(self))]
    pub fn activate_context(&mut self, component: &str, context: &str) -> bool {
        let Some(&cid) = self.by_name.get(component) else {
            return false;
        };
        let Some(comp) = self.components.get(cid) else {
            return false;
        };
        if comp.is_current(context) {
            return true;
        }

        let old: Vec<ShortcutId> = comp.current_context().shortcut_ids().to_vec();
        for id in old {
            self.deactivate_shortcut(id);
        }
        let Some(comp) = self.components.get_mut(cid) else {
            return false;
        };
        comp.ensure_context(context);
        comp.set_current(context);
        let new: Vec<ShortcutId> = comp.current_context().shortcut_ids().to_vec();
        for id in new {
            self.activate_shortcut(id);
        }
        info!("Context activated");
        self.check_consistency();
        true
    }

    /// Record whether a component is reachable. Shortcuts of an unreachable
    /// component stay registered but inactive.
    pub fn set_component_present(&mut self, component: &str, present: bool) -> bool {
        let Some(&cid) = self.by_name.get(component) else {
            return false;
        };
        let Some(comp) = self.components.get_mut(cid) else {
            return false;
        };
        if comp.is_present() == present {
            return true;
        }
        comp.set_present(present);

        if present {
            let ids: Vec<ShortcutId> = comp.current_context().shortcut_ids().to_vec();
            for id in ids {
                self.activate_shortcut(id);
            }
        } else {
            let ids: Vec<ShortcutId> = comp.shortcut_ids().collect();
            for id in ids {
                self.deactivate_shortcut(id);
            }
        }
        info!(component, present, "Component presence changed");
        self.check_consistency();
        true
    }

    /// Activate every eligible shortcut of every reachable component.
    pub fn activate_shortcuts(&mut self) {
        let ids: Vec<ShortcutId> = self
            .component_order
            .iter()
            .filter_map(|cid| self.components.get(*cid))
            .filter(|c| c.is_present())
            .flat_map(|c| c.current_context().shortcut_ids().iter().copied())
            .collect();
        let activated = ids
            .into_iter()
            .filter(|id| self.activate_shortcut(*id))
            .count();
        info!(activated, active = self.active_keys.len(), "Shortcuts activated");
        self.check_consistency();
    }

    /// Deactivate every shortcut and release all grabs.
    ///
    /// A temporary deactivation is undone by [`Self::activate_shortcuts`]. A
    /// permanent one marks the shortcuts as no longer present, so only a new
    /// registration by their owner brings them back.
    pub fn deactivate_shortcuts(&mut self, temporarily: bool) {
        let ids: Vec<ShortcutId> = self.shortcuts.keys().collect();
        for id in ids {
            self.deactivate_shortcut(id);
            if !temporarily {
                if let Some(shortcut) = self.shortcuts.get_mut(id) {
                    shortcut.present = false;
                }
            }
        }
        self.reset_input_state();
        info!(temporarily, "Shortcuts deactivated");
        self.check_consistency();
    }

    /// Drop the shortcuts of `component` that its owner no longer declares.
    /// Returns true if anything was removed.
    pub fn clean_up(&mut self, component: &str) -> bool {
        let Some(&cid) = self.by_name.get(component) else {
            return false;
        };
        let stale: Vec<(String, String, ShortcutId)> = self
            .components
            .get(cid)
            .into_iter()
            .flat_map(|c| c.shortcut_ids())
            .filter_map(|id| self.shortcuts.get(id))
            .filter(|s| !s.present)
            .map(|s| (s.context.clone(), s.action.clone(), s.id))
            .collect();
        if stale.is_empty() {
            return false;
        }
        for (context, action, id) in &stale {
            if let Some(ctx) = self
                .components
                .get_mut(cid)
                .and_then(|c| c.context_mut(context))
            {
                ctx.remove(action);
            }
            self.drop_shortcut(*id);
        }
        info!(component, removed = stale.len(), "Stale shortcuts cleaned up");
        self.check_consistency();
        true
    }

    /// Drop every component and release all grabs.
    pub fn clear(&mut self) {
        let ids: Vec<ShortcutId> = self.shortcuts.keys().collect();
        for id in ids {
            self.deactivate_shortcut(id);
        }
        self.shortcuts.clear();
        self.components.clear();
        self.component_order.clear();
        self.by_name.clear();
        self.last_triggered = None;
        self.input.reset();
        if !self.grabs.is_empty() {
            debug_panic!("{} grabs left after clear", self.grabs.len());
            self.grabs.clear();
        }
        info!("Registry cleared");
    }

    // ============================================
    // LOOKUP AND ENUMERATION
    // ============================================

    /// First shortcut in a current context whose combination matches `keys`.
    /// Active and reserved shortcuts are both considered.
    pub fn shortcut_by_key(
        &self,
        keys: &KeyCombination,
        match_type: MatchType,
    ) -> Option<&GlobalShortcut> {
        self.components()
            .flat_map(|c| c.current_context().shortcut_ids().iter())
            .filter_map(|id| self.shortcuts.get(*id))
            .find(|s| s.keys.as_ref().is_some_and(|k| match_type.matches(k, keys)))
    }

    /// Every shortcut in any context whose combination matches `keys`.
    pub fn shortcuts_by_key(
        &self,
        keys: &KeyCombination,
        match_type: MatchType,
    ) -> Vec<&GlobalShortcut> {
        self.components()
            .flat_map(|c| c.shortcut_ids())
            .filter_map(|id| self.shortcuts.get(id))
            .filter(|s| s.keys.as_ref().is_some_and(|k| match_type.matches(k, keys)))
            .collect()
    }

    /// Components in creation order.
    pub fn components(&self) -> impl Iterator<Item = &Component> {
        self.component_order
            .iter()
            .filter_map(|id| self.components.get(*id))
    }

    pub fn all_component_names(&self) -> Vec<String> {
        self.components()
            .map(|c| c.unique_name().to_string())
            .collect()
    }

    pub fn component(&self, unique_name: &str) -> Option<&Component> {
        self.by_name
            .get(unique_name)
            .and_then(|id| self.components.get(*id))
    }

    pub fn component_by_id(&self, id: ComponentId) -> Option<&Component> {
        self.components.get(id)
    }

    pub fn context_names(&self, component: &str) -> Vec<String> {
        self.component(component)
            .map(|c| c.context_names().into_iter().map(str::to_string).collect())
            .unwrap_or_default()
    }

    /// Action names of a context, in registration order.
    pub fn shortcut_names(&self, component: &str, context: &str) -> Vec<String> {
        self.component(component)
            .and_then(|c| c.context(context))
            .map(|ctx| {
                ctx.shortcut_ids()
                    .iter()
                    .filter_map(|id| self.shortcuts.get(*id))
                    .map(|s| s.action.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn shortcut(&self, id: ShortcutId) -> Option<&GlobalShortcut> {
        self.shortcuts.get(id)
    }

    pub fn shortcut_by_name(
        &self,
        component: &str,
        context: &str,
        action: &str,
    ) -> Option<&GlobalShortcut> {
        self.find_shortcut(component, context, action)
            .and_then(|id| self.shortcuts.get(id))
    }

    pub fn active_shortcut_count(&self) -> usize {
        self.active_keys.len()
    }

    /// Owner of `keys` in the active-key table.
    pub fn active_owner(&self, keys: &KeyCombination) -> Option<&GlobalShortcut> {
        self.active_keys
            .get(keys)
            .and_then(|id| self.shortcuts.get(*id))
    }

    pub fn last_triggered(&self) -> Option<&GlobalShortcut> {
        self.last_triggered.and_then(|id| self.shortcuts.get(id))
    }

    pub fn input_state(&self) -> ModifierOnlyState {
        self.input.state()
    }

    pub fn pressed_sequence(&self) -> &KeyCombination {
        self.input.pressed_sequence()
    }

    // ============================================
    // INPUT DISPATCH
    // ============================================

    /// Returns true if the event was consumed by a shortcut.
    pub fn key_pressed(&mut self, code: KeyCode) -> bool {
        self.key_pressed_at(code, Instant::now())
    }

    pub fn key_pressed_at(&mut self, code: KeyCode, now: Instant) -> bool {
        let Some(sequence) = self.input.press(code, now) else {
            return false;
        };

        let hit = (1..=sequence.len())
            .find_map(|len| self.active_keys.get(&sequence.suffix(len)).copied());
        let Some(id) = hit else {
            trace!(sequence = %sequence, "No shortcut for sequence");
            return false;
        };

        if self.last_triggered == Some(id) {
            trace!(sequence = %sequence, "Repeat of the held shortcut, consumed");
            return true;
        }
        if let Some(previous) = self.last_triggered.take() {
            self.emit(previous, ShortcutEventKind::Released);
        }
        self.last_triggered = Some(id);
        self.emit(id, ShortcutEventKind::Pressed);
        true
    }

    pub fn key_released(&mut self, code: KeyCode) -> bool {
        self.key_released_at(code, Instant::now())
    }

    pub fn key_released_at(&mut self, code: KeyCode, now: Instant) -> bool {
        let outcome = self.input.release(code, now);

        if outcome.tracked {
            if let Some(previous) = self.last_triggered.take() {
                self.emit(previous, ShortcutEventKind::Released);
            }
        }

        let Some(modifiers) = outcome.modifier_only else {
            return false;
        };
        let keys = KeyCombination::single(Key::modifier_only(modifiers));
        let Some(&id) = self.active_keys.get(&keys) else {
            trace!(keys = %keys, "No modifier-only shortcut");
            return false;
        };
        self.emit(id, ShortcutEventKind::Pressed);
        self.emit(id, ShortcutEventKind::Released);
        true
    }

    /// A pointer button press. Never consumed.
    pub fn pointer_pressed(&mut self, buttons: u32) -> bool {
        self.pointer_pressed_at(buttons, Instant::now())
    }

    pub fn pointer_pressed_at(&mut self, buttons: u32, _now: Instant) -> bool {
        trace!(buttons, "Pointer pressed");
        self.input.interrupt();
        false
    }

    /// Scroll or other axis motion. Never consumed.
    pub fn axis_triggered(&mut self, axis: u32) -> bool {
        self.axis_triggered_at(axis, Instant::now())
    }

    pub fn axis_triggered_at(&mut self, axis: u32, _now: Instant) -> bool {
        trace!(axis, "Axis triggered");
        self.input.interrupt();
        false
    }

    /// Forget all pressed keys, e.g. after a focus or session change.
    pub fn reset_input_state(&mut self) {
        if let Some(previous) = self.last_triggered.take() {
            self.emit(previous, ShortcutEventKind::Released);
        }
        self.input.reset();
        debug!("Input state reset");
    }

    fn emit(&self, id: ShortcutId, kind: ShortcutEventKind) {
        let Some(shortcut) = self.shortcuts.get(id) else {
            return;
        };
        let Some(component) = self.components.get(shortcut.component) else {
            return;
        };
        let event = ShortcutEvent {
            kind,
            component: component.unique_name().to_string(),
            context: shortcut.context.clone(),
            action: shortcut.action.clone(),
        };
        match kind {
            ShortcutEventKind::Pressed => info!(
                component = %event.component,
                action = %event.action,
                "Shortcut triggered"
            ),
            ShortcutEventKind::Released => debug!(
                component = %event.component,
                action = %event.action,
                "Shortcut released"
            ),
        }
        if let Err(e) = self.events.try_send(event) {
            debug!(error = %e, "Shortcut event not delivered");
        }
    }

    // ============================================
    // PERSISTENCE
    // ============================================

    /// Every shortcut, in component, context and registration order.
    pub fn snapshot(&self) -> Vec<PersistedShortcut> {
        self.components()
            .flat_map(move |component| {
                component.contexts().iter().flat_map(move |context| {
                    context
                        .shortcut_ids()
                        .iter()
                        .filter_map(|id| self.shortcuts.get(*id))
                        .map(move |s| PersistedShortcut {
                            component: component.unique_name().to_string(),
                            component_friendly_name: component.friendly_name().to_string(),
                            context: context.name().to_string(),
                            action: s.action.clone(),
                            friendly_name: s.friendly_name.clone(),
                            keys: s.keys.as_ref().map(ToString::to_string),
                            default_keys: s.default_keys.as_ref().map(ToString::to_string),
                            active: s.active,
                        })
                })
            })
            .collect()
    }

    /// Load persisted shortcuts. Conflicts never abort loading: the first
    /// record to claim a combination wins and every loser is reported.
    #[instrument(skip_all, fields(records = records.len()))]
    pub fn load(&mut self, records: &[PersistedShortcut]) -> Vec<LoadWarning> {
        let mut warnings = Vec::new();

        for record in records {
            let keys = match parse_keys(record.keys.as_deref()) {
                Ok(keys) => keys,
                Err(error) => {
                    warnings.push(LoadWarning::InvalidKeys {
                        component: record.component.clone(),
                        action: record.action.clone(),
                        keys: record.keys.clone().unwrap_or_default(),
                        error,
                    });
                    continue;
                }
            };
            let default_keys = match parse_keys(record.default_keys.as_deref()) {
                Ok(keys) => keys,
                Err(error) => {
                    warnings.push(LoadWarning::InvalidKeys {
                        component: record.component.clone(),
                        action: record.action.clone(),
                        keys: record.default_keys.clone().unwrap_or_default(),
                        error,
                    });
                    continue;
                }
            };

            if self
                .find_shortcut(&record.component, &record.context, &record.action)
                .is_some()
            {
                warnings.push(LoadWarning::Duplicate {
                    component: record.component.clone(),
                    context: record.context.clone(),
                    action: record.action.clone(),
                });
                continue;
            }

            let cid = self.create_component(&record.component, &record.component_friendly_name);
            let friendly_name = Some(record.friendly_name.as_str()).filter(|n| !n.is_empty());
            let id = self.insert_shortcut(
                cid,
                &record.context,
                &record.action,
                friendly_name,
                keys.clone(),
                default_keys,
            );

            if !record.active {
                continue;
            }
            if !self.make_context_current_for_load(cid, &record.context) {
                warnings.push(LoadWarning::ContextConflict {
                    component: record.component.clone(),
                    context: record.context.clone(),
                    action: record.action.clone(),
                });
                continue;
            }
            if !self.activate_shortcut(id) {
                if let Some(keys) = &keys {
                    let owner = self.active_owner(keys).map(|o| {
                        let component = self
                            .components
                            .get(o.component)
                            .map(|c| c.unique_name().to_string())
                            .unwrap_or_default();
                        (component, o.action.clone())
                    });
                    let (owner_component, owner_action) = owner.unwrap_or_default();
                    warnings.push(LoadWarning::Collision {
                        component: record.component.clone(),
                        action: record.action.clone(),
                        keys: keys.to_string(),
                        owner_component,
                        owner_action,
                    });
                }
            }
        }

        info!(
            components = self.component_order.len(),
            active = self.active_keys.len(),
            warnings = warnings.len(),
            "Shortcuts loaded"
        );
        self.check_consistency();
        warnings
    }

    /// A component has one current context; the first active record decides
    /// which one it is.
    fn make_context_current_for_load(&mut self, cid: ComponentId, context: &str) -> bool {
        let Some(component) = self.components.get(cid) else {
            return false;
        };
        if component.is_current(context) {
            return true;
        }
        let has_active = component
            .current_context()
            .shortcut_ids()
            .iter()
            .any(|id| self.shortcuts.get(*id).is_some_and(|s| s.active));
        if has_active {
            return false;
        }
        self.components
            .get_mut(cid)
            .is_some_and(|c| c.set_current(context))
    }

    // ============================================
    // INVARIANTS
    // ============================================

    /// Check that the active-key table, the `active` flags and the grab
    /// counts agree.
    pub fn is_consistent(&self) -> bool {
        for (keys, id) in &self.active_keys {
            let Some(shortcut) = self.shortcuts.get(*id) else {
                return false;
            };
            if !shortcut.active || shortcut.keys.as_ref() != Some(keys) || !self.is_eligible(shortcut)
            {
                return false;
            }
        }
        let active = self.shortcuts.values().filter(|s| s.active).count();
        if active != self.active_keys.len() {
            return false;
        }

        let mut expected: HashMap<Key, usize> = HashMap::new();
        for key in self.active_keys.keys().filter_map(KeyCombination::first) {
            *expected.entry(key).or_insert(0) += 1;
        }
        expected == self.grabs
    }

    fn check_consistency(&self) {
        if cfg!(debug_assertions) && !self.is_consistent() {
            debug_panic!("active-key table and shortcut state diverged");
        }
    }
}

fn parse_keys(
    text: Option<&str>,
) -> Result<Option<KeyCombination>, super::keys::KeyParseError> {
    match text.map(str::trim) {
        None | Some("") => Ok(None),
        Some(text) => text.parse().map(Some),
    }
}
