//! Input accumulator and the modifier-only state machine.
//!
//! The tracker sees every raw key event in order. It keeps a multiset of the
//! pressed key codes, assembles non-modifier presses into a rotating key
//! sequence, and decides when a bare modifier tap completes.
//!
//! State machine:
//! - Normal -> PressingModifierOnly when a modifier is pressed and no other key is held
//! - PressingModifierOnly -> ReleasingModifierOnly on the first release
//! - ReleasingModifierOnly -> PressingModifierOnly when a modifier is pressed again
//! - Any -> Normal when a non-modifier key, a pointer button or an axis event arrives
//! - ReleasingModifierOnly -> Normal when all keys are released; the tap fires if the
//!   time since the first release is below the threshold

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tracing::{debug, trace, warn};

use super::keys::{KeyCode, Key, KeyCombination, Modifiers};
use crate::config::Config;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ModifierOnlyState {
    #[default]
    Normal,
    PressingModifierOnly,
    ReleasingModifierOnly,
}

/// Which physical keys count as modifiers, and which flag each one sets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModifierKeyMap {
    keys: HashMap<KeyCode, Modifiers>,
}

impl Default for ModifierKeyMap {
    fn default() -> Self {
        let keys = [
            (KeyCode::SHIFT, Modifiers::SHIFT),
            (KeyCode::CONTROL, Modifiers::CTRL),
            (KeyCode::ALT, Modifiers::ALT),
            (KeyCode::META, Modifiers::META),
        ]
        .into_iter()
        .collect();
        Self { keys }
    }
}

impl ModifierKeyMap {
    pub fn new(keys: impl IntoIterator<Item = (KeyCode, Modifiers)>) -> Self {
        Self {
            keys: keys.into_iter().collect(),
        }
    }

    /// Build from configured `key name -> modifier name` pairs, skipping
    /// entries that do not resolve.
    pub fn from_names<'a>(entries: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let mut keys = HashMap::new();
        for (key_name, modifier_name) in entries {
            let Some(code) = KeyCode::from_name(key_name) else {
                warn!(key = key_name, "Unknown modifier key in config, ignoring");
                continue;
            };
            let Some(modifier) = Modifiers::from_alias(modifier_name) else {
                warn!(
                    key = key_name,
                    modifier = modifier_name,
                    "Unknown modifier name in config, ignoring"
                );
                continue;
            };
            keys.insert(code, modifier);
        }
        Self { keys }
    }

    pub fn get(&self, code: KeyCode) -> Option<Modifiers> {
        self.keys.get(&code).copied()
    }

    pub fn is_modifier(&self, code: KeyCode) -> bool {
        self.keys.contains_key(&code)
    }
}

/// Result of a key release.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReleaseOutcome {
    /// Modifier set of a completed modifier-only tap.
    pub modifier_only: Option<Modifiers>,
    /// The key was held; releases of unknown keys change nothing.
    pub tracked: bool,
    pub all_released: bool,
}

/// Accumulator for in-flight key events.
#[derive(Debug, Clone)]
pub struct InputTracker {
    modifier_keys: ModifierKeyMap,
    threshold: Duration,
    modifier_only_enabled: bool,
    keys_count: HashMap<KeyCode, u32>,
    sequence: KeyCombination,
    state: ModifierOnlyState,
    /// Modifiers held at any point of the current modifier-only candidate.
    candidate: Modifiers,
    /// A non-modifier key was pressed since the last moment no key was held.
    chord_had_non_modifier: bool,
    pressed_at: Option<Instant>,
    first_release_at: Option<Instant>,
}

impl InputTracker {
    pub fn new(modifier_keys: ModifierKeyMap, threshold: Duration, modifier_only_enabled: bool) -> Self {
        Self {
            modifier_keys,
            threshold,
            modifier_only_enabled,
            keys_count: HashMap::new(),
            sequence: KeyCombination::default(),
            state: ModifierOnlyState::Normal,
            candidate: Modifiers::empty(),
            chord_had_non_modifier: false,
            pressed_at: None,
            first_release_at: None,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        let modifier_keys = ModifierKeyMap::from_names(
            config
                .modifier_keys
                .iter()
                .map(|(key, modifier)| (key.as_str(), modifier.as_str())),
        );
        Self::new(
            modifier_keys,
            config.modifier_only_threshold(),
            config.modifier_only_enabled,
        )
    }

    pub fn state(&self) -> ModifierOnlyState {
        self.state
    }

    pub fn pressed_sequence(&self) -> &KeyCombination {
        &self.sequence
    }

    /// How many presses of `code` are outstanding.
    pub fn key_count(&self, code: KeyCode) -> u32 {
        self.keys_count.get(&code).copied().unwrap_or(0)
    }

    pub fn has_pressed_keys(&self) -> bool {
        !self.keys_count.is_empty()
    }

    /// Modifiers derived from the currently pressed modifier keys.
    pub fn held_modifiers(&self) -> Modifiers {
        self.keys_count
            .keys()
            .filter_map(|code| self.modifier_keys.get(*code))
            .fold(Modifiers::empty(), |acc, m| acc | m)
    }

    /// Record a key press. Returns the updated sequence when a non-modifier
    /// key completed a new step, so the caller can look it up.
    pub fn press(&mut self, code: KeyCode, now: Instant) -> Option<KeyCombination> {
        match self.modifier_keys.get(code) {
            Some(modifier) => {
                *self.keys_count.entry(code).or_insert(0) += 1;
                self.modifier_pressed(modifier, now);
                None
            }
            None => {
                *self.keys_count.entry(code).or_insert(0) += 1;
                self.chord_had_non_modifier = true;
                if self.state != ModifierOnlyState::Normal {
                    debug!(state = ?self.state, "Non-modifier key pressed, modifier-only candidate aborted");
                }
                self.abort_modifier_only();
                let key = Key::new(code, self.held_modifiers());
                self.sequence.push_rotating(key);
                Some(self.sequence.clone())
            }
        }
    }

    fn modifier_pressed(&mut self, modifier: Modifiers, now: Instant) {
        if !self.modifier_only_enabled {
            return;
        }
        match self.state {
            ModifierOnlyState::Normal => {
                // Only a chord made of modifiers alone can become a tap.
                if !self.chord_had_non_modifier {
                    self.state = ModifierOnlyState::PressingModifierOnly;
                    self.candidate = self.held_modifiers();
                    self.pressed_at = Some(now);
                    self.first_release_at = None;
                }
            }
            ModifierOnlyState::PressingModifierOnly => {
                self.candidate |= modifier;
            }
            ModifierOnlyState::ReleasingModifierOnly => {
                self.state = ModifierOnlyState::PressingModifierOnly;
                self.candidate |= modifier;
                self.first_release_at = None;
            }
        }
        trace!(state = ?self.state, candidate = ?self.candidate, "Modifier pressed");
    }

    /// Record a key release.
    pub fn release(&mut self, code: KeyCode, now: Instant) -> ReleaseOutcome {
        let tracked = match self.keys_count.get_mut(&code) {
            Some(count) => {
                *count -= 1;
                if *count == 0 {
                    self.keys_count.remove(&code);
                }
                true
            }
            None => false,
        };
        if !tracked {
            debug!(key = %code.name(), "Release of a key that is not pressed, ignoring");
        }

        if tracked && self.state == ModifierOnlyState::PressingModifierOnly {
            self.state = ModifierOnlyState::ReleasingModifierOnly;
            self.first_release_at = Some(now);
        }

        let all_released = self.keys_count.is_empty();
        let mut modifier_only = None;
        if all_released {
            if self.state == ModifierOnlyState::ReleasingModifierOnly {
                let elapsed = self
                    .first_release_at
                    .map(|t| now.saturating_duration_since(t))
                    .unwrap_or_default();
                let held_for = self
                    .pressed_at
                    .map(|t| now.saturating_duration_since(t))
                    .unwrap_or_default();
                if elapsed < self.threshold {
                    debug!(
                        modifiers = ?self.candidate,
                        held_ms = held_for.as_millis() as u64,
                        "Modifier-only tap completed"
                    );
                    modifier_only = Some(self.candidate);
                } else {
                    debug!(
                        elapsed_ms = elapsed.as_millis() as u64,
                        threshold_ms = self.threshold.as_millis() as u64,
                        "Modifier-only release too slow, ignoring"
                    );
                }
            }
            self.sequence.clear();
            self.chord_had_non_modifier = false;
            self.abort_modifier_only();
        }

        ReleaseOutcome {
            modifier_only,
            tracked,
            all_released,
        }
    }

    /// A pointer button or axis event interrupts any modifier-only candidate.
    pub fn interrupt(&mut self) {
        if self.state != ModifierOnlyState::Normal {
            debug!(state = ?self.state, "Input interrupted, modifier-only candidate aborted");
        }
        self.abort_modifier_only();
    }

    /// Forget everything, e.g. after a focus change that may have eaten key releases.
    pub fn reset(&mut self) {
        self.keys_count.clear();
        self.sequence.clear();
        self.chord_had_non_modifier = false;
        self.abort_modifier_only();
    }

    fn abort_modifier_only(&mut self) {
        self.state = ModifierOnlyState::Normal;
        self.candidate = Modifiers::empty();
        self.pressed_at = None;
        self.first_release_at = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const THRESHOLD: Duration = Duration::from_millis(500);

    fn tracker() -> InputTracker {
        InputTracker::new(ModifierKeyMap::default(), THRESHOLD, true)
    }

    fn ms(base: Instant, millis: u64) -> Instant {
        base + Duration::from_millis(millis)
    }

    fn key(c: char) -> KeyCode {
        KeyCode::from_char(c)
    }

    #[test]
    fn single_modifier_tap_completes() {
        let mut t = tracker();
        let t0 = Instant::now();

        assert_eq!(t.press(KeyCode::META, t0), None);
        assert_eq!(t.state(), ModifierOnlyState::PressingModifierOnly);

        let outcome = t.release(KeyCode::META, ms(t0, 100));
        assert_eq!(outcome.modifier_only, Some(Modifiers::META));
        assert!(outcome.all_released);
        assert_eq!(t.state(), ModifierOnlyState::Normal);
    }

    #[test]
    fn chord_of_modifiers_reports_union() {
        let mut t = tracker();
        let t0 = Instant::now();

        t.press(KeyCode::META, t0);
        t.press(KeyCode::SHIFT, ms(t0, 10));
        assert_eq!(t.state(), ModifierOnlyState::PressingModifierOnly);

        let first = t.release(KeyCode::SHIFT, ms(t0, 50));
        assert_eq!(first.modifier_only, None);
        assert!(!first.all_released);
        assert_eq!(t.state(), ModifierOnlyState::ReleasingModifierOnly);

        let last = t.release(KeyCode::META, ms(t0, 80));
        assert_eq!(last.modifier_only, Some(Modifiers::META | Modifiers::SHIFT));
    }

    #[test]
    fn slow_release_does_not_complete() {
        let mut t = tracker();
        let t0 = Instant::now();

        t.press(KeyCode::META, t0);
        t.press(KeyCode::ALT, t0);
        t.release(KeyCode::ALT, ms(t0, 10));
        let outcome = t.release(KeyCode::META, ms(t0, 10 + 500));
        assert_eq!(outcome.modifier_only, None);
        assert_eq!(t.state(), ModifierOnlyState::Normal);
    }

    #[test]
    fn non_modifier_aborts_from_pressing() {
        let mut t = tracker();
        let t0 = Instant::now();

        t.press(KeyCode::META, t0);
        let seq = t.press(key('a'), ms(t0, 5)).unwrap();
        assert_eq!(seq.to_string(), "Meta+A");
        assert_eq!(t.state(), ModifierOnlyState::Normal);

        t.release(key('a'), ms(t0, 10));
        let outcome = t.release(KeyCode::META, ms(t0, 20));
        assert_eq!(outcome.modifier_only, None);
        assert!(t.pressed_sequence().is_empty());
    }

    #[test]
    fn non_modifier_aborts_from_releasing() {
        let mut t = tracker();
        let t0 = Instant::now();

        t.press(KeyCode::META, t0);
        t.press(KeyCode::CONTROL, t0);
        t.release(KeyCode::CONTROL, ms(t0, 5));
        assert_eq!(t.state(), ModifierOnlyState::ReleasingModifierOnly);

        t.press(key('x'), ms(t0, 6));
        assert_eq!(t.state(), ModifierOnlyState::Normal);
        t.release(key('x'), ms(t0, 7));
        assert_eq!(t.release(KeyCode::META, ms(t0, 8)).modifier_only, None);
    }

    #[test]
    fn modifier_pressed_again_while_releasing_returns_to_pressing() {
        let mut t = tracker();
        let t0 = Instant::now();

        t.press(KeyCode::META, t0);
        t.press(KeyCode::SHIFT, t0);
        t.release(KeyCode::SHIFT, ms(t0, 5));
        t.press(KeyCode::SHIFT, ms(t0, 10));
        assert_eq!(t.state(), ModifierOnlyState::PressingModifierOnly);

        t.release(KeyCode::SHIFT, ms(t0, 600));
        let outcome = t.release(KeyCode::META, ms(t0, 610));
        assert_eq!(outcome.modifier_only, Some(Modifiers::META | Modifiers::SHIFT));
    }

    #[test]
    fn modifier_with_other_key_held_stays_normal() {
        let mut t = tracker();
        let t0 = Instant::now();

        t.press(key('q'), t0);
        t.press(KeyCode::META, t0);
        assert_eq!(t.state(), ModifierOnlyState::Normal);
    }

    #[test]
    fn interrupt_and_reset_return_to_normal() {
        let mut t = tracker();
        let t0 = Instant::now();

        t.press(KeyCode::META, t0);
        t.interrupt();
        assert_eq!(t.state(), ModifierOnlyState::Normal);
        assert_eq!(t.key_count(KeyCode::META), 1);
        assert_eq!(t.release(KeyCode::META, t0).modifier_only, None);

        t.press(KeyCode::META, t0);
        t.press(key('k'), t0);
        t.reset();
        assert!(!t.has_pressed_keys());
        assert!(t.pressed_sequence().is_empty());
        assert_eq!(t.state(), ModifierOnlyState::Normal);
    }

    #[test]
    fn every_state_handles_every_event() {
        use ModifierOnlyState::{
            Normal, PressingModifierOnly as Pressing, ReleasingModifierOnly as Releasing,
        };

        let t0 = Instant::now();
        let starts = [Normal, Pressing, Releasing];
        let setups: [fn(&mut InputTracker, Instant); 3] = [
            |_, _| {},
            |t, now| {
                t.press(KeyCode::META, now);
                t.press(KeyCode::CONTROL, now);
            },
            |t, now| {
                t.press(KeyCode::META, now);
                t.press(KeyCode::SHIFT, now);
                t.press(KeyCode::CONTROL, now);
                t.release(KeyCode::SHIFT, now);
            },
        ];
        // Each event returns the modifier-only tap it completed, if any.
        let events: [fn(&mut InputTracker, Instant) -> Option<Modifiers>; 5] = [
            |t, now| t.press(KeyCode::ALT, now).and(None),
            |t, now| t.release(KeyCode::CONTROL, now).modifier_only,
            |t, now| t.press(key('z'), now).and(None),
            |t, now| {
                let held: Vec<(KeyCode, u32)> =
                    t.keys_count.iter().map(|(code, count)| (*code, *count)).collect();
                if held.is_empty() {
                    return t.release(KeyCode::META, now).modifier_only;
                }
                let mut tap = None;
                for (code, count) in held {
                    for _ in 0..count {
                        tap = t.release(code, now).modifier_only;
                    }
                }
                tap
            },
            |t, _| {
                t.reset();
                None
            },
        ];

        let meta_ctrl = Modifiers::META | Modifiers::CTRL;
        let expected: [[(ModifierOnlyState, Option<Modifiers>); 5]; 3] = [
            [
                (Pressing, None),
                (Normal, None),
                (Normal, None),
                (Normal, None),
                (Normal, None),
            ],
            [
                (Pressing, None),
                (Releasing, None),
                (Normal, None),
                (Normal, Some(meta_ctrl)),
                (Normal, None),
            ],
            [
                (Pressing, None),
                (Releasing, None),
                (Normal, None),
                (Normal, Some(meta_ctrl | Modifiers::SHIFT)),
                (Normal, None),
            ],
        ];

        for ((start, setup), row) in starts.into_iter().zip(setups).zip(expected) {
            for (index, (event, (state, tap))) in events.into_iter().zip(row).enumerate() {
                let mut t = tracker();
                setup(&mut t, t0);
                assert_eq!(t.state(), start);
                let completed = event(&mut t, t0);
                assert_eq!(t.state(), state, "{start:?}, event {index}");
                assert_eq!(completed, tap, "{start:?}, event {index}");
            }
        }
    }

    #[test]
    fn modifier_pressed_after_chord_in_same_hold_stays_normal() {
        let mut t = tracker();
        let t0 = Instant::now();

        t.press(KeyCode::META, t0);
        t.press(key('a'), t0);
        t.release(key('a'), t0);
        t.press(KeyCode::SHIFT, t0);
        assert_eq!(t.state(), ModifierOnlyState::Normal);
        assert_eq!(t.release(KeyCode::SHIFT, t0).modifier_only, None);
        assert_eq!(t.release(KeyCode::META, t0).modifier_only, None);

        // A fresh hold can tap again, reporting every held modifier.
        t.press(KeyCode::META, t0);
        t.press(KeyCode::SHIFT, t0);
        t.release(KeyCode::META, t0);
        assert_eq!(
            t.release(KeyCode::SHIFT, t0).modifier_only,
            Some(Modifiers::META | Modifiers::SHIFT)
        );
    }

    #[test]
    fn release_of_unknown_key_is_untracked() {
        let mut t = tracker();
        let t0 = Instant::now();

        t.press(key('t'), t0);
        let outcome = t.release(key('q'), t0);
        assert!(!outcome.tracked);
        assert!(!outcome.all_released);
        assert!(t.release(key('t'), t0).tracked);
    }

    #[test]
    fn sequence_carries_held_modifiers() {
        let mut t = tracker();
        let t0 = Instant::now();

        t.press(KeyCode::CONTROL, t0);
        assert_eq!(t.press(key('k'), t0).unwrap().to_string(), "Ctrl+K");
        t.release(key('k'), t0);
        assert_eq!(
            t.press(key('d'), t0).unwrap().to_string(),
            "Ctrl+K, Ctrl+D"
        );
        t.release(key('d'), t0);
        t.release(KeyCode::CONTROL, t0);
        assert!(t.pressed_sequence().is_empty());
    }

    #[test]
    fn repeated_modifier_presses_are_counted() {
        let mut t = tracker();
        let t0 = Instant::now();

        t.press(KeyCode::SHIFT, t0);
        t.press(KeyCode::SHIFT, t0);
        assert_eq!(t.key_count(KeyCode::SHIFT), 2);
        assert!(!t.release(KeyCode::SHIFT, t0).all_released);
        assert!(t.release(KeyCode::SHIFT, t0).all_released);
        assert_eq!(t.release(KeyCode::SHIFT, t0).modifier_only, None);
    }

    #[test]
    fn disabled_modifier_only_never_completes() {
        let mut t = InputTracker::new(ModifierKeyMap::default(), THRESHOLD, false);
        let t0 = Instant::now();
        t.press(KeyCode::META, t0);
        assert_eq!(t.state(), ModifierOnlyState::Normal);
        assert_eq!(t.release(KeyCode::META, t0).modifier_only, None);
    }

    #[test]
    fn modifier_key_map_from_names() {
        let map = ModifierKeyMap::from_names([("CapsLock", "ctrl"), ("Bogus", "ctrl"), ("Meta", "hyper")]);
        assert_eq!(map.get(KeyCode::CAPS_LOCK), Some(Modifiers::CTRL));
        assert!(!map.is_modifier(KeyCode::META));
    }
}
