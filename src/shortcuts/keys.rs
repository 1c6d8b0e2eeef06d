//! Key model with proper error handling and canonical text form.
//!
//! This module provides:
//! - `Modifiers` - Modifier flags (Meta, Ctrl, Alt, Shift)
//! - `KeyCode` - A key identity as delivered by the input backend
//! - `Key` - A key code together with the modifiers held while it was pressed
//! - `KeyCombination` - One to four keys pressed in sequence
//! - `MatchType` - How a queried combination is compared to a registered one
//! - `KeyParseError` - Detailed parse errors for user feedback
//!
//! The canonical text form is `Meta+Ctrl+Alt+Shift+Key`, with sequence steps
//! separated by `", "`. Parsing accepts the usual aliases case-insensitively.

use std::fmt;
use std::str::FromStr;

use bitflags::bitflags;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use smallvec::SmallVec;
use thiserror::Error;

/// Maximum number of keys in one combination.
pub const MAX_SEQUENCE_LENGTH: usize = 4;

/// Errors that can occur when parsing a key combination string.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyParseError {
    #[error("key combination string is empty")]
    Empty,
    #[error("unknown key '{0}'")]
    UnknownKey(String),
    #[error("unexpected token '{token}', key '{key}' was already given")]
    UnexpectedToken { token: String, key: String },
    #[error("a combination holds at most 4 keys, got {0}")]
    TooManyKeys(usize),
    #[error("modifier-only key '{0}' cannot be part of a sequence")]
    ModifierOnlyInSequence(String),
}

bitflags! {
    /// Modifier flags held together with a key.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
    pub struct Modifiers: u8 {
        /// Meta / Super / Windows / Command
        const META = 1 << 0;
        const CTRL = 1 << 1;
        const ALT = 1 << 2;
        const SHIFT = 1 << 3;
    }
}

impl Modifiers {
    /// Resolve a single modifier token (`ctrl`, `super`, `option`, ...).
    pub fn from_alias(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "meta" | "super" | "win" | "cmd" | "command" | "logo" => Some(Self::META),
            "ctrl" | "control" | "ctl" => Some(Self::CTRL),
            "alt" | "option" | "opt" => Some(Self::ALT),
            "shift" => Some(Self::SHIFT),
            _ => None,
        }
    }

    /// Display names in canonical order.
    pub fn names(self) -> Vec<&'static str> {
        let mut names = Vec::with_capacity(4);
        if self.contains(Self::META) {
            names.push("Meta");
        }
        if self.contains(Self::CTRL) {
            names.push("Ctrl");
        }
        if self.contains(Self::ALT) {
            names.push("Alt");
        }
        if self.contains(Self::SHIFT) {
            names.push("Shift");
        }
        names
    }

    /// The key code of the physical key that produces this single modifier.
    pub fn key_code(self) -> Option<KeyCode> {
        if self == Self::META {
            Some(KeyCode::META)
        } else if self == Self::CTRL {
            Some(KeyCode::CONTROL)
        } else if self == Self::ALT {
            Some(KeyCode::ALT)
        } else if self == Self::SHIFT {
            Some(KeyCode::SHIFT)
        } else {
            None
        }
    }
}

/// A key identity. Printable keys use their uppercase code point, named keys
/// live in a reserved range above the Unicode planes used for printable keys.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeyCode(pub u32);

impl KeyCode {
    /// No key: used by modifier-only combinations.
    pub const NONE: KeyCode = KeyCode(0);
    const NAMED_BASE: u32 = 0x0100_0000;

    pub const SPACE: KeyCode = KeyCode(0x20);
    pub const PLUS: KeyCode = KeyCode(0x2b);
    pub const COMMA: KeyCode = KeyCode(0x2c);

    pub const ESCAPE: KeyCode = KeyCode(0x0100_0000);
    pub const TAB: KeyCode = KeyCode(0x0100_0001);
    pub const BACKSPACE: KeyCode = KeyCode(0x0100_0003);
    pub const RETURN: KeyCode = KeyCode(0x0100_0004);
    pub const ENTER: KeyCode = KeyCode(0x0100_0005);
    pub const INSERT: KeyCode = KeyCode(0x0100_0006);
    pub const DELETE: KeyCode = KeyCode(0x0100_0007);
    pub const PAUSE: KeyCode = KeyCode(0x0100_0008);
    pub const PRINT: KeyCode = KeyCode(0x0100_0009);
    pub const HOME: KeyCode = KeyCode(0x0100_0010);
    pub const END: KeyCode = KeyCode(0x0100_0011);
    pub const LEFT: KeyCode = KeyCode(0x0100_0012);
    pub const UP: KeyCode = KeyCode(0x0100_0013);
    pub const RIGHT: KeyCode = KeyCode(0x0100_0014);
    pub const DOWN: KeyCode = KeyCode(0x0100_0015);
    pub const PAGE_UP: KeyCode = KeyCode(0x0100_0016);
    pub const PAGE_DOWN: KeyCode = KeyCode(0x0100_0017);
    pub const SHIFT: KeyCode = KeyCode(0x0100_0020);
    pub const CONTROL: KeyCode = KeyCode(0x0100_0021);
    pub const META: KeyCode = KeyCode(0x0100_0022);
    pub const ALT: KeyCode = KeyCode(0x0100_0023);
    pub const CAPS_LOCK: KeyCode = KeyCode(0x0100_0024);
    pub const NUM_LOCK: KeyCode = KeyCode(0x0100_0025);
    pub const SCROLL_LOCK: KeyCode = KeyCode(0x0100_0026);
    pub const F1: KeyCode = KeyCode(0x0100_0030);
    pub const F35: KeyCode = KeyCode(0x0100_0052);
    pub const MENU: KeyCode = KeyCode(0x0100_0055);
    pub const VOLUME_DOWN: KeyCode = KeyCode(0x0100_0070);
    pub const VOLUME_MUTE: KeyCode = KeyCode(0x0100_0071);
    pub const VOLUME_UP: KeyCode = KeyCode(0x0100_0072);
    pub const MEDIA_PLAY: KeyCode = KeyCode(0x0100_0080);
    pub const MEDIA_STOP: KeyCode = KeyCode(0x0100_0081);
    pub const MEDIA_PREVIOUS: KeyCode = KeyCode(0x0100_0082);
    pub const MEDIA_NEXT: KeyCode = KeyCode(0x0100_0083);
    pub const ALT_GR: KeyCode = KeyCode(0x0100_1103);

    /// Function key `F{n}`, `n` in `1..=35`.
    pub fn function(n: u32) -> Option<KeyCode> {
        (1..=35)
            .contains(&n)
            .then(|| KeyCode(Self::F1.0 + n - 1))
    }

    /// The key producing `c`, case-folded to uppercase.
    pub fn from_char(c: char) -> KeyCode {
        let upper = c.to_uppercase().next().unwrap_or(c);
        KeyCode(upper as u32)
    }

    /// Resolve a key name or alias. Single characters map to their key.
    pub fn from_name(name: &str) -> Option<KeyCode> {
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        let lower = name.to_ascii_lowercase();

        for (code, canonical, aliases) in NAMED_KEYS {
            if canonical.eq_ignore_ascii_case(&lower) || aliases.contains(&lower.as_str()) {
                return Some(*code);
            }
        }

        if let Some(n) = lower.strip_prefix('f').and_then(|d| d.parse::<u32>().ok()) {
            return Self::function(n);
        }
        if let Some(hex) = lower.strip_prefix("0x") {
            return u32::from_str_radix(hex, 16).ok().map(KeyCode);
        }

        let mut chars = name.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) if !c.is_whitespace() && c != '+' && c != ',' => {
                Some(Self::from_char(c))
            }
            _ => None,
        }
    }

    /// Canonical name, the inverse of [`KeyCode::from_name`].
    pub fn name(self) -> String {
        if let Some((_, canonical, _)) = NAMED_KEYS.iter().find(|(code, ..)| *code == self) {
            return (*canonical).to_string();
        }
        if (Self::F1.0..=Self::F35.0).contains(&self.0) {
            return format!("F{}", self.0 - Self::F1.0 + 1);
        }
        match char::from_u32(self.0) {
            Some(c) if self.0 < Self::NAMED_BASE && !c.is_control() && !c.is_whitespace() => {
                c.to_string()
            }
            _ => format!("0x{:x}", self.0),
        }
    }
}

/// Named keys: (code, canonical name, lowercase aliases).
const NAMED_KEYS: &[(KeyCode, &str, &[&str])] = &[
    (KeyCode::SPACE, "Space", &[]),
    (KeyCode::PLUS, "Plus", &[]),
    (KeyCode::COMMA, "Comma", &[]),
    (KeyCode::ESCAPE, "Esc", &["escape"]),
    (KeyCode::TAB, "Tab", &[]),
    (KeyCode::BACKSPACE, "Backspace", &["back"]),
    (KeyCode::RETURN, "Return", &[]),
    (KeyCode::ENTER, "Enter", &[]),
    (KeyCode::INSERT, "Ins", &["insert"]),
    (KeyCode::DELETE, "Del", &["delete"]),
    (KeyCode::PAUSE, "Pause", &[]),
    (KeyCode::PRINT, "Print", &["printscreen", "prtsc"]),
    (KeyCode::HOME, "Home", &[]),
    (KeyCode::END, "End", &[]),
    (KeyCode::LEFT, "Left", &["arrowleft"]),
    (KeyCode::UP, "Up", &["arrowup"]),
    (KeyCode::RIGHT, "Right", &["arrowright"]),
    (KeyCode::DOWN, "Down", &["arrowdown"]),
    (KeyCode::PAGE_UP, "PgUp", &["pageup"]),
    (KeyCode::PAGE_DOWN, "PgDown", &["pagedown", "pgdn"]),
    (KeyCode::SHIFT, "Shift", &[]),
    (KeyCode::CONTROL, "Control", &["ctrl"]),
    (KeyCode::META, "Meta", &["super", "win"]),
    (KeyCode::ALT, "Alt", &[]),
    (KeyCode::CAPS_LOCK, "CapsLock", &[]),
    (KeyCode::NUM_LOCK, "NumLock", &[]),
    (KeyCode::SCROLL_LOCK, "ScrollLock", &[]),
    (KeyCode::MENU, "Menu", &[]),
    (KeyCode::VOLUME_DOWN, "VolumeDown", &[]),
    (KeyCode::VOLUME_MUTE, "VolumeMute", &[]),
    (KeyCode::VOLUME_UP, "VolumeUp", &[]),
    (KeyCode::MEDIA_PLAY, "MediaPlay", &[]),
    (KeyCode::MEDIA_STOP, "MediaStop", &[]),
    (KeyCode::MEDIA_PREVIOUS, "MediaPrevious", &[]),
    (KeyCode::MEDIA_NEXT, "MediaNext", &[]),
    (KeyCode::ALT_GR, "AltGr", &[]),
];

/// One step of a combination: a key plus the modifiers held with it.
///
/// A key with [`KeyCode::NONE`] and a non-empty modifier set is a
/// modifier-only key (e.g. `Meta` alone).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Key {
    pub modifiers: Modifiers,
    pub code: KeyCode,
}

impl Key {
    pub fn new(code: KeyCode, modifiers: Modifiers) -> Self {
        Self { modifiers, code }
    }

    pub fn modifier_only(modifiers: Modifiers) -> Self {
        Self {
            modifiers,
            code: KeyCode::NONE,
        }
    }

    pub fn is_modifier_only(&self) -> bool {
        self.code == KeyCode::NONE && !self.modifiers.is_empty()
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts: Vec<String> = self
            .modifiers
            .names()
            .into_iter()
            .map(str::to_string)
            .collect();
        if self.code != KeyCode::NONE {
            parts.push(self.code.name());
        }
        f.write_str(&parts.join("+"))
    }
}

impl FromStr for Key {
    type Err = KeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(KeyParseError::Empty);
        }

        let mut modifiers = Modifiers::empty();
        let mut code: Option<(KeyCode, &str)> = None;

        for token in s.split('+').map(str::trim) {
            if token.is_empty() {
                return Err(KeyParseError::UnknownKey(s.to_string()));
            }
            if let Some(modifier) = Modifiers::from_alias(token) {
                modifiers |= modifier;
                continue;
            }
            if let Some((_, key)) = code {
                return Err(KeyParseError::UnexpectedToken {
                    token: token.to_string(),
                    key: key.to_string(),
                });
            }
            let parsed = KeyCode::from_name(token)
                .ok_or_else(|| KeyParseError::UnknownKey(token.to_string()))?;
            code = Some((parsed, token));
        }

        Ok(Key {
            modifiers,
            code: code.map(|(code, _)| code).unwrap_or(KeyCode::NONE),
        })
    }
}

/// An ordered sequence of one to four keys.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeyCombination {
    keys: SmallVec<[Key; MAX_SEQUENCE_LENGTH]>,
}

impl KeyCombination {
    /// Build a combination, rejecting sequences longer than four keys.
    pub fn new(keys: impl IntoIterator<Item = Key>) -> Result<Self, KeyParseError> {
        let keys: SmallVec<[Key; MAX_SEQUENCE_LENGTH]> = keys.into_iter().collect();
        if keys.is_empty() {
            return Err(KeyParseError::Empty);
        }
        if keys.len() > MAX_SEQUENCE_LENGTH {
            return Err(KeyParseError::TooManyKeys(keys.len()));
        }
        if keys.len() > 1 {
            if let Some(key) = keys.iter().find(|k| k.is_modifier_only()) {
                return Err(KeyParseError::ModifierOnlyInSequence(key.to_string()));
            }
        }
        Ok(Self { keys })
    }

    pub fn single(key: Key) -> Self {
        let mut keys = SmallVec::new();
        keys.push(key);
        Self { keys }
    }

    pub fn keys(&self) -> &[Key] {
        &self.keys
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn first(&self) -> Option<Key> {
        self.keys.first().copied()
    }

    pub fn is_modifier_only(&self) -> bool {
        self.keys.len() == 1 && self.keys[0].is_modifier_only()
    }

    /// True if `other` appears in `self` as a contiguous run of keys.
    pub fn contains(&self, other: &KeyCombination) -> bool {
        !other.is_empty()
            && other.len() <= self.len()
            && self
                .keys
                .windows(other.len())
                .any(|window| window == other.keys.as_slice())
    }

    /// The last `len` keys.
    pub fn suffix(&self, len: usize) -> KeyCombination {
        let start = self.keys.len().saturating_sub(len);
        KeyCombination {
            keys: self.keys[start..].iter().copied().collect(),
        }
    }

    /// Append a key, dropping the oldest one when the sequence is full.
    pub(crate) fn push_rotating(&mut self, key: Key) {
        if self.keys.len() == MAX_SEQUENCE_LENGTH {
            self.keys.remove(0);
        }
        self.keys.push(key);
    }

    pub(crate) fn clear(&mut self) {
        self.keys.clear();
    }
}

impl From<Key> for KeyCombination {
    fn from(key: Key) -> Self {
        Self::single(key)
    }
}

impl fmt::Display for KeyCombination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, key) in self.keys.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", key)?;
        }
        Ok(())
    }
}

impl FromStr for KeyCombination {
    type Err = KeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() {
            return Err(KeyParseError::Empty);
        }
        let steps: Vec<&str> = s.split(',').collect();
        if steps.len() > MAX_SEQUENCE_LENGTH {
            return Err(KeyParseError::TooManyKeys(steps.len()));
        }
        let keys = steps
            .into_iter()
            .map(str::parse::<Key>)
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(keys)
    }
}

impl Serialize for KeyCombination {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for KeyCombination {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// How a queried combination is compared against registered ones.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MatchType {
    /// The registered combination equals the query.
    #[default]
    Equal,
    /// The query shadows the registered combination: it appears inside it.
    Shadows,
    /// The query is shadowed: the registered combination appears inside it.
    Shadowed,
}

impl MatchType {
    pub fn matches(self, registered: &KeyCombination, query: &KeyCombination) -> bool {
        match self {
            MatchType::Equal => registered == query,
            MatchType::Shadows => registered != query && registered.contains(query),
            MatchType::Shadowed => registered != query && query.contains(registered),
        }
    }
}
