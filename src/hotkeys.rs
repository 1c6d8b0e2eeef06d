//! OS key grabs through the `global-hotkey` crate.
//!
//! The OS hotkey API only reports chords it was asked to grab, so the
//! forwarder turns each hotkey press/release back into the raw key events the
//! registry expects: modifier downs, key down, key up, modifier ups.

use global_hotkey::{
    hotkey::{Code, HotKey, Modifiers as HotkeyModifiers},
    Error as HotkeyError, GlobalHotKeyEvent, GlobalHotKeyManager, HotKeyState,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{debug, info, warn};

use crate::service::{InputEvent, RegistryHandle};
use crate::shortcuts::{Key, KeyCode, KeyGrabber, Modifiers};

/// Hotkey ID -> grabbed key, shared between the grabber and the forwarder.
pub type HotkeyBindings = Arc<Mutex<HashMap<u32, Key>>>;

/// [`KeyGrabber`] backed by the OS global hotkey API.
pub struct GlobalHotkeyGrabber {
    /// The underlying global hotkey manager
    manager: GlobalHotKeyManager,
    /// Maps grabbed key -> HotKey object (needed for proper unregistration)
    hotkeys: HashMap<Key, HotKey>,
    bindings: HotkeyBindings,
}

impl GlobalHotkeyGrabber {
    /// NOTE: on macOS this must run on the thread that owns the event loop.
    pub fn new() -> anyhow::Result<Self> {
        let manager = GlobalHotKeyManager::new()
            .map_err(|e| anyhow::anyhow!("Failed to create hotkey manager: {}", e))?;
        Ok(Self {
            manager,
            hotkeys: HashMap::new(),
            bindings: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    pub fn bindings(&self) -> HotkeyBindings {
        Arc::clone(&self.bindings)
    }
}

impl KeyGrabber for GlobalHotkeyGrabber {
    fn grab_key(&mut self, key: Key, grab: bool) -> bool {
        // Bare modifiers cannot be grabbed as hotkeys; the backend still
        // delivers them as plain key events.
        if key.is_modifier_only() {
            debug!(key = %key, "Modifier-only key, nothing to grab");
            return true;
        }

        if !grab {
            if let Some(hotkey) = self.hotkeys.remove(&key) {
                self.bindings.lock().remove(&hotkey.id());
                if let Err(e) = self.manager.unregister(hotkey) {
                    warn!(key = %key, error = %e, "Failed to unregister hotkey");
                    return false;
                }
                debug!(key = %key, "Hotkey unregistered");
            }
            return true;
        }

        let Some(code) = to_hotkey_code(key.code) else {
            warn!(key = %key, "Key has no OS hotkey equivalent");
            return false;
        };
        let hotkey = HotKey::new(Some(to_hotkey_modifiers(key.modifiers)), code);
        if let Err(e) = self.manager.register(hotkey) {
            warn!("{}", format_hotkey_error(&e, &key.to_string()));
            return false;
        }
        self.bindings.lock().insert(hotkey.id(), key);
        self.hotkeys.insert(key, hotkey);
        info!(key = %key, id = hotkey.id(), "Hotkey registered");
        true
    }
}

fn format_hotkey_error(e: &HotkeyError, shortcut_display: &str) -> String {
    match e {
        HotkeyError::AlreadyRegistered(hk) => format!(
            "Hotkey '{}' is already registered by another application (id: {})",
            shortcut_display,
            hk.id()
        ),
        HotkeyError::FailedToRegister(msg) => format!(
            "System rejected hotkey '{}': {}. It may be reserved by the desktop.",
            shortcut_display, msg
        ),
        HotkeyError::OsError(os_err) => {
            format!("OS error registering '{}': {}", shortcut_display, os_err)
        }
        other => format!("Failed to register hotkey '{}': {}", shortcut_display, other),
    }
}

fn to_hotkey_modifiers(modifiers: Modifiers) -> HotkeyModifiers {
    let mut out = HotkeyModifiers::empty();
    if modifiers.contains(Modifiers::META) {
        out |= HotkeyModifiers::META;
    }
    if modifiers.contains(Modifiers::CTRL) {
        out |= HotkeyModifiers::CONTROL;
    }
    if modifiers.contains(Modifiers::ALT) {
        out |= HotkeyModifiers::ALT;
    }
    if modifiers.contains(Modifiers::SHIFT) {
        out |= HotkeyModifiers::SHIFT;
    }
    out
}

fn to_hotkey_code(code: KeyCode) -> Option<Code> {
    const LETTERS: [Code; 26] = [
        Code::KeyA,
        Code::KeyB,
        Code::KeyC,
        Code::KeyD,
        Code::KeyE,
        Code::KeyF,
        Code::KeyG,
        Code::KeyH,
        Code::KeyI,
        Code::KeyJ,
        Code::KeyK,
        Code::KeyL,
        Code::KeyM,
        Code::KeyN,
        Code::KeyO,
        Code::KeyP,
        Code::KeyQ,
        Code::KeyR,
        Code::KeyS,
        Code::KeyT,
        Code::KeyU,
        Code::KeyV,
        Code::KeyW,
        Code::KeyX,
        Code::KeyY,
        Code::KeyZ,
    ];
    const DIGITS: [Code; 10] = [
        Code::Digit0,
        Code::Digit1,
        Code::Digit2,
        Code::Digit3,
        Code::Digit4,
        Code::Digit5,
        Code::Digit6,
        Code::Digit7,
        Code::Digit8,
        Code::Digit9,
    ];
    const FUNCTION: [Code; 12] = [
        Code::F1,
        Code::F2,
        Code::F3,
        Code::F4,
        Code::F5,
        Code::F6,
        Code::F7,
        Code::F8,
        Code::F9,
        Code::F10,
        Code::F11,
        Code::F12,
    ];

    let value = code.0;
    if (u32::from(b'A')..=u32::from(b'Z')).contains(&value) {
        return Some(LETTERS[(value - u32::from(b'A')) as usize]);
    }
    if (u32::from(b'0')..=u32::from(b'9')).contains(&value) {
        return Some(DIGITS[(value - u32::from(b'0')) as usize]);
    }
    if (KeyCode::F1.0..KeyCode::F1.0 + 12).contains(&value) {
        return Some(FUNCTION[(value - KeyCode::F1.0) as usize]);
    }

    let named = match code {
        KeyCode::SPACE => Code::Space,
        KeyCode::COMMA => Code::Comma,
        KeyCode::ESCAPE => Code::Escape,
        KeyCode::TAB => Code::Tab,
        KeyCode::BACKSPACE => Code::Backspace,
        KeyCode::RETURN | KeyCode::ENTER => Code::Enter,
        KeyCode::INSERT => Code::Insert,
        KeyCode::DELETE => Code::Delete,
        KeyCode::PAUSE => Code::Pause,
        KeyCode::PRINT => Code::PrintScreen,
        KeyCode::HOME => Code::Home,
        KeyCode::END => Code::End,
        KeyCode::LEFT => Code::ArrowLeft,
        KeyCode::UP => Code::ArrowUp,
        KeyCode::RIGHT => Code::ArrowRight,
        KeyCode::DOWN => Code::ArrowDown,
        KeyCode::PAGE_UP => Code::PageUp,
        KeyCode::PAGE_DOWN => Code::PageDown,
        KeyCode::VOLUME_DOWN => Code::AudioVolumeDown,
        KeyCode::VOLUME_MUTE => Code::AudioVolumeMute,
        KeyCode::VOLUME_UP => Code::AudioVolumeUp,
        KeyCode::MEDIA_PLAY => Code::MediaPlayPause,
        KeyCode::MEDIA_STOP => Code::MediaStop,
        KeyCode::MEDIA_PREVIOUS => Code::MediaTrackPrevious,
        KeyCode::MEDIA_NEXT => Code::MediaTrackNext,
        _ => return None,
    };
    Some(named)
}

/// Raw key events equivalent to one OS hotkey press or release.
fn synthesize(key: Key, state: HotKeyState) -> Vec<InputEvent> {
    let modifier_codes: Vec<KeyCode> = key
        .modifiers
        .iter()
        .filter_map(Modifiers::key_code)
        .collect();
    match state {
        HotKeyState::Pressed => modifier_codes
            .into_iter()
            .map(InputEvent::KeyDown)
            .chain(std::iter::once(InputEvent::KeyDown(key.code)))
            .collect(),
        HotKeyState::Released => std::iter::once(InputEvent::KeyUp(key.code))
            .chain(modifier_codes.into_iter().rev().map(InputEvent::KeyUp))
            .collect(),
    }
}

/// Forward OS hotkey events into the registry service.
pub fn start_hotkey_forwarder(
    bindings: HotkeyBindings,
    handle: RegistryHandle,
) -> std::io::Result<JoinHandle<()>> {
    std::thread::Builder::new()
        .name("global-accel-hotkeys".to_string())
        .spawn(move || {
            let receiver = GlobalHotKeyEvent::receiver();
            info!("Hotkey forwarder started");

            while let Ok(event) = receiver.recv() {
                let Some(key) = bindings.lock().get(&event.id).copied() else {
                    debug!(id = event.id, "Event for unknown hotkey id");
                    continue;
                };
                debug!(key = %key, state = ?event.state, "OS hotkey event");
                for input in synthesize(key, event.state) {
                    if handle.send_input(input).is_err() {
                        info!("Registry service gone, hotkey forwarder exiting");
                        return;
                    }
                }
            }
            info!("Hotkey event channel closed");
        })
}
