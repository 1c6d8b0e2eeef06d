//! External command handling via stdin.
//!
//! `global-acceld` is driven by JSONL commands on stdin. This is how input
//! backends without an OS grab feed key events in, and how tests and scripts
//! register shortcuts.
//!
//! # Protocol
//!
//! Commands are sent as JSON objects, one per line (JSONL format):
//!
//! ```json
//! {"type": "register", "component": "konsole", "action": "NewTab", "keys": "Ctrl+Alt+T"}
//! {"type": "keyDown", "key": "Ctrl"}
//! {"type": "keyUp", "key": "T"}
//! {"type": "activateContext", "component": "plasmashell", "context": "activities"}
//! {"type": "save"}
//! ```
//!
//! # Example Usage
//!
//! ```bash
//! printf '%s\n' \
//!   '{"type": "register", "component": "konsole", "action": "NewTab", "keys": "Ctrl+Alt+T"}' \
//!   '{"type": "keyDown", "key": "Ctrl"}' \
//!   '{"type": "keyDown", "key": "Alt"}' \
//!   '{"type": "keyDown", "key": "T"}' | global-acceld
//! ```

use tracing::{debug, info, warn};

use crate::service::InputEvent;
use crate::shortcuts::{KeyCode, KeyParseError, ShortcutRequest, DEFAULT_CONTEXT};

fn default_context() -> String {
    DEFAULT_CONTEXT.to_string()
}

/// External commands accepted on stdin.
///
/// Every command takes an optional `requestId`, echoed in the reply line and
/// attached to the log records of that command.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ExternalCommand {
    /// Register or update an action
    Register {
        component: String,
        action: String,
        /// Canonical key string; omitted keeps the current keys
        #[serde(default)]
        keys: Option<String>,
        #[serde(default = "default_context")]
        context: String,
        #[serde(default, rename = "friendlyName")]
        friendly_name: Option<String>,
        #[serde(default, rename = "componentFriendlyName")]
        component_friendly_name: Option<String>,
        #[serde(default, rename = "defaultKeys")]
        default_keys: Option<String>,
        #[serde(default, rename = "requestId")]
        request_id: Option<String>,
    },
    /// Remove an action for good
    Unregister {
        component: String,
        action: String,
        #[serde(default = "default_context")]
        context: String,
        #[serde(default, rename = "requestId")]
        request_id: Option<String>,
    },
    /// key: Key name like "Ctrl", "T", "F5", "Space"
    KeyDown {
        key: String,
        #[serde(default, rename = "requestId")]
        request_id: Option<String>,
    },
    KeyUp {
        key: String,
        #[serde(default, rename = "requestId")]
        request_id: Option<String>,
    },
    /// Pointer button press; buttons is the held button mask
    Pointer {
        buttons: u32,
        #[serde(default, rename = "requestId")]
        request_id: Option<String>,
    },
    /// Scroll or other axis event
    Axis {
        axis: u32,
        #[serde(default, rename = "requestId")]
        request_id: Option<String>,
    },
    /// Forget held keys (focus or session change)
    Reset {
        #[serde(default, rename = "requestId")]
        request_id: Option<String>,
    },
    ActivateContext {
        component: String,
        context: String,
        #[serde(default, rename = "requestId")]
        request_id: Option<String>,
    },
    /// Mark a component's owner as running or gone
    SetPresent {
        component: String,
        present: bool,
        #[serde(default, rename = "requestId")]
        request_id: Option<String>,
    },
    /// Grab every active shortcut again
    ActivateAll {
        #[serde(default, rename = "requestId")]
        request_id: Option<String>,
    },
    /// Release every grab; temporarily keeps shortcuts marked active
    DeactivateAll {
        #[serde(default)]
        temporarily: bool,
        #[serde(default, rename = "requestId")]
        request_id: Option<String>,
    },
    /// Write the shortcut file now
    Save {
        #[serde(default, rename = "requestId")]
        request_id: Option<String>,
    },
    /// Print every registered shortcut
    List {
        #[serde(default, rename = "requestId")]
        request_id: Option<String>,
    },
}

impl ExternalCommand {
    pub fn request_id(&self) -> Option<&str> {
        match self {
            Self::Register { request_id, .. }
            | Self::Unregister { request_id, .. }
            | Self::KeyDown { request_id, .. }
            | Self::KeyUp { request_id, .. }
            | Self::Pointer { request_id, .. }
            | Self::Axis { request_id, .. }
            | Self::Reset { request_id }
            | Self::ActivateContext { request_id, .. }
            | Self::SetPresent { request_id, .. }
            | Self::ActivateAll { request_id }
            | Self::DeactivateAll { request_id, .. }
            | Self::Save { request_id }
            | Self::List { request_id } => request_id.as_deref(),
        }
    }

    /// The raw input event carried by an input command, `None` for the rest.
    pub fn input_event(&self) -> Option<Result<InputEvent, KeyParseError>> {
        let event = match self {
            Self::KeyDown { key, .. } => parse_key_code(key).map(InputEvent::KeyDown),
            Self::KeyUp { key, .. } => parse_key_code(key).map(InputEvent::KeyUp),
            Self::Pointer { buttons, .. } => Ok(InputEvent::Pointer(*buttons)),
            Self::Axis { axis, .. } => Ok(InputEvent::Axis(*axis)),
            Self::Reset { .. } => Ok(InputEvent::Reset),
            _ => return None,
        };
        Some(event)
    }

    /// The registration request of a `register` command.
    pub fn shortcut_request(&self) -> Option<Result<ShortcutRequest, KeyParseError>> {
        let Self::Register {
            component,
            action,
            keys,
            context,
            friendly_name,
            component_friendly_name,
            default_keys,
            ..
        } = self
        else {
            return None;
        };

        let build = || -> Result<ShortcutRequest, KeyParseError> {
            let mut request = ShortcutRequest::new(component.as_str(), action.as_str())
                .context(context.as_str());
            if let Some(keys) = keys {
                request = request.keys(keys.parse()?);
            }
            if let Some(default_keys) = default_keys {
                request = request.default_keys(default_keys.parse()?);
            }
            if let Some(name) = friendly_name {
                request = request.friendly_name(name.as_str());
            }
            if let Some(name) = component_friendly_name {
                request = request.component_friendly_name(name.as_str());
            }
            Ok(request)
        };
        Some(build())
    }
}

fn parse_key_code(name: &str) -> Result<KeyCode, KeyParseError> {
    KeyCode::from_name(name).ok_or_else(|| KeyParseError::UnknownKey(name.to_string()))
}

/// Start a thread that listens on stdin for external JSONL commands.
/// Returns an async_channel::Receiver that can be awaited without polling.
///
/// Uses a bounded channel with capacity of 100; a slow consumer blocks the
/// reader instead of growing memory. The thread exits on EOF or when the
/// receiver is dropped, which closes the channel.
pub fn start_stdin_listener() -> async_channel::Receiver<ExternalCommand> {
    use std::io::BufRead;

    let (tx, rx) = async_channel::bounded(100);

    std::thread::spawn(move || {
        info!("External command listener started");
        let stdin = std::io::stdin();
        let reader = stdin.lock();

        for line in reader.lines() {
            match line {
                Ok(line) if !line.trim().is_empty() => {
                    debug!(line = %line, "Received");
                    match serde_json::from_str::<ExternalCommand>(&line) {
                        Ok(cmd) => {
                            // send_blocking is used since we're in a sync thread
                            if tx.send_blocking(cmd).is_err() {
                                info!("Command channel closed, exiting");
                                break;
                            }
                        }
                        Err(e) => {
                            warn!(error = %e, line = %line, "Failed to parse command");
                        }
                    }
                }
                Ok(_) => {} // Empty line, ignore
                Err(e) => {
                    warn!(error = %e, "Error reading stdin");
                    break;
                }
            }
        }
        info!("External command listener exiting");
    });

    rx
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_deserialization() {
        let json = r#"{"type": "register", "component": "konsole", "action": "NewTab", "keys": "Ctrl+Alt+T"}"#;
        let cmd: ExternalCommand = serde_json::from_str(json).unwrap();
        match cmd {
            ExternalCommand::Register {
                component,
                action,
                keys,
                context,
                request_id,
                ..
            } => {
                assert_eq!(component, "konsole");
                assert_eq!(action, "NewTab");
                assert_eq!(keys.as_deref(), Some("Ctrl+Alt+T"));
                assert_eq!(context, "default");
                assert!(request_id.is_none());
            }
            _ => panic!("Expected Register command"),
        }
    }

    #[test]
    fn test_register_builds_request() {
        let json = r#"{"type": "register", "component": "kwin", "action": "Overview",
            "keys": "Meta+W", "defaultKeys": "Meta+W", "friendlyName": "Toggle Overview",
            "context": "desktop"}"#;
        let cmd: ExternalCommand = serde_json::from_str(json).unwrap();
        let request = cmd.shortcut_request().unwrap().unwrap();
        assert_eq!(request.component, "kwin");
        assert_eq!(request.context.as_deref(), Some("desktop"));
        assert_eq!(request.keys, Some("Meta+W".parse().unwrap()));
        assert_eq!(request.default_keys, Some("Meta+W".parse().unwrap()));
        assert_eq!(request.friendly_name.as_deref(), Some("Toggle Overview"));
    }

    #[test]
    fn test_register_with_bad_keys_is_an_error() {
        let json = r#"{"type": "register", "component": "a", "action": "b", "keys": "Ctrl+Nope"}"#;
        let cmd: ExternalCommand = serde_json::from_str(json).unwrap();
        assert!(matches!(
            cmd.shortcut_request(),
            Some(Err(KeyParseError::UnknownKey(_)))
        ));
    }

    #[test]
    fn test_key_events() {
        let down: ExternalCommand =
            serde_json::from_str(r#"{"type": "keyDown", "key": "Ctrl", "requestId": "req-1"}"#)
                .unwrap();
        assert_eq!(down.request_id(), Some("req-1"));
        assert_eq!(
            down.input_event(),
            Some(Ok(InputEvent::KeyDown(KeyCode::CONTROL)))
        );

        let up: ExternalCommand = serde_json::from_str(r#"{"type": "keyUp", "key": "t"}"#).unwrap();
        assert_eq!(
            up.input_event(),
            Some(Ok(InputEvent::KeyUp(KeyCode::from_char('t'))))
        );

        let bad: ExternalCommand =
            serde_json::from_str(r#"{"type": "keyDown", "key": "NoSuchKey"}"#).unwrap();
        assert!(matches!(bad.input_event(), Some(Err(_))));
    }

    #[test]
    fn test_pointer_axis_and_reset() {
        let pointer: ExternalCommand =
            serde_json::from_str(r#"{"type": "pointer", "buttons": 1}"#).unwrap();
        assert_eq!(pointer.input_event(), Some(Ok(InputEvent::Pointer(1))));

        let axis: ExternalCommand = serde_json::from_str(r#"{"type": "axis", "axis": 0}"#).unwrap();
        assert_eq!(axis.input_event(), Some(Ok(InputEvent::Axis(0))));

        let reset: ExternalCommand = serde_json::from_str(r#"{"type": "reset"}"#).unwrap();
        assert_eq!(reset.input_event(), Some(Ok(InputEvent::Reset)));
    }

    #[test]
    fn test_management_commands_carry_no_input() {
        let cmd: ExternalCommand = serde_json::from_str(
            r#"{"type": "setPresent", "component": "konsole", "present": false}"#,
        )
        .unwrap();
        assert_eq!(
            cmd,
            ExternalCommand::SetPresent {
                component: "konsole".to_string(),
                present: false,
                request_id: None,
            }
        );
        assert!(cmd.input_event().is_none());
        assert!(cmd.shortcut_request().is_none());
    }

    #[test]
    fn test_deactivate_all_defaults_to_permanent() {
        let cmd: ExternalCommand = serde_json::from_str(r#"{"type": "deactivateAll"}"#).unwrap();
        assert!(matches!(
            cmd,
            ExternalCommand::DeactivateAll {
                temporarily: false,
                ..
            }
        ));
    }

    #[test]
    fn test_unknown_command_type() {
        let result = serde_json::from_str::<ExternalCommand>(r#"{"type": "explode"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_required_field() {
        let result = serde_json::from_str::<ExternalCommand>(r#"{"type": "keyDown"}"#);
        assert!(result.is_err());
    }
}
