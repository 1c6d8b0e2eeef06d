//! Registry actor.
//!
//! One thread owns the [`GlobalShortcutsRegistry`]; every other thread talks to
//! it through a clonable [`RegistryHandle`]. Commands are applied in arrival
//! order, so input events and registration requests from different sources
//! never interleave inside an operation.

use std::thread::JoinHandle;
use std::time::Instant;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::error::RegistryError;
use crate::shortcuts::{
    GlobalShortcutsRegistry, KeyCode, LoadWarning, PersistedShortcut, ShortcutId,
    ShortcutRequest,
};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    #[error("registry service is not running")]
    Disconnected,
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// A raw input event from the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    KeyDown(KeyCode),
    KeyUp(KeyCode),
    /// Pointer button mask
    Pointer(u32),
    Axis(u32),
    /// Focus or session change: forget held keys
    Reset,
}

type Job = Box<dyn FnOnce(&mut GlobalShortcutsRegistry) + Send>;

enum Command {
    Input {
        event: InputEvent,
        at: Instant,
        reply: Option<async_channel::Sender<bool>>,
    },
    Exec(Job),
    Shutdown,
}

/// Clonable handle to the registry thread.
#[derive(Clone)]
pub struct RegistryHandle {
    tx: async_channel::Sender<Command>,
}

/// Start the registry thread.
pub fn spawn(
    registry: GlobalShortcutsRegistry,
) -> std::io::Result<(RegistryHandle, JoinHandle<()>)> {
    spawn_with(move || registry)
}

/// Start the registry thread, building the registry on it. Use this when the
/// key grabber must be created on the thread that drives it.
pub fn spawn_with<F>(factory: F) -> std::io::Result<(RegistryHandle, JoinHandle<()>)>
where
    F: FnOnce() -> GlobalShortcutsRegistry + Send + 'static,
{
    let (tx, rx) = async_channel::unbounded::<Command>();

    let join = std::thread::Builder::new()
        .name("global-accel-registry".to_string())
        .spawn(move || {
            let mut registry = factory();
            info!("Registry service started");

            while let Ok(command) = rx.recv_blocking() {
                match command {
                    Command::Input { event, at, reply } => {
                        let consumed = apply_input(&mut registry, event, at);
                        if let Some(reply) = reply {
                            // Caller may have given up waiting
                            let _ = reply.try_send(consumed);
                        }
                    }
                    Command::Exec(job) => job(&mut registry),
                    Command::Shutdown => break,
                }
            }

            registry.deactivate_shortcuts(true);
            info!("Registry service stopped");
        })?;

    Ok((RegistryHandle { tx }, join))
}

fn apply_input(registry: &mut GlobalShortcutsRegistry, event: InputEvent, at: Instant) -> bool {
    match event {
        InputEvent::KeyDown(code) => registry.key_pressed_at(code, at),
        InputEvent::KeyUp(code) => registry.key_released_at(code, at),
        InputEvent::Pointer(buttons) => registry.pointer_pressed_at(buttons, at),
        InputEvent::Axis(axis) => registry.axis_triggered_at(axis, at),
        InputEvent::Reset => {
            registry.reset_input_state();
            false
        }
    }
}

impl RegistryHandle {
    /// Queue an input event, timestamped now, without waiting.
    pub fn send_input(&self, event: InputEvent) -> Result<(), ServiceError> {
        self.send(Command::Input {
            event,
            at: Instant::now(),
            reply: None,
        })
    }

    /// Apply an input event and report whether a shortcut consumed it.
    pub fn dispatch(&self, event: InputEvent) -> Result<bool, ServiceError> {
        let (reply, rx) = async_channel::bounded(1);
        self.send(Command::Input {
            event,
            at: Instant::now(),
            reply: Some(reply),
        })?;
        rx.recv_blocking().map_err(|_| ServiceError::Disconnected)
    }

    /// Run `f` on the registry thread and wait for its result.
    pub fn call<R, F>(&self, f: F) -> Result<R, ServiceError>
    where
        R: Send + 'static,
        F: FnOnce(&mut GlobalShortcutsRegistry) -> R + Send + 'static,
    {
        let (reply, rx) = async_channel::bounded(1);
        self.send(Command::Exec(Box::new(move |registry| {
            let _ = reply.try_send(f(registry));
        })))?;
        rx.recv_blocking().map_err(|_| ServiceError::Disconnected)
    }

    pub fn register_shortcut(&self, request: ShortcutRequest) -> Result<ShortcutId, ServiceError> {
        Ok(self.call(move |r| r.register_shortcut(request))??)
    }

    pub fn unregister_shortcut(
        &self,
        component: &str,
        context: &str,
        action: &str,
    ) -> Result<bool, ServiceError> {
        let (component, context, action) =
            (component.to_string(), context.to_string(), action.to_string());
        self.call(move |r| r.unregister_shortcut(&component, &context, &action))
    }

    pub fn activate_context(&self, component: &str, context: &str) -> Result<bool, ServiceError> {
        let (component, context) = (component.to_string(), context.to_string());
        self.call(move |r| r.activate_context(&component, &context))
    }

    pub fn set_component_present(&self, component: &str, present: bool) -> Result<bool, ServiceError> {
        let component = component.to_string();
        self.call(move |r| r.set_component_present(&component, present))
    }

    pub fn activate_shortcuts(&self) -> Result<(), ServiceError> {
        self.call(|r| r.activate_shortcuts())
    }

    pub fn deactivate_shortcuts(&self, temporarily: bool) -> Result<(), ServiceError> {
        self.call(move |r| r.deactivate_shortcuts(temporarily))
    }

    pub fn snapshot(&self) -> Result<Vec<PersistedShortcut>, ServiceError> {
        self.call(|r| r.snapshot())
    }

    pub fn load(&self, records: Vec<PersistedShortcut>) -> Result<Vec<LoadWarning>, ServiceError> {
        self.call(move |r| r.load(&records))
    }

    /// Ask the registry thread to release its grabs and exit.
    pub fn shutdown(&self) {
        if self.tx.try_send(Command::Shutdown).is_err() {
            debug!("Registry service already stopped");
        }
    }

    fn send(&self, command: Command) -> Result<(), ServiceError> {
        self.tx.try_send(command).map_err(|e| {
            warn!(error = %e, "Registry service unreachable");
            ServiceError::Disconnected
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::shortcuts::ShortcutEventKind;

    fn start() -> (
        RegistryHandle,
        JoinHandle<()>,
        async_channel::Receiver<crate::shortcuts::ShortcutEvent>,
    ) {
        let (registry, events) = GlobalShortcutsRegistry::new(&Config::default());
        let (handle, join) = spawn(registry).unwrap();
        (handle, join, events)
    }

    #[test]
    fn commands_are_applied_in_order() {
        let (handle, join, events) = start();

        handle
            .register_shortcut(
                ShortcutRequest::new("konsole", "NewTab").keys("Ctrl+Alt+T".parse().unwrap()),
            )
            .unwrap();
        handle.send_input(InputEvent::KeyDown(KeyCode::CONTROL)).unwrap();
        handle.send_input(InputEvent::KeyDown(KeyCode::ALT)).unwrap();
        assert!(handle
            .dispatch(InputEvent::KeyDown(KeyCode::from_char('t')))
            .unwrap());

        let event = events.try_recv().unwrap();
        assert_eq!(event.kind, ShortcutEventKind::Pressed);
        assert_eq!(event.action, "NewTab");

        handle.shutdown();
        join.join().unwrap();
    }

    #[test]
    fn collision_is_reported_through_the_handle() {
        let (handle, join, _events) = start();
        let keys: crate::shortcuts::KeyCombination = "Meta+L".parse().unwrap();

        handle
            .register_shortcut(ShortcutRequest::new("a", "Lock").keys(keys.clone()))
            .unwrap();
        let err = handle
            .register_shortcut(ShortcutRequest::new("b", "Launch").keys(keys))
            .unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Registry(RegistryError::Collision { .. })
        ));
        assert_eq!(handle.snapshot().unwrap().len(), 1);

        handle.shutdown();
        join.join().unwrap();
    }

    #[test]
    fn stopped_service_reports_disconnected() {
        let (handle, join, _events) = start();
        handle.shutdown();
        join.join().unwrap();

        assert_eq!(handle.activate_shortcuts(), Err(ServiceError::Disconnected));
        assert_eq!(
            handle.send_input(InputEvent::Reset),
            Err(ServiceError::Disconnected)
        );
    }
}
