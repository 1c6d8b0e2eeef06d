//! `global-acceld`: the global shortcut daemon.
//!
//! Reads JSONL commands on stdin (see [`global_accel::stdin_commands`]) and
//! prints one JSON line per shortcut event and per command reply on stdout.
//! Registered shortcuts are restored on start and saved on exit.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::thread::JoinHandle;

use anyhow::Context as _;
use clap::Parser;
use serde::Serialize;
use tracing::{info, info_span, warn};

use global_accel::config::{self, Config};
use global_accel::error::ResultExt;
use global_accel::logging;
use global_accel::service::{self, RegistryHandle, ServiceError};
use global_accel::shortcuts::{
    GlobalShortcutsRegistry, InputTracker, PersistedShortcut, ShortcutEvent, ShortcutStore,
};
use global_accel::stdin_commands::{self, ExternalCommand};

#[derive(Parser)]
#[command(name = "global-acceld")]
#[command(about = "Global keyboard shortcut daemon", version)]
struct Cli {
    /// Path to the JSON config file
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Path to the shortcut file (overrides `shortcutsPath` from the config)
    #[arg(long, short = 's')]
    shortcuts: Option<PathBuf>,
}

/// One line of daemon output.
#[derive(Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
enum Output<'a> {
    Shortcut(&'a ShortcutEvent),
    Ok {
        #[serde(rename = "requestId", skip_serializing_if = "Option::is_none")]
        request_id: Option<&'a str>,
        /// Input commands only: whether a shortcut consumed the event
        #[serde(skip_serializing_if = "Option::is_none")]
        consumed: Option<bool>,
    },
    List {
        #[serde(rename = "requestId", skip_serializing_if = "Option::is_none")]
        request_id: Option<&'a str>,
        shortcuts: Vec<PersistedShortcut>,
    },
    Error {
        #[serde(rename = "requestId", skip_serializing_if = "Option::is_none")]
        request_id: Option<&'a str>,
        message: String,
    },
}

fn emit(output: &Output<'_>) {
    let line = match serde_json::to_string(output) {
        Ok(line) => line,
        Err(e) => {
            warn!(error = %e, "Failed to serialize output line");
            return;
        }
    };
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{}", line)
        .and_then(|()| stdout.flush())
        .warn_on_err();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _guard = logging::init();

    let config = match &cli.config {
        Some(path) => config::load_config_from(path),
        None => config::load_config(),
    };
    let shortcuts_path = cli.shortcuts.unwrap_or_else(|| config.shortcuts_path());
    info!(
        shortcuts_path = %shortcuts_path.display(),
        modifier_only_enabled = config.modifier_only_enabled,
        "Starting global-acceld"
    );

    let (events_tx, events_rx) = async_channel::unbounded::<ShortcutEvent>();
    let (handle, registry_thread) = start_service(config, events_tx)?;

    let printer = std::thread::Builder::new()
        .name("global-accel-events".to_string())
        .spawn(move || {
            while let Ok(event) = events_rx.recv_blocking() {
                logging::log_shortcut_event(&event);
                emit(&Output::Shortcut(&event));
            }
        })
        .context("Failed to start event printer thread")?;

    restore_shortcuts(&handle, &shortcuts_path);

    let commands = stdin_commands::start_stdin_listener();
    while let Ok(command) = commands.recv_blocking() {
        let _span = info_span!("command", request_id = command.request_id()).entered();
        let request_id = command.request_id();
        let output = match execute(&command, &handle, &shortcuts_path) {
            Ok(output) => output,
            Err(e) => {
                warn!(error = %e, "Command failed");
                Output::Error {
                    request_id,
                    message: e.to_string(),
                }
            }
        };
        emit(&output);
    }
    info!("stdin closed, shutting down");

    save_shortcuts(&handle, &shortcuts_path).log_err();
    handle.shutdown();
    if registry_thread.join().is_err() {
        warn!("Registry thread panicked");
    }
    // The registry owned the last event sender, so the printer drains and exits
    if printer.join().is_err() {
        warn!("Event printer thread panicked");
    }
    Ok(())
}

#[cfg(not(feature = "global-hotkey"))]
fn start_service(
    config: Config,
    events: async_channel::Sender<ShortcutEvent>,
) -> anyhow::Result<(RegistryHandle, JoinHandle<()>)> {
    use global_accel::shortcuts::NoopGrabber;

    service::spawn_with(move || {
        GlobalShortcutsRegistry::with_parts(
            InputTracker::from_config(&config),
            Box::new(NoopGrabber),
            events,
        )
    })
    .context("Failed to start registry service")
}

/// The hotkey manager is created on the registry thread, which then owns it.
#[cfg(feature = "global-hotkey")]
fn start_service(
    config: Config,
    events: async_channel::Sender<ShortcutEvent>,
) -> anyhow::Result<(RegistryHandle, JoinHandle<()>)> {
    use global_accel::hotkeys::{start_hotkey_forwarder, GlobalHotkeyGrabber};
    use global_accel::shortcuts::{KeyGrabber, NoopGrabber};

    let (bindings_tx, bindings_rx) = async_channel::bounded(1);
    let (handle, join) = service::spawn_with(move || {
        let grabber: Box<dyn KeyGrabber> = match GlobalHotkeyGrabber::new() {
            Ok(grabber) => {
                let _ = bindings_tx.try_send(grabber.bindings());
                Box::new(grabber)
            }
            Err(e) => {
                warn!(error = %e, "OS hotkeys unavailable, running without key grabs");
                Box::new(NoopGrabber)
            }
        };
        GlobalShortcutsRegistry::with_parts(InputTracker::from_config(&config), grabber, events)
    })
    .context("Failed to start registry service")?;

    // Closed without a value when the grabber could not be created
    if let Ok(bindings) = bindings_rx.recv_blocking() {
        start_hotkey_forwarder(bindings, handle.clone())
            .context("Failed to start hotkey forwarder")?;
    }
    Ok((handle, join))
}

fn restore_shortcuts(handle: &RegistryHandle, path: &Path) {
    let store = match ShortcutStore::load(path) {
        Ok(store) => store,
        Err(e) => {
            warn!(error = %e, path = %path.display(), "Failed to read shortcut file, starting empty");
            return;
        }
    };
    if store.is_empty() {
        return;
    }

    let count = store.len();
    match handle.load(store.shortcuts) {
        Ok(warnings) => {
            logging::log_load_warnings(&warnings);
            info!(count, path = %path.display(), "Shortcuts restored");
        }
        Err(e) => warn!(error = %e, "Failed to restore shortcuts"),
    }
}

fn save_shortcuts(handle: &RegistryHandle, path: &Path) -> anyhow::Result<()> {
    let store = ShortcutStore {
        shortcuts: handle.snapshot()?,
        ..ShortcutStore::new()
    };
    store
        .save(path)
        .with_context(|| format!("Failed to save shortcuts to {}", path.display()))
}

fn execute<'a>(
    command: &'a ExternalCommand,
    handle: &RegistryHandle,
    shortcuts_path: &Path,
) -> anyhow::Result<Output<'a>> {
    let request_id = command.request_id();
    let ok = Output::Ok {
        request_id,
        consumed: None,
    };

    if let Some(event) = command.input_event() {
        let consumed = handle.dispatch(event?)?;
        return Ok(Output::Ok {
            request_id,
            consumed: Some(consumed),
        });
    }
    if let Some(request) = command.shortcut_request() {
        let id = handle.register_shortcut(request?).map_err(user_facing)?;
        tracing::debug!(?id, "Registered");
        return Ok(ok);
    }

    match command {
        ExternalCommand::Unregister {
            component,
            context,
            action,
            ..
        } => {
            if !handle.unregister_shortcut(component, context, action)? {
                anyhow::bail!("No shortcut '{}/{}/{}'", component, context, action);
            }
        }
        ExternalCommand::ActivateContext {
            component, context, ..
        } => {
            if !handle.activate_context(component, context)? {
                anyhow::bail!("Unknown component '{}'", component);
            }
        }
        ExternalCommand::SetPresent {
            component, present, ..
        } => {
            if !handle.set_component_present(component, *present)? {
                anyhow::bail!("Unknown component '{}'", component);
            }
        }
        ExternalCommand::ActivateAll { .. } => handle.activate_shortcuts()?,
        ExternalCommand::DeactivateAll { temporarily, .. } => {
            handle.deactivate_shortcuts(*temporarily)?
        }
        ExternalCommand::Save { .. } => save_shortcuts(handle, shortcuts_path)?,
        ExternalCommand::List { .. } => {
            return Ok(Output::List {
                request_id,
                shortcuts: handle.snapshot()?,
            })
        }
        // Input and register commands were handled above
        _ => {}
    }
    Ok(ok)
}

fn user_facing(e: ServiceError) -> anyhow::Error {
    match e {
        ServiceError::Registry(e) => anyhow::anyhow!(e.user_message()),
        other => other.into(),
    }
}
