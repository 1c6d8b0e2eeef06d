use thiserror::Error;
use tracing::{error, warn};

/// Non-fatal failures of high-level registry operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("'{keys}' is already owned by '{owner_action}' of component '{owner_component}'")]
    Collision {
        keys: String,
        owner_component: String,
        owner_action: String,
    },

    #[error("unknown shortcut")]
    UnknownShortcut,
}

impl RegistryError {
    /// Short message suitable for a client-facing reply.
    pub fn user_message(&self) -> String {
        match self {
            Self::Collision {
                keys,
                owner_component,
                ..
            } => format!("{} is already used by {}", keys, owner_component),
            Self::UnknownShortcut => "No such shortcut".to_string(),
        }
    }
}

/// Extension trait for silent error logging with caller location tracking.
/// Use when the operation is recoverable and the caller has nothing better to do.
///
/// # Examples
///
/// ```ignore
/// use global_accel::error::ResultExt;
///
/// // Keep running if the shortcut file cannot be written
/// store.save(&path).log_err();
///
/// // Log as warning for expected failures
/// let config = read_optional_file().warn_on_err();
/// ```
pub trait ResultExt<T> {
    /// Log error with caller location and return None. Use for recoverable failures.
    fn log_err(self) -> Option<T>;
    /// Log as warning with caller location and return None. Use for expected failures.
    fn warn_on_err(self) -> Option<T>;
}

impl<T, E: std::fmt::Debug> ResultExt<T> for std::result::Result<T, E> {
    #[track_caller]
    fn log_err(self) -> Option<T> {
        match self {
            Ok(value) => Some(value),
            Err(error) => {
                let caller = std::panic::Location::caller();
                error!(
                    error = ?error,
                    file = caller.file(),
                    line = caller.line(),
                    "Operation failed"
                );
                None
            }
        }
    }

    #[track_caller]
    fn warn_on_err(self) -> Option<T> {
        match self {
            Ok(value) => Some(value),
            Err(error) => {
                let caller = std::panic::Location::caller();
                warn!(
                    error = ?error,
                    file = caller.file(),
                    line = caller.line(),
                    "Operation had warning"
                );
                None
            }
        }
    }
}

/// Panic in debug mode, log error in release mode.
///
/// Use for "impossible" states that should crash during development
/// but gracefully degrade in production.
///
/// # Examples
///
/// ```ignore
/// use global_accel::debug_panic;
///
/// debug_panic!("active key table out of sync for {}", keys);
/// ```
#[macro_export]
macro_rules! debug_panic {
    ( $($fmt_arg:tt)* ) => {
        if cfg!(debug_assertions) {
            panic!( $($fmt_arg)* );
        } else {
            tracing::error!("IMPOSSIBLE STATE: {}", format_args!($($fmt_arg)*));
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_err_passes_values_through() {
        let ok: Result<u8, String> = Ok(3);
        assert_eq!(ok.log_err(), Some(3));
        let err: Result<u8, String> = Err("boom".into());
        assert_eq!(err.warn_on_err(), None);
    }

    #[test]
    fn collision_message_names_owner() {
        let err = RegistryError::Collision {
            keys: "Ctrl+Alt+T".into(),
            owner_component: "konsole".into(),
            owner_action: "NewTab".into(),
        };
        assert_eq!(err.user_message(), "Ctrl+Alt+T is already used by konsole");
        assert!(err.to_string().contains("NewTab"));
    }

    #[test]
    #[should_panic(expected = "IMPOSSIBLE")]
    #[cfg(debug_assertions)]
    fn debug_panic_panics_in_debug() {
        crate::debug_panic!("IMPOSSIBLE {}", 1);
    }
}
