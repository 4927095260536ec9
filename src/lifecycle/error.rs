//! Lifecycle-specific error types

use super::{Phase, RunState};
use thiserror::Error;

/// Errors that can occur during lifecycle operations
///
/// `Clone` so a single start or stop outcome can be handed to every caller
/// sharing that flight.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LifecycleError {
    /// `start` was called when the application was no longer idle
    #[error("Application already started (state: {state})")]
    AlreadyStarted {
        /// State observed when the call was rejected
        state: RunState,
    },

    /// `stop` was called before `start`
    #[error("Application is not running")]
    NotRunning,

    /// A hook returned an error
    #[error("Hook {hook} failed during {phase}: {message}")]
    HookFailed {
        /// Phase whose hooks were running
        phase: Phase,
        /// Name of the failing hook
        hook: String,
        /// Flattened error chain
        message: String,
    },

    /// Signal installation or delivery failed
    #[error("Signal error: {0}")]
    Signal(String),

    /// A configuration value could not be parsed
    #[error("Invalid config value for {key}: {message}")]
    Config {
        /// Configuration key
        key: String,
        /// Parse failure
        message: String,
    },
}

impl LifecycleError {
    /// Create a hook failure error
    pub fn hook_failed(phase: Phase, hook: impl Into<String>, err: &anyhow::Error) -> Self {
        Self::HookFailed {
            phase,
            hook: hook.into(),
            message: format!("{err:#}"),
        }
    }

    /// Create a signal error
    pub fn signal(msg: impl Into<String>) -> Self {
        Self::Signal(msg.into())
    }

    /// Create a config error
    pub fn config(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Config {
            key: key.into(),
            message: message.into(),
        }
    }
}

/// A specialized Result type for lifecycle operations
pub type Result<T> = std::result::Result<T, LifecycleError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hook_failed_flattens_chain() {
        let err = anyhow::anyhow!("connection refused").context("opening listener");
        let err = LifecycleError::hook_failed(Phase::Booted, "http", &err);
        assert_eq!(
            err.to_string(),
            "Hook http failed during booted: opening listener: connection refused"
        );
    }

    #[test]
    fn test_already_started_names_state() {
        let err = LifecycleError::AlreadyStarted {
            state: RunState::Started,
        };
        assert_eq!(err.to_string(), "Application already started (state: started)");
    }
}
