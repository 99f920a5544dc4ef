//! Error types for the controller

use std::time::Duration;

use gate_hw::HardwareError;
use gate_protocol::ModemCommand;
use thiserror::Error;

/// Errors on the modem's serial line
#[derive(Debug, Error)]
pub enum ModemError {
    /// Reading from the transport failed; the caller may retry
    #[error("serial read failed: {0}")]
    Read(#[source] std::io::Error),

    /// Writing a command failed
    #[error("serial write failed: {0}")]
    Write(#[source] std::io::Error),

    /// The transport reached end of stream
    #[error("serial line closed")]
    Closed,
}

impl ModemError {
    /// Returns true if the serial line can no longer be used
    pub fn is_fatal(&self) -> bool {
        matches!(self, ModemError::Closed)
    }
}

/// Errors while switching between data mode and command mode
#[derive(Debug, Error)]
pub enum ModeSwitchError {
    /// The modem answered with something other than the expected result code
    #[error("unexpected response to {command}: {response}")]
    UnexpectedResponse {
        command: ModemCommand,
        response: String,
    },

    /// The modem stayed silent
    #[error("no response to {command} within {after:?}")]
    NoResponse {
        command: ModemCommand,
        after: Duration,
    },

    /// Serial line error
    #[error(transparent)]
    Modem(#[from] ModemError),
}

impl ModeSwitchError {
    /// Returns true if the serial line can no longer be used
    pub fn is_fatal(&self) -> bool {
        matches!(self, ModeSwitchError::Modem(e) if e.is_fatal())
    }
}

/// Invalid controller configuration
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// No authorized callers configured
    #[error("authorized caller list is empty")]
    NoAuthorizedCallers,

    /// An authorized caller entry is empty and would match every caller
    #[error("authorized caller entry {0} is empty")]
    EmptyCallerEntry(usize),

    /// A duration that must be positive is zero
    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),

    /// Mode switching needs at least one attempt
    #[error("mode_switch_attempts must be at least 1")]
    ZeroAttempts,
}

/// Top-level controller errors
#[derive(Debug, Error)]
pub enum GateError {
    /// Serial line error
    #[error("modem error: {0}")]
    Modem(#[from] ModemError),

    /// Mode switch error
    #[error("mode switch failed: {0}")]
    ModeSwitch(#[from] ModeSwitchError),

    /// Pin or serial hardware error
    #[error("hardware error: {0}")]
    Hardware(#[from] HardwareError),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl GateError {
    /// Returns true if the controller cannot continue
    pub fn is_fatal(&self) -> bool {
        match self {
            GateError::Modem(e) => e.is_fatal(),
            GateError::ModeSwitch(e) => e.is_fatal(),
            GateError::Hardware(e) => e.is_fatal(),
            GateError::Config(_) => true,
        }
    }
}
