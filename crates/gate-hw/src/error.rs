//! Error types for hardware access

use thiserror::Error;

/// Errors that can occur while talking to pins or the serial port
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HardwareError {
    /// Pin driver or peripheral setup failed
    #[error("hardware initialization failed: {0}")]
    Init(String),

    /// Failed to open the modem's serial port
    #[error("failed to open serial port {port}: {reason}")]
    SerialOpen { port: String, reason: String },

    /// Reading or driving a pin failed
    #[error("pin {pin} fault: {reason}")]
    Fault { pin: String, reason: String },

    /// Pin name could not be resolved
    #[error("invalid pin name: {0}")]
    InvalidPin(String),
}

impl HardwareError {
    /// Returns true if the error happened during startup and the process cannot continue
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            HardwareError::Init(_) | HardwareError::SerialOpen { .. } | HardwareError::InvalidPin(_)
        )
    }
}
