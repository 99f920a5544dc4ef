//! Controller configuration

use std::time::Duration;

use gate_hw::{DEFAULT_POLL_INTERVAL, DEFAULT_RELAY_ACTIVE};

use crate::authorizer::AuthorizedCallerList;
use crate::error::ConfigError;

/// Default time to wait for a result code during mode switching
pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(2);

/// Default silence kept on the line before the escape sequence (Hayes guard time)
pub const DEFAULT_ESCAPE_GUARD: Duration = Duration::from_secs(1);

/// Default number of tries for each mode switch
pub const DEFAULT_MODE_SWITCH_ATTEMPTS: u32 = 3;

/// Default wait for `+CLIP:` after a ring was detected
pub const DEFAULT_CALLER_ID_TIMEOUT: Duration = Duration::from_secs(30);

/// Default pause after a failed serial read
pub const DEFAULT_READ_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Immutable controller configuration
#[derive(Debug, Clone)]
pub struct GateConfig {
    /// Callers allowed to open the gate
    pub authorized_callers: AuthorizedCallerList,
    /// How long the relay stays energized
    pub relay_active: Duration,
    /// Ring-indicator sampling interval
    pub poll_interval: Duration,
    /// Wait for a result code during mode switching and command exchanges
    pub response_timeout: Duration,
    /// Silence before `+++`; zero disables the wait
    pub escape_guard: Duration,
    /// Tries per mode switch before the call cycle is abandoned
    pub mode_switch_attempts: u32,
    /// Wait for `+CLIP:` after a ring; `None` waits forever
    pub caller_id_timeout: Option<Duration>,
    /// Pause after a failed serial read; zero retries immediately
    pub read_retry_delay: Duration,
}

impl GateConfig {
    /// Configuration with default timings
    pub fn new(authorized_callers: AuthorizedCallerList) -> Self {
        Self {
            authorized_callers,
            relay_active: DEFAULT_RELAY_ACTIVE,
            poll_interval: DEFAULT_POLL_INTERVAL,
            response_timeout: DEFAULT_RESPONSE_TIMEOUT,
            escape_guard: DEFAULT_ESCAPE_GUARD,
            mode_switch_attempts: DEFAULT_MODE_SWITCH_ATTEMPTS,
            caller_id_timeout: Some(DEFAULT_CALLER_ID_TIMEOUT),
            read_retry_delay: DEFAULT_READ_RETRY_DELAY,
        }
    }

    /// Check timing constraints
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.relay_active.is_zero() {
            return Err(ConfigError::ZeroDuration("relay_active"));
        }
        if self.poll_interval.is_zero() {
            return Err(ConfigError::ZeroDuration("poll_interval"));
        }
        if self.response_timeout.is_zero() {
            return Err(ConfigError::ZeroDuration("response_timeout"));
        }
        if self.caller_id_timeout.is_some_and(|t| t.is_zero()) {
            return Err(ConfigError::ZeroDuration("caller_id_timeout"));
        }
        if self.mode_switch_attempts == 0 {
            return Err(ConfigError::ZeroAttempts);
        }
        Ok(())
    }
}
