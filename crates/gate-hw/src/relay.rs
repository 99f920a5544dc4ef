//! Relay actuator
//!
//! The relay closes the gate opener's push-button contact. It must never be
//! left energized: every failure path and every cancellation of an in-flight
//! pulse drives the output Low again.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::error::HardwareError;
use crate::line::{Level, OutputLine};

/// Default pulse length
pub const DEFAULT_RELAY_ACTIVE: Duration = Duration::from_millis(750);

/// How many times a failed Low write is retried
const FORCE_LOW_ATTEMPTS: usize = 3;

/// Pulses a relay output
pub struct RelayActuator {
    pin: Arc<dyn OutputLine>,
    active: Duration,
}

impl RelayActuator {
    /// Create a relay actuator on an output pin
    pub fn new(pin: Arc<dyn OutputLine>, active: Duration) -> Self {
        Self { pin, active }
    }

    /// Shared handle to the relay pin (for the shutdown guard)
    pub fn pin(&self) -> Arc<dyn OutputLine> {
        self.pin.clone()
    }

    /// Energize the relay for the configured duration, then release it
    ///
    /// The caller is held for the whole pulse. If the future is dropped
    /// mid-pulse the relay is released on drop.
    pub async fn trigger(&self) -> Result<(), HardwareError> {
        info!("Energizing relay {} for {:?}", self.pin.name(), self.active);

        let pulse = PulseGuard::new(self.pin.as_ref());

        if let Err(e) = self.pin.write(Level::High) {
            error!("Failed to energize relay {}: {}", self.pin.name(), e);
            // PulseGuard forces the pin Low on drop
            return Err(e);
        }

        tokio::time::sleep(self.active).await;

        pulse.finish()
    }

    /// Drive the relay Low, retrying a few times on failure
    pub fn force_low(&self) -> Result<(), HardwareError> {
        force_low(self.pin.as_ref())
    }
}

/// Drive an output Low, retrying on failure
pub(crate) fn force_low(pin: &dyn OutputLine) -> Result<(), HardwareError> {
    let mut last_err = None;

    for attempt in 1..=FORCE_LOW_ATTEMPTS {
        match pin.write(Level::Low) {
            Ok(()) => {
                if attempt > 1 {
                    info!("Pin {} forced low after {} attempts", pin.name(), attempt);
                }
                return Ok(());
            }
            Err(e) => {
                warn!(
                    "Failed to drive pin {} low (attempt {}/{}): {}",
                    pin.name(),
                    attempt,
                    FORCE_LOW_ATTEMPTS,
                    e
                );
                last_err = Some(e);
            }
        }
    }

    let err = last_err.unwrap_or_else(|| HardwareError::Fault {
        pin: pin.name().to_string(),
        reason: "no write attempted".to_string(),
    });
    error!("Pin {} could not be driven low: {}", pin.name(), err);
    Err(err)
}

/// Releases the relay when a pulse ends, however it ends
struct PulseGuard<'a> {
    pin: Option<&'a dyn OutputLine>,
}

impl<'a> PulseGuard<'a> {
    fn new(pin: &'a dyn OutputLine) -> Self {
        Self { pin: Some(pin) }
    }

    fn finish(mut self) -> Result<(), HardwareError> {
        match self.pin.take() {
            Some(pin) => force_low(pin),
            None => Ok(()),
        }
    }
}

impl Drop for PulseGuard<'_> {
    fn drop(&mut self) {
        if let Some(pin) = self.pin.take() {
            let _ = force_low(pin);
        }
    }
}
