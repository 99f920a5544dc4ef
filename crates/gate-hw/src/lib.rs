//! Gate Hardware Library
//!
//! This crate provides the hardware-facing pieces of the call-triggered gate
//! opener:
//!
//! - **Pin traits**: [`InputLine`] and [`OutputLine`] abstract a digital pin
//! - **RelayActuator**: pulses the relay output for a fixed duration
//! - **Pin poller**: samples the ring-indicator input and reports level changes
//! - **ShutdownGuard**: forces outputs to their safe level on every exit path
//! - **Serial**: opens the modem's serial port
//!
//! Raspberry Pi pin adapters live behind the `rpi` feature.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use gate_hw::{OutputLine, RelayActuator, ShutdownGuard};
//!
//! async fn pulse(pin: Arc<dyn OutputLine>) {
//!     let _guard = ShutdownGuard::new().with_output(pin.clone());
//!     let relay = RelayActuator::new(pin, Duration::from_millis(750));
//!     relay.trigger().await.unwrap();
//! }
//! ```

pub mod error;
pub mod line;
pub mod poller;
pub mod relay;
#[cfg(feature = "rpi")]
pub mod rpi;
pub mod serial;
pub mod shutdown;
#[cfg(test)]
mod testing;

pub use error::HardwareError;
pub use line::{parse_pin_name, InputLine, Level, OutputLine};
pub use poller::{run_pin_poller, spawn_pin_poller, EdgeDetector, PinLevelEvent, DEFAULT_POLL_INTERVAL};
pub use relay::{RelayActuator, DEFAULT_RELAY_ACTIVE};
pub use serial::{available_port_names, open_modem_port, DEFAULT_BAUD_RATE};
pub use shutdown::ShutdownGuard;
