//! Call-Triggered Gate Controller
//!
//! This crate watches a GSM/PPP modem for incoming calls and pulses a relay
//! when the caller is on the authorized list.
//!
//! # Architecture
//!
//! - [`CallerAuthorizer`] decides whether a caller-ID line is authorized
//! - [`ModemLink`] exchanges lines with the modem
//! - [`ModeSwitcher`] moves the modem between data mode and command mode
//! - [`CallController`] ties them together with a [`RelayActuator`]
//!
//! The controller runs in one of two ways, chosen by [`RingSource`]:
//!
//! - **SerialOnly**: the modem stays in command mode and every received line is
//!   a candidate caller-ID notification
//! - **Pin**: the modem carries a PPP session; only after the ring-indicator
//!   pin falls does the controller escape to command mode, read the caller ID
//!   and resume the data session
//!
//! Activity is published as [`GateEvent`]s on a broadcast channel.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use gate_ctl::{AuthorizedCallerList, CallController, GateConfig, RingSource};
//! use gate_hw::{OutputLine, RelayActuator};
//!
//! async fn serve(serial: tokio::io::DuplexStream, relay_pin: Arc<dyn OutputLine>) {
//!     let callers = AuthorizedCallerList::new(["43000000"]).unwrap();
//!     let config = GateConfig::new(callers);
//!     let relay = RelayActuator::new(relay_pin, config.relay_active);
//!
//!     let mut controller = CallController::new(config, serial, relay).unwrap();
//!     controller.run(RingSource::SerialOnly).await.unwrap();
//! }
//! ```
//!
//! [`RelayActuator`]: gate_hw::RelayActuator

pub mod authorizer;
pub mod config;
pub mod controller;
pub mod error;
pub mod events;
pub mod link;
pub mod mode;

pub use authorizer::{AuthorizedCallerList, CallerAuthorizer};
pub use config::GateConfig;
pub use controller::{CallController, RingSource};
pub use error::{ConfigError, GateError, ModeSwitchError, ModemError};
pub use events::GateEvent;
pub use link::ModemLink;
pub use mode::ModeSwitcher;

pub use gate_protocol::ModemMode;
