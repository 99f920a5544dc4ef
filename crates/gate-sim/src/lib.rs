//! Gate Controller Simulation Library
//!
//! This crate provides a simulation layer for testing the gate controller
//! without a modem or a Raspberry Pi. It includes:
//!
//! - **VirtualModem**: models a GSM modem's data/command modes, result codes
//!   and caller-ID reporting
//! - **VirtualPin**: in-memory relay output or ring-indicator input
//! - **FaultyStream**: wraps the serial stream to inject read failures
//!
//! # Example
//!
//! ```rust
//! use gate_protocol::ModemMode;
//! use gate_sim::VirtualModem;
//!
//! let mut modem = VirtualModem::new("sim800", ModemMode::DataMode);
//!
//! // Escape to command mode and enable caller ID
//! assert_eq!(modem.process_command("+++"), vec!["OK"]);
//! assert_eq!(modem.process_command("AT+CLIP=1"), vec!["OK"]);
//!
//! // A call now reports the caller's number
//! for line in modem.incoming_call("43000000") {
//!     println!("Modem output: {}", line);
//! }
//! ```

pub mod modem;
pub mod modem_task;
pub mod pin;
pub mod stream;

pub use modem::{clip_line, VirtualModem};
pub use modem_task::{
    run_virtual_modem_task, spawn_virtual_modem, VirtualModemCommand, VirtualModemEvent,
    VirtualModemHandle,
};
pub use pin::VirtualPin;
pub use stream::{FaultInjector, FaultyStream};
