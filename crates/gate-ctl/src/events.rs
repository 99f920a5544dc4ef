//! Controller activity events
//!
//! Every observable step of call handling is broadcast on a single channel.
//! Sending never blocks the controller; with no subscribers events are simply
//! dropped.

use gate_protocol::ModemMode;
use serde::{Deserialize, Serialize};

/// Controller activity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GateEvent {
    // -------------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------------
    /// Caller ID is enabled and the controller is waiting for calls
    Listening,

    /// The ring source went away; the controller stopped
    Stopped,

    // -------------------------------------------------------------------------
    // Ring indicator
    // -------------------------------------------------------------------------
    /// Falling edge on the ring-indicator pin
    RingStarted,

    /// Rising edge on the ring-indicator pin
    RingStopped,

    // -------------------------------------------------------------------------
    // Modem mode
    // -------------------------------------------------------------------------
    /// The tracked modem mode changed
    ModeChanged(ModemMode),

    /// A mode switch failed after all attempts
    ModeSwitchFailed {
        /// Mode that was being entered
        target: ModemMode,
        /// Last error
        reason: String,
    },

    // -------------------------------------------------------------------------
    // Call handling
    // -------------------------------------------------------------------------
    /// A `+CLIP:` notification was received
    CallerId {
        /// Calling number, if reported
        number: Option<String>,
        /// Whole notification line
        line: String,
    },

    /// The caller matched an authorized entry
    Authorized {
        /// The matching entry
        entry: String,
    },

    /// The caller matched no authorized entry
    Rejected,

    /// The relay was pulsed and released
    RelayPulsed,

    /// Driving the relay failed
    RelayFault {
        /// Error text
        reason: String,
    },

    /// The hang-up command was sent
    HungUp,

    /// A serial read failed and will be retried
    ReadFailed {
        /// Error text
        reason: String,
    },

    /// No `+CLIP:` arrived in time after a ring
    CallerIdTimedOut,
}
