//! Modem Line Protocol Library
//!
//! This crate provides encoding and parsing for the small slice of the Hayes
//! AT command set used to watch a GSM/PPP modem for incoming calls:
//!
//! - **Commands**: `AT+CLIP=1`, `ATH`, `+++` and `ATO`, each terminated by CR
//! - **Result codes**: `OK`, `ERROR`, `CONNECT`, `NO CARRIER`, `RING`
//! - **Caller ID**: unsolicited `+CLIP:` notifications carrying the calling number
//!
//! # Architecture
//!
//! - [`ModemCommand`] encodes commands to wire bytes
//! - [`ModemLine`] classifies one received line
//! - [`CallerIdNotification`] parses the `+CLIP:` payload
//! - [`LineCodec`] splits a raw byte stream into lines, for peers that do not
//!   get a buffered reader (the simulated modem parses CR-terminated commands
//!   with it)
//!
//! # Example
//!
//! ```rust
//! use gate_protocol::{ModemLine, ModemCommand, EncodeCommand};
//!
//! assert_eq!(ModemCommand::HangUp.encode(), b"ATH\r");
//!
//! let line = ModemLine::parse("+CLIP: \"43000000\",128,\"\",0");
//! if let ModemLine::CallerId(clip) = line {
//!     assert_eq!(clip.number(), Some("43000000"));
//! }
//! ```

pub mod caller_id;
pub mod codec;
pub mod command;
pub mod error;
pub mod response;

pub use caller_id::{is_caller_id_notification, CallerIdNotification, CLIP_PREFIX};
pub use codec::{LineCodec, MAX_LINE_LEN};
pub use command::ModemCommand;
pub use error::ParseError;
pub use response::ModemLine;

/// Which mode the modem is believed to be in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ModemMode {
    /// A PPP/data session owns the line; AT commands are not recognized
    #[default]
    DataMode,
    /// The modem accepts AT commands
    CommandMode,
}

impl ModemMode {
    /// Returns a human-readable name for the mode
    pub fn name(&self) -> &'static str {
        match self {
            ModemMode::DataMode => "data mode",
            ModemMode::CommandMode => "command mode",
        }
    }
}

impl std::fmt::Display for ModemMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Trait for commands that can be encoded to bytes
pub trait EncodeCommand {
    /// Encode this command to its wire format
    fn encode(&self) -> Vec<u8>;
}
