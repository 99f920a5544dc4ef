//! AT commands sent to the modem
//!
//! Every command is written as its text followed by a single carriage return.
//! The escape sequence `+++` is not a real AT command but is framed the same
//! way so the modem's line discipline stays uniform.

use crate::EncodeCommand;

/// Command terminator
pub const COMMAND_TERMINATOR: u8 = b'\r';

/// Commands understood by the call watcher
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModemCommand {
    /// Enable calling line identification: `AT+CLIP=1`
    EnableCallerId,
    /// Hang up the current call: `ATH`
    HangUp,
    /// Drop from data mode to command mode: `+++`
    Escape,
    /// Return to the suspended data session: `ATO`
    ResumeData,
}

impl ModemCommand {
    /// Command text without terminator
    pub fn as_str(&self) -> &'static str {
        match self {
            ModemCommand::EnableCallerId => "AT+CLIP=1",
            ModemCommand::HangUp => "ATH",
            ModemCommand::Escape => "+++",
            ModemCommand::ResumeData => "ATO",
        }
    }

    /// Look up a command from its text (terminator and surrounding whitespace ignored)
    pub fn from_text(text: &str) -> Option<Self> {
        match text.trim().to_ascii_uppercase().as_str() {
            "AT+CLIP=1" => Some(ModemCommand::EnableCallerId),
            "ATH" | "ATH0" => Some(ModemCommand::HangUp),
            "+++" => Some(ModemCommand::Escape),
            "ATO" | "ATO0" => Some(ModemCommand::ResumeData),
            _ => None,
        }
    }
}

impl EncodeCommand for ModemCommand {
    fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.as_str().len() + 1);
        out.extend_from_slice(self.as_str().as_bytes());
        out.push(COMMAND_TERMINATOR);
        out
    }
}

impl std::fmt::Display for ModemCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
