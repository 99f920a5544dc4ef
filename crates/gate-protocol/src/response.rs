//! Classification of lines received from the modem

use crate::caller_id::{is_caller_id_notification, CallerIdNotification};

/// One line of modem output
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModemLine {
    /// Empty line (modems frame result codes with CRLF on both sides)
    Blank,
    /// `OK` final result code
    Ok,
    /// `ERROR`, `+CME ERROR: n` or `+CMS ERROR: n`
    Error,
    /// `CONNECT` with optional speed/text suffix
    Connect(Option<String>),
    /// `NO CARRIER`
    NoCarrier,
    /// `RING` unsolicited result code
    Ring,
    /// `+CLIP:` caller-ID notification
    CallerId(CallerIdNotification),
    /// Anything else (echoes, information responses, vendor URCs)
    Other(String),
}

impl ModemLine {
    /// Classify a line; surrounding whitespace is ignored
    pub fn parse(line: &str) -> Self {
        let line = line.trim();

        if line.is_empty() {
            return ModemLine::Blank;
        }
        if is_caller_id_notification(line) {
            return ModemLine::CallerId(CallerIdNotification::from_line(line));
        }

        match line {
            "OK" => ModemLine::Ok,
            "ERROR" => ModemLine::Error,
            "NO CARRIER" => ModemLine::NoCarrier,
            "RING" => ModemLine::Ring,
            "CONNECT" => ModemLine::Connect(None),
            _ if line.starts_with("+CME ERROR") || line.starts_with("+CMS ERROR") => {
                ModemLine::Error
            }
            _ => match line.strip_prefix("CONNECT ") {
                Some(rest) => ModemLine::Connect(Some(rest.trim().to_string())),
                None => ModemLine::Other(line.to_string()),
            },
        }
    }

    /// True for result codes that terminate a command exchange
    pub fn is_final(&self) -> bool {
        matches!(
            self,
            ModemLine::Ok | ModemLine::Error | ModemLine::Connect(_) | ModemLine::NoCarrier
        )
    }

    /// True for lines the modem emits on its own, independent of any command
    pub fn is_unsolicited(&self) -> bool {
        matches!(self, ModemLine::Ring | ModemLine::CallerId(_))
    }
}
