//! Virtual modem for testing
//!
//! A small model of a GSM modem's AT front end: it tracks data mode versus
//! command mode, answers commands with result codes and reports an incoming
//! call the way a real modem does. `RING` is reported straight away, and
//! `+CLIP:` only once caller ID has been enabled and the modem is in command
//! mode. While a PPP session is up (data mode) nothing reaches the host.

use gate_protocol::{ModemCommand, ModemMode};
use tracing::debug;

/// Speed reported in `CONNECT` when the data session resumes
const CONNECT_SPEED: u32 = 115_200;

/// Virtual modem for testing
pub struct VirtualModem {
    /// Identifier for logging
    id: String,
    mode: ModemMode,
    echo: bool,
    caller_id_enabled: bool,
    /// Escape sequences to swallow without answering
    ignored_escapes: usize,
    /// Number of the call currently ringing
    ringing: Option<String>,
    /// Commands received (for test verification)
    received_commands: Vec<String>,
}

impl VirtualModem {
    /// Create a modem starting in `mode`, echo off, caller ID disabled
    pub fn new(id: impl Into<String>, mode: ModemMode) -> Self {
        Self {
            id: id.into(),
            mode,
            echo: false,
            caller_id_enabled: false,
            ignored_escapes: 0,
            ringing: None,
            received_commands: Vec::new(),
        }
    }

    /// Echo commands back in command mode (`ATE1`)
    pub fn with_echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    /// Get the identifier
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Current mode
    pub fn mode(&self) -> ModemMode {
        self.mode
    }

    /// Whether `AT+CLIP=1` has been received
    pub fn caller_id_enabled(&self) -> bool {
        self.caller_id_enabled
    }

    /// Number of the call currently ringing
    pub fn ringing(&self) -> Option<&str> {
        self.ringing.as_deref()
    }

    /// Commands received so far, terminator stripped
    pub fn received_commands(&self) -> &[String] {
        &self.received_commands
    }

    /// How many times `command` was received
    pub fn count(&self, command: ModemCommand) -> usize {
        self.received_commands
            .iter()
            .filter(|c| ModemCommand::from_text(c) == Some(command))
            .count()
    }

    /// Stay silent on the next `count` escape sequences
    pub fn ignore_escapes(&mut self, count: usize) {
        self.ignored_escapes = count;
    }

    /// Process one line received from the host
    ///
    /// Returns the lines the modem answers with, in order.
    pub fn process_command(&mut self, text: &str) -> Vec<String> {
        let text = text.trim();
        self.received_commands.push(text.to_string());
        let command = ModemCommand::from_text(text);

        match self.mode {
            ModemMode::DataMode => self.process_in_data_mode(command),
            ModemMode::CommandMode => {
                let mut out = Vec::new();
                if self.echo {
                    out.push(text.to_string());
                }
                out.extend(self.process_in_command_mode(text, command));
                out
            }
        }
    }

    /// A call comes in for `number`
    ///
    /// Returns the unsolicited lines the host sees now.
    pub fn incoming_call(&mut self, number: impl Into<String>) -> Vec<String> {
        let number = number.into();
        debug!("{}: incoming call from {}", self.id, number);
        self.ringing = Some(number);
        self.ring_lines()
    }

    /// The caller gave up
    pub fn call_ended(&mut self) -> Vec<String> {
        self.ringing = None;
        match self.mode {
            ModemMode::CommandMode => vec!["NO CARRIER".to_string()],
            ModemMode::DataMode => Vec::new(),
        }
    }

    fn process_in_data_mode(&mut self, command: Option<ModemCommand>) -> Vec<String> {
        if command != Some(ModemCommand::Escape) {
            // Session traffic; never answered
            return Vec::new();
        }

        if self.ignored_escapes > 0 {
            self.ignored_escapes -= 1;
            debug!("{}: ignoring escape sequence", self.id);
            return Vec::new();
        }

        self.set_mode(ModemMode::CommandMode);
        vec!["OK".to_string()]
    }

    fn process_in_command_mode(&mut self, text: &str, command: Option<ModemCommand>) -> Vec<String> {
        match command {
            Some(ModemCommand::EnableCallerId) => {
                self.caller_id_enabled = true;
                let mut out = vec!["OK".to_string()];
                if let Some(number) = &self.ringing {
                    out.push(clip_line(number));
                }
                out
            }
            Some(ModemCommand::HangUp) => {
                self.ringing = None;
                vec!["OK".to_string()]
            }
            Some(ModemCommand::ResumeData) => {
                self.set_mode(ModemMode::DataMode);
                vec![format!("CONNECT {}", CONNECT_SPEED)]
            }
            Some(ModemCommand::Escape) => vec!["ERROR".to_string()],
            None if text.eq_ignore_ascii_case("AT") => vec!["OK".to_string()],
            None => vec!["ERROR".to_string()],
        }
    }

    fn ring_lines(&self) -> Vec<String> {
        let Some(number) = &self.ringing else {
            return Vec::new();
        };
        if self.mode == ModemMode::DataMode {
            return Vec::new();
        }

        let mut out = vec!["RING".to_string()];
        if self.caller_id_enabled {
            out.push(clip_line(number));
        }
        out
    }

    fn set_mode(&mut self, mode: ModemMode) {
        if self.mode != mode {
            debug!("{}: {} -> {}", self.id, self.mode, mode);
            self.mode = mode;
        }
    }
}

/// Caller-ID line as reported for a national number
pub fn clip_line(number: &str) -> String {
    format!("+CLIP: \"{}\",128,\"\",0", number)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_and_resume() {
        let mut modem = VirtualModem::new("sim", ModemMode::DataMode);

        assert_eq!(modem.process_command("+++"), vec!["OK"]);
        assert_eq!(modem.mode(), ModemMode::CommandMode);

        assert_eq!(modem.process_command("ATO"), vec!["CONNECT 115200"]);
        assert_eq!(modem.mode(), ModemMode::DataMode);
    }

    #[test]
    fn test_data_mode_ignores_commands() {
        let mut modem = VirtualModem::new("sim", ModemMode::DataMode);

        assert!(modem.process_command("AT+CLIP=1").is_empty());
        assert!(!modem.caller_id_enabled());
        assert_eq!(modem.received_commands(), ["AT+CLIP=1"]);
    }

    #[test]
    fn test_ignored_escapes() {
        let mut modem = VirtualModem::new("sim", ModemMode::DataMode);
        modem.ignore_escapes(2);

        assert!(modem.process_command("+++").is_empty());
        assert!(modem.process_command("+++").is_empty());
        assert_eq!(modem.process_command("+++"), vec!["OK"]);
        assert_eq!(modem.count(ModemCommand::Escape), 3);
    }

    #[test]
    fn test_echo() {
        let mut modem = VirtualModem::new("sim", ModemMode::CommandMode).with_echo(true);
        assert_eq!(modem.process_command("ATH"), vec!["ATH", "OK"]);
    }

    #[test]
    fn test_unknown_command_errors() {
        let mut modem = VirtualModem::new("sim", ModemMode::CommandMode);
        assert_eq!(modem.process_command("AT+CSQ"), vec!["ERROR"]);
        assert_eq!(modem.process_command("AT"), vec!["OK"]);
    }

    #[test]
    fn test_call_reported_after_caller_id_enabled() {
        let mut modem = VirtualModem::new("sim", ModemMode::DataMode);

        // Nothing reaches the host during the PPP session
        assert!(modem.incoming_call("43000000").is_empty());

        modem.process_command("+++");
        assert_eq!(
            modem.process_command("AT+CLIP=1"),
            vec!["OK".to_string(), clip_line("43000000")]
        );

        assert_eq!(modem.process_command("ATH"), vec!["OK"]);
        assert_eq!(modem.ringing(), None);
    }

    #[test]
    fn test_call_in_command_mode_with_caller_id() {
        let mut modem = VirtualModem::new("sim", ModemMode::CommandMode);
        modem.process_command("AT+CLIP=1");

        assert_eq!(
            modem.incoming_call("49999999"),
            vec!["RING".to_string(), clip_line("49999999")]
        );
        assert_eq!(modem.call_ended(), vec!["NO CARRIER"]);
    }
}
