//! Data mode / command mode sequencing
//!
//! While a PPP session is up the modem passes every byte through, so AT
//! commands would corrupt the session. `+++` suspends the session and puts
//! the modem in command mode; `ATO` resumes it.
//!
//! Switching is verified: `+++` must be answered with `OK` and `ATO` with
//! `CONNECT` (or `OK`). Each switch is retried a configured number of times.
//! If command mode cannot be entered, a best-effort `ATO` is sent and the
//! modem is treated as being in data mode. `resume_data_mode` always leaves
//! the tracked mode at data mode, so the controller never goes back to idle
//! believing the modem is stuck in command mode.

use std::time::Duration;

use gate_protocol::{ModemCommand, ModemLine, ModemMode};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::config::GateConfig;
use crate::error::ModeSwitchError;
use crate::link::ModemLink;

/// Tracks and switches the modem's mode
#[derive(Debug, Clone)]
pub struct ModeSwitcher {
    mode: ModemMode,
    response_timeout: Duration,
    escape_guard: Duration,
    attempts: u32,
}

impl ModeSwitcher {
    /// Create a switcher starting in `initial`
    pub fn new(initial: ModemMode, config: &GateConfig) -> Self {
        Self {
            mode: initial,
            response_timeout: config.response_timeout,
            escape_guard: config.escape_guard,
            attempts: config.mode_switch_attempts.max(1),
        }
    }

    /// The mode the modem is believed to be in
    pub fn mode(&self) -> ModemMode {
        self.mode
    }

    /// Declare the modem's mode without talking to it (session start)
    pub fn assume(&mut self, mode: ModemMode) {
        debug!("Assuming modem is in {}", mode);
        self.mode = mode;
    }

    /// Escape from data mode to command mode
    ///
    /// On failure after all attempts, `ATO` is sent best-effort and the tracked
    /// mode stays at data mode.
    pub async fn enter_command_mode<S>(
        &mut self,
        link: &mut ModemLink<S>,
    ) -> Result<(), ModeSwitchError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        if self.mode == ModemMode::CommandMode {
            debug!("Modem already in command mode");
            return Ok(());
        }

        info!("Switching from data mode to command mode");
        let mut attempt = 1;
        let err = loop {
            match self.try_escape(link).await {
                Ok(()) => {
                    self.mode = ModemMode::CommandMode;
                    return Ok(());
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) if attempt < self.attempts => {
                    warn!(
                        "Escape to command mode failed (attempt {}/{}): {}",
                        attempt, self.attempts, e
                    );
                    attempt += 1;
                }
                Err(e) => break e,
            }
        };

        warn!(
            "Giving up on command mode after {} attempts: {}",
            self.attempts, err
        );
        if let Err(e) = self.try_resume(link).await {
            debug!("Best-effort resume after failed escape: {}", e);
        }
        self.mode = ModemMode::DataMode;
        Err(err)
    }

    /// Return from command mode to the suspended data session
    ///
    /// The tracked mode is data mode afterwards whether or not the modem
    /// confirmed the switch.
    pub async fn resume_data_mode<S>(
        &mut self,
        link: &mut ModemLink<S>,
    ) -> Result<(), ModeSwitchError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        info!("Returning to data mode");
        let mut attempt = 1;
        let result = loop {
            match self.try_resume(link).await {
                Ok(()) => break Ok(()),
                Err(e) if e.is_fatal() => break Err(e),
                Err(e) if attempt < self.attempts => {
                    warn!(
                        "Resume to data mode failed (attempt {}/{}): {}",
                        attempt, self.attempts, e
                    );
                    attempt += 1;
                }
                Err(e) => break Err(e),
            }
        };

        self.mode = ModemMode::DataMode;
        result
    }

    async fn try_escape<S>(&self, link: &mut ModemLink<S>) -> Result<(), ModeSwitchError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        if !self.escape_guard.is_zero() {
            tokio::time::sleep(self.escape_guard).await;
        }
        link.send_command(ModemCommand::Escape).await?;

        match self.await_response(link, ModemCommand::Escape).await? {
            ModemLine::Ok => Ok(()),
            other => Err(self.classify_failure(ModemCommand::Escape, other)),
        }
    }

    async fn try_resume<S>(&self, link: &mut ModemLink<S>) -> Result<(), ModeSwitchError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        link.send_command(ModemCommand::ResumeData).await?;

        match self.await_response(link, ModemCommand::ResumeData).await? {
            ModemLine::Connect(_) | ModemLine::Ok => Ok(()),
            other => Err(self.classify_failure(ModemCommand::ResumeData, other)),
        }
    }

    async fn await_response<S>(
        &self,
        link: &mut ModemLink<S>,
        command: ModemCommand,
    ) -> Result<ModemLine, ModeSwitchError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        match timeout(self.response_timeout, link.read_response(command)).await {
            Ok(response) => {
                let response = response?;
                debug!("Response to {}: {:?}", command, response);
                Ok(response)
            }
            Err(_) => Err(ModeSwitchError::NoResponse {
                command,
                after: self.response_timeout,
            }),
        }
    }

    fn classify_failure(&self, command: ModemCommand, response: ModemLine) -> ModeSwitchError {
        match response {
            ModemLine::Blank => ModeSwitchError::NoResponse {
                command,
                after: self.response_timeout,
            },
            other => ModeSwitchError::UnexpectedResponse {
                command,
                response: format!("{:?}", other),
            },
        }
    }
}
