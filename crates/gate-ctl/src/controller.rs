//! Call detection loop
//!
//! One controller serves both deployments:
//!
//! - [`RingSource::SerialOnly`]: the modem has no PPP session and stays in
//!   command mode. Caller ID is enabled once and every received line is a
//!   candidate notification.
//! - [`RingSource::Pin`]: the modem carries a PPP session. The controller
//!   waits for a falling edge on the ring indicator, escapes to command mode,
//!   enables caller ID, handles the first `+CLIP:` line and resumes the data
//!   session before waiting for the next edge.
//!
//! Every `+CLIP:` line is answered with `ATH`, authorized or not. An
//! authorized caller pulses the relay exactly once per notification.

use std::time::Duration;

use gate_hw::{PinLevelEvent, RelayActuator};
use gate_protocol::{
    is_caller_id_notification, CallerIdNotification, ModemCommand, ModemLine, ModemMode,
};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{broadcast, watch};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::authorizer::CallerAuthorizer;
use crate::config::GateConfig;
use crate::error::{GateError, ModeSwitchError, ModemError};
use crate::events::GateEvent;
use crate::link::ModemLink;
use crate::mode::ModeSwitcher;

/// Capacity of the event broadcast channel
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// What tells the controller that a call is coming in
pub enum RingSource {
    /// Every serial line is a candidate caller-ID notification
    SerialOnly,
    /// Only inspect the line after a falling edge on the ring-indicator pin
    Pin(watch::Receiver<Option<PinLevelEvent>>),
}

/// Call detection and relay activation controller
pub struct CallController<S> {
    config: GateConfig,
    authorizer: CallerAuthorizer,
    relay: RelayActuator,
    link: ModemLink<S>,
    switcher: ModeSwitcher,
    events: broadcast::Sender<GateEvent>,
}

impl<S> CallController<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Create a controller over a serial stream and a relay
    pub fn new(config: GateConfig, io: S, relay: RelayActuator) -> Result<Self, GateError> {
        config.validate()?;

        let authorizer = CallerAuthorizer::new(config.authorized_callers.clone());
        let switcher = ModeSwitcher::new(ModemMode::DataMode, &config);
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Ok(Self {
            config,
            authorizer,
            relay,
            link: ModemLink::new(io),
            switcher,
            events,
        })
    }

    /// Subscribe to controller events
    pub fn subscribe(&self) -> broadcast::Receiver<GateEvent> {
        self.events.subscribe()
    }

    /// The mode the modem is believed to be in
    pub fn mode(&self) -> ModemMode {
        self.switcher.mode()
    }

    /// The configuration in use
    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    /// Run until the serial line closes or the ring source goes away
    ///
    /// Serial read failures are logged and retried indefinitely. Only a closed
    /// serial line ends the loop with an error.
    pub async fn run(&mut self, source: RingSource) -> Result<(), GateError> {
        match source {
            RingSource::SerialOnly => self.run_serial_only().await,
            RingSource::Pin(ring) => self.run_pin_triggered(ring).await,
        }
    }

    async fn run_serial_only(&mut self) -> Result<(), GateError> {
        self.switcher.assume(ModemMode::CommandMode);
        self.enable_caller_id().await?;

        info!("Listening for calls...");
        self.emit(GateEvent::Listening);

        loop {
            let line = match self.link.read_line().await {
                Ok(line) => line,
                Err(e) if e.is_fatal() => return Err(e.into()),
                Err(e) => {
                    self.read_failed(&e).await;
                    continue;
                }
            };

            self.handle_line(&line).await?;
        }
    }

    async fn run_pin_triggered(
        &mut self,
        mut ring: watch::Receiver<Option<PinLevelEvent>>,
    ) -> Result<(), GateError> {
        self.switcher.assume(ModemMode::DataMode);
        self.prepare_session().await?;

        info!("Listening for calls...");
        self.emit(GateEvent::Listening);

        loop {
            if ring.changed().await.is_err() {
                info!("Ring indicator source closed, stopping");
                self.emit(GateEvent::Stopped);
                return Ok(());
            }

            let event = *ring.borrow_and_update();
            let Some(event) = event else {
                continue;
            };

            if !event.is_falling_edge {
                debug!("Ring indicator is high, nothing to do");
                self.emit(GateEvent::RingStopped);
                continue;
            }

            info!("Ring indicator is low, someone is calling");
            self.emit(GateEvent::RingStarted);
            self.handle_ring().await?;
        }
    }

    /// Enable caller ID once at session start, then hand the line back to PPP
    async fn prepare_session(&mut self) -> Result<(), GateError> {
        if let Err(e) = self.enter_command_mode().await {
            if e.is_fatal() {
                return Err(e.into());
            }
            warn!("Could not enable caller ID at startup: {}", e);
            return Ok(());
        }

        let enabled = self.enable_caller_id().await;
        self.resume_data_mode().await?;
        enabled
    }

    /// One call cycle after a falling edge
    ///
    /// The modem is back in data mode when this returns, unless the serial
    /// line itself is gone.
    async fn handle_ring(&mut self) -> Result<(), GateError> {
        // Lines queued in an earlier cycle belong to an earlier call
        let stale = self.link.discard_pending();
        if stale > 0 {
            debug!("Dropped {} unsolicited lines from the previous call", stale);
        }

        if let Err(e) = self.enter_command_mode().await {
            if e.is_fatal() {
                return Err(e.into());
            }
            warn!("Abandoning call cycle: {}", e);
            return Ok(());
        }

        let outcome = self.inspect_call().await;
        self.resume_data_mode().await?;

        match outcome {
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                warn!("Call cycle ended early: {}", e);
                Ok(())
            }
            Ok(()) => Ok(()),
        }
    }

    /// Enable caller ID and handle the first `+CLIP:` line
    ///
    /// The timeout bounds the wait for the line only; once it has arrived the
    /// relay pulse and the hang-up always run to completion.
    async fn inspect_call(&mut self) -> Result<(), GateError> {
        self.enable_caller_id().await?;

        let line = match self.config.caller_id_timeout {
            Some(limit) => match timeout(limit, self.next_caller_id_line()).await {
                Ok(line) => line?,
                Err(_) => {
                    warn!("No caller ID within {:?}", limit);
                    self.emit(GateEvent::CallerIdTimedOut);
                    return Ok(());
                }
            },
            None => self.next_caller_id_line().await?,
        };

        self.handle_line(&line).await?;
        Ok(())
    }

    /// Read lines until a `+CLIP:` line arrives
    async fn next_caller_id_line(&mut self) -> Result<String, GateError> {
        loop {
            let line = match self.link.read_line().await {
                Ok(line) => line,
                Err(e) if e.is_fatal() => return Err(e.into()),
                Err(e) => {
                    self.read_failed(&e).await;
                    continue;
                }
            };

            if is_caller_id_notification(&line) {
                return Ok(line);
            }
            if !line.is_empty() {
                debug!("> {}", line);
            }
        }
    }

    /// Handle one received line
    ///
    /// Returns true if it was a caller-ID notification.
    async fn handle_line(&mut self, line: &str) -> Result<bool, GateError> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(false);
        }
        debug!("> {}", line);

        if !is_caller_id_notification(line) {
            return Ok(false);
        }

        let clip = CallerIdNotification::from_line(line);
        info!(
            "Incoming call from {}{}",
            clip.number().unwrap_or("unknown number"),
            if clip.is_international() { " (international)" } else { "" }
        );
        debug!("Caller ID type of address: {:?}", clip.address_type());
        self.emit(GateEvent::CallerId {
            number: clip.number().map(str::to_string),
            line: clip.line().to_string(),
        });

        let entry = self.authorizer.first_match(clip.line()).map(str::to_string);
        match entry {
            Some(entry) => {
                info!("Authorized caller detected ({}). Opening gate.", entry);
                self.emit(GateEvent::Authorized { entry });
                self.pulse_relay().await;
            }
            None => {
                info!("Caller is not authorized");
                self.emit(GateEvent::Rejected);
            }
        }

        self.hang_up().await?;
        Ok(true)
    }

    async fn pulse_relay(&mut self) {
        match self.relay.trigger().await {
            Ok(()) => self.emit(GateEvent::RelayPulsed),
            Err(e) => {
                error!("Relay pulse failed: {}", e);
                self.emit(GateEvent::RelayFault {
                    reason: e.to_string(),
                });
            }
        }
    }

    async fn hang_up(&mut self) -> Result<(), GateError> {
        info!("Hanging up");
        match self.exchange(ModemCommand::HangUp).await {
            Ok(_) => {
                self.emit(GateEvent::HungUp);
                Ok(())
            }
            Err(e) if e.is_fatal() => Err(e.into()),
            Err(e) => {
                warn!("Hang-up failed: {}", e);
                Ok(())
            }
        }
    }

    async fn enable_caller_id(&mut self) -> Result<(), GateError> {
        info!("Enabling caller ID");
        match self.exchange(ModemCommand::EnableCallerId).await {
            Ok(_) => Ok(()),
            Err(e) if e.is_fatal() => Err(e.into()),
            Err(e) => {
                warn!("Enabling caller ID failed: {}", e);
                Ok(())
            }
        }
    }

    /// Send a command and wait for its result code
    ///
    /// A missing or non-OK result is logged, not treated as an error: the
    /// modem may already have acted on the command.
    async fn exchange(&mut self, command: ModemCommand) -> Result<Option<ModemLine>, ModemError> {
        self.link.send_command(command).await?;

        match timeout(self.config.response_timeout, self.link.read_response(command)).await {
            Ok(Ok(ModemLine::Ok)) => Ok(Some(ModemLine::Ok)),
            Ok(Ok(other)) => {
                warn!("Unexpected response to {}: {:?}", command, other);
                Ok(Some(other))
            }
            Ok(Err(e)) => Err(e),
            Err(_) => {
                warn!("No response to {} within {:?}", command, self.config.response_timeout);
                Ok(None)
            }
        }
    }

    async fn enter_command_mode(&mut self) -> Result<(), ModeSwitchError> {
        let result = self.switcher.enter_command_mode(&mut self.link).await;
        match &result {
            Ok(()) => self.emit(GateEvent::ModeChanged(ModemMode::CommandMode)),
            Err(e) => self.emit(GateEvent::ModeSwitchFailed {
                target: ModemMode::CommandMode,
                reason: e.to_string(),
            }),
        }
        result
    }

    async fn resume_data_mode(&mut self) -> Result<(), GateError> {
        let result = self.switcher.resume_data_mode(&mut self.link).await;
        if let Err(e) = &result {
            error!("Modem did not confirm data mode: {}", e);
            self.emit(GateEvent::ModeSwitchFailed {
                target: ModemMode::DataMode,
                reason: e.to_string(),
            });
        }
        self.emit(GateEvent::ModeChanged(ModemMode::DataMode));

        match result {
            Err(e) if e.is_fatal() => Err(e.into()),
            _ => Ok(()),
        }
    }

    async fn read_failed(&mut self, e: &ModemError) {
        warn!("Error reading from serial: {}", e);
        self.emit(GateEvent::ReadFailed {
            reason: e.to_string(),
        });
        if self.config.read_retry_delay > Duration::ZERO {
            tokio::time::sleep(self.config.read_retry_delay).await;
        }
    }

    fn emit(&self, event: GateEvent) {
        let _ = self.events.send(event);
    }
}
