//! Integration tests for the gate controller
//!
//! These tests drive the controller end to end against the simulated modem:
//! - Serial-only call detection (authorized, rejected, junk lines)
//! - Pin-assisted call cycles with data/command mode switching
//! - Recovery from read failures, relay faults and mode-switch failures
//! - Caller-ID timeout handling, including a notification just before the
//!   deadline
//!
//! All tests run on a paused clock, so guard times and timeouts elapse
//! instantly once every task is idle.

use std::sync::Arc;
use std::time::Duration;

use gate_ctl::{
    AuthorizedCallerList, CallController, GateConfig, GateError, GateEvent, ModemError,
    ModemMode, RingSource,
};
use gate_hw::{Level, PinLevelEvent, RelayActuator};
use gate_protocol::ModemCommand;
use gate_sim::{spawn_virtual_modem, VirtualModem, VirtualModemHandle, VirtualPin};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

// ============================================================================
// Helper Functions
// ============================================================================

mod helpers {
    use super::*;

    /// Upper bound for any single wait, in simulated time
    pub const WAIT_LIMIT: Duration = Duration::from_secs(300);

    /// Default configuration for the given callers
    pub fn config(callers: &[&str]) -> GateConfig {
        GateConfig::new(AuthorizedCallerList::new(callers.iter().copied()).unwrap())
    }

    /// A running controller wired to a virtual modem and a virtual relay
    pub struct Harness {
        pub modem: VirtualModemHandle,
        pub relay: Arc<VirtualPin>,
        pub seen: Vec<GateEvent>,
        events: broadcast::Receiver<GateEvent>,
        ring_tx: Option<watch::Sender<Option<PinLevelEvent>>>,
        poller: Option<JoinHandle<()>>,
        controller: JoinHandle<Result<(), GateError>>,
    }

    impl Harness {
        /// Start a controller over `stream`
        pub fn start<S>(
            stream: S,
            modem: VirtualModemHandle,
            config: GateConfig,
            source: RingSource,
        ) -> Self
        where
            S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
        {
            let relay = Arc::new(VirtualPin::new("relay", Level::Low));
            let actuator = RelayActuator::new(relay.clone(), config.relay_active);
            let mut controller = CallController::new(config, stream, actuator).unwrap();
            let events = controller.subscribe();
            let controller = tokio::spawn(async move { controller.run(source).await });

            Self {
                modem,
                relay,
                seen: Vec::new(),
                events,
                ring_tx: None,
                poller: None,
                controller,
            }
        }

        /// Modem in command mode, every line inspected
        pub fn serial_only(config: GateConfig) -> Self {
            let (stream, modem) =
                spawn_virtual_modem(VirtualModem::new("sim800", ModemMode::CommandMode));
            Self::start(stream, modem, config, RingSource::SerialOnly)
        }

        /// Modem carrying a PPP session, ring indicator driven by the test
        pub fn pin_triggered(config: GateConfig) -> Self {
            let (stream, modem) =
                spawn_virtual_modem(VirtualModem::new("sim800", ModemMode::DataMode));
            let (ring_tx, ring_rx) = watch::channel(None);
            let mut harness = Self::start(stream, modem, config, RingSource::Pin(ring_rx));
            harness.ring_tx = Some(ring_tx);
            harness
        }

        /// Modem carrying a PPP session, ring indicator sampled from `pin`
        pub fn pin_polled(config: GateConfig, pin: Arc<VirtualPin>) -> Self {
            let (stream, modem) =
                spawn_virtual_modem(VirtualModem::new("sim800", ModemMode::DataMode));
            let (ring_tx, ring_rx) = watch::channel(None);
            let poller = gate_hw::spawn_pin_poller(pin, config.poll_interval, ring_tx);
            let mut harness = Self::start(stream, modem, config, RingSource::Pin(ring_rx));
            harness.poller = Some(poller);
            harness
        }

        /// Publish a ring-indicator level change
        pub fn ring(&self, level: Level) {
            let tx = self.ring_tx.as_ref().expect("not a pin-triggered harness");
            tx.send_replace(Some(PinLevelEvent {
                level,
                is_falling_edge: level == Level::Low,
            }));
        }

        /// Wait for the first event matching `pred`, recording everything seen
        pub async fn wait_for(&mut self, pred: impl Fn(&GateEvent) -> bool) -> GateEvent {
            let wait = async {
                loop {
                    match self.events.recv().await {
                        Ok(event) => {
                            self.seen.push(event.clone());
                            if pred(&event) {
                                return event;
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(_)) => continue,
                        Err(broadcast::error::RecvError::Closed) => {
                            panic!("controller stopped; saw {:?}", self.seen)
                        }
                    }
                }
            };
            tokio::time::timeout(WAIT_LIMIT, wait)
                .await
                .expect("timed out waiting for event")
        }

        /// Wait for an exact event
        pub async fn wait_for_event(&mut self, expected: GateEvent) {
            self.wait_for(|e| *e == expected).await;
        }

        /// Record events already sent without waiting
        pub fn drain(&mut self) {
            while let Ok(event) = self.events.try_recv() {
                self.seen.push(event);
            }
        }

        /// Count recorded events matching `pred`
        pub fn count(&self, pred: impl Fn(&GateEvent) -> bool) -> usize {
            self.seen.iter().filter(|e| pred(e)).count()
        }

        /// Position of the first recorded event equal to `event`
        pub fn position(&self, event: &GateEvent) -> Option<usize> {
            self.seen.iter().position(|e| e == event)
        }

        /// Stop everything; returns the controller's result and the modem
        pub async fn finish(mut self) -> (Result<(), GateError>, VirtualModem) {
            self.drain();
            drop(self.ring_tx.take());
            if let Some(poller) = self.poller.take() {
                poller.abort();
            }
            let modem = self.modem.shutdown().await.unwrap();
            let result = tokio::time::timeout(WAIT_LIMIT, self.controller)
                .await
                .expect("controller did not stop")
                .unwrap();
            (result, modem)
        }
    }

    pub fn is_closed(result: &Result<(), GateError>) -> bool {
        matches!(result, Err(GateError::Modem(ModemError::Closed)))
    }
}

use helpers::Harness;

// ============================================================================
// Serial-Only Call Detection
// ============================================================================

mod serial_only_tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn authorized_caller_pulses_relay_then_hangs_up() {
        let mut h = Harness::serial_only(helpers::config(&["43000000"]));
        h.wait_for_event(GateEvent::Listening).await;

        h.modem.incoming_call("43000000").await;
        h.wait_for_event(GateEvent::HungUp).await;

        assert_eq!(h.relay.writes(), vec![Level::High, Level::Low]);
        let authorized = h
            .position(&GateEvent::Authorized {
                entry: "43000000".to_string(),
            })
            .unwrap();
        let pulsed = h.position(&GateEvent::RelayPulsed).unwrap();
        let hung_up = h.position(&GateEvent::HungUp).unwrap();
        assert!(authorized < pulsed && pulsed < hung_up);

        let (result, modem) = h.finish().await;
        assert!(helpers::is_closed(&result));
        assert_eq!(modem.count(ModemCommand::EnableCallerId), 1);
        assert_eq!(modem.count(ModemCommand::HangUp), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn unauthorized_caller_is_hung_up_without_pulse() {
        let mut h = Harness::serial_only(helpers::config(&["43000000"]));
        h.wait_for_event(GateEvent::Listening).await;

        h.modem.incoming_call("49999999").await;
        h.wait_for_event(GateEvent::HungUp).await;

        assert!(h.relay.writes().is_empty());
        assert_eq!(h.count(|e| *e == GateEvent::Rejected), 1);
        assert_eq!(
            h.count(|e| matches!(e, GateEvent::CallerId { number: Some(n), .. } if n == "49999999")),
            1
        );

        let (_, modem) = h.finish().await;
        assert_eq!(modem.count(ModemCommand::HangUp), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn non_caller_id_lines_are_ignored() {
        let mut h = Harness::serial_only(helpers::config(&["43000000"]));
        h.wait_for_event(GateEvent::Listening).await;

        // Contains an authorized number but is not a caller-ID line
        h.modem.send_line("+CMTI: \"43000000\",1").await;
        h.modem.send_line("RING").await;
        h.modem.send_line("NO CARRIER").await;
        h.modem.send_line("43000000").await;
        h.modem.incoming_call("49999999").await;
        h.wait_for_event(GateEvent::HungUp).await;

        assert!(h.relay.writes().is_empty());
        assert_eq!(h.count(|e| matches!(e, GateEvent::CallerId { .. })), 1);

        let (_, modem) = h.finish().await;
        assert_eq!(modem.count(ModemCommand::HangUp), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn several_matching_entries_pulse_once() {
        let mut h = Harness::serial_only(helpers::config(&["4300", "43000000", "000"]));
        h.wait_for_event(GateEvent::Listening).await;

        h.modem.incoming_call("43000000").await;
        h.wait_for_event(GateEvent::HungUp).await;

        assert_eq!(h.relay.pulses(), 1);
        assert_eq!(h.count(|e| matches!(e, GateEvent::Authorized { .. })), 1);
        assert!(h.seen.contains(&GateEvent::Authorized {
            entry: "4300".to_string()
        }));
        assert_eq!(h.count(|e| *e == GateEvent::RelayPulsed), 1);

        h.finish().await;
    }

    #[tokio::test(start_paused = true)]
    async fn every_call_is_handled() {
        let mut h = Harness::serial_only(helpers::config(&["43000000"]));
        h.wait_for_event(GateEvent::Listening).await;

        for number in ["43000000", "49999999", "43000000"] {
            h.modem.incoming_call(number).await;
            h.wait_for_event(GateEvent::HungUp).await;
        }

        assert_eq!(h.relay.pulses(), 2);
        assert_eq!(h.relay.output(), Level::Low);

        let (_, modem) = h.finish().await;
        assert_eq!(modem.count(ModemCommand::HangUp), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn echoed_commands_are_skipped() {
        let (stream, modem) = spawn_virtual_modem(
            VirtualModem::new("sim800", ModemMode::CommandMode).with_echo(true),
        );
        let mut h = Harness::start(
            stream,
            modem,
            helpers::config(&["43000000"]),
            RingSource::SerialOnly,
        );
        h.wait_for_event(GateEvent::Listening).await;

        h.modem.incoming_call("43000000").await;
        h.wait_for_event(GateEvent::HungUp).await;

        assert_eq!(h.relay.pulses(), 1);
        h.finish().await;
    }
}

// ============================================================================
// Pin-Assisted Call Detection
// ============================================================================

mod pin_triggered_tests {
    use super::*;
    use gate_sim::clip_line;

    #[tokio::test(start_paused = true)]
    async fn startup_enables_caller_id_and_resumes_session() {
        let mut h = Harness::pin_triggered(helpers::config(&["43000000"]));
        h.wait_for_event(GateEvent::Listening).await;

        assert_eq!(
            h.count(|e| *e == GateEvent::ModeChanged(ModemMode::CommandMode)),
            1
        );
        assert!(h.seen.contains(&GateEvent::ModeChanged(ModemMode::DataMode)));

        let (result, modem) = h.finish().await;
        assert!(result.is_ok());
        assert_eq!(modem.mode(), ModemMode::DataMode);
        assert!(modem.caller_id_enabled());
        assert_eq!(
            modem.received_commands(),
            ["+++", "AT+CLIP=1", "ATO"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn authorized_call_cycle() {
        let mut h = Harness::pin_triggered(helpers::config(&["43000000"]));
        h.wait_for_event(GateEvent::Listening).await;

        h.modem.incoming_call("43000000").await;
        h.ring(Level::Low);

        h.wait_for_event(GateEvent::RingStarted).await;
        h.wait_for_event(GateEvent::ModeChanged(ModemMode::CommandMode)).await;
        h.wait_for_event(GateEvent::HungUp).await;
        h.wait_for_event(GateEvent::ModeChanged(ModemMode::DataMode)).await;

        assert_eq!(h.relay.writes(), vec![Level::High, Level::Low]);

        let (result, modem) = h.finish().await;
        assert!(result.is_ok());
        assert_eq!(modem.mode(), ModemMode::DataMode);
        assert_eq!(modem.ringing(), None);
        assert_eq!(
            modem.received_commands(),
            ["+++", "AT+CLIP=1", "ATO", "+++", "AT+CLIP=1", "ATH", "ATO"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn unauthorized_call_is_hung_up_and_session_resumed() {
        let mut h = Harness::pin_triggered(helpers::config(&["43000000"]));
        h.wait_for_event(GateEvent::Listening).await;

        h.modem.incoming_call("49999999").await;
        h.ring(Level::Low);

        h.wait_for_event(GateEvent::Rejected).await;
        h.wait_for_event(GateEvent::HungUp).await;
        h.wait_for_event(GateEvent::ModeChanged(ModemMode::DataMode)).await;

        assert!(h.relay.writes().is_empty());

        let (_, modem) = h.finish().await;
        assert_eq!(modem.count(ModemCommand::HangUp), 1);
        assert_eq!(modem.mode(), ModemMode::DataMode);
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_caller_id_does_not_carry_into_next_call() {
        let mut h = Harness::pin_triggered(helpers::config(&["43000000"]));
        h.wait_for_event(GateEvent::Listening).await;

        h.modem.incoming_call("43000000").await;
        h.ring(Level::Low);
        h.wait_for(|e| matches!(e, GateEvent::Authorized { .. })).await;

        // The modem repeats the notification while the relay is energized
        h.modem.send_line("RING").await;
        h.modem.send_line(clip_line("43000000")).await;

        h.wait_for_event(GateEvent::HungUp).await;
        h.wait_for_event(GateEvent::ModeChanged(ModemMode::DataMode)).await;

        h.ring(Level::High);
        h.wait_for_event(GateEvent::RingStopped).await;

        h.modem.incoming_call("49999999").await;
        h.ring(Level::Low);
        let caller = h.wait_for(|e| matches!(e, GateEvent::CallerId { .. })).await;
        h.wait_for_event(GateEvent::HungUp).await;
        h.wait_for_event(GateEvent::ModeChanged(ModemMode::DataMode)).await;

        assert!(matches!(
            caller,
            GateEvent::CallerId { number: Some(ref n), .. } if n == "49999999"
        ));
        assert_eq!(h.relay.pulses(), 1);
        assert_eq!(h.count(|e| matches!(e, GateEvent::Authorized { .. })), 1);
        assert_eq!(h.count(|e| *e == GateEvent::Rejected), 1);

        let (_, modem) = h.finish().await;
        assert_eq!(modem.count(ModemCommand::HangUp), 2);
        assert_eq!(modem.mode(), ModemMode::DataMode);
    }

    #[tokio::test(start_paused = true)]
    async fn rising_edge_does_nothing() {
        let mut h = Harness::pin_triggered(helpers::config(&["43000000"]));
        h.wait_for_event(GateEvent::Listening).await;

        h.ring(Level::High);
        h.wait_for_event(GateEvent::RingStopped).await;

        let (result, modem) = h.finish().await;
        assert!(result.is_ok());
        assert_eq!(modem.count(ModemCommand::Escape), 1);
        assert_eq!(modem.count(ModemCommand::HangUp), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn ring_source_closing_stops_controller() {
        let mut h = Harness::pin_triggered(helpers::config(&["43000000"]));
        h.wait_for_event(GateEvent::Listening).await;

        let (result, _) = h.finish().await;
        assert!(result.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn ring_indicator_pin_drives_call_cycle() {
        let ring = Arc::new(VirtualPin::new("ring", Level::High));
        let mut h = Harness::pin_polled(helpers::config(&["43000000"]), ring.clone());
        h.wait_for_event(GateEvent::Listening).await;

        h.modem.incoming_call("43000000").await;
        ring.set_input(Level::Low);

        h.wait_for_event(GateEvent::RingStarted).await;
        h.wait_for_event(GateEvent::RelayPulsed).await;
        h.wait_for_event(GateEvent::ModeChanged(ModemMode::DataMode)).await;

        ring.set_input(Level::High);
        h.wait_for_event(GateEvent::RingStopped).await;

        assert_eq!(h.relay.pulses(), 1);
        h.finish().await;
    }
}

// ============================================================================
// Failure and Recovery
// ============================================================================

mod recovery_tests {
    use super::*;
    use gate_sim::{clip_line, FaultyStream, VirtualModemCommand};

    #[tokio::test(start_paused = true)]
    async fn read_failure_is_logged_and_loop_continues() {
        let (stream, modem) =
            spawn_virtual_modem(VirtualModem::new("sim800", ModemMode::CommandMode));
        let (stream, faults) = FaultyStream::new(stream);
        let mut h = Harness::start(
            stream,
            modem,
            helpers::config(&["43000000"]),
            RingSource::SerialOnly,
        );
        h.wait_for_event(GateEvent::Listening).await;

        faults.fail_next_reads(1);
        h.modem.incoming_call("43000000").await;

        h.wait_for(|e| matches!(e, GateEvent::ReadFailed { .. })).await;
        h.wait_for_event(GateEvent::HungUp).await;

        assert_eq!(faults.remaining(), 0);
        assert_eq!(h.relay.pulses(), 1);
        h.finish().await;
    }

    #[tokio::test(start_paused = true)]
    async fn relay_fault_still_hangs_up() {
        let mut h = Harness::serial_only(helpers::config(&["43000000"]));
        h.wait_for_event(GateEvent::Listening).await;

        h.relay.fail_next_writes(1);
        h.modem.incoming_call("43000000").await;

        h.wait_for(|e| matches!(e, GateEvent::RelayFault { .. })).await;
        h.wait_for_event(GateEvent::HungUp).await;

        assert_eq!(h.relay.output(), Level::Low);
        assert_eq!(h.count(|e| *e == GateEvent::RelayPulsed), 0);
        h.finish().await;
    }

    #[tokio::test(start_paused = true)]
    async fn closed_serial_line_ends_run() {
        let mut h = Harness::serial_only(helpers::config(&["43000000"]));
        h.wait_for_event(GateEvent::Listening).await;

        let (result, _) = h.finish().await;
        let err = result.unwrap_err();
        assert!(err.is_fatal());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_escape_abandons_cycle_then_recovers() {
        let mut h = Harness::pin_triggered(helpers::config(&["43000000"]));
        h.wait_for_event(GateEvent::Listening).await;

        h.modem.send(VirtualModemCommand::IgnoreEscapes(3)).await;
        h.modem.incoming_call("43000000").await;
        h.ring(Level::Low);

        h.wait_for(|e| {
            matches!(
                e,
                GateEvent::ModeSwitchFailed {
                    target: ModemMode::CommandMode,
                    ..
                }
            )
        })
        .await;
        assert!(h.relay.writes().is_empty());

        // Next ring: the modem answers escapes again
        h.ring(Level::High);
        h.wait_for_event(GateEvent::RingStopped).await;
        h.ring(Level::Low);
        h.wait_for_event(GateEvent::HungUp).await;
        h.wait_for_event(GateEvent::ModeChanged(ModemMode::DataMode)).await;

        assert_eq!(h.relay.pulses(), 1);

        let (_, modem) = h.finish().await;
        // 1 at startup, 3 ignored, 1 successful
        assert_eq!(modem.count(ModemCommand::Escape), 5);
        assert_eq!(modem.count(ModemCommand::HangUp), 1);
        assert_eq!(modem.mode(), ModemMode::DataMode);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_caller_id_times_out_and_resumes() {
        let mut h = Harness::pin_triggered(helpers::config(&["43000000"]));
        h.wait_for_event(GateEvent::Listening).await;

        // Ring without a call behind it
        h.ring(Level::Low);
        h.wait_for_event(GateEvent::CallerIdTimedOut).await;
        h.wait_for_event(GateEvent::ModeChanged(ModemMode::DataMode)).await;

        let (_, modem) = h.finish().await;
        assert_eq!(modem.mode(), ModemMode::DataMode);
        assert_eq!(modem.count(ModemCommand::ResumeData), 2);
        assert_eq!(modem.count(ModemCommand::HangUp), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn late_caller_id_is_handled_past_the_timeout() {
        let mut config = helpers::config(&["43000000"]);
        config.relay_active = Duration::from_secs(10);
        config.caller_id_timeout = Some(Duration::from_secs(5));
        let mut h = Harness::pin_triggered(config);
        h.wait_for_event(GateEvent::Listening).await;

        h.ring(Level::Low);
        h.wait_for_event(GateEvent::ModeChanged(ModemMode::CommandMode)).await;

        tokio::time::sleep(Duration::from_secs(2)).await;
        h.modem.send_line(clip_line("43000000")).await;

        h.wait_for_event(GateEvent::HungUp).await;
        h.wait_for_event(GateEvent::ModeChanged(ModemMode::DataMode)).await;

        let history = h.relay.history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].1, Level::High);
        assert_eq!(history[1].1, Level::Low);
        assert!(history[1].0 - history[0].0 >= Duration::from_secs(10));
        let pulsed = h.position(&GateEvent::RelayPulsed).unwrap();
        let hung_up = h.position(&GateEvent::HungUp).unwrap();
        assert!(pulsed < hung_up);
        assert_eq!(h.count(|e| *e == GateEvent::CallerIdTimedOut), 0);

        let (_, modem) = h.finish().await;
        assert_eq!(modem.count(ModemCommand::HangUp), 1);
        assert_eq!(modem.mode(), ModemMode::DataMode);
    }

    #[tokio::test(start_paused = true)]
    async fn without_timeout_controller_waits_in_command_mode() {
        let mut config = helpers::config(&["43000000"]);
        config.caller_id_timeout = None;
        let mut h = Harness::pin_triggered(config);
        h.wait_for_event(GateEvent::Listening).await;

        h.ring(Level::Low);
        h.wait_for_event(GateEvent::ModeChanged(ModemMode::CommandMode)).await;

        tokio::time::sleep(Duration::from_secs(600)).await;
        h.drain();
        assert_eq!(
            h.count(|e| *e == GateEvent::ModeChanged(ModemMode::DataMode)),
            1
        );

        let (_, modem) = h.finish().await;
        assert_eq!(modem.mode(), ModemMode::CommandMode);
        assert_eq!(modem.count(ModemCommand::ResumeData), 1);
    }
}

// ============================================================================
// Property Tests
// ============================================================================

mod proptest_tests {
    use super::*;
    use gate_protocol::is_caller_id_notification;
    use proptest::prelude::*;

    fn paused_runtime() -> tokio::runtime::Runtime {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .start_paused(true)
            .build()
            .unwrap()
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        /// Lines other than caller-ID notifications never move the relay or hang up
        #[test]
        fn non_caller_id_lines_never_act(
            lines in prop::collection::vec("[A-Z0-9+:, \"]{1,24}", 1..8)
        ) {
            let lines: Vec<String> = lines
                .into_iter()
                .filter(|l| !is_caller_id_notification(l))
                .collect();

            let (pulses, hang_ups) = paused_runtime().block_on(async {
                let mut h = Harness::serial_only(helpers::config(&["43000000"]));
                h.wait_for_event(GateEvent::Listening).await;

                for line in &lines {
                    h.modem.send_line(line.clone()).await;
                }
                h.modem.incoming_call("49999999").await;
                h.wait_for_event(GateEvent::HungUp).await;

                let pulses = h.relay.pulses();
                let (_, modem) = h.finish().await;
                (pulses, modem.count(ModemCommand::HangUp))
            });

            prop_assert_eq!(pulses, 0);
            prop_assert_eq!(hang_ups, 1);
        }
    }
}
