//! Ring-indicator pin polling
//!
//! The pin driver offers no portable edge interrupts, so the input is sampled
//! at a fixed interval. 100 ms is responsive enough for a ring indicator whose
//! cadence is measured in seconds; much shorter intervals cost noticeable CPU
//! on a Pi Zero.
//!
//! Level changes are published into a `watch` channel. The poller never waits
//! for the consumer: if the controller is busy handling a call, a newer event
//! replaces an unread one.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::line::{InputLine, Level};

/// Default sampling interval
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// A detected level change on the monitored pin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinLevelEvent {
    /// Level after the change
    pub level: Level,
    /// True for a High to Low transition ("ringing started")
    pub is_falling_edge: bool,
}

/// Turns a stream of samples into level-change events
#[derive(Debug, Clone)]
pub struct EdgeDetector {
    last: Level,
}

impl EdgeDetector {
    /// Create a detector with the baseline level
    pub fn new(initial: Level) -> Self {
        Self { last: initial }
    }

    /// Feed one sample; returns an event only if the level changed
    pub fn observe(&mut self, level: Level) -> Option<PinLevelEvent> {
        if level == self.last {
            return None;
        }
        let event = PinLevelEvent {
            level,
            is_falling_edge: self.last == Level::High && level == Level::Low,
        };
        self.last = level;
        Some(event)
    }
}

/// Spawn the poller as a background task
pub fn spawn_pin_poller(
    pin: Arc<dyn InputLine>,
    period: Duration,
    tx: watch::Sender<Option<PinLevelEvent>>,
) -> JoinHandle<()> {
    tokio::spawn(run_pin_poller(pin, period, tx))
}

/// Sample `pin` every `period` and publish level changes
///
/// The first successful read sets the baseline and produces no event. Read
/// failures are logged and the sample is skipped. Returns once every receiver
/// has been dropped.
pub async fn run_pin_poller(
    pin: Arc<dyn InputLine>,
    period: Duration,
    tx: watch::Sender<Option<PinLevelEvent>>,
) {
    info!("Polling pin {} every {:?}", pin.name(), period);

    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut detector: Option<EdgeDetector> = None;

    loop {
        tokio::select! {
            _ = tx.closed() => break,
            _ = ticker.tick() => {}
        }

        let level = match pin.read() {
            Ok(level) => level,
            Err(e) => {
                warn!("Failed to read pin {}: {}", pin.name(), e);
                continue;
            }
        };

        match detector.as_mut() {
            None => {
                debug!("Pin {} baseline level is {}", pin.name(), level);
                detector = Some(EdgeDetector::new(level));
            }
            Some(detector) => {
                if let Some(event) = detector.observe(level) {
                    debug!("Pin {} changed to {}", pin.name(), event.level);
                    tx.send_replace(Some(event));
                }
            }
        }
    }

    info!("Pin poller for {} stopped", pin.name());
}
