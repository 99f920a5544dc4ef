//! Virtual pin for testing
//!
//! Implements both [`InputLine`] and [`OutputLine`], so the same type stands
//! in for the relay output and the ring-indicator input. Writes are recorded
//! with a timestamp taken from tokio's clock, which makes pulse lengths
//! checkable under a paused test runtime.

use std::sync::{Mutex, MutexGuard};

use gate_hw::{HardwareError, InputLine, Level, OutputLine};
use tokio::time::Instant;

#[derive(Debug)]
struct PinState {
    input: Level,
    output: Level,
    history: Vec<(Instant, Level)>,
    writes_before_failure: usize,
    write_failures: usize,
    read_failures: usize,
    released: bool,
}

/// In-memory pin
#[derive(Debug)]
pub struct VirtualPin {
    name: String,
    state: Mutex<PinState>,
}

impl VirtualPin {
    /// Create a pin; `initial` is both the input level and the output level
    pub fn new(name: impl Into<String>, initial: Level) -> Self {
        Self {
            name: name.into(),
            state: Mutex::new(PinState {
                input: initial,
                output: initial,
                history: Vec::new(),
                writes_before_failure: 0,
                write_failures: 0,
                read_failures: 0,
                released: false,
            }),
        }
    }

    /// Set the level returned by reads
    pub fn set_input(&self, level: Level) {
        self.lock().input = level;
    }

    /// Level last driven by a successful write
    pub fn output(&self) -> Level {
        self.lock().output
    }

    /// Successful writes with the time they happened
    pub fn history(&self) -> Vec<(Instant, Level)> {
        self.lock().history.clone()
    }

    /// Successful writes, levels only
    pub fn writes(&self) -> Vec<Level> {
        self.lock().history.iter().map(|(_, level)| *level).collect()
    }

    /// Number of High writes
    pub fn pulses(&self) -> usize {
        self.lock()
            .history
            .iter()
            .filter(|(_, level)| *level == Level::High)
            .count()
    }

    /// Fail the next `count` writes
    pub fn fail_next_writes(&self, count: usize) {
        self.fail_writes_after(0, count);
    }

    /// Let `ok` writes succeed, then fail the following `count`
    pub fn fail_writes_after(&self, ok: usize, count: usize) {
        let mut state = self.lock();
        state.writes_before_failure = ok;
        state.write_failures = count;
    }

    /// Fail the next `count` reads
    pub fn fail_next_reads(&self, count: usize) {
        self.lock().read_failures = count;
    }

    /// Whether [`InputLine::release`] was called
    pub fn released(&self) -> bool {
        self.lock().released
    }

    fn lock(&self) -> MutexGuard<'_, PinState> {
        // Poisoned only by a panicking test
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl OutputLine for VirtualPin {
    fn name(&self) -> &str {
        &self.name
    }

    fn write(&self, level: Level) -> Result<(), HardwareError> {
        let mut state = self.lock();
        if state.writes_before_failure > 0 {
            state.writes_before_failure -= 1;
        } else if state.write_failures > 0 {
            state.write_failures -= 1;
            return Err(HardwareError::Fault {
                pin: self.name.clone(),
                reason: "injected write failure".to_string(),
            });
        }
        state.output = level;
        state.history.push((Instant::now(), level));
        Ok(())
    }
}

impl InputLine for VirtualPin {
    fn name(&self) -> &str {
        &self.name
    }

    fn read(&self) -> Result<Level, HardwareError> {
        let mut state = self.lock();
        if state.read_failures > 0 {
            state.read_failures -= 1;
            return Err(HardwareError::Fault {
                pin: self.name.clone(),
                reason: "injected read failure".to_string(),
            });
        }
        Ok(state.input)
    }

    fn release(&self) -> Result<(), HardwareError> {
        self.lock().released = true;
        Ok(())
    }
}
