//! In-crate test pin

use std::sync::Mutex;

use crate::error::HardwareError;
use crate::line::{InputLine, Level, OutputLine};

#[derive(Default)]
struct State {
    level: Option<Level>,
    input: Option<Level>,
    writes: Vec<Level>,
    ok_before_fail: usize,
    failures: usize,
    read_failures: usize,
    released: bool,
}

/// Pin that records writes and can be told to fail
pub(crate) struct RecordingPin {
    name: String,
    state: Mutex<State>,
}

impl RecordingPin {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            state: Mutex::new(State::default()),
        }
    }

    pub(crate) fn fail_next_writes(&self, count: usize) {
        self.fail_writes_after(0, count);
    }

    pub(crate) fn fail_writes_after(&self, ok: usize, count: usize) {
        let mut state = self.state.lock().unwrap();
        state.ok_before_fail = ok;
        state.failures = count;
    }

    pub(crate) fn fail_next_reads(&self, count: usize) {
        self.state.lock().unwrap().read_failures = count;
    }

    pub(crate) fn set_input(&self, level: Level) {
        self.state.lock().unwrap().input = Some(level);
    }

    pub(crate) fn writes(&self) -> Vec<Level> {
        self.state.lock().unwrap().writes.clone()
    }

    pub(crate) fn level(&self) -> Level {
        self.state.lock().unwrap().level.unwrap_or(Level::Low)
    }

    pub(crate) fn released(&self) -> bool {
        self.state.lock().unwrap().released
    }
}

impl OutputLine for RecordingPin {
    fn name(&self) -> &str {
        &self.name
    }

    fn write(&self, level: Level) -> Result<(), HardwareError> {
        let mut state = self.state.lock().unwrap();
        if state.ok_before_fail > 0 {
            state.ok_before_fail -= 1;
        } else if state.failures > 0 {
            state.failures -= 1;
            return Err(HardwareError::Fault {
                pin: self.name.clone(),
                reason: "injected write failure".to_string(),
            });
        }
        state.level = Some(level);
        state.writes.push(level);
        Ok(())
    }
}

impl InputLine for RecordingPin {
    fn name(&self) -> &str {
        &self.name
    }

    fn read(&self) -> Result<Level, HardwareError> {
        let mut state = self.state.lock().unwrap();
        if state.read_failures > 0 {
            state.read_failures -= 1;
            return Err(HardwareError::Fault {
                pin: self.name.clone(),
                reason: "injected read failure".to_string(),
            });
        }
        Ok(state.input.unwrap_or(Level::High))
    }

    fn release(&self) -> Result<(), HardwareError> {
        self.state.lock().unwrap().released = true;
        Ok(())
    }
}
