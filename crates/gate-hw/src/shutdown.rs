//! Safe-state teardown
//!
//! The guard is created as soon as the relay pin exists and lives until the
//! process exits. Whether the exit comes from a signal, a fatal startup error
//! or the controller returning, dropping the guard drives every held output
//! Low. A signal arriving mid-pulse overwrites the relay with Low; that race is
//! harmless because de-energizing is always safe.

use std::sync::Arc;

use tracing::{error, info};

use crate::line::{InputLine, OutputLine};
use crate::relay::force_low;

/// Forces outputs Low and releases inputs on teardown
#[derive(Default)]
pub struct ShutdownGuard {
    outputs: Vec<Arc<dyn OutputLine>>,
    inputs: Vec<Arc<dyn InputLine>>,
}

impl ShutdownGuard {
    /// Create an empty guard
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an output that must be Low at exit
    pub fn with_output(mut self, pin: Arc<dyn OutputLine>) -> Self {
        self.outputs.push(pin);
        self
    }

    /// Add an input to release at exit
    pub fn with_input(mut self, pin: Arc<dyn InputLine>) -> Self {
        self.inputs.push(pin);
        self
    }

    /// Register an input after construction
    pub fn add_input(&mut self, pin: Arc<dyn InputLine>) {
        self.inputs.push(pin);
    }

    /// Drive all outputs Low and release all inputs
    ///
    /// Returns false if any pin could not be put into its safe state.
    pub fn force_safe_state(&self) -> bool {
        let mut ok = true;

        for pin in &self.outputs {
            if force_low(pin.as_ref()).is_err() {
                ok = false;
            }
        }
        for pin in &self.inputs {
            if let Err(e) = pin.release() {
                error!("Failed to release input {}: {}", pin.name(), e);
                ok = false;
            }
        }

        ok
    }
}

impl Drop for ShutdownGuard {
    fn drop(&mut self) {
        info!("Forcing outputs to safe state");
        if !self.force_safe_state() {
            error!("Some pins could not be put into a safe state");
        }
    }
}
