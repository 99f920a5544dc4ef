//! Raspberry Pi GPIO adapters (rppal)

use std::sync::Mutex;

use rppal::gpio::{Gpio, InputPin, OutputPin};
use tracing::debug;

use crate::error::HardwareError;
use crate::line::{parse_pin_name, InputLine, Level, OutputLine};

fn from_rppal(level: rppal::gpio::Level) -> Level {
    match level {
        rppal::gpio::Level::Low => Level::Low,
        rppal::gpio::Level::High => Level::High,
    }
}

/// Handle to the GPIO peripheral
pub struct RpiGpio {
    gpio: Gpio,
}

impl RpiGpio {
    /// Open the GPIO peripheral
    pub fn new() -> Result<Self, HardwareError> {
        let gpio = Gpio::new().map_err(|e| HardwareError::Init(e.to_string()))?;
        Ok(Self { gpio })
    }

    /// Claim a pin as an output, driven Low immediately
    pub fn output(&self, name: &str) -> Result<RpiOutputLine, HardwareError> {
        let bcm = parse_pin_name(name)?;
        let pin = self
            .gpio
            .get(bcm)
            .map_err(|e| HardwareError::Init(format!("{}: {}", name, e)))?;
        debug!("Claimed {} (BCM {}) as output", name, bcm);

        Ok(RpiOutputLine {
            name: name.to_string(),
            pin: Mutex::new(pin.into_output_low()),
        })
    }

    /// Claim a pin as a polled input
    pub fn input(&self, name: &str) -> Result<RpiInputLine, HardwareError> {
        let bcm = parse_pin_name(name)?;
        let pin = self
            .gpio
            .get(bcm)
            .map_err(|e| HardwareError::Init(format!("{}: {}", name, e)))?;
        debug!("Claimed {} (BCM {}) as input", name, bcm);

        Ok(RpiInputLine {
            name: name.to_string(),
            pin: Mutex::new(pin.into_input()),
        })
    }
}

/// Output pin on the Pi header
pub struct RpiOutputLine {
    name: String,
    pin: Mutex<OutputPin>,
}

impl OutputLine for RpiOutputLine {
    fn name(&self) -> &str {
        &self.name
    }

    fn write(&self, level: Level) -> Result<(), HardwareError> {
        let mut pin = self.pin.lock().map_err(|_| HardwareError::Fault {
            pin: self.name.clone(),
            reason: "pin lock poisoned".to_string(),
        })?;
        match level {
            Level::Low => pin.set_low(),
            Level::High => pin.set_high(),
        }
        Ok(())
    }
}

/// Input pin on the Pi header
pub struct RpiInputLine {
    name: String,
    pin: Mutex<InputPin>,
}

impl InputLine for RpiInputLine {
    fn name(&self) -> &str {
        &self.name
    }

    fn read(&self) -> Result<Level, HardwareError> {
        let pin = self.pin.lock().map_err(|_| HardwareError::Fault {
            pin: self.name.clone(),
            reason: "pin lock poisoned".to_string(),
        })?;
        Ok(from_rppal(pin.read()))
    }
}
