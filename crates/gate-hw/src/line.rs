//! Digital pin abstraction
//!
//! Pins are shared between the component that uses them and the shutdown
//! guard, so both traits take `&self`. Implementations serialize access
//! internally.

use crate::error::HardwareError;

/// Highest BCM GPIO number exposed by the Raspberry Pi SoCs
const MAX_BCM_PIN: u8 = 53;

/// Logic level of a digital pin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Level {
    Low,
    High,
}

impl std::ops::Not for Level {
    type Output = Level;

    fn not(self) -> Level {
        match self {
            Level::Low => Level::High,
            Level::High => Level::Low,
        }
    }
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Level::Low => f.write_str("low"),
            Level::High => f.write_str("high"),
        }
    }
}

/// A pin driven by this process
pub trait OutputLine: Send + Sync {
    /// Pin name for logging
    fn name(&self) -> &str;

    /// Drive the pin to the given level
    fn write(&self, level: Level) -> Result<(), HardwareError>;
}

/// A pin sampled by this process
pub trait InputLine: Send + Sync {
    /// Pin name for logging
    fn name(&self) -> &str;

    /// Read the current level
    fn read(&self) -> Result<Level, HardwareError>;

    /// Return the pin to a safe state on shutdown
    ///
    /// Inputs are wired to external drivers (the modem's ring indicator), so
    /// the default leaves the pin configured as an input.
    fn release(&self) -> Result<(), HardwareError> {
        Ok(())
    }
}

/// Resolve a pin name such as `GPIO24`, `BCM24` or `24` to its BCM number
pub fn parse_pin_name(name: &str) -> Result<u8, HardwareError> {
    let trimmed = name.trim();
    let upper = trimmed.to_ascii_uppercase();
    let digits = upper
        .strip_prefix("GPIO")
        .or_else(|| upper.strip_prefix("BCM"))
        .unwrap_or(&upper);

    match digits.parse::<u8>() {
        Ok(n) if n <= MAX_BCM_PIN => Ok(n),
        _ => Err(HardwareError::InvalidPin(trimmed.to_string())),
    }
}
