//! Deployment settings
//!
//! Edit these and rebuild. Set [`RING_DETECTION_PIN`] to `None` when the modem
//! has no PPP session and every serial line can be inspected directly.

use gate_ctl::{AuthorizedCallerList, ConfigError, GateConfig};
use gate_hw::DEFAULT_BAUD_RATE;

/// Modem UART
pub const SERIAL_PORT: &str = "/dev/serial0";

/// Modem UART speed
pub const BAUD_RATE: u32 = DEFAULT_BAUD_RATE;

/// Relay output (header pin 16)
pub const RELAY_PIN: &str = "GPIO23";

/// Modem ring-indicator input, or `None` for serial-only detection
pub const RING_DETECTION_PIN: Option<&str> = Some("GPIO24");

/// Numbers allowed to open the gate, matched as substrings of the caller-ID line
pub const AUTHORIZED_CALLERS: &[&str] = &["43000000"];

/// Controller configuration built from the constants above
pub fn gate_config() -> Result<GateConfig, ConfigError> {
    let callers = AuthorizedCallerList::new(AUTHORIZED_CALLERS.iter().copied())?;
    let config = GateConfig::new(callers);
    config.validate()?;
    Ok(config)
}
