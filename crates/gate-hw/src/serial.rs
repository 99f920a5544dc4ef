//! Modem serial port

use serialport::available_ports;
use tokio_serial::{SerialPortBuilderExt, SerialStream};
use tracing::{debug, info};

use crate::error::HardwareError;

/// Baud rate of the modem's UART
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Open the modem's serial port for async line I/O
///
/// Must be called from within a tokio runtime.
pub fn open_modem_port(port_name: &str, baud_rate: u32) -> Result<SerialStream, HardwareError> {
    debug!("Opening {} at {} baud", port_name, baud_rate);

    let stream = tokio_serial::new(port_name, baud_rate)
        .open_native_async()
        .map_err(|e| HardwareError::SerialOpen {
            port: port_name.to_string(),
            reason: e.to_string(),
        })?;

    info!("Opened modem port {} at {} baud", port_name, baud_rate);
    Ok(stream)
}

/// Names of the serial ports present on this machine
///
/// Used to give a useful hint when the configured port cannot be opened.
pub fn available_port_names() -> Vec<String> {
    match available_ports() {
        Ok(ports) => ports.into_iter().map(|p| p.port_name).collect(),
        Err(e) => {
            debug!("Failed to enumerate serial ports: {}", e);
            Vec::new()
        }
    }
}
