//! Call-Triggered Gate Opener
//!
//! Watches a GSM modem on a Raspberry Pi for incoming calls and pulses the
//! gate relay when the caller is authorized. Every call is hung up, so
//! opening the gate costs the caller nothing.
//!
//! The relay is forced Low on every exit path: startup failure, a lost
//! serial line, Ctrl-C or SIGTERM.

mod config;

use std::sync::Arc;

use anyhow::Context;
use gate_ctl::{CallController, RingSource};
use gate_hw::rpi::RpiGpio;
use gate_hw::{
    available_port_names, open_modem_port, spawn_pin_poller, InputLine, OutputLine,
    RelayActuator, ShutdownGuard,
};
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "callgate=info,gate_protocol=info,gate_hw=info,gate_ctl=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting callgate");

    let gpio = RpiGpio::new().context("failed to open GPIO")?;
    let relay_pin: Arc<dyn OutputLine> = Arc::new(
        gpio.output(config::RELAY_PIN)
            .with_context(|| format!("failed to claim relay pin {}", config::RELAY_PIN))?,
    );

    // From here on, every return drives the relay Low
    let mut guard = ShutdownGuard::new().with_output(relay_pin.clone());

    let ring_pin: Option<Arc<dyn InputLine>> = match config::RING_DETECTION_PIN {
        Some(name) => {
            let pin: Arc<dyn InputLine> = Arc::new(
                gpio.input(name)
                    .with_context(|| format!("failed to claim ring indicator pin {}", name))?,
            );
            guard.add_input(pin.clone());
            Some(pin)
        }
        None => None,
    };

    let serial = match open_modem_port(config::SERIAL_PORT, config::BAUD_RATE) {
        Ok(serial) => serial,
        Err(e) => {
            let ports = available_port_names();
            if ports.is_empty() {
                warn!("No serial ports found");
            } else {
                warn!("Available serial ports: {}", ports.join(", "));
            }
            return Err(e).context("cannot talk to the modem");
        }
    };

    let gate_config = config::gate_config().context("invalid configuration")?;
    let poll_interval = gate_config.poll_interval;
    let relay = RelayActuator::new(relay_pin, gate_config.relay_active);
    let mut controller = CallController::new(gate_config, serial, relay)?;

    let source = match ring_pin {
        Some(pin) => {
            info!("Waiting for the ring indicator on {}", pin.name());
            let (tx, rx) = watch::channel(None);
            spawn_pin_poller(pin, poll_interval, tx);
            RingSource::Pin(rx)
        }
        None => {
            info!("Inspecting every serial line for caller ID");
            RingSource::SerialOnly
        }
    };

    let result = tokio::select! {
        result = controller.run(source) => {
            if let Err(e) = &result {
                error!("Call controller stopped: {}", e);
            }
            result.context("call controller stopped")
        }
        received = shutdown_signal() => received,
    };

    info!("Shutting down");
    drop(controller);
    drop(guard);
    result
}

/// Resolves on SIGINT or SIGTERM
async fn shutdown_signal() -> anyhow::Result<()> {
    let mut terminate =
        signal(SignalKind::terminate()).context("failed to install SIGTERM handler")?;

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result.context("failed to listen for Ctrl-C")?;
            info!("Received SIGINT");
        }
        _ = terminate.recv() => {
            info!("Received SIGTERM");
        }
    }
    Ok(())
}
