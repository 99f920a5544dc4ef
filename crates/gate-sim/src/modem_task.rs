//! Virtual modem actor task
//!
//! The task owns a [`VirtualModem`] and serves it over an async stream, usually
//! one end of a `tokio::io::duplex` pair whose other end is handed to the
//! controller in place of the serial port. A select! loop:
//! - reads CR-terminated commands from the stream and writes the answers
//! - handles test commands (incoming calls, raw lines, shutdown) from a channel
//! - emits an event for every command received

use std::io;

use gate_protocol::{LineCodec, ModemMode};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, DuplexStream};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::VirtualModem;

/// Buffer size of the duplex pair created by [`spawn_virtual_modem`]
const DUPLEX_BUFFER: usize = 4096;

/// Commands that can be sent to a virtual modem actor
#[derive(Debug, Clone)]
pub enum VirtualModemCommand {
    /// A call comes in from this number
    IncomingCall(String),
    /// The caller hung up
    CallEnded,
    /// Write a raw line to the host as-is (CRLF framed)
    SendLine(String),
    /// Swallow the next N escape sequences
    IgnoreEscapes(usize),
    /// Shutdown the virtual modem actor
    Shutdown,
}

/// Event emitted by the virtual modem actor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VirtualModemEvent {
    /// A line was received from the host
    CommandReceived {
        /// Command text, terminator stripped
        text: String,
        /// Modem mode after processing
        mode: ModemMode,
    },
}

/// Run the virtual modem actor task
///
/// Returns the modem when the stream closes or shutdown is requested, so tests
/// can inspect what it received.
pub async fn run_virtual_modem_task<S>(
    mut stream: S,
    mut modem: VirtualModem,
    mut cmd_rx: mpsc::Receiver<VirtualModemCommand>,
    event_tx: broadcast::Sender<VirtualModemEvent>,
) -> io::Result<VirtualModem>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut codec = LineCodec::new();
    let mut buf = [0u8; 512];

    info!("Starting virtual modem task for {} in {}", modem.id(), modem.mode());

    loop {
        tokio::select! {
            result = stream.read(&mut buf) => {
                match result {
                    Ok(0) => {
                        debug!("Virtual modem stream closed for {}", modem.id());
                        break;
                    }
                    Ok(n) => {
                        codec.push_bytes(&buf[..n]);
                        while let Some(text) = codec.next_line() {
                            debug!("Virtual modem {} received {:?}", modem.id(), text);
                            let replies = modem.process_command(&text);
                            write_lines(&mut stream, &replies).await?;
                            let _ = event_tx.send(VirtualModemEvent::CommandReceived {
                                text,
                                mode: modem.mode(),
                            });
                        }
                    }
                    Err(e) => {
                        warn!("Virtual modem {} stream error: {}", modem.id(), e);
                        return Err(e);
                    }
                }
            }

            cmd = cmd_rx.recv() => {
                let lines = match cmd {
                    Some(VirtualModemCommand::IncomingCall(number)) => modem.incoming_call(number),
                    Some(VirtualModemCommand::CallEnded) => modem.call_ended(),
                    Some(VirtualModemCommand::SendLine(line)) => vec![line],
                    Some(VirtualModemCommand::IgnoreEscapes(count)) => {
                        modem.ignore_escapes(count);
                        Vec::new()
                    }
                    Some(VirtualModemCommand::Shutdown) => {
                        info!("Shutdown requested for virtual modem {}", modem.id());
                        break;
                    }
                    None => {
                        debug!("Command channel closed for virtual modem {}", modem.id());
                        break;
                    }
                };
                write_lines(&mut stream, &lines).await?;
            }
        }
    }

    info!("Virtual modem task ended for {}", modem.id());
    Ok(modem)
}

async fn write_lines<S>(stream: &mut S, lines: &[String]) -> io::Result<()>
where
    S: AsyncWrite + Unpin,
{
    if lines.is_empty() {
        return Ok(());
    }
    let mut out = String::new();
    for line in lines {
        out.push_str("\r\n");
        out.push_str(line);
        out.push_str("\r\n");
    }
    stream.write_all(out.as_bytes()).await?;
    stream.flush().await
}

/// Handle to a spawned virtual modem
pub struct VirtualModemHandle {
    cmd_tx: mpsc::Sender<VirtualModemCommand>,
    event_tx: broadcast::Sender<VirtualModemEvent>,
    task: JoinHandle<io::Result<VirtualModem>>,
}

impl VirtualModemHandle {
    /// Subscribe to commands received by the modem
    pub fn subscribe(&self) -> broadcast::Receiver<VirtualModemEvent> {
        self.event_tx.subscribe()
    }

    /// Send a command to the actor; ignored if it already stopped
    pub async fn send(&self, cmd: VirtualModemCommand) {
        let _ = self.cmd_tx.send(cmd).await;
    }

    /// A call comes in from `number`
    pub async fn incoming_call(&self, number: impl Into<String>) {
        self.send(VirtualModemCommand::IncomingCall(number.into())).await;
    }

    /// Write a raw line to the host
    pub async fn send_line(&self, line: impl Into<String>) {
        self.send(VirtualModemCommand::SendLine(line.into())).await;
    }

    /// Stop the actor and return the modem
    pub async fn shutdown(self) -> io::Result<VirtualModem> {
        let _ = self.cmd_tx.send(VirtualModemCommand::Shutdown).await;
        self.task.await.map_err(io::Error::other)?
    }
}

/// Spawn a virtual modem on a fresh duplex pair
///
/// Returns the host end of the pair (stands in for the serial port) and a
/// handle to the actor.
pub fn spawn_virtual_modem(modem: VirtualModem) -> (DuplexStream, VirtualModemHandle) {
    let (host, device) = tokio::io::duplex(DUPLEX_BUFFER);
    let (cmd_tx, cmd_rx) = mpsc::channel(16);
    let (event_tx, _) = broadcast::channel(64);

    let task = tokio::spawn(run_virtual_modem_task(device, modem, cmd_rx, event_tx.clone()));

    (
        host,
        VirtualModemHandle {
            cmd_tx,
            event_tx,
            task,
        },
    )
}
