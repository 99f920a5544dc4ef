//! Line-oriented exchange with the modem
//!
//! Commands go out terminated by CR; modem output comes back as
//! newline-terminated lines. Unsolicited `RING` and `+CLIP:` lines that show
//! up while a command's result code is awaited are queued rather than
//! dropped, so a caller ID arriving during a mode switch is still seen.

use std::collections::VecDeque;

use gate_protocol::{EncodeCommand, ModemCommand, ModemLine, MAX_LINE_LEN};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, trace, warn};

use crate::error::ModemError;

/// Lines examined while looking for a command's result before giving up
const MAX_RESPONSE_LINES: usize = 8;

/// Modem line protocol over any async byte stream
pub struct ModemLink<S> {
    io: BufReader<S>,
    /// Partially received line; kept across cancelled reads
    raw: Vec<u8>,
    /// Unsolicited lines set aside while awaiting a result code
    pending: VecDeque<String>,
}

impl<S> ModemLink<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wrap a serial stream
    pub fn new(io: S) -> Self {
        Self {
            io: BufReader::new(io),
            raw: Vec::with_capacity(128),
            pending: VecDeque::new(),
        }
    }

    /// Write `cmd` followed by CR
    pub async fn send_command(&mut self, cmd: ModemCommand) -> Result<(), ModemError> {
        debug!("TX: {}", cmd);
        let bytes = cmd.encode();
        self.io.write_all(&bytes).await.map_err(ModemError::Write)?;
        self.io.flush().await.map_err(ModemError::Write)?;
        Ok(())
    }

    /// Next line from the modem, trimmed
    ///
    /// Lines queued by [`read_response`](Self::read_response) are returned
    /// first. Cancel safe: a partially received line survives a dropped call.
    pub async fn read_line(&mut self) -> Result<String, ModemError> {
        if let Some(line) = self.pending.pop_front() {
            return Ok(line);
        }
        self.read_raw_line().await
    }

    /// Read the modem's answer to `sent`
    ///
    /// Blank lines, the echo of the command and other non-final lines are
    /// skipped; unsolicited lines are queued for [`read_line`](Self::read_line).
    /// Returns the first final result code, or [`ModemLine::Blank`] if none
    /// arrived.
    pub async fn read_response(&mut self, sent: ModemCommand) -> Result<ModemLine, ModemError> {
        for _ in 0..MAX_RESPONSE_LINES {
            let raw = self.read_raw_line().await?;

            if raw.is_empty() || raw.eq_ignore_ascii_case(sent.as_str()) {
                trace!("Skipping {:?} while awaiting response to {}", raw, sent);
                continue;
            }

            let line = ModemLine::parse(&raw);
            if line.is_unsolicited() {
                debug!("Queueing unsolicited line {:?}", raw);
                self.pending.push_back(raw);
                continue;
            }
            if !line.is_final() {
                debug!("Ignoring {:?} while awaiting response to {}", raw, sent);
                continue;
            }

            return Ok(line);
        }

        Ok(ModemLine::Blank)
    }

    /// Drop every queued unsolicited line, returning how many were dropped
    pub fn discard_pending(&mut self) -> usize {
        let dropped = self.pending.len();
        self.pending.clear();
        dropped
    }

    async fn read_raw_line(&mut self) -> Result<String, ModemError> {
        loop {
            let available = self.io.fill_buf().await.map_err(ModemError::Read)?;
            if available.is_empty() {
                if self.raw.is_empty() {
                    return Err(ModemError::Closed);
                }
                break;
            }

            let (used, complete) = match available.iter().position(|&b| b == b'\n') {
                Some(pos) => (pos + 1, true),
                None => (available.len(), false),
            };
            self.raw.extend_from_slice(&available[..used]);
            self.io.consume(used);

            // Bytes without a line break, e.g. PPP frames still draining after `+++`
            if self.raw.len() > MAX_LINE_LEN * 4 {
                let start = self.raw.len() - MAX_LINE_LEN;
                warn!("Line buffer overflow, dropping {} bytes", start);
                self.raw.drain(..start);
            }

            if complete {
                break;
            }
        }

        let line = String::from_utf8_lossy(&self.raw).trim().to_string();
        self.raw.clear();
        debug!("RX: {}", line);
        Ok(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn test_send_command_appends_cr() {
        let (mut modem, host) = tokio::io::duplex(256);
        let mut link = ModemLink::new(host);

        link.send_command(ModemCommand::EnableCallerId).await.unwrap();

        let mut buf = [0u8; 10];
        modem.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"AT+CLIP=1\r");
    }

    #[tokio::test]
    async fn test_read_line_trims() {
        let (mut modem, host) = tokio::io::duplex(256);
        let mut link = ModemLink::new(host);

        modem.write_all(b"  RING \r\n").await.unwrap();
        assert_eq!(link.read_line().await.unwrap(), "RING");
    }

    #[tokio::test]
    async fn test_end_of_stream_is_closed() {
        let (modem, host) = tokio::io::duplex(256);
        let mut link = ModemLink::new(host);
        drop(modem);

        assert!(matches!(link.read_line().await, Err(ModemError::Closed)));
    }

    #[tokio::test]
    async fn test_response_skips_blank_and_echo() {
        let (mut modem, host) = tokio::io::duplex(256);
        let mut link = ModemLink::new(host);

        modem.write_all(b"ATH\r\n\r\nOK\r\n").await.unwrap();
        let response = link.read_response(ModemCommand::HangUp).await.unwrap();
        assert_eq!(response, ModemLine::Ok);
    }

    #[tokio::test]
    async fn test_unsolicited_lines_are_queued() {
        let (mut modem, host) = tokio::io::duplex(256);
        let mut link = ModemLink::new(host);

        modem
            .write_all(b"RING\r\n+CLIP: \"43000000\",128,\"\",0\r\nOK\r\n")
            .await
            .unwrap();

        let response = link.read_response(ModemCommand::Escape).await.unwrap();
        assert_eq!(response, ModemLine::Ok);

        assert_eq!(link.read_line().await.unwrap(), "RING");
        assert_eq!(
            link.read_line().await.unwrap(),
            "+CLIP: \"43000000\",128,\"\",0"
        );
    }

    #[tokio::test]
    async fn test_partial_line_survives_cancelled_read() {
        let (mut modem, host) = tokio::io::duplex(256);
        let mut link = ModemLink::new(host);

        modem.write_all(b"+CLIP: \"4300").await.unwrap();
        let cancelled =
            tokio::time::timeout(Duration::from_millis(20), link.read_line()).await;
        assert!(cancelled.is_err());

        modem.write_all(b"0000\",128\r\n").await.unwrap();
        assert_eq!(link.read_line().await.unwrap(), "+CLIP: \"43000000\",128");
    }

    #[tokio::test]
    async fn test_discarded_lines_are_not_returned() {
        let (mut modem, host) = tokio::io::duplex(256);
        let mut link = ModemLink::new(host);

        modem
            .write_all(b"RING\r\n+CLIP: \"43000000\",128,\"\",0\r\nOK\r\n")
            .await
            .unwrap();
        link.read_response(ModemCommand::HangUp).await.unwrap();
        assert_eq!(link.discard_pending(), 2);

        modem
            .write_all(b"+CLIP: \"49999999\",128,\"\",0\r\n")
            .await
            .unwrap();
        assert_eq!(
            link.read_line().await.unwrap(),
            "+CLIP: \"49999999\",128,\"\",0"
        );
    }

    #[tokio::test]
    async fn test_information_lines_are_not_results() {
        let (mut modem, host) = tokio::io::duplex(256);
        let mut link = ModemLink::new(host);

        modem
            .write_all(b"AT+CLIP=1\r\nSIEMENS\r\nOK\r\n")
            .await
            .unwrap();
        let response = link.read_response(ModemCommand::EnableCallerId).await.unwrap();
        assert_eq!(response, ModemLine::Ok);
    }

    #[tokio::test]
    async fn test_overlong_line_is_capped() {
        let (mut modem, host) = tokio::io::duplex(256);
        let mut link = ModemLink::new(host);

        let writer = tokio::spawn(async move {
            modem.write_all(&[0x7e; MAX_LINE_LEN * 20]).await.unwrap();
            modem.write_all(b"\r\nOK\r\n").await.unwrap();
            modem
        });

        let junk = link.read_line().await.unwrap();
        assert!(junk.len() <= MAX_LINE_LEN * 4);
        assert!(link.raw.capacity() <= MAX_LINE_LEN * 8);
        assert_eq!(link.read_line().await.unwrap(), "OK");

        drop(writer.await.unwrap());
    }
}
