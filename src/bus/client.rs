//! Client side of the bus socket, for bridges and tests.

use anyhow::{Context, Result};
use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;
use std::path::Path;
use std::time::Duration;

use super::{BusMessage, parse_line};

#[derive(Debug)]
pub struct BusClient {
    stream: UnixStream,
    reader: BufReader<UnixStream>,
}

impl BusClient {
    /// Connect to a running flux bus.
    pub fn connect(socket_path: &Path) -> Result<Self> {
        let stream = UnixStream::connect(socket_path).with_context(|| {
            format!(
                "Failed to connect to flux bus at {:?}. Is flux running?",
                socket_path
            )
        })?;

        stream
            .set_read_timeout(Some(Duration::from_secs(5)))
            .context("Failed to set read timeout on bus socket")?;

        let reader_stream = stream
            .try_clone()
            .context("Failed to clone stream for reader")?;

        Ok(Self {
            stream,
            reader: BufReader::new(reader_stream),
        })
    }

    /// Deliver `payload` to flux on `topic`.
    pub fn send(&mut self, topic: &str, payload: serde_json::Value) -> Result<()> {
        let message = BusMessage {
            topic: topic.to_string(),
            payload,
        };
        let line = serde_json::to_string(&message).context("Failed to serialize bus message")?;
        self.stream
            .write_all(format!("{line}\n").as_bytes())
            .context("Failed to write to bus socket")?;
        self.stream.flush().context("Failed to flush bus socket")
    }

    /// Block until flux publishes the next message.
    pub fn receive(&mut self) -> Result<BusMessage> {
        loop {
            let mut line = String::new();
            let read = self
                .reader
                .read_line(&mut line)
                .context("Failed to read from bus socket")?;
            if read == 0 {
                anyhow::bail!("Connection closed by flux");
            }
            if let Some(message) = parse_line(&line)? {
                return Ok(message);
            }
        }
    }

    pub fn set_read_timeout(&self, timeout: Duration) -> Result<()> {
        self.stream
            .set_read_timeout(Some(timeout))
            .context("Failed to set read timeout on bus socket")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_fails_without_server() {
        let temp_dir = tempfile::tempdir().unwrap();
        let err = BusClient::connect(&temp_dir.path().join("absent.sock")).unwrap_err();
        assert!(err.to_string().contains("Failed to connect"));
    }
}
