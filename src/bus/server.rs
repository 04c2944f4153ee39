//! Unix socket server carrying bus messages in both directions.
//!
//! Every connected client may write newline-delimited [`BusMessage`] JSON,
//! which is forwarded to the driver as [`Event::Message`], and receives every
//! message the driver publishes. The server polls in a single thread with
//! non-blocking sockets.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::io::{BufWriter, ErrorKind, Read, Write};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, mpsc};
use std::thread;
use std::time::{Duration, Instant};

use super::{BusMessage, Event};
use crate::constants::BUS_POLL_INTERVAL_MS;

/// Longest accepted line; a client exceeding it without a newline is dropped.
const MAX_LINE_BYTES: usize = 1024 * 1024;

pub struct BusSocketServer {
    socket_path: PathBuf,
    listener: UnixListener,
    clients: HashMap<u32, ClientConnection>,
    next_client_id: u32,
}

struct ClientConnection {
    raw_stream: UnixStream,
    writer: BufWriter<UnixStream>,
    pending: Vec<u8>,
    connected_at: Instant,
}

/// Outcome of draining one client's socket.
enum ReadOutcome {
    Open,
    Closed,
}

impl BusSocketServer {
    /// Bind the socket, replacing a stale socket file from an earlier run.
    pub fn new(socket_path: PathBuf) -> Result<Self> {
        if socket_path.exists() {
            std::fs::remove_file(&socket_path)
                .with_context(|| format!("Failed to remove existing socket: {:?}", socket_path))?;
        }

        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create socket directory: {:?}", parent))?;
        }

        let listener = UnixListener::bind(&socket_path)
            .with_context(|| format!("Failed to bind Unix socket: {:?}", socket_path))?;

        listener
            .set_nonblocking(true)
            .context("Failed to set socket to non-blocking mode")?;

        Ok(Self {
            socket_path,
            listener,
            clients: HashMap::new(),
            next_client_id: 1,
        })
    }

    /// Serve until `running` is cleared or the driver goes away.
    pub fn run(
        mut self,
        inbound: mpsc::Sender<Event>,
        outbound: mpsc::Receiver<BusMessage>,
        running: Arc<AtomicBool>,
        debug_enabled: bool,
    ) -> Result<()> {
        if debug_enabled {
            log_debug!("Bus listening on {:?}", self.socket_path);
        }

        while running.load(Ordering::SeqCst) {
            let had_clients = !self.clients.is_empty();

            self.accept(debug_enabled);
            let connected = !self.clients.is_empty();
            if !had_clients && connected && inbound.send(Event::Connected).is_err() {
                break;
            }

            if !self.read_clients(&inbound, debug_enabled) {
                break;
            }

            loop {
                match outbound.try_recv() {
                    Ok(message) => self.broadcast(&message, debug_enabled)?,
                    Err(mpsc::TryRecvError::Empty) => break,
                    Err(mpsc::TryRecvError::Disconnected) => {
                        running.store(false, Ordering::SeqCst);
                        break;
                    }
                }
            }

            if connected && self.clients.is_empty() && inbound.send(Event::Disconnected).is_err() {
                break;
            }

            thread::sleep(Duration::from_millis(BUS_POLL_INTERVAL_MS));
        }

        if debug_enabled {
            log_debug!("Bus shutting down");
        }

        self.cleanup()
    }

    /// Accept all pending connections. A connection that cannot be set up
    /// is dropped on its own; the server keeps serving the others.
    fn accept(&mut self, debug_enabled: bool) {
        loop {
            match self.listener.accept() {
                Ok((stream, _addr)) => {
                    if let Err(e) = self.register(stream, debug_enabled) {
                        log_warning!("Dropping bus connection: {e:#}");
                    }
                }
                Err(ref e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) => {
                    if debug_enabled {
                        log_debug!("Error accepting bus connection: {}", e);
                    }
                    break;
                }
            }
        }
    }

    fn register(&mut self, stream: UnixStream, debug_enabled: bool) -> Result<()> {
        stream
            .set_nonblocking(true)
            .context("Failed to set client stream to non-blocking mode")?;

        let writer_stream = stream
            .try_clone()
            .context("Failed to clone stream for writer")?;

        let client_id = self.next_client_id;
        self.next_client_id += 1;
        self.clients.insert(
            client_id,
            ClientConnection {
                raw_stream: stream,
                writer: BufWriter::new(writer_stream),
                pending: Vec::new(),
                connected_at: Instant::now(),
            },
        );
        if debug_enabled {
            log_debug!("Bus connections: {}", self.clients.len());
        }
        Ok(())
    }

    /// Drain every client, forwarding complete lines and dropping closed
    /// connections. Returns `false` once the driver's channel is gone.
    fn read_clients(&mut self, inbound: &mpsc::Sender<Event>, debug_enabled: bool) -> bool {
        let mut disconnected = Vec::new();
        let mut delivered = true;

        for (client_id, client) in &mut self.clients {
            let outcome = client.drain();

            for line in client.take_lines() {
                match parse_line(&line) {
                    Ok(Some(message)) => {
                        if inbound.send(message.into_event()).is_err() {
                            delivered = false;
                        }
                    }
                    Ok(None) => {}
                    Err(e) => {
                        log_warning!("Ignoring malformed bus line: {e:#}");
                    }
                }
            }

            if client.pending.len() > MAX_LINE_BYTES {
                log_warning!("Bus client {client_id} exceeded the line limit, disconnecting");
                disconnected.push(*client_id);
            } else if let ReadOutcome::Closed = outcome {
                disconnected.push(*client_id);
            }
        }

        for client_id in disconnected {
            self.remove_client(client_id, debug_enabled);
        }

        delivered
    }

    /// Send `message` to every client, dropping clients whose write fails.
    fn broadcast(&mut self, message: &BusMessage, debug_enabled: bool) -> Result<()> {
        let json_line =
            serde_json::to_string(message).context("Failed to serialize bus message")?;
        let line = format!("{}\n", json_line);

        let mut failed_clients = Vec::new();
        for (client_id, client) in &mut self.clients {
            if client.writer.write_all(line.as_bytes()).is_err() || client.writer.flush().is_err()
            {
                failed_clients.push(*client_id);
            }
        }

        for client_id in failed_clients {
            self.remove_client(client_id, debug_enabled);
        }

        Ok(())
    }

    fn remove_client(&mut self, client_id: u32, debug_enabled: bool) {
        if let Some(client) = self.clients.remove(&client_id)
            && debug_enabled
        {
            log_debug!(
                "Bus client disconnected after {}s - connections: {}",
                client.connected_at.elapsed().as_secs(),
                self.clients.len()
            );
        }
    }

    /// Remove the socket file.
    fn cleanup(&self) -> Result<()> {
        if self.socket_path.exists() {
            std::fs::remove_file(&self.socket_path)
                .with_context(|| format!("Failed to remove socket file: {:?}", self.socket_path))?;
        }
        Ok(())
    }
}

impl ClientConnection {
    /// Read everything currently available into `pending`.
    fn drain(&mut self) -> ReadOutcome {
        let mut buffer = [0u8; 4096];
        loop {
            match self.raw_stream.read(&mut buffer) {
                Ok(0) => return ReadOutcome::Closed,
                Ok(n) => self.pending.extend_from_slice(&buffer[..n]),
                Err(ref e) if e.kind() == ErrorKind::WouldBlock => return ReadOutcome::Open,
                Err(ref e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(_) => return ReadOutcome::Closed,
            }
        }
    }

    /// Split off every complete line, leaving a partial tail in `pending`.
    fn take_lines(&mut self) -> Vec<String> {
        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            lines.push(String::from_utf8_lossy(&line[..pos]).into_owned());
        }
        lines
    }
}

/// Parse one line; blank lines yield `None`.
pub(crate) fn parse_line(line: &str) -> Result<Option<BusMessage>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let message: BusMessage = serde_json::from_str(line)
        .with_context(|| format!("Failed to parse bus message: {line}"))?;
    Ok(Some(message))
}
