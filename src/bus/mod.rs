//! Local message bus between flux and the outside world.
//!
//! flux does not speak to a broker itself. It listens on a Unix socket and a
//! bridge process relays between that socket and the home automation broker.
//! Both directions carry one JSON object per line:
//!
//! ```text
//! {"topic": "state/sensor/clouds/", "payload": {"name": "clouds", "floats": [...]}}
//! ```
//!
//! Inbound lines become [`Event::Message`] values on the driver's channel;
//! everything the driver publishes through [`ChannelPublisher`] is written to
//! every connected client. The socket thread also reports when the first
//! client connects and when the last one leaves.

pub mod client;
mod server;

use anyhow::{Context, Result};
use nix::unistd::getuid;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, mpsc};

use crate::constants::BUS_SOCKET_NAME;
use crate::core::publish::Publisher;

pub(crate) use server::parse_line;

/// Everything the cycle driver reacts to.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// A message arrived on `topic`; `payload` is the raw JSON text.
    Message { topic: String, payload: String },
    /// The first bus client connected.
    Connected,
    /// The last bus client went away.
    Disconnected,
    /// Stop the driver (signal received).
    Shutdown,
}

/// One line on the bus socket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusMessage {
    pub topic: String,
    pub payload: serde_json::Value,
}

impl BusMessage {
    /// Convert to a driver event.
    ///
    /// Bridges that forward broker payloads verbatim send them as a JSON
    /// string; such a string is unwrapped so the driver always sees the
    /// payload document itself.
    pub fn into_event(self) -> Event {
        let payload = match self.payload {
            serde_json::Value::String(text) => text,
            other => other.to_string(),
        };
        Event::Message {
            topic: self.topic,
            payload,
        }
    }
}

/// Publisher that hands messages to the bus thread.
pub struct ChannelPublisher {
    sender: mpsc::Sender<BusMessage>,
}

impl ChannelPublisher {
    /// Create a publisher and the receiver the bus thread drains.
    pub fn new() -> (Self, mpsc::Receiver<BusMessage>) {
        let (sender, receiver) = mpsc::channel();
        (Self { sender }, receiver)
    }
}

impl Publisher for ChannelPublisher {
    fn publish(&mut self, topic: &str, payload: String) -> Result<()> {
        let payload = serde_json::from_str(&payload).context("Outbound payload is not JSON")?;
        self.sender
            .send(BusMessage {
                topic: topic.to_string(),
                payload,
            })
            .map_err(|_| anyhow::anyhow!("Bus thread is no longer running"))
    }
}

/// Background thread serving the bus socket.
pub struct Bus {
    thread_handle: Option<std::thread::JoinHandle<()>>,
}

impl Bus {
    /// Bind the socket and start serving it.
    ///
    /// Binding happens on the calling thread so that a bad socket path fails
    /// startup instead of leaving a driver without a bus.
    pub fn start(
        socket_path: PathBuf,
        inbound: mpsc::Sender<Event>,
        outbound: mpsc::Receiver<BusMessage>,
        running: Arc<AtomicBool>,
        debug_enabled: bool,
    ) -> Result<Self> {
        let socket_server =
            server::BusSocketServer::new(socket_path).context("Failed to create bus socket")?;

        let exit_events = inbound.clone();
        let thread_handle = std::thread::Builder::new()
            .name("flux-bus".to_string())
            .spawn(move || {
                let result = socket_server.run(inbound, outbound, running.clone(), debug_enabled);
                report_exit(result, &running, &exit_events);
            })
            .context("Failed to spawn bus thread")?;

        Ok(Self {
            thread_handle: Some(thread_handle),
        })
    }

    /// Wait for the bus thread to finish. The running flag must already be cleared.
    pub fn shutdown(mut self) -> Result<()> {
        if let Some(handle) = self.thread_handle.take() {
            handle
                .join()
                .map_err(|_| anyhow::anyhow!("Bus thread panicked"))?;
        }
        Ok(())
    }
}

/// Without the bus flux can neither receive nor publish anything, so a bus
/// thread that stops while the daemon is still running shuts the driver down.
fn report_exit(result: Result<()>, running: &AtomicBool, inbound: &mpsc::Sender<Event>) {
    if let Err(ref e) = result {
        log_error!("Bus stopped: {e:#}");
    }
    if result.is_err() || running.load(Ordering::SeqCst) {
        running.store(false, Ordering::SeqCst);
        let _ = inbound.send(Event::Shutdown);
    }
}

/// Default socket path.
///
/// - Primary: `$XDG_RUNTIME_DIR/flux-bus.sock`
/// - Fallback: `/run/user/{uid}/flux-bus.sock`
pub fn socket_path() -> PathBuf {
    let runtime_dir = if let Ok(xdg_runtime_dir) = std::env::var("XDG_RUNTIME_DIR") {
        PathBuf::from(xdg_runtime_dir)
    } else {
        PathBuf::from(format!("/run/user/{}", getuid()))
    };

    runtime_dir.join(BUS_SOCKET_NAME)
}
