//! Application coordinator for the flux daemon.
//!
//! Acquires every resource the driver needs and wires them together:
//! - optional file logging
//! - settings loading
//! - the event channel shared by the bus and the signal handler
//! - the bus socket thread
//!
//! It then hands control to [`Core::run`] on the calling thread and tears
//! the bus down once the driver returns.

use anyhow::{Context, Result};
use std::sync::atomic::Ordering;
use std::sync::mpsc;

use crate::bus::{self, Bus, ChannelPublisher};
use crate::config::{self, Settings};
use crate::core::{Core, CoreParams};
use crate::logger::Log;
use crate::signals::setup_signal_handler;
use crate::time_source::RealTimeSource;

/// Builder for configuring and running the flux daemon.
///
/// ```no_run
/// use flux::Flux;
///
/// # fn main() -> anyhow::Result<()> {
/// Flux::new(false).with_log_file(Some("/tmp/flux.log".to_string())).run()?;
/// # Ok(())
/// # }
/// ```
pub struct Flux {
    debug_enabled: bool,
    log_file: Option<String>,
}

impl Flux {
    pub fn new(debug_enabled: bool) -> Self {
        Self {
            debug_enabled,
            log_file: None,
        }
    }

    /// Mirror all output into `path`.
    pub fn with_log_file(mut self, path: Option<String>) -> Self {
        self.log_file = path;
        self
    }

    /// Run until a termination signal arrives.
    pub fn run(self) -> Result<()> {
        let _log_guard = match self.log_file {
            Some(ref path) => Some(Log::start_file_logging(path.clone())?),
            None => None,
        };

        log_version!();

        if let Some(custom_dir) = config::get_custom_config_dir() {
            log_block_start!("Base directory: {}", config::loading::private_path(&custom_dir));
        }

        let settings = match config::load() {
            Ok((settings, source)) => {
                settings.log_settings(source.as_ref());
                settings
            }
            Err(e) => {
                log_error_exit!("Settings failed");
                return Err(e);
            }
        };

        self.serve(settings)
    }

    fn serve(&self, settings: Settings) -> Result<()> {
        let (event_sender, event_receiver) = mpsc::channel();
        let running = setup_signal_handler(event_sender.clone(), self.debug_enabled)?;

        let socket_path = settings.socket_path.clone().unwrap_or_else(bus::socket_path);
        let (publisher, outbound) = ChannelPublisher::new();
        let bus = Bus::start(
            socket_path.clone(),
            event_sender,
            outbound,
            running.clone(),
            self.debug_enabled,
        )
        .context("Failed to start the message bus")?;
        log_block_start!(
            "Bus listening on {}",
            config::loading::private_path(&socket_path)
        );

        let core = Core::new(CoreParams {
            settings,
            publisher: Box::new(publisher),
            time_source: Box::new(RealTimeSource),
            debug_enabled: self.debug_enabled,
        });

        let result = core.run(&event_receiver);

        // The driver is gone; stop the bus even if no signal arrived
        running.store(false, Ordering::SeqCst);
        if let Err(e) = bus.shutdown() {
            log_critical!("{e:#}");
        }
        log_end!();

        result
    }
}
