//! Signal handling for the flux daemon.
//!
//! SIGINT, SIGTERM and SIGHUP all mean "stop": the signal thread clears the
//! shared running flag and posts [`Event::Shutdown`] on the driver's event
//! channel, so a driver waiting for its next tick wakes up immediately.

use anyhow::{Context, Result};
use signal_hook::{
    consts::signal::{SIGHUP, SIGINT, SIGTERM},
    iterator::Signals,
};
use std::{
    sync::atomic::{AtomicBool, Ordering},
    sync::{Arc, mpsc},
    thread,
};

use crate::bus::Event;

/// Human readable name for a termination signal.
pub fn signal_name(signal: i32) -> &'static str {
    match signal {
        SIGINT => "SIGINT (Ctrl+C)",
        SIGTERM => "SIGTERM (termination request)",
        SIGHUP => "SIGHUP (session logout)",
        _ => "unknown signal",
    }
}

/// Register the termination signals and forward them to `events`.
///
/// The returned flag starts out `true` and is cleared on the first signal;
/// the bus thread watches it to know when to stop.
pub fn setup_signal_handler(
    events: mpsc::Sender<Event>,
    debug_enabled: bool,
) -> Result<Arc<AtomicBool>> {
    let running = Arc::new(AtomicBool::new(true));

    let mut signals =
        Signals::new([SIGINT, SIGTERM, SIGHUP]).context("failed to register signal handlers")?;

    let running_clone = running.clone();

    thread::Builder::new()
        .name("flux-signals".to_string())
        .spawn(move || {
            for sig in signals.forever() {
                if debug_enabled {
                    log_pipe!();
                    log_debug!("Received {}", signal_name(sig));
                }

                running_clone.store(false, Ordering::SeqCst);

                if events.send(Event::Shutdown).is_err() {
                    break;
                }
            }
        })
        .context("failed to spawn signal handler thread")?;

    Ok(running)
}
