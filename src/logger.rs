//! Structured logging with box-drawing output.
//!
//! Every line flux prints goes through this module so that the daemon log
//! reads as one continuous tree:
//!
//! ```text
//! ┏ flux v0.4.0 ━━╸
//! ┃
//! ┣ Loaded settings
//! ┃   Update interval: 10s
//! ┣[INFO] Bus client connected
//! ╹
//! ```
//!
//! ## Conventions
//!
//! - `log_block_start!` opens a new conceptual block (state change, startup
//!   phase). It prints a spacer pipe before the `┣` line.
//! - `log_decorated!` continues the current block.
//! - `log_indented!` prints nested details under the previous line.
//! - `log_pipe!` inserts one empty `┃` line, mainly before a level-prefixed
//!   message that starts a block of its own.
//! - `log_info!`, `log_warning!`, `log_error!`, `log_debug!` and
//!   `log_critical!` carry a colored `[LEVEL]` tag.
//! - `log_version!` and `log_end!` frame the whole run.
//!
//! Output goes to stdout, or to a file when [`Log::start_file_logging`] is
//! active. File output is stripped of ANSI codes and every line carries a
//! `[HH:MM:SS]` timestamp, since a long-running daemon log is useless without one.

use std::io::Write;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Sender, channel};

static LOGGING_ENABLED: AtomicBool = AtomicBool::new(true);

static LOG_CHANNEL: OnceLock<Option<Sender<LogMessage>>> = OnceLock::new();

enum LogMessage {
    Formatted(String),
    Shutdown,
}

/// Runtime switches for the logging macros.
pub struct Log;

impl Log {
    /// Enable or disable all output (tests turn it off to keep runs quiet).
    pub fn set_enabled(enabled: bool) {
        LOGGING_ENABLED.store(enabled, Ordering::SeqCst);
    }

    pub fn is_enabled() -> bool {
        LOGGING_ENABLED.load(Ordering::SeqCst)
    }

    /// Route all further output to `file_path`.
    ///
    /// Writing happens on a dedicated thread so the cycle driver never waits
    /// on disk I/O. Dropping the returned guard flushes and closes the file.
    pub fn start_file_logging(file_path: String) -> anyhow::Result<LoggerGuard> {
        let (tx, rx) = channel();

        LOG_CHANNEL
            .set(Some(tx.clone()))
            .map_err(|_| anyhow::anyhow!("Logger channel already initialized"))?;

        let handle = std::thread::Builder::new()
            .name("flux-log".to_string())
            .spawn(move || {
                let mut file = std::fs::File::create(&file_path)?;

                loop {
                    match rx.recv() {
                        Ok(LogMessage::Formatted(text)) => {
                            file.write_all(text.as_bytes())?;
                        }
                        Ok(LogMessage::Shutdown) | Err(_) => {
                            file.flush()?;
                            break;
                        }
                    }
                }

                Ok::<(), anyhow::Error>(())
            })?;

        Ok(LoggerGuard {
            tx,
            handle: Some(handle),
        })
    }

    fn is_file_logging() -> bool {
        matches!(LOG_CHANNEL.get(), Some(Some(_)))
    }

    /// Timestamp prefix for file output, empty on a terminal.
    pub fn timestamp_prefix() -> String {
        if Self::is_file_logging() {
            format!("[{}] ", chrono::Local::now().format("%H:%M:%S"))
        } else {
            String::new()
        }
    }
}

/// Keeps the file logging thread alive; flushes the file on drop.
pub struct LoggerGuard {
    tx: Sender<LogMessage>,
    handle: Option<std::thread::JoinHandle<anyhow::Result<()>>>,
}

impl Drop for LoggerGuard {
    fn drop(&mut self) {
        let _ = self.tx.send(LogMessage::Shutdown);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn strip_ansi_codes(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '\x1b' && chars.peek() == Some(&'[') {
            chars.next();
            for ch in chars.by_ref() {
                if ch == 'm' {
                    break;
                }
            }
        } else {
            result.push(ch);
        }
    }

    result
}

/// Write already formatted text to the active sink.
pub fn write_output(text: &str) {
    if let Some(Some(tx)) = LOG_CHANNEL.get() {
        let _ = tx.send(LogMessage::Formatted(strip_ansi_codes(text)));
    } else {
        print!("{text}");
        let _ = std::io::stdout().flush();
    }
}

/// Emit one line made of `lead` followed by `message`.
pub fn emit(lead: &str, message: &str) {
    let prefix = Log::timestamp_prefix();
    write_output(&format!("{prefix}{lead}{message}\n"));
}

/// Emit a spacer pipe followed by a `┣` line.
pub fn emit_block(message: &str) {
    let prefix = Log::timestamp_prefix();
    write_output(&format!("{prefix}┃\n{prefix}┣ {message}\n"));
}

// # Logging Macros

#[doc(hidden)]
#[macro_export]
macro_rules! __flux_log {
    ($lead:expr, $($arg:tt)+) => {{
        if $crate::logger::Log::is_enabled() {
            $crate::logger::emit($lead, &format!($($arg)+));
        }
    }};
}

/// Continue the current block with a `┣` line.
#[macro_export]
macro_rules! log_decorated {
    ($($arg:tt)+) => { $crate::__flux_log!("┣ ", $($arg)+) };
}

/// Nested detail line under the previous message.
#[macro_export]
macro_rules! log_indented {
    ($($arg:tt)+) => { $crate::__flux_log!("┃   ", $($arg)+) };
}

/// Single empty `┃` line for vertical spacing.
#[macro_export]
macro_rules! log_pipe {
    () => {{
        if $crate::logger::Log::is_enabled() {
            $crate::logger::emit("┃", "");
        }
    }};
}

/// Start a new block of related lines.
#[macro_export]
macro_rules! log_block_start {
    ($($arg:tt)+) => {{
        if $crate::logger::Log::is_enabled() {
            $crate::logger::emit_block(&format!($($arg)+));
        }
    }};
}

/// Application header, printed once at startup.
#[macro_export]
macro_rules! log_version {
    () => {{
        if $crate::logger::Log::is_enabled() {
            let version = env!("CARGO_PKG_VERSION");
            $crate::logger::emit("┏ ", &format!("flux v{version} ━━╸"));
        }
    }};
}

/// Final marker, printed once at shutdown.
#[macro_export]
macro_rules! log_end {
    () => {{
        if $crate::logger::Log::is_enabled() {
            $crate::logger::emit("╹", "");
        }
    }};
}

#[macro_export]
macro_rules! log_warning {
    ($($arg:tt)+) => { $crate::__flux_log!("┣[\x1b[33mWARNING\x1b[0m] ", $($arg)+) };
}

#[macro_export]
macro_rules! log_error {
    ($($arg:tt)+) => { $crate::__flux_log!("┣[\x1b[31mERROR\x1b[0m] ", $($arg)+) };
}

/// Error that terminates the current flow, drawn with a closing corner.
#[macro_export]
macro_rules! log_error_exit {
    ($($arg:tt)+) => {{
        if $crate::logger::Log::is_enabled() {
            $crate::logger::emit("┃", "");
            $crate::logger::emit("┗[\x1b[31mERROR\x1b[0m] ", &format!($($arg)+));
        }
    }};
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)+) => { $crate::__flux_log!("┣[\x1b[32mINFO\x1b[0m] ", $($arg)+) };
}

#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)+) => { $crate::__flux_log!("┣[\x1b[32mDEBUG\x1b[0m] ", $($arg)+) };
}

#[macro_export]
macro_rules! log_critical {
    ($($arg:tt)+) => { $crate::__flux_log!("┣[\x1b[31mCRITICAL\x1b[0m] ", $($arg)+) };
}
