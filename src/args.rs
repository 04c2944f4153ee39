//! Command-line argument parsing.
//!
//! flux takes a handful of flags and no subcommands. Unknown options print
//! the help text and make the process exit with a failure code.

/// What the command line asks flux to do.
#[derive(Debug, PartialEq)]
pub enum CliAction {
    /// Run the daemon with these settings
    Run {
        debug_enabled: bool,
        config_dir: Option<String>,
        log_file: Option<String>,
    },
    /// Display help information and exit
    ShowHelp,
    /// Display version information and exit
    ShowVersion,
    /// Show help due to unknown or incomplete arguments and exit
    ShowHelpDueToError,
}

/// Result of parsing command-line arguments.
pub struct ParsedArgs {
    pub action: CliAction,
}

impl ParsedArgs {
    /// Parse `args`, whose first item is the program name.
    pub fn parse<I, S>(args: I) -> ParsedArgs
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut debug_enabled = false;
        let mut display_help = false;
        let mut display_version = false;
        let mut unknown_arg_found = false;
        let mut config_dir: Option<String> = None;
        let mut log_file: Option<String> = None;

        let mut args = args
            .into_iter()
            .skip(1)
            .map(|s| s.as_ref().to_string());

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--help" | "-h" => display_help = true,
                "--version" | "-V" | "-v" => display_version = true,
                "--debug" | "-d" => debug_enabled = true,
                "--config" | "-c" => match args.next() {
                    Some(dir) if !dir.starts_with('-') => config_dir = Some(dir),
                    _ => {
                        log_warning!("Missing directory for --config");
                        unknown_arg_found = true;
                    }
                },
                "--log" | "-l" => match args.next() {
                    Some(path) if !path.starts_with('-') => log_file = Some(path),
                    _ => {
                        log_warning!("Missing file path for --log");
                        unknown_arg_found = true;
                    }
                },
                other => {
                    if other.starts_with('-') {
                        log_warning!("Unknown option: {other}");
                    } else {
                        log_warning!("Unexpected argument: {other}");
                    }
                    unknown_arg_found = true;
                }
            }
        }

        let action = if display_version {
            CliAction::ShowVersion
        } else if unknown_arg_found {
            CliAction::ShowHelpDueToError
        } else if display_help {
            CliAction::ShowHelp
        } else {
            CliAction::Run {
                debug_enabled,
                config_dir,
                log_file,
            }
        };

        ParsedArgs { action }
    }

    pub fn from_env() -> ParsedArgs {
        Self::parse(std::env::args())
    }
}

pub fn display_version_info() {
    log_version!();
    log_pipe!();
    println!("┗ {}", env!("CARGO_PKG_DESCRIPTION"));
}

pub fn display_help() {
    log_version!();
    log_block_start!(env!("CARGO_PKG_DESCRIPTION"));
    log_block_start!("Usage:");
    log_indented!("flux [OPTIONS]");
    log_block_start!("Options:");
    log_indented!("-c, --config <dir>     Use custom settings directory");
    log_indented!("-d, --debug            Enable detailed debug output");
    log_indented!("-l, --log <file>       Write log output to a file");
    log_indented!("-h, --help             Print help information");
    log_indented!("-V, --version          Print version information");
    log_end!();
}
