//! Entry point for the flux daemon.
//!
//! Parses the command line, handles help/version, applies the settings
//! directory override and then hands over to [`flux::Flux`].

use flux::args::{self, CliAction, ParsedArgs};
use flux::constants::{EXIT_FAILURE, EXIT_SUCCESS};
use flux::{Flux, config};

fn main() {
    let parsed = ParsedArgs::from_env();

    let code = match parsed.action {
        CliAction::ShowVersion => {
            args::display_version_info();
            EXIT_SUCCESS
        }
        CliAction::ShowHelp => {
            args::display_help();
            EXIT_SUCCESS
        }
        CliAction::ShowHelpDueToError => {
            args::display_help();
            EXIT_FAILURE
        }
        CliAction::Run {
            debug_enabled,
            config_dir,
            log_file,
        } => {
            if let Err(e) = config::set_config_dir(config_dir) {
                flux::log_error!("{e}");
                std::process::exit(EXIT_FAILURE);
            }

            match Flux::new(debug_enabled).with_log_file(log_file).run() {
                Ok(()) => EXIT_SUCCESS,
                Err(e) => {
                    eprintln!("{e:?}");
                    EXIT_FAILURE
                }
            }
        }
    };

    std::process::exit(code);
}
