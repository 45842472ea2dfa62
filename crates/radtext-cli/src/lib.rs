pub mod cli;
pub mod commands;
pub mod format;
pub mod logging;

use clap::Parser;

/// Parse the command line and run it, exiting with status 1 on failure
pub fn run_main() {
    let args = cli::Radtext::parse();

    if let Err(e) = commands::handle_command(args.commands) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
