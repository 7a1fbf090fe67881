pub mod cli;
pub mod commands;
pub mod utils;

use abbrv_core::config::get_data_file_path;
use clap::Parser;
use cli::{Abbrv, Commands};
use commands::handle_command;
use std::io;
use std::process;
use tracing::error;
use utils::init_logging;

/// Run the abbrv CLI application
pub fn run_main() {
    let args = Abbrv::parse();

    // The worker's stderr is the daemon log, so it logs more
    let is_worker = matches!(args.commands, Some(Commands::DaemonWorker));
    init_logging(if is_worker { "info" } else { "warn" });

    let data_file = args.file.unwrap_or_else(get_data_file_path);
    let result = handle_command(args.commands, &data_file, &mut io::stdout().lock());

    if let Err(e) = result {
        if is_worker {
            error!("Daemon worker failed: {}", e);
        }
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}
