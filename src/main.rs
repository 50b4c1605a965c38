mod annotate;
mod artifacts;
mod cli;
mod globals;
mod logger;
mod os_utils;
mod region;
mod run_stats;
mod sv_candidate;
mod tool_runner;
mod validate_sv;
mod vcf_utils;

use std::{error, process};

use hhmmss::Hhmmss;
use log::{info, warn};

use crate::annotate::run_sv_validation;
use crate::globals::{PROGRAM_NAME, PROGRAM_VERSION};
use crate::logger::setup_output_dir_and_logger;

/// Run system configuration steps prior to starting any other program logic
///
fn system_configuration_prelude() {
    os_utils::attempt_max_open_file_limit();
}

fn run(settings: &cli::Settings) -> Result<(), Box<dyn error::Error>> {
    info!("Starting {PROGRAM_NAME} {PROGRAM_VERSION}");
    info!(
        "cmdline: {}",
        std::env::args().collect::<Vec<_>>().join(" ")
    );
    info!(
        "Running {} SV validation workers, with {} threads per external tool",
        settings.shared.worker_count, settings.shared.thread_count
    );

    let thread_demand = cli::get_max_tool_thread_demand(&settings.shared);
    let cpu_count = num_cpus::get();
    if thread_demand > cpu_count {
        warn!(
            "External tools may run on up to {thread_demand} threads at once, which exceeds the {cpu_count} available cpus"
        );
    }

    let start = std::time::Instant::now();

    cli::validate_settings_data(&settings.validate);
    cli::write_validate_settings(settings.get_output_dir(), &settings.shared, &settings.validate);

    run_sv_validation(&settings.shared, &settings.validate)?;

    info!(
        "{PROGRAM_NAME} completed. Total Runtime: {}",
        start.elapsed().hhmmssxxx()
    );
    Ok(())
}

fn main() {
    system_configuration_prelude();

    let settings = cli::validate_and_fix_settings(cli::parse_settings());

    // Setup logger, including creation of the output directory for the log file:
    setup_output_dir_and_logger(
        settings.get_output_dir(),
        settings.shared.clobber,
        settings.shared.debug,
    );

    if let Err(err) = run(&settings) {
        eprintln!("{err}");
        process::exit(2);
    }
}
