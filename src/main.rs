use std::process::ExitCode;

use clap::Parser;

fn main() -> ExitCode {
    // Session log lives in the OS data directory; init before anything that
    // might want to log.
    smartmask::logger::init();

    let args = smartmask::cli::CliArgs::parse();
    smartmask::cli::run(args)
}
