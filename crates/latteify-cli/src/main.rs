use std::process::ExitCode;
use std::str::FromStr;

use clap::Parser;
use latteify_cli::{run, Args};
use log::{debug, LevelFilter};

fn main() -> ExitCode {
    let args = Args::parse();

    let log_level = LevelFilter::from_str(&args.log_level).unwrap_or_else(|_| {
        eprintln!("Invalid log level: {}. Using 'warn' instead.", args.log_level);
        LevelFilter::Warn
    });
    env_logger::Builder::from_env(env_logger::Env::default())
        .filter_level(log_level)
        .init();

    debug!(args:?; "Parsed arguments");

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            debug!(error:? = err; "Run failed");
            eprintln!("Error: {err}");
            ExitCode::FAILURE
        }
    }
}
