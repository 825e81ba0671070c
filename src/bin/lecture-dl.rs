//! lecture-dl CLI - keeps a local lecture archive up to date.

#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

use std::env;

use env_logger::Env;
use log::LevelFilter;

use lecture_dl::cli::{self, Command};

fn init_logger(verbose: bool) {
    let mut builder = env_logger::Builder::from_env(Env::default().default_filter_or("info"));
    if verbose {
        builder.filter_level(LevelFilter::Debug);
    } else {
        builder.format_timestamp(None).format_target(false);
    }
    builder.init();
}

#[tokio::main]
async fn main() {
    let args = match cli::parse_args(env::args().skip(1)) {
        Ok(Command::Run(args)) => args,
        Ok(Command::Help) => {
            cli::print_usage();
            return;
        }
        Err(e) => {
            eprintln!("Error: {e}");
            cli::print_usage();
            std::process::exit(2);
        }
    };
    init_logger(args.verbose);

    match cli::run(&args).await {
        Ok(report) if report.is_clean() => {}
        Ok(_) => std::process::exit(1),
        Err(e) => {
            log::error!("{e}");
            std::process::exit(1);
        }
    }
}
