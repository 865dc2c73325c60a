#![forbid(unsafe_code)]

//! Heddle showcase binary: runs the demo screens against a real scheduler.

mod cli;
mod screens;

use std::process;

use cli::{Options, Screen};
use heddle_core::error::Result;

fn run(options: &Options) -> Result<()> {
    match options.screen {
        Screen::Counter => screens::counter::run(options.clicks)?,
        Screen::Remote => screens::remote::run()?,
        Screen::Todo => screens::todo::run()?,
        Screen::All => {
            screens::counter::run(options.clicks)?;
            screens::remote::run()?;
            screens::todo::run()?;
        }
    }
    Ok(())
}

fn main() {
    let options = Options::parse_or_exit();

    let default_level = if options.quiet { "warn" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_target(false)
        .init();

    if let Err(err) = run(&options) {
        tracing::error!(error = %err, "showcase failed");
        process::exit(1);
    }
}
