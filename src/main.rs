//! gredentures
//!
//! Exchanges an MFA token for temporary AWS session credentials and rewrites
//! the shared credentials file so other tools can use the session.
//!
//! The run is a single linear pipeline:
//! 1. Merge command-line options with `~/.gredentures`, creating it on first run
//! 2. Load the permanent keys of the `[default]` profile
//! 3. Call STS `GetSessionToken` with the MFA device and token
//! 4. Write `[default]` and the session profile to `~/.aws/credentials`
//! 5. Suggest `export AWS_PROFILE=...` if the session profile is not selected

use std::{env, process::ExitCode};

use clap::Parser;
use log::{LevelFilter, Log};

mod cli;
mod config;
mod credentials;
mod error;
mod pipeline;
mod resolver;
mod writer;

use cli::Args;
use credentials::StsExchanger;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();
    println!("gredentures {}", env!("CARGO_PKG_VERSION"));

    let logger = build_logger(args.verbose);

    match run(args, &logger).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args, logger: &dyn Log) -> anyhow::Result<()> {
    let config = pipeline::resolve(args.into(), logger).await?;
    let exchanger = StsExchanger::load(logger).await;
    pipeline::refresh(&config, &exchanger, logger).await?;

    let current = env::var("AWS_PROFILE").ok();
    if let Some(notice) = pipeline::profile_notice(&config.profile_name, current.as_deref()) {
        println!("{notice}");
    }

    Ok(())
}

/// Builds the logger handed to every component. INFO by default, DEBUG with
/// `--verbose`; `RUST_LOG` can still refine per-module levels.
///
/// Only the level ceiling is published globally: the `log` macros consult it
/// before dispatching to an explicit logger.
fn build_logger(verbose: bool) -> env_logger::Logger {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    let logger = env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .build();
    log::set_max_level(logger.filter());

    logger
}
