//! Command-line interface definitions.

use std::path::PathBuf;

use clap::Parser;

use crate::resolver::CliOptions;

/// Exchange an MFA token for AWS session credentials.
///
/// Reads the permanent keys of the `[default]` profile, requests a session
/// with the given MFA code and rewrites the credentials file with both the
/// `[default]` profile and the session profile. Org, device and timeout are
/// remembered in the config file after the first run.
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Args {
    /// MFA token code (required)
    #[arg(short, long)]
    pub token: Option<String>,

    /// Path to gredentures config file [default: ~/.gredentures]
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Organization (optional if set in config)
    #[arg(short, long)]
    pub org: Option<String>,

    /// MFA device ARN (optional if set in config)
    #[arg(short, long)]
    pub device: Option<String>,

    /// Name to use for the session credentials profile [default: default-mfa]
    #[arg(short, long)]
    pub profile: Option<String>,

    /// Session duration in seconds [default: 86400]
    #[arg(long)]
    pub timeout: Option<u32>,

    /// Path to AWS credentials file [default: ~/.aws/credentials]
    #[arg(long, env = "AWS_SHARED_CREDENTIALS_FILE")]
    pub credentials_file: Option<PathBuf>,

    /// Keep other profiles already present in the credentials file
    #[arg(long)]
    pub keep_other_profiles: bool,

    /// Enable verbose output
    #[arg(long)]
    pub verbose: bool,
}

impl From<Args> for CliOptions {
    fn from(args: Args) -> Self {
        Self {
            token: args.token,
            config_path: args.config,
            org: args.org,
            device: args.device,
            profile: args.profile,
            timeout: args.timeout,
            credentials_path: args.credentials_file,
            keep_other_profiles: args.keep_other_profiles,
            verbose: args.verbose,
        }
    }
}
