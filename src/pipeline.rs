//! The single linear run: resolve, fetch permanent keys, exchange, write.
//!
//! Each step commits its own side effect. A failure in a later step leaves
//! earlier effects (such as a freshly bootstrapped config file) in place.

use anyhow::{Context, Result};
use aws_smithy_types::date_time::Format;
use log::{Log, debug, info};

use crate::{
    credentials::CredentialExchanger,
    resolver::{CliOptions, ConfigResolver, ResolvedConfig},
    writer::CredentialFileWriter,
};

/// Merges and validates the options. Runs before any AWS config is loaded.
pub async fn resolve(options: CliOptions, logger: &dyn Log) -> Result<ResolvedConfig> {
    info!(logger: logger, "Validating gredentures options and config...");
    let config = ConfigResolver::new(logger)
        .resolve(options)
        .await
        .context("Error validating options")?;
    debug!(
        logger: logger,
        "Using config file {} (verbose: {})",
        config.config_path.display(),
        config.verbose
    );

    Ok(config)
}

/// Runs the credential steps for an already resolved configuration.
pub async fn refresh<E: CredentialExchanger>(
    config: &ResolvedConfig,
    exchanger: &E,
    logger: &dyn Log,
) -> Result<()> {
    info!(logger: logger, "Getting default aws credentials...");
    let permanent = exchanger
        .permanent_credentials()
        .await
        .context("Error getting default credentials")?;

    info!(logger: logger, "Getting aws session credentials...");
    let temporary = exchanger
        .exchange(
            &config.org_id,
            &config.device_arn,
            &config.token,
            config.timeout_seconds,
        )
        .await
        .context("Error getting session credentials")?;

    info!(logger: logger, "Writing updated aws credentials file...");
    CredentialFileWriter::new(logger)
        .write(
            &config.credentials_path,
            &permanent,
            &temporary,
            &config.profile_name,
            config.write_mode,
        )
        .await
        .context("Error creating updated credentials file")?;

    match temporary.expiration.fmt(Format::DateTime) {
        Ok(expiration) => info!(logger: logger, "Success! Credentials expire at: {expiration}"),
        Err(_) => info!(logger: logger, "Success!"),
    }

    Ok(())
}

/// Boxed hint printed when `AWS_PROFILE` does not already select the session
/// profile.
pub fn profile_notice(profile_name: &str, current: Option<&str>) -> Option<String> {
    if current == Some(profile_name) {
        return None;
    }

    let lines = [
        "To use your session credentials by default add this to your shell profile:"
            .to_string(),
        String::new(),
        format!("    export AWS_PROFILE={profile_name}"),
        String::new(),
        "then reload your shell profile.".to_string(),
    ];
    let width = lines.iter().map(|l| l.chars().count()).max().unwrap_or(0);
    let border = "*".repeat(width + 4);

    let mut notice = format!("\n{border}\n");
    for line in &lines {
        notice.push_str(&format!("* {line:<width$} *\n"));
    }
    notice.push_str(&border);
    notice.push('\n');

    Some(notice)
}
