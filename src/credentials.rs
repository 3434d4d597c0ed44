//! Permanent and temporary AWS credentials, and the STS exchange between them.

use std::fmt;

use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_credential_types::provider::ProvideCredentials;
use aws_sdk_sts::Client;
use aws_smithy_types::{DateTime, error::display::DisplayErrorContext};
use log::{Log, debug, info};

use crate::error::{Error, Result};

/// Profile holding the long-lived IAM user keys.
pub const PERMANENT_PROFILE: &str = "default";

/// Used when the permanent profile has no region configured.
const FALLBACK_REGION: &str = "us-west-2";

#[derive(Clone, PartialEq, Eq)]
pub struct PermanentCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
}

#[derive(Clone, PartialEq)]
pub struct TemporaryCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: String,
    pub expiration: DateTime,
}

// Secrets stay out of `{:?}` output.
impl fmt::Debug for PermanentCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PermanentCredentials")
            .field("access_key_id", &self.access_key_id)
            .finish_non_exhaustive()
    }
}

impl fmt::Debug for TemporaryCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TemporaryCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("expiration", &self.expiration)
            .finish_non_exhaustive()
    }
}

/// Source of permanent credentials and of MFA-backed session credentials.
pub trait CredentialExchanger {
    /// Long-lived keys of the [`PERMANENT_PROFILE`] profile.
    async fn permanent_credentials(&self) -> Result<PermanentCredentials>;

    /// Trades a one-time MFA code for session credentials valid for
    /// `timeout_seconds`. `device_arn` is the MFA serial number. `org_id` does
    /// not influence the request.
    async fn exchange(
        &self,
        org_id: &str,
        device_arn: &str,
        token: &str,
        timeout_seconds: u32,
    ) -> Result<TemporaryCredentials>;
}

/// [`CredentialExchanger`] backed by AWS STS `GetSessionToken`.
pub struct StsExchanger<'a> {
    config: SdkConfig,
    logger: &'a dyn Log,
}

impl<'a> StsExchanger<'a> {
    /// Loads the SDK configuration for the permanent profile once; both
    /// [`CredentialExchanger`] calls reuse it.
    pub async fn load(logger: &'a dyn Log) -> Self {
        debug!(logger: logger, "Loading AWS config for profile '{PERMANENT_PROFILE}'");

        let loaded = aws_config::defaults(BehaviorVersion::latest())
            .profile_name(PERMANENT_PROFILE)
            .load()
            .await;

        let config = match loaded.region() {
            Some(region) => {
                debug!(logger: logger, "Using region: {region}");
                loaded
            }
            None => {
                debug!(logger: logger, "No region configured, using {FALLBACK_REGION} for STS");
                aws_config::defaults(BehaviorVersion::latest())
                    .profile_name(PERMANENT_PROFILE)
                    .region(Region::new(FALLBACK_REGION))
                    .load()
                    .await
            }
        };

        Self { config, logger }
    }

    fn auth_error(reason: impl Into<String>) -> Error {
        Error::Auth {
            profile: PERMANENT_PROFILE.to_string(),
            reason: reason.into(),
        }
    }
}

impl CredentialExchanger for StsExchanger<'_> {
    async fn permanent_credentials(&self) -> Result<PermanentCredentials> {
        let provider = self
            .config
            .credentials_provider()
            .ok_or_else(|| Self::auth_error("no credentials provider configured"))?;

        let credentials = provider
            .provide_credentials()
            .await
            .map_err(|e| Self::auth_error(DisplayErrorContext(&e).to_string()))?;
        debug!(
            logger: self.logger,
            "Loaded permanent credentials {}",
            credentials.access_key_id()
        );

        Ok(PermanentCredentials {
            access_key_id: credentials.access_key_id().to_string(),
            secret_access_key: credentials.secret_access_key().to_string(),
        })
    }

    async fn exchange(
        &self,
        org_id: &str,
        device_arn: &str,
        token: &str,
        timeout_seconds: u32,
    ) -> Result<TemporaryCredentials> {
        let duration = i32::try_from(timeout_seconds).map_err(|_| {
            Error::Validation(format!("timeout of {timeout_seconds}s is out of range"))
        })?;

        info!(logger: self.logger, "Requesting session token - Duration: {duration}s");
        debug!(logger: self.logger, "Getting session token for device {device_arn} (org {org_id})");

        let output = Client::new(&self.config)
            .get_session_token()
            .duration_seconds(duration)
            .serial_number(device_arn)
            .token_code(token)
            .send()
            .await
            .map_err(|e| Error::Exchange(DisplayErrorContext(&e).to_string()))?;

        let session = output
            .credentials()
            .ok_or_else(|| Error::Exchange("no credentials returned".to_string()))?;

        Ok(TemporaryCredentials {
            access_key_id: session.access_key_id().to_string(),
            secret_access_key: session.secret_access_key().to_string(),
            session_token: session.session_token().to_string(),
            expiration: *session.expiration(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_output_hides_secrets() {
        let permanent = PermanentCredentials {
            access_key_id: "AKIAEXAMPLE".to_string(),
            secret_access_key: "permanent-secret".to_string(),
        };
        let temporary = TemporaryCredentials {
            access_key_id: "ASIAEXAMPLE".to_string(),
            secret_access_key: "temporary-secret".to_string(),
            session_token: "session-token".to_string(),
            expiration: DateTime::from_secs(0),
        };

        let permanent = format!("{permanent:?}");
        let temporary = format!("{temporary:?}");

        assert!(permanent.contains("AKIAEXAMPLE"));
        assert!(!permanent.contains("permanent-secret"));
        assert!(temporary.contains("ASIAEXAMPLE"));
        assert!(!temporary.contains("temporary-secret"));
        assert!(!temporary.contains("session-token"));
    }
}
