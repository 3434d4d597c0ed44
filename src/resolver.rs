//! Merges command-line values with the persisted config file.
//!
//! Precedence is CLI, then file, then built-in defaults. The file only ever
//! backfills gaps; it is written once, on first run, and never overwritten
//! by resolution afterwards.

use std::path::PathBuf;

use log::{Log, debug};

use crate::{
    config::{self, ConfigStore, PersistedConfig},
    error::{Error, Result},
    writer::{self, WriteMode},
};

pub const DEFAULT_PROFILE_NAME: &str = "default-mfa";
pub const DEFAULT_TIMEOUT_SECONDS: u32 = 86_400;

/// Values as they arrived on the command line, before any merging.
#[derive(Debug, Clone, Default)]
pub struct CliOptions {
    pub token: Option<String>,
    pub config_path: Option<PathBuf>,
    pub org: Option<String>,
    pub device: Option<String>,
    pub profile: Option<String>,
    pub timeout: Option<u32>,
    pub credentials_path: Option<PathBuf>,
    pub keep_other_profiles: bool,
    pub verbose: bool,
}

/// Complete configuration for one run. `token`, `org_id` and `device_arn` are
/// guaranteed non-empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
    pub token: String,
    pub org_id: String,
    pub device_arn: String,
    pub timeout_seconds: u32,
    pub profile_name: String,
    pub config_path: PathBuf,
    pub credentials_path: PathBuf,
    pub write_mode: WriteMode,
    pub verbose: bool,
}

/// Produces a [`ResolvedConfig`] from [`CliOptions`] and the config file.
pub struct ConfigResolver<'a> {
    store: ConfigStore<'a>,
    logger: &'a dyn Log,
}

impl<'a> ConfigResolver<'a> {
    pub fn new(logger: &'a dyn Log) -> Self {
        Self {
            store: ConfigStore::new(logger),
            logger,
        }
    }

    /// Merges `options` with the config file, creating the file when it is
    /// missing, then applies defaults and validates.
    ///
    /// Fails with [`Error::Validation`] when the token is empty, or when org
    /// or device is still empty after the merge.
    pub async fn resolve(&self, options: CliOptions) -> Result<ResolvedConfig> {
        let config_path = match options.config_path {
            Some(path) => path,
            None => config::default_config_path()?,
        };

        let mut org_id = options.org.unwrap_or_default();
        let mut device_arn = options.device.unwrap_or_default();
        let mut timeout_seconds = options.timeout.unwrap_or_default();

        debug!(logger: self.logger, "Checking for gredentures config file at {}", config_path.display());
        match self.store.load(&config_path).await {
            Ok(persisted) => {
                if org_id.is_empty() {
                    org_id = persisted.org_id;
                }
                if device_arn.is_empty() {
                    device_arn = persisted.device_arn;
                }
                if timeout_seconds == 0 {
                    timeout_seconds = persisted.timeout_seconds;
                }
            }
            Err(Error::NotFound(_)) => {
                debug!(logger: self.logger, "Gredentures config file does not exist, creating it");
                let seed = PersistedConfig {
                    org_id: org_id.clone(),
                    device_arn: device_arn.clone(),
                    timeout_seconds,
                };
                self.store.save(&config_path, &seed).await?;
            }
            Err(e) => return Err(e),
        }

        let profile_name = options
            .profile
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| DEFAULT_PROFILE_NAME.to_string());
        if timeout_seconds == 0 {
            timeout_seconds = DEFAULT_TIMEOUT_SECONDS;
        }

        debug!(logger: self.logger, "Validating options");
        let token = options.token.unwrap_or_default();
        if token.is_empty() {
            return Err(Error::Validation("token must be supplied for MFA".to_string()));
        }
        if org_id.is_empty() || device_arn.is_empty() {
            return Err(Error::Validation(
                "org and device are both required: the token must be passed on the command line, \
                 org and device may come from the command line or the config file"
                    .to_string(),
            ));
        }

        let credentials_path = match options.credentials_path {
            Some(path) => path,
            None => writer::default_credentials_path()?,
        };
        let write_mode = if options.keep_other_profiles {
            WriteMode::Merge
        } else {
            WriteMode::Overwrite
        };

        debug!(
            logger: self.logger,
            "Resolved org={org_id} device={device_arn} timeout={timeout_seconds}s profile={profile_name}"
        );

        Ok(ResolvedConfig {
            token,
            org_id,
            device_arn,
            timeout_seconds,
            profile_name,
            config_path,
            credentials_path,
            write_mode,
            verbose: options.verbose,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    struct Fixture {
        dir: TempDir,
        logger: env_logger::Logger,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                dir: TempDir::new().unwrap(),
                logger: env_logger::Builder::new().is_test(true).build(),
            }
        }

        fn config_path(&self) -> PathBuf {
            self.dir.path().join(".gredentures")
        }

        fn write_config(&self, content: &str) {
            std::fs::write(self.config_path(), content).unwrap();
        }

        fn options(&self) -> CliOptions {
            CliOptions {
                token: Some("123456".to_string()),
                config_path: Some(self.config_path()),
                credentials_path: Some(self.dir.path().join("credentials")),
                ..Default::default()
            }
        }

        async fn resolve(&self, options: CliOptions) -> Result<ResolvedConfig> {
            ConfigResolver::new(&self.logger).resolve(options).await
        }
    }

    #[tokio::test]
    async fn test_full_cli_input_ignores_file_content() {
        let fx = Fixture::new();
        fx.write_config("[gredentures]\nOrg=file-org\nDevice=file-device\nTimeout=60\n");

        let resolved = fx
            .resolve(CliOptions {
                org: Some("cli-org".to_string()),
                device: Some("cli-device".to_string()),
                timeout: Some(900),
                ..fx.options()
            })
            .await
            .unwrap();

        assert_eq!(resolved.org_id, "cli-org");
        assert_eq!(resolved.device_arn, "cli-device");
        assert_eq!(resolved.timeout_seconds, 900);
    }

    #[tokio::test]
    async fn test_file_backfills_missing_cli_values() {
        let fx = Fixture::new();
        fx.write_config("[gredentures]\nOrg=file-org\nDevice=file-device\nTimeout=3600\n");

        let resolved = fx.resolve(fx.options()).await.unwrap();

        assert_eq!(resolved.org_id, "file-org");
        assert_eq!(resolved.device_arn, "file-device");
        assert_eq!(resolved.timeout_seconds, 3600);
    }

    #[tokio::test]
    async fn test_cli_org_overrides_file_org() {
        let fx = Fixture::new();
        fx.write_config("[gredentures]\nOrg=file-org\nDevice=file-device\n");

        let resolved = fx
            .resolve(CliOptions {
                org: Some("cli-org".to_string()),
                ..fx.options()
            })
            .await
            .unwrap();

        assert_eq!(resolved.org_id, "cli-org");
        assert_eq!(resolved.device_arn, "file-device");
    }

    #[tokio::test]
    async fn test_defaults_applied_when_unset_everywhere() {
        let fx = Fixture::new();
        fx.write_config("[gredentures]\nOrg=acme\nDevice=arn:x\nTimeout=0\n");

        let resolved = fx.resolve(fx.options()).await.unwrap();

        assert_eq!(resolved.profile_name, DEFAULT_PROFILE_NAME);
        assert_eq!(resolved.timeout_seconds, DEFAULT_TIMEOUT_SECONDS);
        assert_eq!(resolved.write_mode, WriteMode::Overwrite);
    }

    #[tokio::test]
    async fn test_missing_token_is_rejected() {
        let fx = Fixture::new();

        for token in [None, Some(String::new())] {
            let err = fx
                .resolve(CliOptions {
                    token,
                    org: Some("acme".to_string()),
                    device: Some("arn:x".to_string()),
                    ..fx.options()
                })
                .await
                .unwrap_err();
            assert!(matches!(&err, Error::Validation(msg) if msg.contains("token")));
        }
    }

    #[tokio::test]
    async fn test_missing_org_or_device_is_rejected() {
        let cases = [
            (Some("acme"), None),
            (None, Some("arn:x")),
            (None, None),
        ];

        for (org, device) in cases {
            let fx = Fixture::new();
            let err = fx
                .resolve(CliOptions {
                    org: org.map(str::to_string),
                    device: device.map(str::to_string),
                    ..fx.options()
                })
                .await
                .unwrap_err();
            assert!(
                matches!(&err, Error::Validation(msg) if msg.contains("org") && msg.contains("device")),
                "unexpected error: {err}"
            );
        }
    }

    #[tokio::test]
    async fn test_first_run_bootstraps_config_file() {
        let fx = Fixture::new();

        fx.resolve(CliOptions {
            org: Some("acme".to_string()),
            device: Some("arn:x".to_string()),
            ..fx.options()
        })
        .await
        .unwrap();

        let logger = env_logger::Builder::new().is_test(true).build();
        let saved = ConfigStore::new(&logger).load(&fx.config_path()).await.unwrap();
        assert_eq!(saved.org_id, "acme");
        assert_eq!(saved.device_arn, "arn:x");
        assert_eq!(saved.timeout_seconds, 0);
    }

    #[tokio::test]
    async fn test_bootstrap_happens_even_when_validation_fails() {
        let fx = Fixture::new();

        let err = fx
            .resolve(CliOptions {
                org: Some("acme".to_string()),
                ..fx.options()
            })
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Validation(_)));
        assert!(fx.config_path().exists());
    }

    #[tokio::test]
    async fn test_existing_file_is_not_rewritten() {
        let fx = Fixture::new();
        let original = "[gredentures]\nOrg=file-org\nDevice=file-device\nTimeout=3600\n";
        fx.write_config(original);

        let first = fx
            .resolve(CliOptions {
                org: Some("cli-org".to_string()),
                ..fx.options()
            })
            .await
            .unwrap();
        assert_eq!(first.org_id, "cli-org");
        assert_eq!(std::fs::read_to_string(fx.config_path()).unwrap(), original);

        let a = fx.resolve(fx.options()).await.unwrap();
        let b = fx.resolve(fx.options()).await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.org_id, "file-org");
    }

    #[tokio::test]
    async fn test_malformed_config_is_a_parse_error() {
        let fx = Fixture::new();
        fx.write_config("[gredentures]\nTimeout=forever\n");

        let err = fx.resolve(fx.options()).await.unwrap_err();
        assert!(matches!(err, Error::Parse { .. }));
    }

    #[tokio::test]
    async fn test_keep_other_profiles_selects_merge() {
        let fx = Fixture::new();

        let resolved = fx
            .resolve(CliOptions {
                org: Some("acme".to_string()),
                device: Some("arn:x".to_string()),
                profile: Some("work-mfa".to_string()),
                keep_other_profiles: true,
                ..fx.options()
            })
            .await
            .unwrap();

        assert_eq!(resolved.profile_name, "work-mfa");
        assert_eq!(resolved.write_mode, WriteMode::Merge);
    }
}
