//! Persisted, non-secret defaults (`~/.gredentures`).
//!
//! The file is INI with a single section:
//!
//! ```ini
//! [gredentures]
//! Org=acme
//! Device=arn:aws:iam::123456789012:mfa/alice
//! Timeout=86400
//! ```

use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

use configparser::ini::Ini;
use log::{Log, debug};
use tokio::fs;

use crate::error::{Error, Result};

const SECTION: &str = "gredentures";
const ORG_KEY: &str = "Org";
const DEVICE_KEY: &str = "Device";
const TIMEOUT_KEY: &str = "Timeout";

const CONFIG_FILE_NAME: &str = ".gredentures";

/// Durable subset of the resolved configuration. Never holds secrets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersistedConfig {
    pub org_id: String,
    pub device_arn: String,
    /// Zero means "not set".
    pub timeout_seconds: u32,
}

/// `<home>/.gredentures`
pub fn default_config_path() -> Result<PathBuf> {
    dirs::home_dir()
        .map(|home| home.join(CONFIG_FILE_NAME))
        .ok_or(Error::NoHomeDir)
}

/// Reads and writes [`PersistedConfig`] files.
pub struct ConfigStore<'a> {
    logger: &'a dyn Log,
}

impl<'a> ConfigStore<'a> {
    pub fn new(logger: &'a dyn Log) -> Self {
        Self { logger }
    }

    /// Reads the config file at `path`.
    ///
    /// Returns [`Error::NotFound`] when the file does not exist so the caller
    /// can decide whether to bootstrap it.
    pub async fn load(&self, path: &Path) -> Result<PersistedConfig> {
        debug!(logger: self.logger, "Loading gredentures config from {}", path.display());

        let content = match fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(Error::NotFound(path.to_path_buf()));
            }
            Err(e) if e.kind() == ErrorKind::InvalidData => {
                return Err(Error::parse(path, e.to_string()));
            }
            Err(e) => return Err(Error::io(path, e)),
        };

        let mut ini = Ini::new_cs();
        ini.read(content).map_err(|reason| Error::parse(path, reason))?;
        if !ini.sections().iter().any(|s| s == SECTION) {
            return Err(Error::parse(path, format!("missing [{SECTION}] section")));
        }

        let timeout_seconds = ini
            .getuint(SECTION, TIMEOUT_KEY)
            .map_err(|reason| Error::parse(path, format!("{TIMEOUT_KEY}: {reason}")))?
            .map(u32::try_from)
            .transpose()
            .map_err(|_| Error::parse(path, format!("{TIMEOUT_KEY} is out of range")))?
            .unwrap_or_default();

        Ok(PersistedConfig {
            org_id: ini.get(SECTION, ORG_KEY).unwrap_or_default(),
            device_arn: ini.get(SECTION, DEVICE_KEY).unwrap_or_default(),
            timeout_seconds,
        })
    }

    /// Writes `config` to `path`, replacing any existing file. The parent
    /// directory must already exist.
    pub async fn save(&self, path: &Path, config: &PersistedConfig) -> Result<()> {
        let mut ini = Ini::new_cs();
        ini.set(SECTION, ORG_KEY, Some(config.org_id.clone()));
        ini.set(SECTION, DEVICE_KEY, Some(config.device_arn.clone()));
        ini.set(SECTION, TIMEOUT_KEY, Some(config.timeout_seconds.to_string()));

        fs::write(path, ini.writes())
            .await
            .map_err(|e| Error::io(path, e))?;
        debug!(logger: self.logger, "Saved gredentures config to {}", path.display());

        Ok(())
    }
}
