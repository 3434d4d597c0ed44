//! Rewrites the AWS shared credentials file.
//!
//! Two profiles are produced: `[default]` keeps the permanent IAM user keys so
//! the next run can request a fresh session, and the MFA profile (named by
//! `--profile`) holds the session credentials downstream tools should use:
//!
//! ```ini
//! [default]
//! aws_access_key_id=AKIA...
//! aws_secret_access_key=...
//!
//! [default-mfa]
//! aws_access_key_id=ASIA...
//! aws_secret_access_key=...
//! aws_session_token=...
//! ```

use std::{
    fmt,
    io::{self, ErrorKind},
    path::{Path, PathBuf},
};

use configparser::ini::Ini;
use log::{Log, debug, warn};
use tokio::{
    fs::{self, OpenOptions},
    io::AsyncWriteExt,
};

use crate::{
    credentials::{PERMANENT_PROFILE, PermanentCredentials, TemporaryCredentials},
    error::{Error, Result},
};

/// How sections outside this tool's two profiles are treated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WriteMode {
    /// Replace the whole file.
    #[default]
    Overwrite,
    /// Carry over every other section already in the file.
    Merge,
}

/// `<home>/.aws/credentials`
pub fn default_credentials_path() -> Result<PathBuf> {
    dirs::home_dir()
        .map(|home| home.join(".aws").join("credentials"))
        .ok_or(Error::NoHomeDir)
}

/// One `[name]` block of the credentials file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub name: String,
    /// `None` marks a bare key with no value.
    pub entries: Vec<(String, Option<String>)>,
}

impl Section {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: Vec::new(),
        }
    }

    fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.entries.push((key.into(), Some(value.into())));
        self
    }
}

/// In-memory credentials file: ordered sections of ordered key/value pairs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CredentialsFile {
    sections: Vec<Section>,
}

impl CredentialsFile {
    /// `[default]` with the permanent keys followed by `[profile_name]` with
    /// the session credentials.
    pub fn new(
        permanent: &PermanentCredentials,
        temporary: &TemporaryCredentials,
        profile_name: &str,
    ) -> Self {
        let default = Section::new(PERMANENT_PROFILE)
            .with("aws_access_key_id", &permanent.access_key_id)
            .with("aws_secret_access_key", &permanent.secret_access_key);
        let session = Section::new(profile_name)
            .with("aws_access_key_id", &temporary.access_key_id)
            .with("aws_secret_access_key", &temporary.secret_access_key)
            .with("aws_session_token", &temporary.session_token);

        Self {
            sections: vec![default, session],
        }
    }

    /// Section called `name`, if present.
    pub fn section(&self, name: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.name == name)
    }

    /// All sections in write order.
    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    /// Appends the sections of `existing` that this file does not define.
    fn preserve(&mut self, existing: &Ini) {
        for (name, values) in existing.get_map_ref() {
            if self.section(name).is_some() {
                continue;
            }
            let entries = values
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            self.sections.push(Section {
                name: name.clone(),
                entries,
            });
        }
    }
}

impl fmt::Display for CredentialsFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, section) in self.sections.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            writeln!(f, "[{}]", section.name)?;
            for (key, value) in &section.entries {
                match value {
                    Some(value) => writeln!(f, "{key}={value}")?,
                    None => writeln!(f, "{key}")?,
                }
            }
        }
        Ok(())
    }
}

/// Writes [`CredentialsFile`] documents to disk.
pub struct CredentialFileWriter<'a> {
    logger: &'a dyn Log,
}

impl<'a> CredentialFileWriter<'a> {
    pub fn new(logger: &'a dyn Log) -> Self {
        Self { logger }
    }

    /// Writes the `default` and `profile_name` sections to `path`.
    ///
    /// The content lands in a sibling temporary file first and is renamed over
    /// `path`. The parent directory must exist.
    pub async fn write(
        &self,
        path: &Path,
        permanent: &PermanentCredentials,
        temporary: &TemporaryCredentials,
        profile_name: &str,
        mode: WriteMode,
    ) -> Result<()> {
        let mut document = CredentialsFile::new(permanent, temporary, profile_name);
        if mode == WriteMode::Merge {
            if let Some(existing) = self.read_existing(path).await? {
                document.preserve(&existing);
            }
        }
        for section in document.sections() {
            debug!(logger: self.logger, "Writing section [{}]", section.name);
        }

        let staging = staging_path(path);
        if let Err(e) = stage(&staging, &document.to_string()).await {
            self.discard(&staging).await;
            return Err(Error::io(path, e));
        }
        if let Err(e) = fs::rename(&staging, path).await {
            self.discard(&staging).await;
            return Err(Error::io(path, e));
        }
        debug!(logger: self.logger, "Saved credentials file {}", path.display());

        Ok(())
    }

    async fn discard(&self, staging: &Path) {
        match fs::remove_file(staging).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(logger: self.logger, "Could not remove {}: {e}", staging.display()),
        }
    }

    async fn read_existing(&self, path: &Path) -> Result<Option<Ini>> {
        let content = match fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::io(path, e)),
        };

        let mut ini = Ini::new_cs();
        ini.read(content).map_err(|reason| Error::parse(path, reason))?;
        debug!(logger: self.logger, "Keeping other profiles from {}", path.display());

        Ok(Some(ini))
    }
}

/// Writes `content` to a fresh file at `staging`, owner-only on Unix from the
/// moment it is created.
async fn stage(staging: &Path, content: &str) -> io::Result<()> {
    match fs::remove_file(staging).await {
        Err(e) if e.kind() != ErrorKind::NotFound => return Err(e),
        _ => {}
    }

    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    options.mode(0o600);

    let mut file = options.open(staging).await?;
    file.write_all(content.as_bytes()).await?;
    file.sync_all().await
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".gredentures-tmp");
    path.with_file_name(name)
}
