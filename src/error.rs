//! Error kinds raised by the individual pipeline steps.

use std::path::{Path, PathBuf};

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("config file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("failed to parse {}: {reason}", path.display())]
    Parse { path: PathBuf, reason: String },

    #[error("{0}")]
    Validation(String),

    #[error("could not determine home directory")]
    NoHomeDir,

    #[error("no credentials for profile '{profile}': {reason}")]
    Auth { profile: String, reason: String },

    #[error("failed to get session token: {0}")]
    Exchange(String),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub fn parse(path: &Path, reason: impl Into<String>) -> Self {
        Self::Parse {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }

    pub fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}
