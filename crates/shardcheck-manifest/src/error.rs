use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Fs(#[from] shardcheck_fs::Error),

    #[error("manifest field '{field}' of key '{key}' cannot be written: {reason}")]
    InvalidField {
        key:    String,
        field:  &'static str,
        reason: &'static str,
    },

    #[error("not a manifest file name: {0}")]
    InvalidFileName(String),

    #[error("unknown role: {0}")]
    UnknownRole(String),

    #[error("manifest directory '{0}' has no {1} files")]
    NoManifests(PathBuf, &'static str),
}

pub type Result<T> = std::result::Result<T, Error>;
