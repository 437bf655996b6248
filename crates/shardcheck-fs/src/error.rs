use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to write '{path}': {source}")]
    Write {
        path:   PathBuf,
        source: std::io::Error,
    },

    #[error("failed to read '{path}': {source}")]
    Read {
        path:   PathBuf,
        source: std::io::Error,
    },

    #[error("failed to create directory '{path}': {source}")]
    CreateDir {
        path:   PathBuf,
        source: std::io::Error,
    },

    #[error("failed to list directory '{path}': {source}")]
    ListDir {
        path:   PathBuf,
        source: std::io::Error,
    },

    #[error("path not found: {0}")]
    NotFound(PathBuf),
}

impl Error {
    /// Path the failed operation was acting on.
    pub fn path(&self) -> &std::path::Path {
        match self {
            Self::Write { path, .. }
            | Self::Read { path, .. }
            | Self::CreateDir { path, .. }
            | Self::ListDir { path, .. }
            | Self::NotFound(path) => path,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
