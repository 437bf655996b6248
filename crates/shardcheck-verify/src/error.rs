use std::io;

#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    #[error("checksum mismatch: expected {expected}, got {actual}")]
    HashMismatch { expected: String, actual: String },

    #[error("invalid hex digest '{input}': {source}")]
    InvalidHex {
        input:  String,
        source: hex::FromHexError,
    },

    #[error("unsupported digest algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, VerifyError>;
