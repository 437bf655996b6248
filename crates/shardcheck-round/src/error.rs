use std::path::PathBuf;
use std::time::Duration;

use shardcheck_tensor::KeyFailure;

/// Failure raised by a [`TransferBoundary`](crate::TransferBoundary) call.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("seq {seq_id}: no data within {waited:?}")]
    Timeout { seq_id: u64, waited: Duration },

    #[error("seq {seq_id}: key '{key}' cannot be stored: {reason}")]
    InvalidKey {
        seq_id: u64,
        key:    String,
        reason: &'static str,
    },

    #[error("seq {seq_id}: payload of '{key}' failed verification: {source}")]
    Payload {
        seq_id: u64,
        key:    String,
        source: shardcheck_verify::VerifyError,
    },

    #[error("invalid metadata '{path}': {source}")]
    Metadata {
        path:   PathBuf,
        source: serde_json::Error,
    },

    #[error("seq {seq_id}: {count} key(s) could not be assembled, first: {first}")]
    Assembly {
        seq_id: u64,
        count:  usize,
        first:  KeyFailure,
    },

    #[error(transparent)]
    Fs(#[from] shardcheck_fs::Error),

    #[error(transparent)]
    Tensor(#[from] shardcheck_tensor::Error),

    #[error("{0}")]
    Other(String),
}

/// A [`RoundConfig`](crate::RoundConfig) value that cannot drive a run.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{field} must be a finite, non-negative number of seconds, got {value}")]
    InvalidSeconds { field: &'static str, value: f64 },
}

/// Failure of a round's verification step. Never fails the round.
#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    #[error("{count} key(s) could not be reconstructed, first: {first}")]
    Reconstruct { count: usize, first: KeyFailure },

    #[error(transparent)]
    Tensor(#[from] shardcheck_tensor::Error),

    #[error(transparent)]
    Manifest(#[from] shardcheck_manifest::Error),
}
