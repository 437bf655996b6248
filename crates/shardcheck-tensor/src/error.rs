use crate::{DType, Shape};

/// Placement or geometry error. Fails the affected logical key only.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ShapeError {
    #[error("rank mismatch: expected {expected}, got {actual}")]
    RankMismatch { expected: usize, actual: usize },

    #[error("dimension {dim} out of bounds: offset {offset} + extent {extent} > {bound}")]
    OutOfBounds {
        dim:    usize,
        offset: usize,
        extent: usize,
        bound:  usize,
    },

    #[error("global shape must be positive, dimension {dim} is 0")]
    ZeroExtent { dim: usize },

    #[error("conflicting global shapes: {expected} vs {actual}")]
    GlobalShapeConflict { expected: Shape, actual: Shape },

    #[error("conflicting element types: {expected} vs {actual}")]
    DTypeConflict { expected: DType, actual: DType },

    #[error("shards {first} and {second} overlap")]
    Overlap { first: usize, second: usize },

    #[error("{uncovered} of {total} elements not covered by any shard")]
    Gap { uncovered: u64, total: u64 },

    #[error("shape {shape} holds {expected} elements, got {actual}")]
    ElementCount {
        shape:    Shape,
        expected: usize,
        actual:   usize,
    },

    #[error("invalid axis permutation {axes:?} for rank {rank}")]
    InvalidPermutation { axes: Vec<usize>, rank: usize },

    #[error("malformed shape string '{0}'")]
    Parse(String),
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Shape(#[from] ShapeError),

    #[error("element type mismatch: expected {expected}, got {actual}")]
    DTypeMismatch { expected: DType, actual: DType },

    #[error("unknown element type '{0}'")]
    UnknownDType(String),

    #[error("{dtype} tensor of shape {shape} needs {expected} bytes, got {actual}")]
    ByteLength {
        dtype:    DType,
        shape:    Shape,
        expected: usize,
        actual:   usize,
    },

    #[error(transparent)]
    Verify(#[from] shardcheck_verify::VerifyError),
}

pub type Result<T> = std::result::Result<T, Error>;
