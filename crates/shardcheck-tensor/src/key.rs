use std::fmt;

use crate::{Shape, ShapeError};

/// Identifies a shard: the logical array it belongs to and where it sits.
///
/// `global_offset` always has the same rank as `global_shape`; that is
/// checked on construction so later stages can rely on it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ShardKey {
    logical_key:   String,
    global_shape:  Shape,
    global_offset: Vec<usize>,
}

impl ShardKey {
    pub fn new(
        logical_key: impl Into<String>,
        global_shape: impl Into<Shape>,
        global_offset: impl Into<Vec<usize>>,
    ) -> Result<Self, ShapeError> {
        let global_shape = global_shape.into();
        let global_offset = global_offset.into();
        if global_offset.len() != global_shape.rank() {
            return Err(ShapeError::RankMismatch {
                expected: global_shape.rank(),
                actual:   global_offset.len(),
            });
        }
        if let Some(dim) = global_shape.dims().iter().position(|&d| d == 0) {
            return Err(ShapeError::ZeroExtent { dim });
        }
        Ok(Self {
            logical_key: logical_key.into(),
            global_shape,
            global_offset,
        })
    }

    /// Key for an unsharded array: offset zero in every dimension.
    pub fn whole(logical_key: impl Into<String>, shape: impl Into<Shape>) -> Result<Self, ShapeError> {
        let shape = shape.into();
        let offset = vec![0; shape.rank()];
        Self::new(logical_key, shape, offset)
    }

    pub fn logical_key(&self) -> &str { &self.logical_key }

    pub fn global_shape(&self) -> &Shape { &self.global_shape }

    pub fn global_offset(&self) -> &[usize] { &self.global_offset }

    pub fn rank(&self) -> usize { self.global_shape.rank() }

    /// Check that a shard of `shard_shape` at this key's offset stays in bounds.
    pub fn check_shard(&self, shard_shape: &Shape) -> Result<(), ShapeError> {
        self.global_shape
            .check_region(&self.global_offset, shard_shape.dims())
    }

    /// Whether a shard of `shard_shape` is the entire global array.
    pub fn covers_whole(&self, shard_shape: &Shape) -> bool {
        self.global_offset.iter().all(|&o| o == 0) && *shard_shape == self.global_shape
    }
}

impl fmt::Display for ShardKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]@{:?}", self.logical_key, self.global_shape, self.global_offset)
    }
}
