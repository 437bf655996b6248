use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ShapeError;

/// Ordered extents of an array. Rank is `dims().len()`; rank 0 is a scalar.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Shape(Vec<usize>);

impl Shape {
    pub fn new(dims: impl Into<Vec<usize>>) -> Self { Self(dims.into()) }

    pub fn scalar() -> Self { Self(Vec::new()) }

    pub fn dims(&self) -> &[usize] { &self.0 }

    pub fn rank(&self) -> usize { self.0.len() }

    pub fn numel(&self) -> usize { self.0.iter().product() }

    /// Row-major strides in elements.
    pub fn strides(&self) -> Vec<usize> {
        let mut strides = vec![1; self.0.len()];
        for i in (0..self.0.len().saturating_sub(1)).rev() {
            strides[i] = strides[i + 1] * self.0[i + 1];
        }
        strides
    }

    /// Check that a box of `extent` placed at `offset` fits inside this shape.
    pub fn check_region(&self, offset: &[usize], extent: &[usize]) -> Result<(), ShapeError> {
        if offset.len() != self.rank() {
            return Err(ShapeError::RankMismatch {
                expected: self.rank(),
                actual:   offset.len(),
            });
        }
        if extent.len() != self.rank() {
            return Err(ShapeError::RankMismatch {
                expected: self.rank(),
                actual:   extent.len(),
            });
        }
        for (dim, ((&off, &ext), &bound)) in offset.iter().zip(extent).zip(&self.0).enumerate() {
            if off.checked_add(ext).is_none_or(|end| end > bound) {
                return Err(ShapeError::OutOfBounds {
                    dim,
                    offset: off,
                    extent: ext,
                    bound,
                });
            }
        }
        Ok(())
    }
}

impl From<Vec<usize>> for Shape {
    fn from(dims: Vec<usize>) -> Self { Self(dims) }
}

impl<const N: usize> From<[usize; N]> for Shape {
    fn from(dims: [usize; N]) -> Self { Self(dims.to_vec()) }
}

impl From<&[usize]> for Shape {
    fn from(dims: &[usize]) -> Self { Self(dims.to_vec()) }
}

/// `x`-joined extents, e.g. `4000x500`. A scalar renders as the empty string.
impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, dim) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("x")?;
            }
            write!(f, "{dim}")?;
        }
        Ok(())
    }
}

impl FromStr for Shape {
    type Err = ShapeError;

    fn from_str(s: &str) -> Result<Self, ShapeError> {
        if s.is_empty() {
            return Ok(Self::scalar());
        }
        s.split('x')
            .map(|part| part.parse::<usize>().map_err(|_| ShapeError::Parse(s.to_string())))
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }
}

/// Copy a `region`-shaped box of elements between two row-major buffers.
///
/// Offsets and strides are in elements; bounds must already be checked.
#[allow(clippy::too_many_arguments)]
pub(crate) fn copy_region(
    dst: &mut [u8],
    dst_strides: &[usize],
    dst_offset: &[usize],
    src: &[u8],
    src_strides: &[usize],
    src_offset: &[usize],
    region: &[usize],
    elem_size: usize,
) {
    let rank = region.len();
    if rank == 0 {
        dst[..elem_size].copy_from_slice(&src[..elem_size]);
        return;
    }
    if region.contains(&0) {
        return;
    }

    let row = region[rank - 1] * elem_size;
    let mut index = vec![0usize; rank - 1];
    loop {
        let d = linear(&index, dst_offset, dst_strides) * elem_size;
        let s = linear(&index, src_offset, src_strides) * elem_size;
        dst[d..d + row].copy_from_slice(&src[s..s + row]);

        let mut dim = rank - 1;
        loop {
            if dim == 0 {
                return;
            }
            dim -= 1;
            index[dim] += 1;
            if index[dim] < region[dim] {
                break;
            }
            index[dim] = 0;
        }
    }
}

fn linear(outer: &[usize], offset: &[usize], strides: &[usize]) -> usize {
    let last = strides.len() - 1;
    let head: usize = outer
        .iter()
        .zip(offset)
        .zip(strides)
        .map(|((i, o), s)| (i + o) * s)
        .sum();
    head + offset[last] * strides[last]
}
