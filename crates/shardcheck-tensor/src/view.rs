use std::borrow::Cow;

use crate::{DType, Result, Shape, ShapeError, Tensor};

/// Anything that can be brought into canonical host bytes for hashing.
///
/// Canonical means contiguous, row-major, little-endian, in host memory.
/// Implementations backed by device memory or non-contiguous layouts must
/// copy; hashing never sees any other layout.
pub trait Materialize {
    fn dtype(&self) -> DType;
    fn shape(&self) -> &Shape;
    fn host_bytes(&self) -> Result<Cow<'_, [u8]>>;
}

/// Non-owning view over a [`Tensor`] with arbitrary element strides.
pub struct StridedView<'a> {
    base:    &'a Tensor,
    shape:   Shape,
    strides: Vec<usize>,
}

impl<'a> StridedView<'a> {
    pub(crate) fn permute(base: &'a Tensor, axes: &[usize]) -> Result<Self> {
        let rank = base.shape().rank();
        let mut seen = vec![false; rank];
        let valid = axes.len() == rank
            && axes
                .iter()
                .all(|&a| a < rank && !std::mem::replace(&mut seen[a], true));
        if !valid {
            return Err(ShapeError::InvalidPermutation {
                axes: axes.to_vec(),
                rank,
            }
            .into());
        }

        let dims = base.shape().dims();
        let base_strides = base.shape().strides();
        Ok(Self {
            base,
            shape: Shape::new(axes.iter().map(|&a| dims[a]).collect::<Vec<_>>()),
            strides: axes.iter().map(|&a| base_strides[a]).collect(),
        })
    }

    pub fn is_contiguous(&self) -> bool { self.strides == self.shape.strides() }

    /// Gather into a new canonical tensor.
    pub fn to_tensor(&self) -> Result<Tensor> {
        let bytes = self.host_bytes()?.into_owned();
        Tensor::from_le_bytes(self.base.dtype(), self.shape.clone(), bytes)
    }
}

impl Materialize for StridedView<'_> {
    fn dtype(&self) -> DType { self.base.dtype() }

    fn shape(&self) -> &Shape { &self.shape }

    fn host_bytes(&self) -> Result<Cow<'_, [u8]>> {
        let src = self.base.as_bytes();
        if self.is_contiguous() {
            return Ok(Cow::Borrowed(src));
        }

        let size = self.base.dtype().size();
        let dims = self.shape.dims();
        let mut out = Vec::with_capacity(self.shape.numel() * size);
        if dims.contains(&0) {
            return Ok(Cow::Owned(out));
        }

        let mut index = vec![0usize; dims.len()];
        loop {
            let at: usize = index.iter().zip(&self.strides).map(|(i, s)| i * s).sum();
            out.extend_from_slice(&src[at * size..(at + 1) * size]);

            let mut dim = dims.len();
            loop {
                if dim == 0 {
                    return Ok(Cow::Owned(out));
                }
                dim -= 1;
                index[dim] += 1;
                if index[dim] < dims[dim] {
                    break;
                }
                index[dim] = 0;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transpose_gathers_row_major() {
        let t = Tensor::from_vec([2, 3], vec![1i32, 2, 3, 4, 5, 6]).unwrap();
        let view = t.permuted(&[1, 0]).unwrap();
        assert!(!view.is_contiguous());
        assert_eq!(view.shape().to_string(), "3x2");
        assert_eq!(view.to_tensor().unwrap().to_vec::<i32>().unwrap(), vec![1, 4, 2, 5, 3, 6]);
    }

    #[test]
    fn identity_permutation_borrows() {
        let t = Tensor::full([2, 2], 1u8);
        let view = t.permuted(&[0, 1]).unwrap();
        assert!(view.is_contiguous());
        assert!(matches!(view.host_bytes().unwrap(), Cow::Borrowed(_)));
    }

    #[test]
    fn rejects_bad_permutation() {
        let t = Tensor::zeros(DType::F32, [2, 2, 2]);
        assert!(t.permuted(&[0, 0, 1]).is_err());
        assert!(t.permuted(&[0, 1]).is_err());
        assert!(t.permuted(&[0, 1, 3]).is_err());
    }
}
