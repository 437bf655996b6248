use std::borrow::Cow;

use crate::shape::copy_region;
use crate::view::{Materialize, StridedView};
use crate::{DType, Element, Error, Result, Shape, ShapeError};

/// Dense host tensor in canonical layout: contiguous, row-major,
/// little-endian element bytes.
#[derive(Clone, PartialEq, Eq)]
pub struct Tensor {
    dtype: DType,
    shape: Shape,
    data:  Vec<u8>,
}

impl Tensor {
    pub fn zeros(dtype: DType, shape: impl Into<Shape>) -> Self {
        let shape = shape.into();
        let data = vec![0u8; shape.numel() * dtype.size()];
        Self { dtype, shape, data }
    }

    pub fn from_vec<T: Element>(shape: impl Into<Shape>, values: Vec<T>) -> Result<Self> {
        let shape = shape.into();
        if values.len() != shape.numel() {
            return Err(ShapeError::ElementCount {
                expected: shape.numel(),
                actual:   values.len(),
                shape,
            }
            .into());
        }
        let size = T::DTYPE.size();
        let mut data = vec![0u8; values.len() * size];
        for (chunk, value) in data.chunks_exact_mut(size).zip(values) {
            value.write_le(chunk);
        }
        Ok(Self {
            dtype: T::DTYPE,
            shape,
            data,
        })
    }

    pub fn full<T: Element>(shape: impl Into<Shape>, value: T) -> Self {
        Self::from_fn(shape, |_| value)
    }

    /// Build from a function of the row-major linear index.
    pub fn from_fn<T: Element>(shape: impl Into<Shape>, mut f: impl FnMut(usize) -> T) -> Self {
        let shape = shape.into();
        let size = T::DTYPE.size();
        let mut data = vec![0u8; shape.numel() * size];
        for (i, chunk) in data.chunks_exact_mut(size).enumerate() {
            f(i).write_le(chunk);
        }
        Self {
            dtype: T::DTYPE,
            shape,
            data,
        }
    }

    /// Wrap raw little-endian bytes, e.g. read back from a payload file.
    pub fn from_le_bytes(dtype: DType, shape: impl Into<Shape>, data: Vec<u8>) -> Result<Self> {
        let shape = shape.into();
        let expected = shape.numel() * dtype.size();
        if data.len() != expected {
            return Err(Error::ByteLength {
                dtype,
                shape,
                expected,
                actual: data.len(),
            });
        }
        Ok(Self { dtype, shape, data })
    }

    pub fn dtype(&self) -> DType { self.dtype }

    pub fn shape(&self) -> &Shape { &self.shape }

    pub fn numel(&self) -> usize { self.shape.numel() }

    pub fn nbytes(&self) -> usize { self.data.len() }

    pub fn as_bytes(&self) -> &[u8] { &self.data }

    pub fn into_bytes(self) -> Vec<u8> { self.data }

    pub fn to_vec<T: Element>(&self) -> Result<Vec<T>> {
        self.expect_dtype(T::DTYPE)?;
        Ok(self
            .data
            .chunks_exact(self.dtype.size())
            .map(T::read_le)
            .collect())
    }

    /// Element at a multi-dimensional index.
    pub fn get<T: Element>(&self, index: &[usize]) -> Result<T> {
        self.expect_dtype(T::DTYPE)?;
        self.shape.check_region(index, &vec![1; index.len()])?;
        let linear: usize = index
            .iter()
            .zip(self.shape.strides())
            .map(|(i, s)| i * s)
            .sum();
        let size = self.dtype.size();
        Ok(T::read_le(&self.data[linear * size..(linear + 1) * size]))
    }

    /// Overwrite every element with zero.
    pub fn fill_zero(&mut self) { self.data.fill(0); }

    pub fn is_all_zero(&self) -> bool { self.data.iter().all(|&b| b == 0) }

    /// Elements with any non-zero byte. Negative zero counts as non-zero.
    pub fn count_nonzero(&self) -> usize {
        self.data
            .chunks_exact(self.dtype.size())
            .filter(|chunk| chunk.iter().any(|&b| b != 0))
            .count()
    }

    /// Write `src` into the box starting at `offset`.
    pub fn write_region(&mut self, offset: &[usize], src: &Tensor) -> Result<()> {
        self.expect_dtype(src.dtype)?;
        self.shape.check_region(offset, src.shape.dims())?;
        let zero = vec![0; offset.len()];
        copy_region(
            &mut self.data,
            &self.shape.strides(),
            offset,
            &src.data,
            &src.shape.strides(),
            &zero,
            src.shape.dims(),
            self.dtype.size(),
        );
        Ok(())
    }

    /// Copy out the box of `extent` starting at `offset`.
    pub fn read_region(&self, offset: &[usize], extent: impl Into<Shape>) -> Result<Tensor> {
        let extent = extent.into();
        self.shape.check_region(offset, extent.dims())?;
        let mut out = Tensor::zeros(self.dtype, extent);
        let zero = vec![0; offset.len()];
        copy_region(
            &mut out.data,
            &out.shape.strides(),
            &zero,
            &self.data,
            &self.shape.strides(),
            offset,
            out.shape.dims(),
            self.dtype.size(),
        );
        Ok(out)
    }

    /// Replace contents in place with `src`, keeping identity.
    pub fn copy_from(&mut self, src: &Tensor) -> Result<()> {
        self.expect_dtype(src.dtype)?;
        if self.shape != src.shape {
            return Err(ShapeError::GlobalShapeConflict {
                expected: self.shape.clone(),
                actual:   src.shape.clone(),
            }
            .into());
        }
        self.data.copy_from_slice(&src.data);
        Ok(())
    }

    /// Lazy view with axes reordered; `axes[i]` is the source axis of view axis `i`.
    pub fn permuted(&self, axes: &[usize]) -> Result<StridedView<'_>> {
        StridedView::permute(self, axes)
    }

    pub(crate) fn expect_dtype(&self, dtype: DType) -> Result<()> {
        if self.dtype != dtype {
            return Err(Error::DTypeMismatch {
                expected: self.dtype,
                actual:   dtype,
            });
        }
        Ok(())
    }
}

impl std::fmt::Debug for Tensor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tensor")
            .field("dtype", &self.dtype)
            .field("shape", &self.shape.to_string())
            .field("nbytes", &self.data.len())
            .finish()
    }
}

impl Materialize for Tensor {
    fn dtype(&self) -> DType { self.dtype }

    fn shape(&self) -> &Shape { &self.shape }

    fn host_bytes(&self) -> Result<Cow<'_, [u8]>> { Ok(Cow::Borrowed(&self.data)) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zeros_has_expected_size() {
        let t = Tensor::zeros(DType::F64, [3, 5]);
        assert_eq!(t.numel(), 15);
        assert_eq!(t.nbytes(), 120);
        assert!(t.is_all_zero());
    }

    #[test]
    fn from_vec_rejects_wrong_count() {
        let err = Tensor::from_vec([2, 2], vec![1.0f32; 3]).unwrap_err();
        assert!(matches!(
            err,
            Error::Shape(ShapeError::ElementCount { expected: 4, actual: 3, .. })
        ));
    }

    #[test]
    fn get_and_to_vec() {
        let t = Tensor::from_vec([2, 3], vec![0i32, 1, 2, 3, 4, 5]).unwrap();
        assert_eq!(t.get::<i32>(&[1, 2]).unwrap(), 5);
        assert_eq!(t.get::<i32>(&[0, 1]).unwrap(), 1);
        assert!(t.get::<i32>(&[2, 0]).is_err());
        assert!(t.to_vec::<f32>().is_err());
    }

    #[test]
    fn fill_zero_and_count_nonzero() {
        let mut t = Tensor::from_vec([4], vec![0.0f32, 1.0, -0.0, 2.0]).unwrap();
        assert_eq!(t.count_nonzero(), 3);
        t.fill_zero();
        assert_eq!(t.count_nonzero(), 0);
        assert!(t.is_all_zero());
    }

    #[test]
    fn write_then_read_region() {
        let mut full = Tensor::zeros(DType::I64, [4, 6]);
        let block = Tensor::full([2, 3], 7i64);
        full.write_region(&[1, 2], &block).unwrap();

        assert_eq!(full.get::<i64>(&[1, 2]).unwrap(), 7);
        assert_eq!(full.get::<i64>(&[2, 4]).unwrap(), 7);
        assert_eq!(full.get::<i64>(&[0, 2]).unwrap(), 0);
        assert_eq!(full.get::<i64>(&[1, 5]).unwrap(), 0);
        assert_eq!(full.read_region(&[1, 2], [2, 3]).unwrap(), block);
    }

    #[test]
    fn write_region_out_of_bounds() {
        let mut full = Tensor::zeros(DType::U8, [2, 2]);
        let block = Tensor::full([2, 2], 1u8);
        let err = full.write_region(&[1, 0], &block).unwrap_err();
        assert!(matches!(err, Error::Shape(ShapeError::OutOfBounds { dim: 0, .. })));
        assert!(full.is_all_zero());
    }

    #[test]
    fn write_region_dtype_mismatch() {
        let mut full = Tensor::zeros(DType::F32, [2]);
        let block = Tensor::full([1], 1.0f64);
        assert!(matches!(
            full.write_region(&[0], &block),
            Err(Error::DTypeMismatch { .. })
        ));
    }

    #[test]
    fn scalar_tensor() {
        let mut s = Tensor::zeros(DType::F32, Shape::scalar());
        assert_eq!(s.numel(), 1);
        s.write_region(&[], &Tensor::full(Shape::scalar(), 3.5f32)).unwrap();
        assert_eq!(s.get::<f32>(&[]).unwrap(), 3.5);
    }

    #[test]
    fn from_le_bytes_validates_length() {
        assert!(Tensor::from_le_bytes(DType::I16, [3], vec![0; 6]).is_ok());
        assert!(matches!(
            Tensor::from_le_bytes(DType::I16, [3], vec![0; 5]),
            Err(Error::ByteLength { expected: 6, actual: 5, .. })
        ));
    }
}
