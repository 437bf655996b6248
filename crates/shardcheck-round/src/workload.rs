use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use shardcheck_tensor::{DType, Shape, ShapeError, ShardKey, Tensor};

/// The set of logical tensors a run moves, and how the consumer shards them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Workload {
    pub num_tensors: usize,
    pub height:      usize,
    pub width:       usize,
    pub dtype:       DType,
    pub shard_rows:  usize,
    pub shard_cols:  usize,
    pub seed:        u64,
}

impl Default for Workload {
    fn default() -> Self {
        Self {
            num_tensors: 20,
            height:      20000,
            width:       5000,
            dtype:       DType::F32,
            shard_rows:  1,
            shard_cols:  1,
            seed:        0,
        }
    }
}

impl Workload {
    pub fn key(index: usize) -> String { format!("tensor_{index:03}") }

    pub fn global_shape(&self) -> Shape { Shape::new([self.height, self.width]) }

    /// Bytes of all logical tensors together.
    pub fn logical_bytes(&self) -> u64 {
        (self.num_tensors * self.height * self.width * self.dtype.size()) as u64
    }

    /// Shards per logical tensor on the consumer side.
    pub fn shards_per_tensor(&self) -> usize { self.shard_rows * self.shard_cols }

    /// Whole tensors filled from the seeded generator.
    pub fn producer_buffers(&self) -> Result<Vec<(ShardKey, Tensor)>, ShapeError> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let shape = self.global_shape();
        (0..self.num_tensors)
            .map(|i| {
                let key = ShardKey::whole(Self::key(i), shape.clone())?;
                Ok((key, random_tensor(self.dtype, shape.clone(), &mut rng)))
            })
            .collect()
    }

    /// Zeroed receive shards on a `shard_rows x shard_cols` grid.
    ///
    /// The last row and column take whatever the even split leaves over.
    pub fn consumer_buffers(&self) -> Result<Vec<(ShardKey, Tensor)>, ShapeError> {
        let (rows, cols) = (self.shard_rows, self.shard_cols);
        if rows == 0 || rows > self.height {
            return Err(ShapeError::ZeroExtent { dim: 0 });
        }
        if cols == 0 || cols > self.width {
            return Err(ShapeError::ZeroExtent { dim: 1 });
        }
        let (sh, sw) = (self.height / rows, self.width / cols);
        if self.height % rows != 0 || self.width % cols != 0 {
            tracing::warn!(
                height = self.height,
                width = self.width,
                rows,
                cols,
                "grid does not divide evenly, last row/column takes the remainder"
            );
        }

        let global = self.global_shape();
        let mut buffers = Vec::with_capacity(self.num_tensors * rows * cols);
        for i in 0..self.num_tensors {
            for r in 0..rows {
                for c in 0..cols {
                    let h = if r + 1 < rows { sh } else { self.height - r * sh };
                    let w = if c + 1 < cols { sw } else { self.width - c * sw };
                    let key = ShardKey::new(Self::key(i), global.clone(), [r * sh, c * sw])?;
                    key.check_shard(&Shape::new([h, w]))?;
                    buffers.push((key, Tensor::zeros(self.dtype, [h, w])));
                }
            }
        }
        tracing::info!(
            tensors = self.num_tensors,
            shards = buffers.len(),
            shard_shape = %Shape::new([sh, sw]),
            "allocated receive buffers"
        );
        Ok(buffers)
    }
}

fn random_tensor(dtype: DType, shape: Shape, rng: &mut StdRng) -> Tensor {
    match dtype {
        DType::F32 => Tensor::from_fn(shape, |_| rng.gen_range(-1.0f32..1.0)),
        DType::F64 => Tensor::from_fn(shape, |_| rng.gen_range(-1.0f64..1.0)),
        DType::I8 => Tensor::from_fn(shape, |_| rng.gen_range(i8::MIN..=i8::MAX)),
        DType::I16 => Tensor::from_fn(shape, |_| rng.gen_range(i16::MIN..=i16::MAX)),
        DType::I32 => Tensor::from_fn(shape, |_| rng.gen_range(i32::MIN..=i32::MAX)),
        DType::I64 => Tensor::from_fn(shape, |_| rng.gen_range(i64::MIN..=i64::MAX)),
        DType::U8 => Tensor::from_fn(shape, |_| rng.gen_range(u8::MIN..=u8::MAX)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small() -> Workload {
        Workload {
            num_tensors: 3,
            height: 7,
            width: 10,
            shard_rows: 2,
            shard_cols: 3,
            ..Default::default()
        }
    }

    #[test]
    fn producer_buffers_are_whole_and_seeded() {
        let w = small();
        let a = w.producer_buffers().unwrap();
        let b = w.producer_buffers().unwrap();
        assert_eq!(a.len(), 3);
        assert_eq!(a, b);
        assert_eq!(a[2].0.logical_key(), "tensor_002");
        assert!(a.iter().all(|(k, t)| k.covers_whole(t.shape()) && !t.is_all_zero()));

        let other = Workload { seed: 1, ..small() }.producer_buffers().unwrap();
        assert_ne!(a[0].1, other[0].1);
    }

    #[test]
    fn consumer_grid_takes_remainder() {
        let buffers = small().consumer_buffers().unwrap();
        assert_eq!(buffers.len(), 3 * 6);
        let shapes: Vec<_> = buffers[..6].iter().map(|(_, t)| t.shape().to_string()).collect();
        assert_eq!(shapes, ["3x3", "3x3", "3x4", "4x3", "4x3", "4x4"]);
        let offsets: Vec<_> = buffers[..6].iter().map(|(k, _)| k.global_offset().to_vec()).collect();
        assert_eq!(offsets[5], vec![3, 6]);
        assert!(buffers.iter().all(|(_, t)| t.is_all_zero()));
    }

    #[test]
    fn impossible_grid_is_rejected() {
        let w = Workload { shard_rows: 8, ..small() };
        assert!(w.consumer_buffers().is_err());
        let w = Workload { shard_cols: 0, ..small() };
        assert!(w.consumer_buffers().is_err());
    }

    #[test]
    fn every_dtype_generates() {
        for dtype in DType::ALL {
            let w = Workload { dtype, ..small() };
            let buffers = w.producer_buffers().unwrap();
            assert_eq!(buffers[0].1.dtype(), dtype);
            assert_eq!(w.logical_bytes(), (3 * 70 * dtype.size()) as u64);
        }
    }
}
