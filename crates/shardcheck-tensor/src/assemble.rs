//! Reconstruction of full arrays from independently transferred shards.
//!
//! Shards are grouped by logical key. Each group is validated as a whole
//! (rank, global shape, element type, bounds) before anything is copied, so
//! a bad shard fails its own key and never corrupts a neighbouring region.
//! Overlaps and gaps are detected for every group; whether they are fatal
//! is decided by [`AssemblyOptions`].

use std::collections::HashMap;
use std::fmt;

use crate::{DType, Error, Shape, ShapeError, ShardKey, Tensor};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlapPolicy {
    /// Later shards in input order overwrite earlier ones.
    #[default]
    LastWriteWins,
    Reject,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GapPolicy {
    /// Uncovered elements stay zero; a warning is logged.
    #[default]
    Warn,
    Reject,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(default)]
pub struct AssemblyOptions {
    pub overlap: OverlapPolicy,
    pub gap:     GapPolicy,
}

impl AssemblyOptions {
    pub fn new() -> Self { Self::default() }

    pub fn overlap(mut self, policy: OverlapPolicy) -> Self {
        self.overlap = policy;
        self
    }

    pub fn gap(mut self, policy: GapPolicy) -> Self {
        self.gap = policy;
        self
    }

    /// Reject both overlaps and gaps.
    pub fn strict() -> Self {
        Self {
            overlap: OverlapPolicy::Reject,
            gap:     GapPolicy::Reject,
        }
    }
}

/// How well a group's shards tile its global shape.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Coverage {
    pub shard_count:    usize,
    pub total_elements: u64,
    pub covered:        u64,
    /// Index pairs (input order within the group) of overlapping shards.
    pub overlaps:       Vec<(usize, usize)>,
}

impl Coverage {
    pub fn uncovered(&self) -> u64 { self.total_elements - self.covered }

    pub fn is_exact(&self) -> bool { self.overlaps.is_empty() && self.uncovered() == 0 }
}

#[derive(Clone, Debug)]
pub struct ReconstructedArray {
    pub key:      String,
    pub tensor:   Tensor,
    pub coverage: Coverage,
}

/// A logical key whose reconstruction failed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyFailure {
    pub key:   String,
    /// Input index of the offending shard within its group, when known.
    pub shard: Option<usize>,
    pub error: ShapeError,
}

impl fmt::Display for KeyFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.shard {
            Some(shard) => write!(f, "{} (shard {}): {}", self.key, shard, self.error),
            None => write!(f, "{}: {}", self.key, self.error),
        }
    }
}

/// Per-key outcome of [`ShardAssembler::reconstruct`], in first-seen key order.
#[derive(Clone, Debug, Default)]
pub struct Reconstruction {
    pub arrays:   Vec<ReconstructedArray>,
    pub failures: Vec<KeyFailure>,
}

impl Reconstruction {
    pub fn get(&self, key: &str) -> Option<&Tensor> {
        self.arrays.iter().find(|a| a.key == key).map(|a| &a.tensor)
    }

    pub fn failure(&self, key: &str) -> Option<&KeyFailure> {
        self.failures.iter().find(|f| f.key == key)
    }

    pub fn is_complete(&self) -> bool { self.failures.is_empty() }

    pub fn len(&self) -> usize { self.arrays.len() + self.failures.len() }

    pub fn is_empty(&self) -> bool { self.len() == 0 }
}

#[derive(Clone, Debug, Default)]
pub struct ShardAssembler {
    options: AssemblyOptions,
}

impl ShardAssembler {
    pub fn new(options: AssemblyOptions) -> Self { Self { options } }

    pub fn options(&self) -> &AssemblyOptions { &self.options }

    pub fn reconstruct(&self, shards: &[(ShardKey, Tensor)]) -> Reconstruction {
        let mut order: Vec<&str> = Vec::new();
        let mut groups: HashMap<&str, Vec<(&ShardKey, &Tensor)>> = HashMap::new();
        for (key, tensor) in shards {
            let name = key.logical_key();
            groups
                .entry(name)
                .or_insert_with(|| {
                    order.push(name);
                    Vec::new()
                })
                .push((key, tensor));
        }
        tracing::debug!(shards = shards.len(), groups = order.len(), "grouped shards");

        let mut out = Reconstruction::default();
        for name in order {
            let members = &groups[name];
            match self.reconstruct_group(members) {
                Ok((tensor, coverage)) => out.arrays.push(ReconstructedArray {
                    key: name.to_string(),
                    tensor,
                    coverage,
                }),
                Err((shard, error)) => {
                    tracing::warn!(key = name, ?shard, %error, "reconstruction failed");
                    out.failures.push(KeyFailure {
                        key: name.to_string(),
                        shard,
                        error,
                    });
                }
            }
        }
        out
    }

    /// Reconstruct one logical key from all of its shards.
    pub fn reconstruct_one(&self, members: &[(&ShardKey, &Tensor)]) -> crate::Result<Tensor> {
        self.reconstruct_group(members)
            .map(|(tensor, _)| tensor)
            .map_err(|(_, error)| Error::Shape(error))
    }

    fn reconstruct_group(
        &self,
        members: &[(&ShardKey, &Tensor)],
    ) -> Result<(Tensor, Coverage), (Option<usize>, ShapeError)> {
        let Some((first_key, first_tensor)) = members.first() else {
            return Err((None, ShapeError::Gap { uncovered: 0, total: 0 }));
        };
        let global = first_key.global_shape();
        let dtype = first_tensor.dtype();
        validate_group(global, dtype, members)?;

        let coverage = measure_coverage(global, members);
        let name = first_key.logical_key();
        if let Some(&(a, b)) = coverage.overlaps.first() {
            match self.options.overlap {
                OverlapPolicy::Reject => {
                    return Err((Some(b), ShapeError::Overlap { first: a, second: b }));
                }
                OverlapPolicy::LastWriteWins => tracing::warn!(
                    key = name,
                    pairs = coverage.overlaps.len(),
                    "overlapping shards, later shards overwrite earlier ones"
                ),
            }
        }
        if coverage.uncovered() > 0 {
            match self.options.gap {
                GapPolicy::Reject => {
                    return Err((
                        None,
                        ShapeError::Gap {
                            uncovered: coverage.uncovered(),
                            total:     coverage.total_elements,
                        },
                    ));
                }
                GapPolicy::Warn => tracing::warn!(
                    key = name,
                    uncovered = coverage.uncovered(),
                    total = coverage.total_elements,
                    "shards leave a gap, uncovered elements stay zero"
                ),
            }
        }

        let mut full = Tensor::zeros(dtype, global.clone());
        for (i, (key, shard)) in members.iter().enumerate() {
            full.write_region(key.global_offset(), shard).map_err(|e| {
                let error = match e {
                    Error::Shape(error) => error,
                    _ => ShapeError::DTypeConflict {
                        expected: dtype,
                        actual:   shard.dtype(),
                    },
                };
                (Some(i), error)
            })?;
            tracing::trace!(key = name, offset = ?key.global_offset(), "placed shard");
        }
        tracing::debug!(key = name, shards = members.len(), shape = %global, "reconstructed");
        Ok((full, coverage))
    }
}

fn validate_group(
    global: &Shape,
    dtype: DType,
    members: &[(&ShardKey, &Tensor)],
) -> Result<(), (Option<usize>, ShapeError)> {
    for (i, (key, shard)) in members.iter().enumerate() {
        if key.global_shape() != global {
            return Err((
                Some(i),
                ShapeError::GlobalShapeConflict {
                    expected: global.clone(),
                    actual:   key.global_shape().clone(),
                },
            ));
        }
        if shard.dtype() != dtype {
            return Err((
                Some(i),
                ShapeError::DTypeConflict {
                    expected: dtype,
                    actual:   shard.dtype(),
                },
            ));
        }
        key.check_shard(shard.shape()).map_err(|e| (Some(i), e))?;
    }
    Ok(())
}

fn measure_coverage(global: &Shape, members: &[(&ShardKey, &Tensor)]) -> Coverage {
    let boxes: Vec<(&[usize], &[usize])> = members
        .iter()
        .map(|(key, shard)| (key.global_offset(), shard.shape().dims()))
        .collect();

    let mut overlaps = Vec::new();
    for i in 0..boxes.len() {
        for j in i + 1..boxes.len() {
            if intersects(boxes[i], boxes[j]) {
                overlaps.push((i, j));
            }
        }
    }

    let total = global.numel() as u64;
    let covered = if overlaps.is_empty() {
        boxes
            .iter()
            .map(|(_, extent)| extent.iter().product::<usize>() as u64)
            .sum()
    } else {
        covered_by_mask(global, &boxes)
    };

    Coverage {
        shard_count: members.len(),
        total_elements: total,
        covered,
        overlaps,
    }
}

fn intersects(a: (&[usize], &[usize]), b: (&[usize], &[usize])) -> bool {
    let (a_off, a_ext) = a;
    let (b_off, b_ext) = b;
    if a_ext.contains(&0) || b_ext.contains(&0) {
        return false;
    }
    a_off
        .iter()
        .zip(a_ext)
        .zip(b_off.iter().zip(b_ext))
        .all(|((&ao, &ae), (&bo, &be))| ao < bo + be && bo < ao + ae)
}

/// Exact union size via a coverage bitmap. Only used once overlaps exist.
fn covered_by_mask(global: &Shape, boxes: &[(&[usize], &[usize])]) -> u64 {
    let total = global.numel();
    let mut mask = vec![0u64; total.div_ceil(64)];
    let strides = global.strides();

    for (offset, extent) in boxes {
        if extent.contains(&0) {
            continue;
        }
        let rank = extent.len();
        if rank == 0 {
            mask[0] |= 1;
            continue;
        }
        let mut index = vec![0usize; rank];
        'walk: loop {
            let at: usize = index
                .iter()
                .zip(offset.iter())
                .zip(&strides)
                .map(|((i, o), s)| (i + o) * s)
                .sum();
            mask[at / 64] |= 1 << (at % 64);

            let mut dim = rank;
            loop {
                if dim == 0 {
                    break 'walk;
                }
                dim -= 1;
                index[dim] += 1;
                if index[dim] < extent[dim] {
                    break;
                }
                index[dim] = 0;
            }
        }
    }

    mask.iter().map(|w| u64::from(w.count_ones())).sum()
}
