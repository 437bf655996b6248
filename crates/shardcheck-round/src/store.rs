use std::collections::BTreeSet;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use shardcheck_fs::{AtomicWriteOptions, atomic_read, atomic_write, ensure_dir, list_files};
use shardcheck_manifest::Role;
use shardcheck_tensor::{
    AssemblyOptions, ContentHasher, DType, Shape, ShapeError, ShardAssembler, ShardKey, Tensor,
};
use shardcheck_verify::{ContentDigest, DigestAlgorithm, VerifiedReader};

use crate::{TransferBoundary, TransferError};

const PUT_DONE: &str = "PUT_DONE";

#[derive(Debug, Serialize, Deserialize)]
struct PayloadMeta {
    dtype:     DType,
    shape:     Shape,
    algorithm: String,
    digest:    String,
}

/// [`TransferBoundary`] over a directory shared by both roles.
///
/// Each sequence id gets `<root>/seq<N>/`. A put reassembles every
/// logical key, writes `<key>.bin` with `<key>.json` metadata, then a
/// `PUT_DONE` marker listing the keys. A get waits for the marker,
/// verifies each payload against its recorded digest while reading it,
/// and copies the requested region into each shard, so producer and
/// consumer may shard differently. Once both roles have called `complete`
/// for a sequence id, its payloads and `PUT_DONE` are removed.
#[derive(Debug, Clone)]
pub struct LocalDirStore {
    root:      PathBuf,
    role:      Role,
    poll:      Duration,
    assembler: ShardAssembler,
    hasher:    ContentHasher,
}

impl LocalDirStore {
    pub fn new(root: impl Into<PathBuf>, role: Role) -> Self {
        Self {
            root: root.into(),
            role,
            poll: Duration::from_millis(50),
            assembler: ShardAssembler::default(),
            hasher: ContentHasher::default(),
        }
    }

    pub fn poll_interval(mut self, poll: Duration) -> Self {
        self.poll = poll;
        self
    }

    pub fn assembly(mut self, options: AssemblyOptions) -> Self {
        self.assembler = ShardAssembler::new(options);
        self
    }

    pub fn digest_algorithm(mut self, algorithm: DigestAlgorithm) -> Self {
        self.hasher = ContentHasher::new(algorithm);
        self
    }

    pub fn root(&self) -> &Path { &self.root }

    pub fn seq_dir(&self, seq_id: u64) -> PathBuf { self.root.join(format!("seq{seq_id}")) }

    /// Marker written by [`complete`](TransferBoundary::complete) for `role`.
    pub fn completion_marker(&self, seq_id: u64, role: Role) -> PathBuf {
        self.seq_dir(seq_id).join(format!("COMPLETE_{}", role.label()))
    }

    fn wait_for_put(&self, seq_id: u64, deadline: Option<Instant>) -> Result<Vec<String>, TransferError> {
        let marker = self.seq_dir(seq_id).join(PUT_DONE);
        let started = Instant::now();
        loop {
            if marker.is_file() {
                let bytes = atomic_read(&marker)?;
                return serde_json::from_slice(&bytes).map_err(|source| TransferError::Metadata {
                    path: marker.clone(),
                    source,
                });
            }
            let now = Instant::now();
            let pause = match deadline {
                Some(deadline) if now >= deadline => {
                    return Err(TransferError::Timeout {
                        seq_id,
                        waited: now - started,
                    });
                }
                Some(deadline) => self.poll.min(deadline - now),
                None => self.poll,
            };
            std::thread::sleep(pause);
        }
    }

    /// Drop the payloads of `seq_id`. Completion markers stay.
    fn release(&self, seq_id: u64) -> Result<usize, TransferError> {
        let mut removed = 0;
        for path in list_files(self.seq_dir(seq_id))? {
            let payload = path.file_name().is_some_and(|n| n == PUT_DONE)
                || path.extension().is_some_and(|ext| ext == "bin" || ext == "json");
            if !payload {
                continue;
            }
            match std::fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(source) => return Err(shardcheck_fs::Error::Write { path, source }.into()),
            }
        }
        Ok(removed)
    }

    fn remove_if_present(path: &Path) -> Result<(), TransferError> {
        match std::fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(shardcheck_fs::Error::Write {
                path: path.to_path_buf(),
                source,
            }
            .into()),
        }
    }

    fn load(&self, seq_id: u64, key: &str) -> Result<Tensor, TransferError> {
        let dir = self.seq_dir(seq_id);
        let meta_path = dir.join(format!("{key}.json"));
        let meta: PayloadMeta = serde_json::from_slice(&atomic_read(&meta_path)?)
            .map_err(|source| TransferError::Metadata {
                path: meta_path.clone(),
                source,
            })?;

        let payload_err = |source| TransferError::Payload {
            seq_id,
            key: key.to_string(),
            source,
        };
        let algorithm: DigestAlgorithm = meta.algorithm.parse().map_err(payload_err)?;
        let expected = ContentDigest::from_hex(&meta.digest).map_err(payload_err)?;

        let path = dir.join(format!("{key}.bin"));
        let read_err = |source| shardcheck_fs::Error::Read {
            path: path.clone(),
            source,
        };
        let file = File::open(&path).map_err(read_err)?;
        let mut reader = VerifiedReader::new(file, algorithm.hasher().map_err(payload_err)?);
        let mut bytes = Vec::with_capacity(meta.shape.numel() * meta.dtype.size());
        reader.read_to_end(&mut bytes).map_err(read_err)?;
        reader.finish(&expected).map_err(payload_err)?;

        Ok(Tensor::from_le_bytes(meta.dtype, meta.shape, bytes)?)
    }
}

fn check_key(seq_id: u64, key: &str) -> Result<(), TransferError> {
    let reason = if key.is_empty() {
        "empty"
    } else if key == "." || key == ".." || key == PUT_DONE || key.starts_with("COMPLETE_") {
        "reserved name"
    } else if key.contains(['/', '\\', '\0']) {
        "contains a path separator"
    } else {
        return Ok(());
    };
    Err(TransferError::InvalidKey {
        seq_id,
        key: key.to_string(),
        reason,
    })
}

impl TransferBoundary for LocalDirStore {
    fn multi_put(
        &mut self,
        seq_id: u64,
        shards: &[(ShardKey, Tensor)],
        _deadline: Option<Instant>,
    ) -> Result<bool, TransferError> {
        let dir = self.seq_dir(seq_id);
        ensure_dir(&dir)?;
        // a new put starts the sequence over
        let marker = dir.join(PUT_DONE);
        Self::remove_if_present(&marker)?;
        for role in Role::ALL {
            Self::remove_if_present(&self.completion_marker(seq_id, role))?;
        }

        let assembled = self.assembler.reconstruct(shards);
        if let Some(first) = assembled.failures.first() {
            return Err(TransferError::Assembly {
                seq_id,
                count: assembled.failures.len(),
                first: first.clone(),
            });
        }

        let mut keys = Vec::with_capacity(assembled.arrays.len());
        for array in &assembled.arrays {
            check_key(seq_id, &array.key)?;
            let digest = self.hasher.digest(&array.tensor)?;
            let meta = PayloadMeta {
                dtype:     array.tensor.dtype(),
                shape:     array.tensor.shape().clone(),
                algorithm: self.hasher.algorithm().as_str().to_string(),
                digest:    digest.to_hex(),
            };
            let meta_path = dir.join(format!("{}.json", array.key));
            let meta_bytes =
                serde_json::to_vec_pretty(&meta).map_err(|source| TransferError::Metadata {
                    path: meta_path.clone(),
                    source,
                })?;

            atomic_write(
                dir.join(format!("{}.bin", array.key)),
                array.tensor.as_bytes(),
                AtomicWriteOptions::new(),
            )?;
            atomic_write(&meta_path, &meta_bytes, AtomicWriteOptions::new())?;
            tracing::trace!(seq_id, key = %array.key, %digest, "stored payload");
            keys.push(array.key.as_str());
        }

        let listing = serde_json::to_vec(&keys).map_err(|source| TransferError::Metadata {
            path: marker.clone(),
            source,
        })?;
        atomic_write(&marker, &listing, AtomicWriteOptions::new())?;
        tracing::debug!(seq_id, keys = keys.len(), dir = %dir.display(), "put done");
        Ok(true)
    }

    fn multi_get(
        &mut self,
        seq_id: u64,
        shards: &mut [(ShardKey, Tensor)],
        deadline: Option<Instant>,
    ) -> Result<bool, TransferError> {
        let published: BTreeSet<String> = self.wait_for_put(seq_id, deadline)?.into_iter().collect();

        let mut wanted: Vec<String> = Vec::new();
        for (key, _) in shards.iter() {
            if !wanted.iter().any(|k| k == key.logical_key()) {
                wanted.push(key.logical_key().to_string());
            }
        }

        let mut complete = true;
        for name in &wanted {
            if !published.contains(name) {
                tracing::warn!(seq_id, key = %name, "key was not published");
                complete = false;
                continue;
            }
            let full = self.load(seq_id, name)?;
            for (key, shard) in shards.iter_mut().filter(|(k, _)| k.logical_key() == name) {
                if key.global_shape() != full.shape() {
                    return Err(TransferError::Tensor(
                        ShapeError::GlobalShapeConflict {
                            expected: full.shape().clone(),
                            actual:   key.global_shape().clone(),
                        }
                        .into(),
                    ));
                }
                let region = full.read_region(key.global_offset(), shard.shape().clone())?;
                shard.copy_from(&region)?;
            }
        }
        tracing::debug!(seq_id, keys = wanted.len(), complete, "get done");
        Ok(complete)
    }

    fn complete(&mut self, seq_id: u64) -> Result<(), TransferError> {
        ensure_dir(self.seq_dir(seq_id))?;
        atomic_write(
            self.completion_marker(seq_id, self.role),
            b"",
            AtomicWriteOptions::new(),
        )?;
        if Role::ALL.iter().all(|&role| self.completion_marker(seq_id, role).is_file()) {
            let removed = self.release(seq_id)?;
            tracing::debug!(seq_id, removed, "released sequence");
        }
        Ok(())
    }
}
