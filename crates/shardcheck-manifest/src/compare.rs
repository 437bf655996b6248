use std::collections::BTreeSet;

use crate::{Manifest, ManifestEntry};

/// A key present on both sides whose records differ.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Mismatch {
    pub key:          String,
    pub producer:     ManifestEntry,
    pub consumer:     ManifestEntry,
    pub digest_match: bool,
    pub shape_match:  bool,
    pub dtype_match:  bool,
}

impl Mismatch {
    /// Names of the fields that differ, for diagnostics.
    pub fn differing(&self) -> Vec<&'static str> {
        [
            (!self.digest_match).then_some("digest"),
            (!self.shape_match).then_some("shape"),
            (!self.dtype_match).then_some("dtype"),
        ]
        .into_iter()
        .flatten()
        .collect()
    }
}

/// Key-by-key verdict for one `(iteration, seq_id)` round.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ComparisonResult {
    pub iteration:      u64,
    pub seq_id:         u64,
    pub producer_total: usize,
    pub consumer_total: usize,
    pub matched:        usize,
    pub mismatched:     Vec<Mismatch>,
    pub producer_only:  BTreeSet<String>,
    pub consumer_only:  BTreeSet<String>,
}

impl ComparisonResult {
    /// `matched / max(producer_total, consumer_total)`, in `[0, 1]`.
    ///
    /// Keys missing on either side count against the rate. Two empty
    /// manifests rate `0`.
    pub fn success_rate(&self) -> f64 {
        let expected = self.producer_total.max(self.consumer_total);
        if expected == 0 {
            return 0.0;
        }
        self.matched as f64 / expected as f64
    }

    /// Every key matched and none is one-sided.
    pub fn is_perfect(&self) -> bool {
        self.mismatched.is_empty() && self.producer_only.is_empty() && self.consumer_only.is_empty()
    }

    pub fn mismatched_count(&self) -> usize { self.mismatched.len() }

    /// Log the verdict; `verbose` adds up to `limit` per-key details.
    pub fn log(&self, verbose: bool, limit: usize) {
        tracing::info!(
            iteration = self.iteration,
            seq_id = self.seq_id,
            producer = self.producer_total,
            consumer = self.consumer_total,
            matched = self.matched,
            mismatched = self.mismatched.len(),
            producer_only = self.producer_only.len(),
            consumer_only = self.consumer_only.len(),
            "round verdict: {:.2}% transferred intact",
            self.success_rate() * 100.0
        );
        if !verbose {
            return;
        }
        for m in self.mismatched.iter().take(limit) {
            tracing::info!(
                key = %m.key,
                digest_match = m.digest_match,
                shape_match = m.shape_match,
                dtype_match = m.dtype_match,
                producer_digest = %m.producer.digest,
                consumer_digest = %m.consumer.digest,
                producer_shape = %m.producer.shape,
                consumer_shape = %m.consumer.shape,
                "mismatch"
            );
        }
        if !self.producer_only.is_empty() {
            let keys: Vec<_> = self.producer_only.iter().take(limit).collect();
            tracing::info!(?keys, total = self.producer_only.len(), "only in producer manifest");
        }
        if !self.consumer_only.is_empty() {
            let keys: Vec<_> = self.consumer_only.iter().take(limit).collect();
            tracing::info!(?keys, total = self.consumer_only.len(), "only in consumer manifest");
        }
    }
}

/// Diffs a producer manifest against a consumer manifest.
#[derive(Clone, Copy, Debug, Default)]
pub struct ManifestComparator;

impl ManifestComparator {
    pub fn new() -> Self { Self }

    /// Classify every key of either manifest.
    ///
    /// The caller pairs manifests by round; the result takes its
    /// `(iteration, seq_id)` from the producer side.
    pub fn compare(&self, producer: &Manifest, consumer: &Manifest) -> ComparisonResult {
        let id = producer.id();
        if id.round() != consumer.id().round() {
            tracing::warn!(
                producer = %id,
                consumer = %consumer.id(),
                "comparing manifests from different rounds"
            );
        }

        let mut result = ComparisonResult {
            iteration:      id.iteration,
            seq_id:         id.seq_id,
            producer_total: producer.len(),
            consumer_total: consumer.len(),
            matched:        0,
            mismatched:     Vec::new(),
            producer_only:  BTreeSet::new(),
            consumer_only:  BTreeSet::new(),
        };

        for ours in producer.entries() {
            let Some(theirs) = consumer.get(&ours.logical_key) else {
                result.producer_only.insert(ours.logical_key.clone());
                continue;
            };
            let digest_match = ours.digest == theirs.digest;
            let shape_match = ours.shape == theirs.shape;
            let dtype_match = ours.dtype == theirs.dtype;
            if digest_match && shape_match && dtype_match {
                result.matched += 1;
            } else {
                result.mismatched.push(Mismatch {
                    key: ours.logical_key.clone(),
                    producer: ours.clone(),
                    consumer: theirs.clone(),
                    digest_match,
                    shape_match,
                    dtype_match,
                });
            }
        }
        result.consumer_only = consumer
            .keys()
            .filter(|key| !producer.contains(key))
            .map(str::to_string)
            .collect();

        tracing::debug!(
            iteration = result.iteration,
            seq_id = result.seq_id,
            matched = result.matched,
            "compared manifests"
        );
        result
    }
}
