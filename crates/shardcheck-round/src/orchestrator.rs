use std::path::PathBuf;
use std::time::{Duration, Instant};

use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use shardcheck_manifest::{Manifest, ManifestEntry, ManifestId, Role};
use shardcheck_tensor::{
    AssemblyOptions, ContentHasher, Materialize, ShardAssembler, ShardKey, Tensor,
};

use crate::report::{LatencyStats, RoundFailure, RoundOutcome, RunReport};
use crate::pacing::seconds;
use crate::{ConfigError, Pacing, TransferBoundary, VerifyError};

/// How a run is driven.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoundConfig {
    pub rounds:                u64,
    /// Round `i` transfers under `seq_id_base + i`.
    pub seq_id_base:           u64,
    /// Hash and record a manifest after each transfer, failed or not.
    pub verify:                bool,
    pub output_dir:            PathBuf,
    pub pacing:                Pacing,
    /// Upper bound for one transfer call. `None` waits indefinitely.
    pub transfer_timeout_secs: Option<f64>,
    pub assembly:              AssemblyOptions,
}

impl Default for RoundConfig {
    fn default() -> Self {
        Self {
            rounds:                5,
            seq_id_base:           1,
            verify:                true,
            output_dir:            PathBuf::from("md5_output"),
            pacing:                Pacing::default(),
            transfer_timeout_secs: None,
            assembly:              AssemblyOptions::default(),
        }
    }
}

impl RoundConfig {
    /// Reject pauses and timeouts that are negative or not finite.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.pacing.validate()?;
        if let Some(secs) = self.transfer_timeout_secs {
            seconds("transfer_timeout_secs", secs)?;
        }
        Ok(())
    }

    pub fn transfer_timeout(&self) -> Option<Duration> {
        self.transfer_timeout_secs
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
    }
}

/// Drives a fixed number of rounds over one reused buffer set.
///
/// Each round runs strictly in order: zero (consumer only), transfer,
/// verify, complete. A failed transfer fails its round and nothing
/// else: the buffers are still hashed, and `complete` runs for every
/// round regardless, and once more for `seq_id_base` after the last round.
pub struct RoundOrchestrator<B> {
    role:      Role,
    config:    RoundConfig,
    boundary:  B,
    buffers:   Vec<(ShardKey, Tensor)>,
    assembler: ShardAssembler,
    hasher:    ContentHasher,
    rng:       StdRng,
    /// Logical tensors and bytes per round, for throughput.
    logical:   (usize, u64),
}

impl<B: TransferBoundary> RoundOrchestrator<B> {
    pub fn new(role: Role, config: RoundConfig, boundary: B, buffers: Vec<(ShardKey, Tensor)>) -> Self {
        let assembler = ShardAssembler::new(config.assembly);
        let mut keys: Vec<&str> = buffers.iter().map(|(k, _)| k.logical_key()).collect();
        keys.sort_unstable();
        keys.dedup();
        let bytes = buffers.iter().map(|(_, t)| t.nbytes() as u64).sum();
        let logical = (keys.len(), bytes);
        Self {
            role,
            config,
            boundary,
            buffers,
            assembler,
            hasher: ContentHasher::md5(),
            rng: StdRng::from_entropy(),
            logical,
        }
    }

    pub fn hasher(mut self, hasher: ContentHasher) -> Self {
        self.hasher = hasher;
        self
    }

    /// Seed the pacing generator for reproducible pauses.
    pub fn seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn config(&self) -> &RoundConfig { &self.config }

    pub fn buffers(&self) -> &[(ShardKey, Tensor)] { &self.buffers }

    pub fn boundary(&self) -> &B { &self.boundary }

    pub fn into_boundary(self) -> B { self.boundary }

    pub fn run(&mut self) -> RunReport {
        let started = Instant::now();
        let mut report = RunReport {
            role:            self.role,
            rounds:          Vec::with_capacity(self.config.rounds as usize),
            transfer:        LatencyStats::default(),
            finalize:        LatencyStats::default(),
            logical_tensors: self.logical.0,
            logical_bytes:   self.logical.1,
            shard_count:     self.buffers.len(),
            complete_calls:  0,
            final_barrier:   Ok(()),
            elapsed:         Duration::ZERO,
        };

        if self.role == Role::Producer && self.buffers.iter().all(|(_, t)| t.is_all_zero()) {
            tracing::warn!("all outgoing buffers are zero, transfers cannot be told apart from loss");
        }
        tracing::info!(
            role = %self.role,
            rounds = self.config.rounds,
            seq_id_base = self.config.seq_id_base,
            buffers = self.buffers.len(),
            verify = self.config.verify,
            "starting run"
        );

        for iteration in 0..self.config.rounds {
            let outcome = self.round(iteration, &mut report);
            match &outcome.result {
                Ok(()) => tracing::info!(
                    iteration,
                    seq_id = outcome.seq_id,
                    transfer = ?outcome.transfer,
                    "round succeeded"
                ),
                Err(failure) => tracing::error!(
                    iteration,
                    seq_id = outcome.seq_id,
                    %failure,
                    "round failed"
                ),
            }
            report.rounds.push(outcome);

            if iteration + 1 < self.config.rounds {
                let pause = self.config.pacing.next_delay(&mut self.rng);
                if !pause.is_zero() {
                    tracing::debug!(?pause, "pausing before next round");
                    std::thread::sleep(pause);
                }
            }
        }

        let base = self.config.seq_id_base;
        tracing::info!(seq_id = base, "final barrier");
        report.complete_calls += 1;
        if let Err(error) = self.boundary.complete(base) {
            tracing::warn!(seq_id = base, %error, "final complete failed");
            report.final_barrier = Err(error.to_string());
        }
        report.elapsed = started.elapsed();
        report
    }

    fn round(&mut self, iteration: u64, report: &mut RunReport) -> RoundOutcome {
        let seq_id = self.config.seq_id_base + iteration;
        let _span = tracing::info_span!("round", role = %self.role, iteration, seq_id).entered();
        let mut outcome = RoundOutcome {
            iteration,
            seq_id,
            result: Ok(()),
            transfer: None,
            finalize: None,
            manifest: None,
            warnings: Vec::new(),
        };

        if self.role == Role::Consumer {
            for (_, buffer) in &mut self.buffers {
                buffer.fill_zero();
            }
            tracing::debug!(buffers = self.buffers.len(), "zeroed receive buffers");
        }

        let timeout = self.config.transfer_timeout();
        let deadline = timeout.and_then(|t| Instant::now().checked_add(t));
        let start = Instant::now();
        let moved = match self.role {
            Role::Producer => self.boundary.multi_put(seq_id, &self.buffers, deadline),
            Role::Consumer => self.boundary.multi_get(seq_id, &mut self.buffers, deadline),
        };
        let elapsed = start.elapsed();
        outcome.transfer = Some(elapsed);
        report.transfer.record(elapsed);

        outcome.result = match moved {
            Ok(true) => match timeout {
                Some(limit) if elapsed > limit => Err(RoundFailure::TimedOut { elapsed, limit }),
                _ => Ok(()),
            },
            Ok(false) => Err(RoundFailure::Rejected),
            Err(error) => Err(RoundFailure::Transfer(error.to_string())),
        };

        // hashed whatever the transfer result
        if self.role == Role::Consumer {
            if let Some(warning) = self.liveness(outcome.succeeded()) {
                outcome.warnings.push(warning);
            }
        }
        if self.config.verify {
            match self.verify(iteration, seq_id) {
                Ok(path) => outcome.manifest = Some(path),
                Err(error) => {
                    tracing::warn!(%error, "verification failed");
                    outcome.warnings.push(format!("verification failed: {error}"));
                }
            }
        }

        let start = Instant::now();
        let finalized = self.boundary.complete(seq_id);
        let elapsed = start.elapsed();
        report.complete_calls += 1;
        outcome.finalize = Some(elapsed);
        report.finalize.record(elapsed);
        if let Err(error) = finalized {
            tracing::warn!(%error, "complete failed");
            outcome.warnings.push(format!("complete failed: {error}"));
        }
        outcome
    }

    /// Warn when every receive buffer is still zero after the transfer.
    fn liveness(&self, transferred: bool) -> Option<String> {
        let mut nonzero = 0usize;
        let mut total = 0usize;
        for (key, buffer) in &self.buffers {
            let n = buffer.count_nonzero();
            if n > 0 {
                tracing::debug!(key = key.logical_key(), nonzero = n, numel = buffer.numel(), "received");
            }
            nonzero += n;
            total += buffer.numel();
        }
        tracing::info!(nonzero, total, "received data");
        if nonzero == 0 && total > 0 {
            if transferred {
                tracing::warn!("transfer reported success but every buffer is still zero");
            } else {
                tracing::warn!("every buffer is still zero after the failed transfer");
            }
            return Some("all buffers zero after transfer".to_string());
        }
        None
    }

    fn verify(&self, iteration: u64, seq_id: u64) -> Result<PathBuf, VerifyError> {
        let mut manifest = Manifest::new(ManifestId::new(self.role, iteration, seq_id));

        if self.buffers.iter().all(|(key, t)| key.covers_whole(t.shape())) {
            for (key, tensor) in &self.buffers {
                manifest.insert(self.entry(key.logical_key(), tensor)?);
            }
        } else {
            let rebuilt = self.assembler.reconstruct(&self.buffers);
            if let Some(first) = rebuilt.failures.first() {
                return Err(VerifyError::Reconstruct {
                    count: rebuilt.failures.len(),
                    first: first.clone(),
                });
            }
            for array in &rebuilt.arrays {
                manifest.insert(self.entry(&array.key, &array.tensor)?);
            }
        }

        Ok(manifest.write_to(&self.config.output_dir)?)
    }

    fn entry(&self, key: &str, array: &impl Materialize) -> Result<ManifestEntry, VerifyError> {
        let digest = self.hasher.digest(array)?;
        Ok(ManifestEntry::new(key, &digest, array.shape(), array.dtype()))
    }
}
