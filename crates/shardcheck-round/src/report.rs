use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use shardcheck_manifest::{Outcome, Role};

/// Duration samples of one kind of call.
#[derive(Clone, Debug, Default)]
pub struct LatencyStats {
    samples: Vec<Duration>,
}

impl LatencyStats {
    pub fn record(&mut self, sample: Duration) { self.samples.push(sample); }

    pub fn count(&self) -> usize { self.samples.len() }

    pub fn is_empty(&self) -> bool { self.samples.is_empty() }

    pub fn total(&self) -> Duration { self.samples.iter().sum() }

    pub fn min(&self) -> Option<Duration> { self.samples.iter().min().copied() }

    pub fn max(&self) -> Option<Duration> { self.samples.iter().max().copied() }

    pub fn mean(&self) -> Option<Duration> {
        let n = u32::try_from(self.samples.len()).ok().filter(|&n| n > 0)?;
        Some(self.total() / n)
    }
}

impl fmt::Display for LatencyStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.min(), self.mean(), self.max()) {
            (Some(min), Some(mean), Some(max)) => write!(
                f,
                "n={} min={:.3}s mean={:.3}s max={:.3}s total={:.3}s",
                self.count(),
                min.as_secs_f64(),
                mean.as_secs_f64(),
                max.as_secs_f64(),
                self.total().as_secs_f64()
            ),
            _ => f.write_str("n=0"),
        }
    }
}

/// Why a round failed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RoundFailure {
    /// The store answered `false`.
    Rejected,
    /// The transfer call returned an error.
    Transfer(String),
    /// The transfer ran past the configured timeout.
    TimedOut { elapsed: Duration, limit: Duration },
}

impl fmt::Display for RoundFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rejected => f.write_str("store rejected the transfer"),
            Self::Transfer(e) => write!(f, "transfer failed: {e}"),
            Self::TimedOut { elapsed, limit } => {
                write!(f, "transfer took {elapsed:?}, limit {limit:?}")
            }
        }
    }
}

/// Everything recorded about one round.
#[derive(Clone, Debug)]
pub struct RoundOutcome {
    pub iteration: u64,
    pub seq_id:    u64,
    pub result:    Result<(), RoundFailure>,
    pub transfer:  Option<Duration>,
    pub finalize:  Option<Duration>,
    /// Manifest written by the verification step.
    pub manifest:  Option<PathBuf>,
    /// Non-fatal diagnostics: verification, liveness and finalize problems.
    pub warnings:  Vec<String>,
}

impl RoundOutcome {
    pub fn succeeded(&self) -> bool { self.result.is_ok() }
}

/// Logical transfer rate over successful rounds.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Throughput {
    pub tensors_per_sec: f64,
    pub mb_per_sec:      f64,
}

/// Aggregate of a whole run, created per run and logged at its end.
#[derive(Clone, Debug)]
pub struct RunReport {
    pub role:            Role,
    pub rounds:          Vec<RoundOutcome>,
    pub transfer:        LatencyStats,
    pub finalize:        LatencyStats,
    /// Logical tensors moved per round, before sharding.
    pub logical_tensors: usize,
    /// Bytes moved per round.
    pub logical_bytes:   u64,
    /// Buffers handed to the store per round, after sharding.
    pub shard_count:     usize,
    pub complete_calls:  usize,
    pub final_barrier:   Result<(), String>,
    pub elapsed:         Duration,
}

impl RunReport {
    pub fn succeeded(&self) -> usize { self.rounds.iter().filter(|r| r.succeeded()).count() }

    pub fn failed(&self) -> usize { self.rounds.len() - self.succeeded() }

    pub fn success_rate(&self) -> f64 {
        if self.rounds.is_empty() {
            return 0.0;
        }
        self.succeeded() as f64 / self.rounds.len() as f64
    }

    pub fn outcome(&self) -> Outcome { Outcome::from_counts(self.succeeded(), self.failed()) }

    pub fn manifests(&self) -> impl Iterator<Item = &PathBuf> {
        self.rounds.iter().filter_map(|r| r.manifest.as_ref())
    }

    /// Throughput from the mean transfer time of all recorded transfers.
    pub fn throughput(&self) -> Option<Throughput> {
        let secs = self.transfer.mean()?.as_secs_f64();
        if secs <= 0.0 {
            return None;
        }
        Some(Throughput {
            tensors_per_sec: self.logical_tensors as f64 / secs,
            mb_per_sec:      self.logical_bytes as f64 / (1024.0 * 1024.0) / secs,
        })
    }

    pub fn log(&self) {
        tracing::info!(
            role = %self.role,
            rounds = self.rounds.len(),
            succeeded = self.succeeded(),
            failed = self.failed(),
            complete_calls = self.complete_calls,
            elapsed = ?self.elapsed,
            outcome = %self.outcome(),
            "run finished: {:.1}% of rounds succeeded",
            self.success_rate() * 100.0
        );
        tracing::info!(stats = %self.transfer, "transfer latency");
        tracing::info!(stats = %self.finalize, "complete latency");
        if let Some(t) = self.throughput() {
            tracing::info!(
                tensors_per_sec = format_args!("{:.1}", t.tensors_per_sec),
                mb_per_sec = format_args!("{:.1}", t.mb_per_sec),
                shards = self.shard_count,
                logical = self.logical_tensors,
                "throughput"
            );
        }
        for round in self.rounds.iter().filter(|r| !r.succeeded()) {
            if let Err(failure) = &round.result {
                tracing::warn!(iteration = round.iteration, seq_id = round.seq_id, %failure, "failed round");
            }
        }
        let manifests: Vec<_> = self.manifests().collect();
        tracing::info!(count = manifests.len(), ?manifests, "manifests written");
        if let Err(error) = &self.final_barrier {
            tracing::warn!(%error, "final barrier failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration { Duration::from_millis(n) }

    #[test]
    fn latency_stats() {
        let mut stats = LatencyStats::default();
        assert_eq!(stats.mean(), None);
        assert_eq!(stats.to_string(), "n=0");
        for n in [30, 10, 20] {
            stats.record(ms(n));
        }
        assert_eq!(stats.min(), Some(ms(10)));
        assert_eq!(stats.max(), Some(ms(30)));
        assert_eq!(stats.mean(), Some(ms(20)));
        assert_eq!(stats.total(), ms(60));
    }

    fn outcome(ok: bool) -> RoundOutcome {
        RoundOutcome {
            iteration: 0,
            seq_id:    1,
            result:    if ok { Ok(()) } else { Err(RoundFailure::Rejected) },
            transfer:  Some(ms(500)),
            finalize:  None,
            manifest:  None,
            warnings:  Vec::new(),
        }
    }

    #[test]
    fn report_aggregates() {
        let mut transfer = LatencyStats::default();
        transfer.record(ms(500));
        transfer.record(ms(1500));
        let report = RunReport {
            role: Role::Consumer,
            rounds: vec![outcome(true), outcome(false), outcome(true), outcome(true)],
            transfer,
            finalize: LatencyStats::default(),
            logical_tensors: 10,
            logical_bytes: 20 * 1024 * 1024,
            shard_count: 40,
            complete_calls: 5,
            final_barrier: Ok(()),
            elapsed: ms(2000),
        };
        assert_eq!(report.succeeded(), 3);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.success_rate(), 0.75);
        assert_eq!(report.outcome(), Outcome::Partial);
        let t = report.throughput().unwrap();
        assert_eq!(t.tensors_per_sec, 10.0);
        assert_eq!(t.mb_per_sec, 20.0);
    }
}
