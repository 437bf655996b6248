use std::fmt;
use std::path::Path;

use serde::Serialize;

use crate::{
    ComparisonResult, Error, ManifestComparator, ManifestIndex, ParsedManifest, Result, Role,
    RoundPair, read_manifest,
};

/// Three-way aggregate verdict, mapped onto the process exit code.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    Partial,
    Failure,
}

impl Outcome {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Success => 0,
            Self::Partial => 1,
            Self::Failure => 2,
        }
    }

    /// Verdict from success and failure counts.
    pub fn from_counts(succeeded: usize, failed: usize) -> Self {
        match (succeeded, failed) {
            (0, _) => Self::Failure,
            (_, 0) => Self::Success,
            _ => Self::Partial,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Success => "success",
            Self::Partial => "partial",
            Self::Failure => "failure",
        })
    }
}

/// A paired round left out of the comparison.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SkippedRound {
    pub iteration: u64,
    pub seq_id:    u64,
    pub reason:    String,
}

#[derive(Clone, Copy, Debug)]
pub struct VerifyOptions {
    /// Compare only rounds of this iteration.
    pub iteration: Option<u64>,
    /// Log per-key details for each round.
    pub verbose:   bool,
    /// Per-round cap on detailed keys when verbose.
    pub detail_limit: usize,
}

impl VerifyOptions {
    pub fn new() -> Self {
        Self {
            iteration:    None,
            verbose:      false,
            detail_limit: 5,
        }
    }

    pub fn iteration(mut self, iteration: Option<u64>) -> Self {
        self.iteration = iteration;
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}

impl Default for VerifyOptions {
    fn default() -> Self { Self::new() }
}

/// Verdicts over every paired round of a directory.
#[derive(Clone, Debug, Default)]
pub struct VerificationSummary {
    pub rounds:  Vec<ComparisonResult>,
    pub skipped: Vec<SkippedRound>,
    /// Paired rounds considered after the iteration filter.
    pub pairs:   usize,
}

impl VerificationSummary {
    pub fn total_matched(&self) -> usize { self.rounds.iter().map(|r| r.matched).sum() }

    pub fn total_mismatched(&self) -> usize { self.rounds.iter().map(|r| r.mismatched.len()).sum() }

    /// `matched / (matched + mismatched)` over all compared keys.
    pub fn overall_success_rate(&self) -> f64 {
        let matched = self.total_matched();
        let total = matched + self.total_mismatched();
        if total == 0 {
            return 0.0;
        }
        matched as f64 / total as f64
    }

    pub fn perfect_rounds(&self) -> usize { self.rounds.iter().filter(|r| r.is_perfect()).count() }

    /// Success only when something was compared and every compared round
    /// is perfect; partial when any key matched anywhere.
    pub fn outcome(&self) -> Outcome {
        if !self.rounds.is_empty() && self.perfect_rounds() == self.rounds.len() {
            Outcome::Success
        } else if self.total_matched() > 0 {
            Outcome::Partial
        } else {
            Outcome::Failure
        }
    }

    pub fn log(&self) {
        tracing::info!(
            pairs = self.pairs,
            compared = self.rounds.len(),
            skipped = self.skipped.len(),
            matched = self.total_matched(),
            mismatched = self.total_mismatched(),
            perfect = self.perfect_rounds(),
            outcome = %self.outcome(),
            "verification finished: {:.2}% overall",
            self.overall_success_rate() * 100.0
        );
    }
}

/// Pair and compare every round found in `dir`.
///
/// Rounds whose files fail to read or parse to no entries are skipped
/// and recorded; they never abort the other rounds.
pub fn verify_directory(dir: impl AsRef<Path>, options: &VerifyOptions) -> Result<VerificationSummary> {
    let dir = dir.as_ref();
    let index = ManifestIndex::scan(dir)?;
    for (role, label) in [(Role::Producer, "producer"), (Role::Consumer, "consumer")] {
        if index.count(role) == 0 {
            return Err(Error::NoManifests(dir.to_path_buf(), label));
        }
    }

    let pairs = index.pairs(options.iteration);
    let comparator = ManifestComparator::new();
    let mut summary = VerificationSummary {
        pairs: pairs.len(),
        ..Default::default()
    };

    for pair in pairs {
        let _span = tracing::info_span!("round", iteration = pair.iteration, seq_id = pair.seq_id)
            .entered();
        match load_pair(&pair) {
            Ok((producer, consumer)) => {
                let result = comparator.compare(&producer.manifest, &consumer.manifest);
                result.log(options.verbose, options.detail_limit);
                summary.rounds.push(result);
            }
            Err(reason) => {
                tracing::error!(%reason, "skipping round");
                summary.skipped.push(SkippedRound {
                    iteration: pair.iteration,
                    seq_id: pair.seq_id,
                    reason,
                });
            }
        }
    }
    Ok(summary)
}

fn load_pair(pair: &RoundPair) -> std::result::Result<(ParsedManifest, ParsedManifest), String> {
    let producer = read_manifest(&pair.producer).map_err(|e| e.to_string())?;
    let consumer = read_manifest(&pair.consumer).map_err(|e| e.to_string())?;
    for (parsed, role) in [(&producer, Role::Producer), (&consumer, Role::Consumer)] {
        if parsed.manifest.is_empty() {
            return Err(format!("{role} manifest has no entries"));
        }
    }
    Ok((producer, consumer))
}
