//! Round-based transfer driver.
//!
//! A [`RoundOrchestrator`] owns one buffer set for the whole run and moves
//! it through a [`TransferBoundary`] round after round, recording a
//! manifest per round and a [`RunReport`] at the end.
//! [`LocalDirStore`] is a boundary over a shared directory, enough to run
//! a producer and a consumer against each other on one machine.

pub use self::boundary::TransferBoundary;
pub use self::error::{ConfigError, TransferError, VerifyError};
pub use self::orchestrator::{RoundConfig, RoundOrchestrator};
pub use self::pacing::Pacing;
pub use self::report::{LatencyStats, RoundFailure, RoundOutcome, RunReport, Throughput};
pub use self::store::LocalDirStore;
pub use self::workload::Workload;

mod boundary;
mod error;
mod orchestrator;
mod pacing;
mod report;
mod store;
mod workload;
