//! Per-round digest manifests.
//!
//! A manifest records, for one `(role, iteration, seq_id)` round, the
//! digest, shape and element type of every logical array. Files are
//! line-oriented and bit-compatible with existing tooling:
//!
//! ```text
//! # Trainer MD5 values - Iteration 0, Seq ID 1
//! # Format: tensor_key,md5_hash,shape,dtype
//! tensor_000,5eb63bbbe01eeed093cb22bb8f5acdc3,4000x500,torch.float32
//! ```
//!
//! Producer and consumer files for the same round are paired by name
//! ([`ManifestIndex`]) and diffed key by key ([`ManifestComparator`]).

pub use self::compare::{ComparisonResult, ManifestComparator, Mismatch};
pub use self::error::{Error, Result};
pub use self::id::ManifestId;
pub use self::index::{ManifestIndex, RoundPair};
pub use self::manifest::{Manifest, ManifestEntry};
pub use self::parse::{ParseWarning, ParsedManifest, parse_str, read_manifest, read_manifest_as};
pub use self::role::Role;
pub use self::summary::{Outcome, SkippedRound, VerificationSummary, VerifyOptions, verify_directory};

mod compare;
mod error;
mod id;
mod index;
mod manifest;
mod parse;
mod role;
mod summary;
