//! Content verification primitives.
//!
//! Provides incremental hashing without fixing the algorithm: callers pick
//! an [`DigestAlgorithm`] at runtime or use a concrete [`Hasher`] directly.
//! [`VerifiedReader`] hashes bytes while they are copied elsewhere, so a
//! payload is touched once for both placement and verification.
//!
//! # Example
//!
//! ```
//! use std::io::Read;
//! use shardcheck_verify::{ContentDigest, Md5Hasher, VerifiedReader};
//!
//! let data = b"hello world";
//! let expected = ContentDigest::new(Md5Hasher::digest(data));
//!
//! let mut reader = VerifiedReader::new(&data[..], Md5Hasher::new());
//! let mut buffer = Vec::new();
//! reader.read_to_end(&mut buffer).unwrap();
//!
//! reader.finish(&expected).unwrap();
//! ```

pub use self::algorithm::DigestAlgorithm;
pub use self::content::ContentDigest;
pub use self::error::{Result, VerifyError};
pub use self::hasher::{DigestHasher, DynHasher, Hasher};
pub use self::reader::VerifiedReader;

#[cfg(feature = "md5")]
pub use self::hasher::Md5Hasher;

#[cfg(feature = "sha256")]
pub use self::hasher::Sha256Hasher;

mod algorithm;
mod content;
mod error;
mod hasher;
mod reader;
