use shardcheck_verify::{ContentDigest, DigestAlgorithm, Hasher};

use crate::Result;
use crate::view::Materialize;

const CHUNK: usize = 1 << 20;

/// Reproducible digest of an array's canonical bytes.
///
/// The input is materialized to contiguous row-major little-endian host
/// bytes first, so where or how an array is laid out never changes its
/// digest. Shape and element type are not part of the digest; manifests
/// record them next to it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ContentHasher {
    algorithm: DigestAlgorithm,
}

impl ContentHasher {
    pub fn new(algorithm: DigestAlgorithm) -> Self { Self { algorithm } }

    pub fn md5() -> Self { Self::new(DigestAlgorithm::Md5) }

    pub fn algorithm(&self) -> DigestAlgorithm { self.algorithm }

    pub fn digest<M: Materialize + ?Sized>(&self, array: &M) -> Result<ContentDigest> {
        let bytes = array.host_bytes()?;
        let mut hasher = self.algorithm.hasher()?;
        for chunk in bytes.chunks(CHUNK) {
            hasher.update(chunk);
        }
        Ok(ContentDigest::new(hasher.finalize()))
    }
}
