use std::fmt;
use std::str::FromStr;

use crate::{DynHasher, Result, VerifyError};

/// Digest algorithms available at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DigestAlgorithm {
    #[default]
    Md5,
    Sha256,
}

impl DigestAlgorithm {
    pub fn digest_length(&self) -> usize {
        match self {
            DigestAlgorithm::Md5 => 16,
            DigestAlgorithm::Sha256 => 32,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DigestAlgorithm::Md5 => "md5",
            DigestAlgorithm::Sha256 => "sha256",
        }
    }

    /// Fresh hasher for this algorithm.
    pub fn hasher(&self) -> Result<Box<dyn DynHasher>> {
        match self {
            #[cfg(feature = "md5")]
            DigestAlgorithm::Md5 => Ok(Box::new(crate::Md5Hasher::new())),
            #[cfg(feature = "sha256")]
            DigestAlgorithm::Sha256 => Ok(Box::new(crate::Sha256Hasher::new())),
            #[allow(unreachable_patterns)]
            other => Err(VerifyError::UnsupportedAlgorithm(other.as_str().to_string())),
        }
    }
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for DigestAlgorithm {
    type Err = VerifyError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "md5" => Ok(DigestAlgorithm::Md5),
            "sha256" | "sha-256" => Ok(DigestAlgorithm::Sha256),
            other => Err(VerifyError::UnsupportedAlgorithm(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Hasher;

    #[test]
    fn parse_algorithm_names() {
        assert_eq!("MD5".parse::<DigestAlgorithm>().unwrap(), DigestAlgorithm::Md5);
        assert_eq!("sha-256".parse::<DigestAlgorithm>().unwrap(), DigestAlgorithm::Sha256);
        assert!("crc32".parse::<DigestAlgorithm>().is_err());
    }

    #[test]
    fn hasher_output_has_declared_length() {
        for algorithm in [DigestAlgorithm::Md5, DigestAlgorithm::Sha256] {
            let mut hasher = algorithm.hasher().unwrap();
            hasher.update(b"payload");
            assert_eq!(hasher.finalize().len(), algorithm.digest_length());
        }
    }
}
