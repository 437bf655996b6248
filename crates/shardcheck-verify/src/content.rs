use std::fmt;
use std::str::FromStr;

use crate::{Result, VerifyError};

/// Finalized digest bytes, displayed as lowercase hex.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentDigest(Vec<u8>);

impl ContentDigest {
    pub fn new(bytes: Vec<u8>) -> Self { Self(bytes) }

    pub fn from_hex(input: &str) -> Result<Self> {
        hex::decode(input)
            .map(Self)
            .map_err(|source| VerifyError::InvalidHex {
                input: input.to_string(),
                source,
            })
    }

    pub fn as_bytes(&self) -> &[u8] { &self.0 }

    pub fn to_hex(&self) -> String { hex::encode(&self.0) }

    /// Compare against an expected digest, returning a mismatch error.
    pub fn verify(&self, expected: &ContentDigest) -> Result<()> {
        if self == expected {
            Ok(())
        } else {
            Err(VerifyError::HashMismatch {
                expected: expected.to_hex(),
                actual:   self.to_hex(),
            })
        }
    }
}

impl From<Vec<u8>> for ContentDigest {
    fn from(bytes: Vec<u8>) -> Self { Self(bytes) }
}

impl fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.to_hex()) }
}

impl fmt::Debug for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentDigest({})", self.to_hex())
    }
}

impl FromStr for ContentDigest {
    type Err = VerifyError;

    fn from_str(s: &str) -> Result<Self> { Self::from_hex(s) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_roundtrip_is_lowercase() {
        let digest = ContentDigest::from_hex("5EB63BBBE01EEED093CB22BB8F5ACDC3").unwrap();
        assert_eq!(digest.to_hex(), "5eb63bbbe01eeed093cb22bb8f5acdc3");
        assert_eq!(digest.as_bytes().len(), 16);
    }

    #[test]
    fn invalid_hex_is_rejected() {
        let err = ContentDigest::from_hex("not-hex").unwrap_err();
        assert!(matches!(err, VerifyError::InvalidHex { .. }));
    }

    #[test]
    fn verify_reports_both_sides() {
        let a = ContentDigest::new(vec![1, 2]);
        let b = ContentDigest::new(vec![1, 3]);
        assert!(a.verify(&a.clone()).is_ok());
        match a.verify(&b) {
            Err(VerifyError::HashMismatch { expected, actual }) => {
                assert_eq!(expected, "0103");
                assert_eq!(actual, "0102");
            }
            other => panic!("expected HashMismatch, got {other:?}"),
        }
    }
}
