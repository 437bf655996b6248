use std::fmt;
use std::path::Path;

use crate::{Error, Result, Role};

const EXTENSION: &str = ".txt";

/// Identity of one round's manifest: `(role, iteration, seq_id)`.
///
/// The file name is derived from it alone, so producer and consumer files
/// for the same round pair up without any side channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ManifestId {
    pub role:      Role,
    pub iteration: u64,
    pub seq_id:    u64,
}

impl ManifestId {
    pub fn new(role: Role, iteration: u64, seq_id: u64) -> Self {
        Self {
            role,
            iteration,
            seq_id,
        }
    }

    /// `{label}_md5_iter{iteration}_seq{seq_id}.txt`
    pub fn file_name(&self) -> String {
        format!(
            "{}_iter{}_seq{}{EXTENSION}",
            self.role.file_prefix(),
            self.iteration,
            self.seq_id
        )
    }

    /// The same round as seen from the other role.
    pub fn counterpart(&self) -> Self {
        Self {
            role: self.role.opposite(),
            ..*self
        }
    }

    /// `(iteration, seq_id)`, the key files of both roles are paired on.
    pub fn round(&self) -> (u64, u64) { (self.iteration, self.seq_id) }

    /// Recover the identity from a file name of the given role.
    ///
    /// The name must carry the role's prefix and the `.txt` suffix; the
    /// numbers come from the `_`-separated tokens `iter<N>` and `seq<N>`.
    pub fn parse_file_name(role: Role, name: &str) -> Result<Self> {
        let invalid = || Error::InvalidFileName(name.to_string());
        let stem = name.strip_suffix(EXTENSION).ok_or_else(invalid)?;
        if !stem.starts_with(&role.file_prefix()) {
            return Err(invalid());
        }

        let mut iteration = None;
        let mut seq_id = None;
        for token in stem.split('_') {
            if let Some(n) = token.strip_prefix("iter") {
                iteration = Some(n.parse().map_err(|_| invalid())?);
            } else if let Some(n) = token.strip_prefix("seq") {
                seq_id = Some(n.parse().map_err(|_| invalid())?);
            }
        }
        match (iteration, seq_id) {
            (Some(iteration), Some(seq_id)) => Ok(Self::new(role, iteration, seq_id)),
            _ => Err(invalid()),
        }
    }

    /// Like [`parse_file_name`](Self::parse_file_name), trying both roles.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| Error::InvalidFileName(path.display().to_string()))?;
        Role::ALL
            .into_iter()
            .find_map(|role| Self::parse_file_name(role, name).ok())
            .ok_or_else(|| Error::InvalidFileName(name.to_string()))
    }
}

impl fmt::Display for ManifestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} iteration {} seq {}",
            self.role, self.iteration, self.seq_id
        )
    }
}
