use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use shardcheck_fs::{AtomicWriteOptions, atomic_write, ensure_dir};
use shardcheck_tensor::{DType, Shape};
use shardcheck_verify::ContentDigest;

use crate::{Error, ManifestId, Result};

pub(crate) const FORMAT_LINE: &str = "# Format: tensor_key,md5_hash,shape,dtype";

/// One record: the digest, shape and element type recorded for a key.
///
/// Fields are kept as the exact text written to or read from the file so
/// comparison is string-exact and shape formatting survives a round trip.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ManifestEntry {
    pub logical_key: String,
    pub digest:      String,
    pub shape:       String,
    pub dtype:       String,
}

impl ManifestEntry {
    pub fn new(
        logical_key: impl Into<String>,
        digest: &ContentDigest,
        shape: &Shape,
        dtype: DType,
    ) -> Self {
        Self {
            logical_key: logical_key.into(),
            digest:      digest.to_hex(),
            shape:       shape.to_string(),
            dtype:       dtype.name().to_string(),
        }
    }

    pub fn parsed_digest(&self) -> Option<ContentDigest> { ContentDigest::from_hex(&self.digest).ok() }

    pub fn parsed_shape(&self) -> Option<Shape> { self.shape.parse().ok() }

    pub fn parsed_dtype(&self) -> Option<DType> { self.dtype.parse().ok() }

    fn validate(&self) -> Result<()> {
        let fields = [
            ("logical_key", &self.logical_key),
            ("digest", &self.digest),
            ("shape", &self.shape),
            ("dtype", &self.dtype),
        ];
        for (field, value) in fields {
            let reason = if value.contains(',') {
                "contains ','"
            } else if value.contains(['\n', '\r']) {
                "contains a line break"
            } else if value.trim() != value.as_str() {
                "has surrounding whitespace"
            } else {
                continue;
            };
            return Err(Error::InvalidField {
                key: self.logical_key.clone(),
                field,
                reason,
            });
        }
        if self.logical_key.is_empty() || self.logical_key.starts_with('#') {
            return Err(Error::InvalidField {
                key:    self.logical_key.clone(),
                field:  "logical_key",
                reason: "would not parse back as a record",
            });
        }
        Ok(())
    }
}

/// Per-round table of logical key to recorded entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Manifest {
    id:      ManifestId,
    entries: BTreeMap<String, ManifestEntry>,
}

impl Manifest {
    pub fn new(id: ManifestId) -> Self {
        Self {
            id,
            entries: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> ManifestId { self.id }

    /// Add or replace the entry for its key, returning the replaced one.
    pub fn insert(&mut self, entry: ManifestEntry) -> Option<ManifestEntry> {
        self.entries.insert(entry.logical_key.clone(), entry)
    }

    pub fn get(&self, key: &str) -> Option<&ManifestEntry> { self.entries.get(key) }

    pub fn contains(&self, key: &str) -> bool { self.entries.contains_key(key) }

    pub fn len(&self) -> usize { self.entries.len() }

    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    /// Entries in key order.
    pub fn entries(&self) -> impl Iterator<Item = &ManifestEntry> { self.entries.values() }

    pub fn keys(&self) -> impl Iterator<Item = &str> { self.entries.keys().map(String::as_str) }

    pub fn header(&self) -> String {
        format!(
            "# {} MD5 values - Iteration {}, Seq ID {}",
            self.id.role.title(),
            self.id.iteration,
            self.id.seq_id
        )
    }

    /// Render the file body: header block then one record per key.
    pub fn render(&self) -> Result<String> {
        let mut out = String::with_capacity(128 + self.entries.len() * 64);
        out.push_str(&self.header());
        out.push('\n');
        out.push_str(FORMAT_LINE);
        out.push('\n');
        for entry in self.entries.values() {
            entry.validate()?;
            out.push_str(&entry.logical_key);
            out.push(',');
            out.push_str(&entry.digest);
            out.push(',');
            out.push_str(&entry.shape);
            out.push(',');
            out.push_str(&entry.dtype);
            out.push('\n');
        }
        Ok(out)
    }

    /// Write to `dir` under the name derived from this manifest's id.
    ///
    /// The file is placed atomically; readers never see a partial file.
    pub fn write_to(&self, dir: impl AsRef<Path>) -> Result<PathBuf> {
        let dir = dir.as_ref();
        let body = self.render()?;
        ensure_dir(dir)?;
        let path = dir.join(self.id.file_name());
        atomic_write(&path, body.as_bytes(), AtomicWriteOptions::new())?;
        tracing::info!(path = %path.display(), entries = self.len(), "wrote manifest");
        Ok(path)
    }
}

impl Extend<ManifestEntry> for Manifest {
    fn extend<I: IntoIterator<Item = ManifestEntry>>(&mut self, iter: I) {
        for entry in iter {
            self.insert(entry);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Role;

    fn entry(key: &str) -> ManifestEntry {
        ManifestEntry {
            logical_key: key.to_string(),
            digest:      "d41d8cd98f00b204e9800998ecf8427e".to_string(),
            shape:       "4000x500".to_string(),
            dtype:       "torch.float32".to_string(),
        }
    }

    #[test]
    fn renders_bit_exact_layout() {
        let mut m = Manifest::new(ManifestId::new(Role::Producer, 0, 1));
        m.insert(entry("tensor_001"));
        m.insert(entry("tensor_000"));
        assert_eq!(
            m.render().unwrap(),
            "# Trainer MD5 values - Iteration 0, Seq ID 1\n\
             # Format: tensor_key,md5_hash,shape,dtype\n\
             tensor_000,d41d8cd98f00b204e9800998ecf8427e,4000x500,torch.float32\n\
             tensor_001,d41d8cd98f00b204e9800998ecf8427e,4000x500,torch.float32\n"
        );
    }

    #[test]
    fn consumer_header() {
        let m = Manifest::new(ManifestId::new(Role::Consumer, 3, 7));
        assert!(m.render().unwrap().starts_with("# Infer MD5 values - Iteration 3, Seq ID 7\n"));
    }

    #[test]
    fn entry_from_typed_parts() {
        let digest = ContentDigest::from_hex("5eb63bbbe01eeed093cb22bb8f5acdc3").unwrap();
        let e = ManifestEntry::new("w", &digest, &Shape::new([20000, 5000]), DType::F32);
        assert_eq!(e.shape, "20000x5000");
        assert_eq!(e.dtype, "torch.float32");
        assert_eq!(e.parsed_digest(), Some(digest));
        assert_eq!(e.parsed_dtype(), Some(DType::F32));
    }

    #[test]
    fn unwritable_keys_are_rejected() {
        for key in ["a,b", "line\nbreak", "#comment", "", " padded"] {
            let mut m = Manifest::new(ManifestId::new(Role::Producer, 0, 0));
            m.insert(entry(key));
            assert!(matches!(m.render(), Err(Error::InvalidField { .. })), "{key:?}");
        }
    }

    #[test]
    fn insert_replaces() {
        let mut m = Manifest::new(ManifestId::new(Role::Producer, 0, 0));
        assert!(m.insert(entry("k")).is_none());
        let mut other = entry("k");
        other.shape = "1x1".into();
        assert_eq!(m.insert(other).unwrap().shape, "4000x500");
        assert_eq!(m.len(), 1);
    }
}
