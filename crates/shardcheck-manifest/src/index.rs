use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use shardcheck_fs::list_files;

use crate::{ManifestId, Result, Role};

/// Producer and consumer files for the same round.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoundPair {
    pub iteration: u64,
    pub seq_id:    u64,
    pub producer:  PathBuf,
    pub consumer:  PathBuf,
}

/// Manifest files in one directory, indexed per role by `(iteration, seq_id)`.
#[derive(Clone, Debug, Default)]
pub struct ManifestIndex {
    producer: BTreeMap<(u64, u64), PathBuf>,
    consumer: BTreeMap<(u64, u64), PathBuf>,
}

impl ManifestIndex {
    /// Index every `*.txt` file carrying a role prefix.
    ///
    /// Names with a role prefix whose round numbers cannot be parsed are
    /// excluded with a warning; other files are ignored silently.
    pub fn scan(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let mut index = Self::default();
        for path in list_files(dir)? {
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            for role in Role::ALL {
                if !name.starts_with(&role.file_prefix()) || !name.ends_with(".txt") {
                    continue;
                }
                match ManifestId::parse_file_name(role, name) {
                    Ok(id) => index.insert(id, path.clone()),
                    Err(error) => tracing::warn!(%error, "excluding manifest"),
                }
            }
        }
        tracing::info!(
            dir = %dir.display(),
            producer = index.producer.len(),
            consumer = index.consumer.len(),
            "indexed manifests"
        );
        Ok(index)
    }

    pub fn insert(&mut self, id: ManifestId, path: PathBuf) {
        let map = match id.role {
            Role::Producer => &mut self.producer,
            Role::Consumer => &mut self.consumer,
        };
        if let Some(previous) = map.insert(id.round(), path) {
            tracing::warn!(manifest = %id, previous = %previous.display(), "round indexed twice");
        }
    }

    pub fn count(&self, role: Role) -> usize {
        match role {
            Role::Producer => self.producer.len(),
            Role::Consumer => self.consumer.len(),
        }
    }

    /// Rounds present on both sides, ascending, optionally narrowed to
    /// one iteration.
    pub fn pairs(&self, iteration: Option<u64>) -> Vec<RoundPair> {
        self.producer
            .iter()
            .filter(|((it, _), _)| iteration.is_none_or(|want| *it == want))
            .filter_map(|(&(iteration, seq_id), producer)| {
                self.consumer.get(&(iteration, seq_id)).map(|consumer| RoundPair {
                    iteration,
                    seq_id,
                    producer: producer.clone(),
                    consumer: consumer.clone(),
                })
            })
            .collect()
    }

    /// Rounds with a file for `role` but none for the other side.
    pub fn unpaired(&self, role: Role) -> Vec<(u64, u64)> {
        let (ours, theirs) = match role {
            Role::Producer => (&self.producer, &self.consumer),
            Role::Consumer => (&self.consumer, &self.producer),
        };
        ours.keys().filter(|k| !theirs.contains_key(k)).copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn pairs_only_rounds_on_both_sides() {
        let dir = tempfile::tempdir().unwrap();
        for name in [
            "train_md5_iter0_seq1.txt",
            "train_md5_iter1_seq2.txt",
            "train_md5_iter2_seq3.txt",
            "infer_md5_iter0_seq1.txt",
            "infer_md5_iter1_seq2.txt",
            "infer_md5_iter5_seq9.txt",
            "train_md5_iterA_seq1.txt",
            "README.md",
        ] {
            fs::write(dir.path().join(name), "").unwrap();
        }

        let index = ManifestIndex::scan(dir.path()).unwrap();
        assert_eq!(index.count(Role::Producer), 3);
        assert_eq!(index.count(Role::Consumer), 3);

        let pairs = index.pairs(None);
        assert_eq!(
            pairs.iter().map(|p| (p.iteration, p.seq_id)).collect::<Vec<_>>(),
            vec![(0, 1), (1, 2)]
        );
        assert!(pairs[0].producer.ends_with("train_md5_iter0_seq1.txt"));
        assert!(pairs[0].consumer.ends_with("infer_md5_iter0_seq1.txt"));

        assert_eq!(index.pairs(Some(1)).len(), 1);
        assert!(index.pairs(Some(7)).is_empty());
        assert_eq!(index.unpaired(Role::Producer), vec![(2, 3)]);
        assert_eq!(index.unpaired(Role::Consumer), vec![(5, 9)]);
    }

    #[test]
    fn missing_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ManifestIndex::scan(dir.path().join("absent")).is_err());
    }
}
