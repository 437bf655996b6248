use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use shardcheck_fs::read_to_string;

use crate::{Manifest, ManifestEntry, ManifestId, Result};

const FIELDS: usize = 4;

/// A line the parser skipped or resolved, with its 1-based line number.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParseWarning {
    FieldCount {
        line:  usize,
        found: usize,
        text:  String,
    },
    DuplicateKey {
        line:          usize,
        key:           String,
        previous_line: usize,
    },
}

impl fmt::Display for ParseWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FieldCount { line, found, text } => write!(
                f,
                "line {line}: expected {FIELDS} fields, found {found}: {text}"
            ),
            Self::DuplicateKey {
                line,
                key,
                previous_line,
            } => write!(
                f,
                "line {line}: key '{key}' repeats line {previous_line}, last occurrence wins"
            ),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ParsedManifest {
    pub manifest: Manifest,
    pub warnings: Vec<ParseWarning>,
    pub path:     Option<PathBuf>,
}

impl ParsedManifest {
    pub fn is_clean(&self) -> bool { self.warnings.is_empty() }
}

/// Parse manifest text for a known identity.
///
/// Comment lines (leading `#`) and blank lines are skipped. Records that
/// do not split into exactly four comma-separated fields are skipped with
/// a warning; repeated keys resolve to the last occurrence and are
/// flagged.
pub fn parse_str(id: ManifestId, text: &str) -> ParsedManifest {
    let mut manifest = Manifest::new(id);
    let mut warnings = Vec::new();
    let mut first_seen: HashMap<String, usize> = HashMap::new();

    for (index, raw) in text.lines().enumerate() {
        let line = index + 1;
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let fields: Vec<&str> = trimmed.split(',').collect();
        let [key, digest, shape, dtype] = fields[..] else {
            let warning = ParseWarning::FieldCount {
                line,
                found: fields.len(),
                text: trimmed.to_string(),
            };
            tracing::warn!(manifest = %id, %warning, "skipping malformed record");
            warnings.push(warning);
            continue;
        };

        if let Some(&previous_line) = first_seen.get(key) {
            let warning = ParseWarning::DuplicateKey {
                line,
                key: key.to_string(),
                previous_line,
            };
            tracing::warn!(manifest = %id, %warning, "duplicate key");
            warnings.push(warning);
        }
        first_seen.insert(key.to_string(), line);

        manifest.insert(ManifestEntry {
            logical_key: key.to_string(),
            digest:      digest.to_string(),
            shape:       shape.to_string(),
            dtype:       dtype.to_string(),
        });
    }

    ParsedManifest {
        manifest,
        warnings,
        path: None,
    }
}

/// Read and parse a manifest file, taking its identity from the file name.
pub fn read_manifest(path: impl AsRef<Path>) -> Result<ParsedManifest> {
    let path = path.as_ref();
    let id = ManifestId::from_path(path)?;
    read_manifest_as(id, path)
}

/// Read and parse a manifest file under an explicit identity.
pub fn read_manifest_as(id: ManifestId, path: impl AsRef<Path>) -> Result<ParsedManifest> {
    let path = path.as_ref();
    let text = read_to_string(path)?;
    let mut parsed = parse_str(id, &text);
    tracing::debug!(
        path = %path.display(),
        entries = parsed.manifest.len(),
        warnings = parsed.warnings.len(),
        "parsed manifest"
    );
    parsed.path = Some(path.to_path_buf());
    Ok(parsed)
}
