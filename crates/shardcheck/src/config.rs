use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;
use shardcheck_round::{RoundConfig, Workload};

/// Everything a `produce` or `consume` run needs, as loaded from TOML.
///
/// ```toml
/// log_level = "info"
/// store_dir = "shardcheck_store"
///
/// [round]
/// rounds = 5
/// seq_id_base = 1
/// output_dir = "md5_output"
///
/// [round.pacing]
/// random_max_secs = 0.0
///
/// [workload]
/// num_tensors = 20
/// shard_rows = 2
/// ```
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    pub log_level: String,
    pub store_dir: PathBuf,
    pub round:     RoundConfig,
    pub workload:  Workload,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            store_dir: PathBuf::from("shardcheck_store"),
            round:     RoundConfig::default(),
            workload:  Workload::default(),
        }
    }
}

impl RunConfig {
    pub fn from_toml(text: &str) -> anyhow::Result<Self> { Ok(toml::from_str(text)?) }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config '{}'", path.display()))?;
        Self::from_toml(&text).with_context(|| format!("invalid config '{}'", path.display()))
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        self.round.validate().context("invalid [round] settings")
    }

    /// Defaults, or the file at `path` when given.
    pub fn load_or_default(path: Option<&Path>) -> anyhow::Result<Self> {
        path.map_or_else(|| Ok(Self::default()), Self::load)
    }
}
