use std::path::PathBuf;

use clap::builder::BoolishValueParser;
use clap::{Args, Parser, Subcommand};
use shardcheck_tensor::{AssemblyOptions, DType};

use crate::config::RunConfig;

#[derive(Clone, Debug, Parser)]
#[command(name = "shardcheck", version = env!("CARGO_PKG_VERSION"), about, long_about = None, propagate_version = true)]
pub struct App {
    /// Log filter, e.g. `info` or `shardcheck_round=debug`. `RUST_LOG` wins.
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Clone, Debug, Subcommand)]
pub enum Commands {
    /// Publish the workload round after round and record producer manifests.
    #[command(alias = "train", name = "produce")]
    Produce(RunArgs),
    /// Receive the workload round after round and record consumer manifests.
    #[command(alias = "infer", name = "consume")]
    Consume(RunArgs),
    /// Compare producer and consumer manifests in a directory.
    #[command(alias = "check", name = "verify")]
    Verify(VerifyArgs),
}

#[derive(Clone, Debug, Default, Args)]
pub struct RunArgs {
    /// TOML run configuration; flags below override it.
    #[arg(long, short)]
    pub config: Option<PathBuf>,

    #[arg(long, visible_alias = "iterations")]
    pub rounds: Option<u64>,
    /// First sequence id; round `i` uses `seq_id + i`.
    #[arg(long)]
    pub seq_id: Option<u64>,
    /// Where manifests are written.
    #[arg(long)]
    pub output_dir: Option<PathBuf>,
    /// Directory shared with the other role.
    #[arg(long)]
    pub store_dir: Option<PathBuf>,
    /// Record a manifest after each successful round.
    #[arg(long, env = "SHARDCHECK_ENABLE_VERIFY", value_parser = BoolishValueParser::new())]
    pub verify: Option<bool>,
    /// Fixed pause between rounds, in seconds.
    #[arg(long)]
    pub sleep: Option<f64>,
    /// Upper bound of a random pause between rounds; 0 uses `--sleep`.
    #[arg(long, env = "SHARDCHECK_RANDOM_SLEEP_MAX")]
    pub random_sleep_max: Option<f64>,
    /// Fail a round whose transfer takes longer, in seconds.
    #[arg(long)]
    pub timeout: Option<f64>,

    #[arg(long)]
    pub num_tensors: Option<usize>,
    #[arg(long)]
    pub height: Option<usize>,
    #[arg(long)]
    pub width: Option<usize>,
    /// Element type, e.g. `float32` or `torch.int64`.
    #[arg(long)]
    pub dtype: Option<DType>,
    #[arg(long)]
    pub shard_rows: Option<usize>,
    #[arg(long)]
    pub shard_cols: Option<usize>,
    /// Seed of the producer's data generator.
    #[arg(long)]
    pub seed: Option<u64>,
    /// Treat overlapping or missing shard regions as errors.
    #[arg(long)]
    pub strict_assembly: bool,
}

impl RunArgs {
    /// Apply flags and environment on top of `config`.
    pub fn apply(&self, config: &mut RunConfig) {
        let round = &mut config.round;
        let workload = &mut config.workload;

        set(&mut round.rounds, self.rounds);
        set(&mut round.seq_id_base, self.seq_id);
        set(&mut round.output_dir, self.output_dir.clone());
        set(&mut round.verify, self.verify);
        set(&mut round.pacing.fixed_secs, self.sleep);
        set(&mut round.pacing.random_max_secs, self.random_sleep_max);
        if self.timeout.is_some() {
            round.transfer_timeout_secs = self.timeout;
        }
        if self.strict_assembly {
            round.assembly = AssemblyOptions::strict();
        }

        set(&mut workload.num_tensors, self.num_tensors);
        set(&mut workload.height, self.height);
        set(&mut workload.width, self.width);
        set(&mut workload.dtype, self.dtype);
        set(&mut workload.shard_rows, self.shard_rows);
        set(&mut workload.shard_cols, self.shard_cols);
        set(&mut workload.seed, self.seed);
        set(&mut config.store_dir, self.store_dir.clone());
    }
}

fn set<T>(slot: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *slot = value;
    }
}

#[derive(Clone, Debug, Args)]
pub struct VerifyArgs {
    /// Directory holding both roles' manifest files.
    #[arg(long, visible_alias = "md5-dir", default_value = "md5_output")]
    pub dir: PathBuf,
    /// Only compare rounds of this iteration.
    #[arg(long)]
    pub iteration: Option<u64>,
    /// Log per-key details of every mismatch.
    #[arg(long, short)]
    pub verbose: bool,
    /// Detailed keys shown per round with `--verbose`.
    #[arg(long, default_value_t = 5)]
    pub limit: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_is_well_formed() { App::command().debug_assert(); }

    #[test]
    fn flags_override_config() {
        let app = App::try_parse_from([
            "shardcheck",
            "consume",
            "--iterations",
            "20",
            "--seq-id",
            "7",
            "--shard-rows",
            "2",
            "--dtype",
            "torch.float64",
            "--timeout",
            "1.5",
            "--strict-assembly",
        ])
        .unwrap();
        let Commands::Consume(args) = app.cmd else { panic!("expected consume") };

        let mut config = RunConfig::default();
        args.apply(&mut config);
        assert_eq!(config.round.rounds, 20);
        assert_eq!(config.round.seq_id_base, 7);
        assert_eq!(config.round.transfer_timeout_secs, Some(1.5));
        assert_eq!(config.round.assembly, AssemblyOptions::strict());
        assert_eq!(config.workload.shard_rows, 2);
        assert_eq!(config.workload.shard_cols, 1);
        assert_eq!(config.workload.dtype, DType::F64);
        assert_eq!(config.round.output_dir, PathBuf::from("md5_output"));
    }

    #[test]
    fn verify_flag_is_boolish() {
        let app = App::try_parse_from(["shardcheck", "produce", "--verify", "0"]).unwrap();
        let Commands::Produce(args) = app.cmd else { panic!("expected produce") };
        assert_eq!(args.verify, Some(false));
    }

    #[test]
    fn verify_defaults() {
        let app = App::try_parse_from(["shardcheck", "verify", "--md5-dir", "out", "-v"]).unwrap();
        let Commands::Verify(args) = app.cmd else { panic!("expected verify") };
        assert_eq!(args.dir, PathBuf::from("out"));
        assert!(args.verbose);
        assert_eq!(args.limit, 5);
        assert_eq!(args.iteration, None);
    }
}
