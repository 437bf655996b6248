use anyhow::Context;
use shardcheck_manifest::{Outcome, Role, VerifyOptions, verify_directory};
use shardcheck_round::{LocalDirStore, RoundOrchestrator};

use crate::cli::VerifyArgs;
use crate::config::RunConfig;

/// One producer or consumer run against the local directory store.
///
/// Errors are setup failures; round failures only show in the outcome.
pub fn run_role(role: Role, config: RunConfig) -> anyhow::Result<Outcome> {
    let _span = tracing::info_span!("run", %role).entered();
    let workload = &config.workload;
    tracing::info!(
        tensors = workload.num_tensors,
        shape = %workload.global_shape(),
        dtype = %workload.dtype.name(),
        grid = %format_args!("{}x{}", workload.shard_rows, workload.shard_cols),
        store = %config.store_dir.display(),
        output = %config.round.output_dir.display(),
        "configured"
    );

    let buffers = match role {
        Role::Producer => workload.producer_buffers(),
        Role::Consumer => workload.consumer_buffers(),
    }
    .context("invalid workload")?;

    std::fs::create_dir_all(&config.store_dir)
        .with_context(|| format!("cannot create store '{}'", config.store_dir.display()))?;
    let store = LocalDirStore::new(&config.store_dir, role).assembly(config.round.assembly);

    let mut orchestrator = RoundOrchestrator::new(role, config.round, store, buffers);
    let report = orchestrator.run();
    report.log();
    Ok(report.outcome())
}

pub fn verify(args: &VerifyArgs) -> anyhow::Result<Outcome> {
    let _span = tracing::info_span!("verify").entered();
    let options = VerifyOptions {
        iteration:    args.iteration,
        verbose:      args.verbose,
        detail_limit: args.limit,
    };
    let summary = verify_directory(&args.dir, &options)
        .with_context(|| format!("cannot verify '{}'", args.dir.display()))?;
    if summary.pairs == 0 {
        match args.iteration {
            Some(iteration) => tracing::error!(iteration, "no paired rounds for this iteration"),
            None => tracing::error!("no round has files from both roles"),
        }
    }
    summary.log();
    Ok(summary.outcome())
}
