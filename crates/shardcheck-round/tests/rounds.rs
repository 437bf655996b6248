use std::thread;
use std::time::{Duration, Instant};

use shardcheck_manifest::{Outcome, Role, VerifyOptions, read_manifest, verify_directory};
use shardcheck_round::{
    LocalDirStore, Pacing, RoundConfig, RoundFailure, RoundOrchestrator, TransferBoundary,
    TransferError, Workload,
};
use shardcheck_tensor::{DType, ShardKey, Tensor};

/// Boundary that fills every shard with `seq_id` and fails on command.
#[derive(Default)]
struct ScriptedBoundary {
    fail_seq:   Option<u64>,
    reject_seq: Option<u64>,
    delay:      Duration,
    leave_zero: bool,
    gets:       Vec<u64>,
    completes:  Vec<u64>,
}

impl TransferBoundary for ScriptedBoundary {
    fn multi_put(
        &mut self,
        seq_id: u64,
        _shards: &[(ShardKey, Tensor)],
        _deadline: Option<Instant>,
    ) -> Result<bool, TransferError> {
        Ok(self.reject_seq != Some(seq_id))
    }

    fn multi_get(
        &mut self,
        seq_id: u64,
        shards: &mut [(ShardKey, Tensor)],
        _deadline: Option<Instant>,
    ) -> Result<bool, TransferError> {
        self.gets.push(seq_id);
        thread::sleep(self.delay);
        if self.fail_seq == Some(seq_id) {
            return Err(TransferError::Other("connection reset".into()));
        }
        for (_, shard) in shards.iter_mut() {
            assert!(shard.is_all_zero(), "buffers must be zeroed before a transfer");
            if !self.leave_zero {
                *shard = Tensor::full(shard.shape().clone(), seq_id as f32);
            }
        }
        Ok(self.reject_seq != Some(seq_id))
    }

    fn complete(&mut self, seq_id: u64) -> Result<(), TransferError> {
        self.completes.push(seq_id);
        Ok(())
    }
}

fn config(rounds: u64, dir: &std::path::Path) -> RoundConfig {
    RoundConfig {
        rounds,
        seq_id_base: 100,
        output_dir: dir.to_path_buf(),
        pacing: Pacing::none(),
        ..Default::default()
    }
}

fn grid_buffers() -> Vec<(ShardKey, Tensor)> {
    Workload {
        num_tensors: 2,
        height: 4,
        width: 4,
        shard_rows: 2,
        shard_cols: 2,
        ..Default::default()
    }
    .consumer_buffers()
    .unwrap()
}

#[test]
fn failing_round_does_not_stop_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let boundary = ScriptedBoundary {
        fail_seq: Some(107),
        ..Default::default()
    };
    let mut orchestrator =
        RoundOrchestrator::new(Role::Consumer, config(20, dir.path()), boundary, grid_buffers());
    let report = orchestrator.run();

    assert_eq!(report.rounds.len(), 20);
    assert_eq!(report.succeeded(), 19);
    assert_eq!(report.failed(), 1);
    assert!(matches!(report.rounds[7].result, Err(RoundFailure::Transfer(_))));
    assert_eq!(report.outcome(), Outcome::Partial);
    assert!(report.complete_calls >= 21);

    let boundary = orchestrator.into_boundary();
    assert_eq!(boundary.gets, (100..120).collect::<Vec<_>>());
    assert_eq!(boundary.completes.len(), 21);
    assert_eq!(&boundary.completes[..20], (100..120).collect::<Vec<_>>().as_slice());
    assert_eq!(boundary.completes[20], 100);

    // the failed round is still recorded, with the zeroed buffers it kept
    assert_eq!(report.manifests().count(), 20);
    let lost = read_manifest(report.rounds[7].manifest.as_ref().unwrap()).unwrap();
    let zeros = shardcheck_tensor::ContentHasher::md5()
        .digest(&Tensor::zeros(DType::F32, [4, 4]))
        .unwrap();
    assert_eq!(lost.manifest.get("tensor_000").unwrap().digest, zeros.to_hex());
}

#[test]
fn rejected_round_still_writes_a_manifest() {
    for role in Role::ALL {
        let dir = tempfile::tempdir().unwrap();
        let boundary = ScriptedBoundary {
            reject_seq: Some(100),
            ..Default::default()
        };
        let buffers = match role {
            Role::Producer => vec![(
                ShardKey::whole("w", [2, 2]).unwrap(),
                Tensor::full([2, 2], 3.0f32),
            )],
            Role::Consumer => grid_buffers(),
        };
        let mut orchestrator = RoundOrchestrator::new(role, config(1, dir.path()), boundary, buffers);
        let report = orchestrator.run();

        assert_eq!(report.rounds[0].result, Err(RoundFailure::Rejected), "{role}");
        assert_eq!(report.outcome(), Outcome::Failure);
        let path = report.rounds[0].manifest.clone().unwrap();
        assert_eq!(path, dir.path().join(format!("{}_md5_iter0_seq100.txt", role.label())));
        assert!(!read_manifest(&path).unwrap().manifest.is_empty());
    }
}

#[test]
fn consumer_manifest_records_reassembled_tensors() {
    let dir = tempfile::tempdir().unwrap();
    let mut orchestrator = RoundOrchestrator::new(
        Role::Consumer,
        config(1, dir.path()),
        ScriptedBoundary::default(),
        grid_buffers(),
    );
    let report = orchestrator.run();
    let path = report.rounds[0].manifest.clone().unwrap();
    assert!(path.ends_with("infer_md5_iter0_seq100.txt"));

    let parsed = read_manifest(&path).unwrap();
    let expected = shardcheck_tensor::ContentHasher::md5()
        .digest(&Tensor::full([4, 4], 100.0f32))
        .unwrap();
    let entry = parsed.manifest.get("tensor_001").unwrap();
    assert_eq!(entry.shape, "4x4");
    assert_eq!(entry.dtype, "torch.float32");
    assert_eq!(entry.digest, expected.to_hex());
}

#[test]
fn all_zero_transfer_is_a_warning_not_a_failure() {
    let dir = tempfile::tempdir().unwrap();
    let boundary = ScriptedBoundary {
        leave_zero: true,
        ..Default::default()
    };
    let mut orchestrator =
        RoundOrchestrator::new(Role::Consumer, config(2, dir.path()), boundary, grid_buffers());
    let report = orchestrator.run();
    assert_eq!(report.succeeded(), 2);
    assert!(report.rounds.iter().all(|r| r.warnings.iter().any(|w| w.contains("zero"))));
}

#[test]
fn rejected_and_slow_transfers_fail_their_round() {
    let dir = tempfile::tempdir().unwrap();
    let boundary = ScriptedBoundary {
        reject_seq: Some(101),
        delay: Duration::from_millis(20),
        ..Default::default()
    };
    let mut cfg = config(3, dir.path());
    cfg.transfer_timeout_secs = Some(0.005);
    let mut orchestrator = RoundOrchestrator::new(Role::Consumer, cfg, boundary, grid_buffers());
    let report = orchestrator.run();

    assert_eq!(report.succeeded(), 0);
    assert_eq!(report.outcome(), Outcome::Failure);
    assert!(matches!(report.rounds[0].result, Err(RoundFailure::TimedOut { .. })));
    assert_eq!(report.rounds[1].result, Err(RoundFailure::Rejected));
    assert_eq!(orchestrator.boundary().completes.len(), 4);
}

#[test]
fn verification_can_be_disabled() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = config(2, dir.path());
    cfg.verify = false;
    let mut orchestrator =
        RoundOrchestrator::new(Role::Consumer, cfg, ScriptedBoundary::default(), grid_buffers());
    let report = orchestrator.run();
    assert_eq!(report.outcome(), Outcome::Success);
    assert_eq!(report.manifests().count(), 0);
}

#[test]
fn producer_and_consumer_agree_through_a_directory() {
    let store = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let workload = Workload {
        num_tensors: 3,
        height: 9,
        width: 6,
        dtype: DType::I16,
        shard_rows: 2,
        shard_cols: 4,
        seed: 42,
    };

    let mut producer = RoundOrchestrator::new(
        Role::Producer,
        config(3, out.path()),
        LocalDirStore::new(store.path(), Role::Producer),
        workload.producer_buffers().unwrap(),
    );
    let produced = producer.run();
    assert_eq!(produced.outcome(), Outcome::Success);

    let mut cfg = config(3, out.path());
    cfg.transfer_timeout_secs = Some(5.0);
    let mut consumer = RoundOrchestrator::new(
        Role::Consumer,
        cfg,
        LocalDirStore::new(store.path(), Role::Consumer).poll_interval(Duration::from_millis(5)),
        workload.consumer_buffers().unwrap(),
    );
    let consumed = consumer.run();
    assert_eq!(consumed.outcome(), Outcome::Success);
    assert_eq!(consumed.shard_count, 3 * 8);
    assert_eq!(consumed.logical_tensors, 3);

    let summary = verify_directory(out.path(), &VerifyOptions::new()).unwrap();
    assert_eq!(summary.rounds.len(), 3);
    assert_eq!(summary.total_matched(), 9);
    assert_eq!(summary.outcome(), Outcome::Success);
}
