use std::path::Path;
use std::process::Command;

fn shardcheck(args: &[&str]) -> i32 {
    let status = Command::new(env!("CARGO_BIN_EXE_shardcheck"))
        .args(args)
        .env("RUST_LOG", "warn")
        .status()
        .unwrap();
    status.code().unwrap()
}

fn run_args<'a>(store: &'a str, out: &'a str) -> Vec<&'a str> {
    vec![
        "--rounds", "2", "--seq-id", "10", "--num-tensors", "2", "--height", "6", "--width",
        "5", "--sleep", "0", "--random-sleep-max", "0", "--timeout", "10", "--store-dir", store,
        "--output-dir", out,
    ]
}

fn path(p: &Path) -> &str { p.to_str().unwrap() }

#[test]
fn produce_consume_verify() {
    let dir = tempfile::tempdir().unwrap();
    let store = dir.path().join("store");
    let out = dir.path().join("out");

    let mut produce = vec!["produce"];
    produce.extend(run_args(path(&store), path(&out)));
    assert_eq!(shardcheck(&produce), 0);

    let mut consume = vec!["consume", "--shard-rows", "2", "--shard-cols", "3"];
    consume.extend(run_args(path(&store), path(&out)));
    assert_eq!(shardcheck(&consume), 0);

    assert!(out.join("train_md5_iter1_seq11.txt").is_file());
    assert!(out.join("infer_md5_iter1_seq11.txt").is_file());
    assert_eq!(shardcheck(&["verify", "--dir", path(&out), "--verbose"]), 0);
}

#[test]
fn tampered_manifest_is_partial() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path();
    std::fs::write(
        out.join("train_md5_iter0_seq1.txt"),
        "# Trainer MD5 values - Iteration 0, Seq ID 1\n\
         # Format: tensor_key,md5_hash,shape,dtype\n\
         a,11,2x2,torch.float32\nb,22,2x2,torch.float32\n",
    )
    .unwrap();
    std::fs::write(
        out.join("infer_md5_iter0_seq1.txt"),
        "# Infer MD5 values - Iteration 0, Seq ID 1\n\
         # Format: tensor_key,md5_hash,shape,dtype\n\
         a,11,2x2,torch.float32\nb,23,2x2,torch.float32\n",
    )
    .unwrap();
    assert_eq!(shardcheck(&["verify", "--dir", path(out)]), 1);
}

#[test]
fn missing_manifests_fail_setup() {
    let dir = tempfile::tempdir().unwrap();
    assert_eq!(shardcheck(&["verify", "--dir", path(dir.path())]), 2);
}

#[test]
fn consumer_without_producer_times_out() {
    let dir = tempfile::tempdir().unwrap();
    let store = dir.path().join("store");
    let out = dir.path().join("out");
    let code = shardcheck(&[
        "consume", "--rounds", "1", "--num-tensors", "1", "--height", "2", "--width", "2",
        "--sleep", "0", "--random-sleep-max", "0", "--timeout", "0.2", "--store-dir",
        path(&store), "--output-dir", path(&out),
    ]);
    assert_eq!(code, 2);
}

#[test]
fn negative_pause_fails_setup() {
    let dir = tempfile::tempdir().unwrap();
    let store = dir.path().join("store");
    let out = dir.path().join("out");
    let code = shardcheck(&[
        "produce", "--rounds", "1", "--num-tensors", "1", "--height", "2", "--width", "2",
        "--sleep=-1", "--random-sleep-max", "0", "--store-dir", path(&store), "--output-dir",
        path(&out),
    ]);
    assert_eq!(code, 2);
    assert!(!out.exists());
}
