mod common;

use std::fs;

use assert_cmd::Command;
use featflow::DataMatrix;
use predicates::prelude::*;

const MEL_CHAIN: &str = r#"{
    "chain": [
        {"processor_name": "MonoAudioReadingProcessor"},
        {"processor_name": "MelExtractorProcessor", "init_parameters": {"n_mels": 32}}
    ]
}"#;

#[test]
fn runs_chain_and_writes_output() {
    let dir = tempfile::tempdir().unwrap();
    let chain = dir.path().join("chain.json");
    let wav = dir.path().join("clip.wav");
    let output = dir.path().join("mel.json");
    fs::write(&chain, MEL_CHAIN).unwrap();
    common::two_second_clip(&wav);

    Command::cargo_bin("featflow")
        .unwrap()
        .arg(&chain)
        .arg(&wav)
        .arg("--output")
        .arg(&output)
        .arg("--show-chain")
        .assert()
        .success()
        .stdout(predicate::str::contains("MelExtractorProcessor"))
        .stdout(predicate::str::contains("data_matrix [32, 101]"));

    let written = DataMatrix::load(&output).unwrap();
    assert_eq!(written.shape(), &[32, 101]);
}

#[test]
fn set_overrides_reach_the_reader() {
    let dir = tempfile::tempdir().unwrap();
    let chain = dir.path().join("chain.json");
    let wav = dir.path().join("clip.wav");
    fs::write(&chain, MEL_CHAIN).unwrap();
    common::two_second_clip(&wav);

    Command::cargo_bin("featflow")
        .unwrap()
        .arg(&chain)
        .arg(&wav)
        .args(["--set", "focus_stop_seconds=1.0"])
        .assert()
        .success()
        .stdout(predicate::str::contains("data_matrix [32, 51]"));
}

#[test]
fn unknown_processor_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let chain = dir.path().join("chain.json");
    let wav = dir.path().join("clip.wav");
    fs::write(&chain, r#"[{"processor_name": "NoSuchProcessor"}]"#).unwrap();
    common::two_second_clip(&wav);

    Command::cargo_bin("featflow")
        .unwrap()
        .arg(&chain)
        .arg(&wav)
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown processor [NoSuchProcessor]"));
}

#[test]
fn missing_input_fails_validation() {
    let dir = tempfile::tempdir().unwrap();
    let chain = dir.path().join("chain.json");
    fs::write(&chain, MEL_CHAIN).unwrap();

    Command::cargo_bin("featflow")
        .unwrap()
        .arg(&chain)
        .arg(dir.path().join("missing.wav"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Input file does not exist"));
}
