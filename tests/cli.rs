#![cfg(feature = "cli")]

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;

const RING: &str = "1 2\n2 3\n3 4\n4 5\n5 1\n";

#[test]
fn test_cli_node2vec_embeddings() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let input = dir.path().join("ring.edgelist");
    let output = dir.path().join("ring.emb");
    fs::write(&input, RING)?;

    let mut cmd = Command::cargo_bin("stickyvec")?;
    cmd.arg("node2vec")
        .arg("-i")
        .arg(&input)
        .arg("-o")
        .arg(&output)
        .args(["-d", "4", "-l", "6", "-r", "3", "-k", "2", "-e", "1"])
        .args(["--seed", "42", "--threads", "1"]);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Results written to"));

    let text = fs::read_to_string(&output)?;
    assert!(text.starts_with("5 4\n"));
    assert_eq!(text.lines().count(), 6);
    Ok(())
}

#[test]
fn test_cli_walks_then_word2vec() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let input = dir.path().join("ring.edgelist");
    let walks = dir.path().join("ring.walks");
    let output = dir.path().join("ring.emb");
    fs::write(&input, RING)?;

    let mut cmd = Command::cargo_bin("stickyvec")?;
    cmd.arg("node2vec")
        .arg("-i")
        .arg(&input)
        .arg("-o")
        .arg(&walks)
        .args(["-l", "6", "-r", "3", "-p", "0.5", "-q", "2"])
        .args(["--output-walks", "--walks-header"]);
    cmd.assert().success();

    let corpus = fs::read_to_string(&walks)?;
    // header + 5 nodes * 3 walks
    assert_eq!(corpus.lines().count(), 16);
    assert_eq!(corpus.lines().next(), Some("15 6"));

    let mut cmd = Command::cargo_bin("stickyvec")?;
    cmd.arg("word2vec")
        .arg("-i")
        .arg(&walks)
        .arg("-o")
        .arg(&output)
        .args(["-d", "8", "-k", "3", "-v"]);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Results written to"));
    assert!(fs::read_to_string(&output)?.starts_with("5 8\n"));
    Ok(())
}

#[test]
fn test_cli_sticky_node_is_unchanged() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let input = dir.path().join("ring.edgelist");
    let init = dir.path().join("init.emb");
    let output = dir.path().join("ring.emb");
    fs::write(&input, RING)?;
    fs::write(&init, "3 0.5 -0.25 1 2 0\n")?;

    let mut cmd = Command::cargo_bin("stickyvec")?;
    cmd.arg("node2vec")
        .arg("-i")
        .arg(&input)
        .arg("-o")
        .arg(&output)
        .arg("--init-embeddings")
        .arg(&init)
        .args(["-d", "4", "-l", "10", "-r", "5", "-e", "2", "--sticky"]);
    cmd.assert().success();

    let text = fs::read_to_string(&output)?;
    let line = text
        .lines()
        .find(|l| l.starts_with("3 "))
        .ok_or("node 3 missing")?;
    assert_eq!(line, "3 0.5 -0.25 1 2");
    Ok(())
}

#[test]
fn test_cli_rejects_bad_input() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let input = dir.path().join("bad.edgelist");
    let output = dir.path().join("out.emb");
    fs::write(&input, "1 2\n0 3\n")?;

    let mut cmd = Command::cargo_bin("stickyvec")?;
    cmd.arg("node2vec").arg("-i").arg(&input).arg("-o").arg(&output);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("reserved"));
    assert!(!output.exists());
    Ok(())
}

#[test]
fn test_cli_rejects_nonpositive_q() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let input = dir.path().join("ring.edgelist");
    fs::write(&input, RING)?;

    let mut cmd = Command::cargo_bin("stickyvec")?;
    cmd.arg("node2vec")
        .arg("-i")
        .arg(&input)
        .arg("-o")
        .arg(dir.path().join("out.emb"))
        .args(["-q", "0"]);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("q must be > 0"));
    Ok(())
}
