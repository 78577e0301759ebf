use std::error::Error;
use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::tempdir;

fn textpad(config: &Path) -> Result<Command, Box<dyn Error>> {
    let mut cmd = Command::cargo_bin("textpad")?;
    cmd.env("TEXTPAD_CONFIG_DIR", config)
        .env_remove("RUST_LOG")
        .env_remove("TEXTPAD_DEBUG");
    Ok(cmd)
}

#[test]
fn status_without_snapshot() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    textpad(dir.path())?
        .args(["recovery", "status"])
        .assert()
        .success()
        .stdout("No recovery snapshot.\n");
    Ok(())
}

#[test]
fn autosave_then_restore_to_original_file() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let config = dir.path().join("config");
    let target = dir.path().join("draft.txt");

    textpad(&config)?
        .args(["autosave", target.to_str().unwrap(), "--encoding", "utf-8-sig"])
        .write_stdin("unsaved work\n")
        .assert()
        .success();
    assert!(config.join("recovery.txt").exists());
    assert!(config.join("recovery.json").exists());

    textpad(&config)?
        .args(["recovery", "status"])
        .assert()
        .success()
        .stdout(predicate::str::contains(target.to_str().unwrap()))
        .stdout(predicate::str::contains("utf-8-sig"));

    textpad(&config)?
        .args(["recovery", "show"])
        .assert()
        .success()
        .stdout("unsaved work\n");

    textpad(&config)?
        .args(["recovery", "restore"])
        .assert()
        .success();

    assert_eq!(fs::read(&target)?, b"\xEF\xBB\xBFunsaved work\n".to_vec());
    assert!(!config.join("recovery.txt").exists());
    assert!(!config.join("recovery.json").exists());
    Ok(())
}

#[test]
fn untitled_snapshot_needs_output_path() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let config = dir.path().join("config");
    fs::create_dir_all(&config)?;
    fs::write(config.join("recovery.txt"), "orphan")?;

    textpad(&config)?
        .args(["recovery", "restore"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--output"));

    let output = dir.path().join("rescued.txt");
    textpad(&config)?
        .args(["recovery", "restore", "--output", output.to_str().unwrap()])
        .assert()
        .success();
    assert_eq!(fs::read_to_string(&output)?, "orphan");
    Ok(())
}

#[test]
fn empty_snapshot_is_treated_as_absent() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    fs::write(dir.path().join("recovery.txt"), "")?;

    textpad(dir.path())?
        .args(["recovery", "status"])
        .assert()
        .success()
        .stdout("No recovery snapshot.\n");
    assert!(!dir.path().join("recovery.txt").exists());
    Ok(())
}

#[test]
fn malformed_metadata_is_reported() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    fs::write(dir.path().join("recovery.txt"), "text")?;
    fs::write(dir.path().join("recovery.json"), "{ broken")?;

    textpad(dir.path())?
        .args(["recovery", "show"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("recovery metadata"));
    Ok(())
}

#[test]
fn discard_removes_snapshot() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let target = dir.path().join("draft.txt");

    textpad(dir.path())?
        .args(["autosave", target.to_str().unwrap()])
        .write_stdin("draft")
        .assert()
        .success();
    textpad(dir.path())?
        .args(["recovery", "discard"])
        .assert()
        .success();

    assert!(!dir.path().join("recovery.txt").exists());
    assert!(!target.exists());
    Ok(())
}
