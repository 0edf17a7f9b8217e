mod util;

use assert_fs::prelude::*;
use clap::Parser;
use predicates::prelude::*;
use todo2issue::cli::{Cli, Commands};
use util::todo2issue;

#[test]
fn remote_flag_parsing() {
    // Given
    let argv = vec!["todo2issue", "sync", "--remote", "--set", "base_sha=aaa", "-vv"];

    // When
    let cmd = Cli::parse_from(argv);

    // Then
    assert_eq!(cmd.verbose, 2);
    assert_eq!(cmd.overrides, vec![("base_sha".to_string(), "aaa".to_string())]);
    match cmd.command {
        Commands::Sync(args) => assert!(args.source.remote),
        _ => panic!("expected Sync command"),
    }
}

#[test]
fn init_writes_default_config() {
    let tmp = assert_fs::TempDir::new().unwrap();

    todo2issue(tmp.path())
        .args(["init", "."])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created config file"));

    let config = tmp.child("todo2issue.toml");
    config.assert(predicate::str::contains("markers").and(predicate::str::contains("\"TODO\"")));
    config.assert(predicate::str::contains("delay_ms = 1000"));
    // The token is never written out
    config.assert(predicate::str::contains("token").not());

    // A second run refuses to overwrite
    todo2issue(tmp.path())
        .args(["init", "."])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--force"));
}

#[test]
fn init_output_is_loadable() {
    let tmp = assert_fs::TempDir::new().unwrap();

    todo2issue(tmp.path())
        .args(["init", "."])
        .assert()
        .success();

    // The generated file feeds straight back into a scan
    todo2issue(tmp.path())
        .args(["scan", "--quiet", "--no-color"])
        .write_stdin(util::APP_DIFF)
        .assert()
        .success()
        .stdout(predicate::str::contains("+\tnew thing @ src/app.rs:2"));
}

#[test]
fn completions_to_stdout() {
    let tmp = assert_fs::TempDir::new().unwrap();

    todo2issue(tmp.path())
        .args(["completions", "bash", "--stdout"])
        .assert()
        .success()
        .stdout(predicate::str::contains("todo2issue"));
}

#[test]
fn completions_require_destination() {
    let tmp = assert_fs::TempDir::new().unwrap();

    todo2issue(tmp.path())
        .args(["completions", "zsh"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--out-dir"));
}
