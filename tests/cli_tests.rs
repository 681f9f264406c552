//! CLI surface tests: argument validation and exit codes.

use assert_cmd::Command;
use predicates::prelude::*;

fn pmd_miner() -> Command {
    Command::cargo_bin("pmd-miner").expect("binary builds")
}

#[test]
fn missing_required_arguments_exit_2() {
    pmd_miner().assert().failure().code(2);

    pmd_miner()
        .arg("https://example.com/repo.git")
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("--ruleset"));
}

#[test]
fn nonexistent_ruleset_exits_2() {
    let out_dir = tempfile::tempdir().unwrap();
    pmd_miner()
        .args([
            "https://example.com/repo.git",
            "-r",
            "/definitely/not/a/ruleset.xml",
            "-o",
        ])
        .arg(out_dir.path())
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("ruleset"));
}

#[test]
fn verbose_conflicts_with_quiet() {
    pmd_miner()
        .args([
            "repo", "-r", "rules.xml", "-o", "out", "--verbose", "--quiet",
        ])
        .assert()
        .failure()
        .code(2);
}

#[test]
fn help_documents_the_full_surface() {
    pmd_miner()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--ruleset"))
        .stdout(predicate::str::contains("--output-dir"))
        .stdout(predicate::str::contains("--workers"))
        .stdout(predicate::str::contains("--aux-jars"))
        .stdout(predicate::str::contains("--analyzer-url"));
}
