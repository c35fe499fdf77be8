//! Smoke tests to verify command wiring

use assert_cmd::Command;
use predicates::prelude::*;

fn pitchhub() -> Command {
    let mut cmd = Command::cargo_bin("pitchhub").unwrap();
    // keep a developer's .env and shell settings out of the tests
    cmd.env_remove("DATABASE_URL")
        .env_remove("UPLOADS_ROOT")
        .env_remove("JWT_SECRET")
        .env_remove("DATABASE_MAX_CONNECTIONS");
    cmd
}

#[test]
fn test_help_lists_commands() {
    pitchhub()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("serve"))
        .stdout(predicate::str::contains("migrate"))
        .stdout(predicate::str::contains("init-storage"))
        .stdout(predicate::str::contains("sweep"))
        .stdout(predicate::str::contains("promote"));
}

#[test]
fn test_serve_help() {
    pitchhub()
        .arg("serve")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Address to bind to"))
        .stdout(predicate::str::contains("--database-url"));
}

#[test]
fn test_database_commands_take_pool_size() {
    for command in ["serve", "migrate", "sweep", "promote"] {
        pitchhub()
            .args([command, "--help"])
            .assert()
            .success()
            .stdout(predicate::str::contains("--max-connections"));
    }
}

#[test]
fn test_pool_size_must_be_a_number() {
    pitchhub()
        .args(["migrate", "--database-url", "postgres://localhost/unused"])
        .args(["--max-connections", "lots"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("lots"));
}

#[test]
fn test_promote_help() {
    pitchhub()
        .arg("promote")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Email of the account"));
}

#[test]
fn test_promote_rejects_unknown_role() {
    pitchhub()
        .args(["promote", "--email", "a@example.com", "--role", "pirate"])
        .args(["--database-url", "postgres://localhost/unused"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("pirate"));
}

#[test]
fn test_migrate_requires_database_url() {
    let dir = tempfile::tempdir().unwrap();
    pitchhub()
        .current_dir(dir.path())
        .arg("migrate")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--database-url"));
}

#[test]
fn test_init_storage_creates_layout() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("uploads");

    pitchhub()
        .arg("init-storage")
        .arg("--uploads")
        .arg(&root)
        .assert()
        .success()
        .stdout(predicate::str::contains("Upload storage ready"));

    assert!(root.join("ProjectFiles").is_dir());
    assert!(root.join("postMedia/images").is_dir());
    assert!(root.join("postMedia/videos").is_dir());

    // idempotent
    pitchhub()
        .arg("init-storage")
        .arg("--uploads")
        .arg(&root)
        .assert()
        .success();
}
