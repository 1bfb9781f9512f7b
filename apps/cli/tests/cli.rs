use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

/// Runs `depot` inside `workdir` with a clean `DEPOT__*` environment.
fn depot(workdir: &TempDir) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_depot"));
    cmd.current_dir(workdir.path())
        .env_remove("DEPOT__STORAGE__ROOT")
        .env_remove("DEPOT__STORAGE__BASE_URL")
        .env_remove("RUST_LOG");
    cmd
}

fn stdout_line(output: &std::process::Output) -> String {
    String::from_utf8(output.stdout.clone()).unwrap().trim_end().to_owned()
}

#[test]
fn sanitize_needs_no_storage() {
    let work = TempDir::new().unwrap();
    depot(&work)
        .args(["sanitize", "  my résumé (final).pdf "])
        .assert()
        .success()
        .stdout("my_resume_final.pdf\n");

    depot(&work).args(["sanitize", "../"]).assert().failure();
}

#[test]
fn storage_commands_require_a_root() {
    let work = TempDir::new().unwrap();
    depot(&work)
        .args(["exists", "a.txt"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No storage root configured"));
}

#[test]
fn save_exists_collide_delete() {
    let work = TempDir::new().unwrap();
    let root = work.path().join("uploads");
    let root = root.to_str().unwrap();
    fs::write(work.path().join("Quarterly report.txt"), b"q3").unwrap();

    let first = depot(&work)
        .args(["--root", root, "save", "Quarterly report.txt"])
        .assert()
        .success()
        .get_output()
        .clone();
    let first = stdout_line(&first);
    assert_eq!(first, "Quarterly_report.txt");
    assert_eq!(fs::read(work.path().join("uploads").join(&first)).unwrap(), b"q3");

    let second = depot(&work)
        .args(["--root", root, "save", "Quarterly report.txt"])
        .assert()
        .success()
        .get_output()
        .clone();
    let second = stdout_line(&second);
    assert_ne!(first, second);
    assert!(second.starts_with("Quarterly_report_") && second.ends_with(".txt"));

    depot(&work).args(["--root", root, "exists", &first]).assert().success().stdout("true\n");
    depot(&work).args(["--root", root, "delete", &first]).assert().success().stdout("");
    depot(&work).args(["--root", root, "exists", &first]).assert().success().stdout("false\n");
    depot(&work).args(["--root", root, "delete", &first]).assert().success();
}

#[test]
fn save_from_stdin_with_length_budget() {
    let work = TempDir::new().unwrap();
    let root = work.path().join("uploads");
    let root = root.to_str().unwrap();

    depot(&work)
        .args(["--root", root, "save", "-"])
        .write_stdin("data")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--name"));

    let output = depot(&work)
        .args(["--root", root, "save", "-", "--name", "a_rather_long_stdin_name.log", "-m", "16"])
        .write_stdin("data")
        .assert()
        .success()
        .get_output()
        .clone();
    let stored = stdout_line(&output);
    assert!(stored.chars().count() <= 16, "{stored}");
    assert!(stored.ends_with(".log"));
    assert_eq!(fs::read_to_string(work.path().join("uploads").join(&stored)).unwrap(), "data");
}

#[test]
fn traversal_is_rejected() {
    let work = TempDir::new().unwrap();
    let root = work.path().join("uploads");
    let root = root.to_str().unwrap();
    fs::write(work.path().join("payload.txt"), b"x").unwrap();

    depot(&work)
        .args(["--root", root, "save", "payload.txt", "--name", "../escape.txt", "--raw"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Path traversal"));
    assert!(!work.path().join("escape.txt").exists());

    depot(&work)
        .args(["--root", root, "exists", "../payload.txt"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Path traversal"));
}

#[test]
fn piped_logs_are_plain_text() {
    let work = TempDir::new().unwrap();
    let root = work.path().join("uploads");

    depot(&work)
        .args(["--root", root.to_str().unwrap(), "delete", "../outside.txt"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Blocked path traversal attempt"))
        .stderr(predicate::str::contains("\u{1b}[").not());
}

#[test]
fn url_uses_base_from_flag_or_config() {
    let work = TempDir::new().unwrap();
    let root = work.path().join("uploads");

    depot(&work)
        .args(["--root", root.to_str().unwrap(), "url", "a/b.txt"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("base URL"));

    depot(&work)
        .args(["--root", root.to_str().unwrap(), "--base-url", "http://h/static/", "url", "a/b.txt"])
        .assert()
        .success()
        .stdout("http://h/static/a/b.txt\n");

    fs::write(
        work.path().join("depot.toml"),
        format!(
            "[storage]\nroot = {:?}\nbase_url = \"https://cdn.test/u/\"\n",
            root.to_str().unwrap()
        ),
    )
    .unwrap();

    depot(&work).args(["url", "x.png"]).assert().success().stdout("https://cdn.test/u/x.png\n");
    depot(&work)
        .args(["url", "a/../b.txt"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Path traversal"));
}

#[test]
fn environment_configures_storage() {
    let work = TempDir::new().unwrap();
    let root = work.path().join("env-root");

    depot(&work)
        .env("DEPOT__STORAGE__ROOT", root.to_str().unwrap())
        .args(["available", "photo.jpg"])
        .assert()
        .success()
        .stdout("photo.jpg\n");
    assert!(root.is_dir());
}

#[test]
fn explicit_config_file_must_exist() {
    let work = TempDir::new().unwrap();
    depot(&work)
        .args(["--config", "missing.toml", "sanitize", "a.txt"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Configuration is malformed"));
}
