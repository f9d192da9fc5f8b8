use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use facto_core::pdf::fixtures::{blank_pdf, FixtureInvoice};
use facto_core::FactoConfig;
use predicates::prelude::*;
use tempfile::TempDir;

/// `facto` with a private config path and no inherited connection settings.
fn facto(config: &Path) -> Command {
    let mut cmd = Command::cargo_bin("facto").unwrap();
    cmd.arg("--config")
        .arg(config)
        .env_remove("ODOO_URL")
        .env_remove("ODOO_DB")
        .env_remove("ODOO_API_KEY")
        .env_remove("RUST_LOG");
    cmd
}

/// Config with every folder under `root` and a fast readiness check.
fn write_config(root: &Path) -> PathBuf {
    let mut config = FactoConfig::default();
    config.watch.input_dir = root.join("inbox");
    config.watch.sent_dir = root.join("sent");
    config.watch.posted_dir = root.join("posted");
    config.watch.error_dir = root.join("error");
    config.watch.readiness_timeout_secs = 2;
    config.watch.readiness_retry_ms = 10;

    let path = root.join("config.json");
    config.save(&path).unwrap();
    fs::create_dir_all(&config.watch.input_dir).unwrap();
    path
}

fn sample_pdf(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, FixtureInvoice::sample().to_pdf().unwrap()).unwrap();
    path
}

#[test]
fn test_help_lists_commands() {
    let dir = TempDir::new().unwrap();
    facto(&dir.path().join("c.json"))
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("watch"))
        .stdout(predicate::str::contains("process"))
        .stdout(predicate::str::contains("extract"))
        .stdout(predicate::str::contains("check"));
}

#[test]
fn test_extract_json() {
    let dir = TempDir::new().unwrap();
    let pdf = sample_pdf(dir.path(), "scan.pdf");

    let output = facto(&dir.path().join("c.json"))
        .arg("extract")
        .arg(&pdf)
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["invoice_number"], "7216");
    assert_eq!(json["invoice_date"], "2025-12-19");
    assert_eq!(json["buyer"]["vat_number"], "BE0123456789");
    assert_eq!(json["buyer"]["name"], "Acme Food BV");
}

#[test]
fn test_extract_csv_with_glob() {
    let dir = TempDir::new().unwrap();
    sample_pdf(dir.path(), "a.pdf");
    sample_pdf(dir.path(), "b.pdf");
    fs::write(dir.path().join("notes.txt"), "x").unwrap();

    let pattern = format!("{}/*.pdf", dir.path().display());
    facto(&dir.path().join("c.json"))
        .args(["extract", "--format", "csv", &pattern])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("file,invoice_number"))
        .stdout(predicate::str::contains("AcmeFoodBV_20251219_7216.pdf").count(2));
}

#[test]
fn test_extract_text_shows_archive_name() {
    let dir = TempDir::new().unwrap();
    let pdf = sample_pdf(dir.path(), "scan.pdf");

    facto(&dir.path().join("c.json"))
        .args(["extract", "--format", "text", "--warnings"])
        .arg(&pdf)
        .assert()
        .success()
        .stdout(predicate::str::contains("Invoice: 7216"))
        .stdout(predicate::str::contains("Archive name: AcmeFoodBV_20251219_7216.pdf"))
        .stdout(predicate::str::contains("checksum"));
}

#[test]
fn test_extract_missing_file_fails() {
    let dir = TempDir::new().unwrap();
    facto(&dir.path().join("c.json"))
        .args(["extract", "nope.pdf"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn test_extract_blank_pdf_fails() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("blank.pdf");
    fs::write(&path, blank_pdf().unwrap()).unwrap();

    facto(&dir.path().join("c.json"))
        .arg("extract")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("no extractable text"));
}

#[test]
fn test_process_dry_run_routes_to_sent() {
    let root = TempDir::new().unwrap();
    let config = write_config(root.path());
    let pdf = sample_pdf(&root.path().join("inbox"), "scan001.pdf");

    facto(&config)
        .args(["--dry-run", "process"])
        .arg(&pdf)
        .assert()
        .success()
        .stdout(predicate::str::contains("created and posted"));

    assert!(!pdf.exists());
    assert!(root.path().join("sent").join("AcmeFoodBV_20251219_7216.pdf").exists());
}

#[test]
fn test_process_failure_routes_to_error() {
    let root = TempDir::new().unwrap();
    let config = write_config(root.path());
    let pdf = root.path().join("inbox").join("junk.pdf");
    fs::write(&pdf, b"garbage").unwrap();

    facto(&config)
        .args(["--dry-run", "process", "--format", "json"])
        .arg(&pdf)
        .assert()
        .failure()
        .stdout(predicate::str::contains("\"outcome\": \"failed\""))
        .stdout(predicate::str::contains("\"stage\": \"read\""));

    assert!(root.path().join("error").join("junk.pdf").exists());
}

#[test]
fn test_live_mode_requires_connection_settings() {
    let root = TempDir::new().unwrap();
    let config = write_config(root.path());

    facto(&config)
        .arg("check")
        .assert()
        .failure()
        .stderr(predicate::str::contains("ODOO_URL"));
}

#[test]
fn test_check_dry_run() {
    let dir = TempDir::new().unwrap();
    facto(&dir.path().join("c.json"))
        .args(["--dry-run", "check"])
        .assert()
        .success()
        .stdout(predicate::str::contains("journal VF"))
        .stdout(predicate::str::contains("Reference data complete"));
}

#[test]
fn test_config_init_get_set() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("nested").join("config.json");

    facto(&config).args(["config", "init"]).assert().success();
    assert!(config.exists());
    facto(&config).args(["config", "init"]).assert().failure();

    facto(&config)
        .args(["config", "get", "watch.poll_interval_ms"])
        .assert()
        .success()
        .stdout(predicate::str::contains("500"));

    facto(&config)
        .args(["config", "set", "watch.max_workers", "3"])
        .assert()
        .success();
    facto(&config)
        .args(["config", "get", "watch.max_workers"])
        .assert()
        .success()
        .stdout(predicate::str::contains("3"));

    // Ill-typed values are rejected and the file is left alone
    facto(&config)
        .args(["config", "set", "watch.max_workers", "many"])
        .assert()
        .failure();
    facto(&config)
        .args(["config", "get", "posting.journal_code"])
        .assert()
        .success()
        .stdout(predicate::str::contains("VF"));
}

#[test]
fn test_config_show_redacts_api_key() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("config.json");

    facto(&config)
        .args(["config", "set", "ledger.api_key", "secret-key"])
        .assert()
        .success()
        .stdout(predicate::str::contains("secret-key").not());

    facto(&config)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("secret-key").not())
        .stdout(predicate::str::contains("********"));
}
