use assert_cmd::cargo_bin;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;

const CATALOG: &str = "tests/fixtures/catalog.csv";
const OPS: &str = "tests/fixtures/ops.csv";

fn billing() -> Command {
    Command::new(cargo_bin!("course-billing"))
}

#[test]
fn test_cli_replay_prints_balances() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = billing();
    cmd.args(["replay", "--catalog", CATALOG, "--ops", OPS]);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("email,balance"))
        .stdout(predicate::str::contains("user@example.com,1060.45"))
        .stdout(predicate::str::contains("other@example.com,0"))
        .stdout(predicate::str::contains("ghost@example.com").not());

    Ok(())
}

#[test]
fn test_cli_transactions_filtered_by_type() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = billing();
    cmd.args([
        "transactions",
        "--catalog",
        CATALOG,
        "--ops",
        OPS,
        "--email",
        "user@example.com",
        "--type",
        "deposit",
    ]);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains(
            "id,created_at,expires_at,type,course_code,amount",
        ))
        .stdout(predicate::str::contains(",deposit,,1000"))
        .stdout(predicate::str::contains(",deposit,,90.45"))
        .stdout(predicate::str::contains("payment").not());

    Ok(())
}

#[test]
fn test_cli_transactions_for_one_course() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = billing();
    cmd.args([
        "transactions",
        "--catalog",
        CATALOG,
        "--ops",
        OPS,
        "--email",
        "user@example.com",
        "--course-code",
        "figmadesign",
        "--skip-expired",
    ]);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains(",payment,figmadesign,10"))
        .stdout(predicate::str::contains("molecularphysics").not());

    Ok(())
}

#[test]
fn test_cli_unknown_account_fails() {
    let mut cmd = billing();
    cmd.args(["transactions", "--email", "nobody@example.com"]);
    cmd.assert().failure();
}

#[test]
fn test_cli_report() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = billing();
    cmd.args(["report", "--catalog", CATALOG, "--ops", OPS]);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains(
            "email,course_code,course_name,course_type,transactions_count,total_amount",
        ))
        .stdout(predicate::str::contains(
            "user@example.com,figmadesign,Figma Design,rent,1,10",
        ))
        .stdout(predicate::str::contains(
            "user@example.com,molecularphysics,Molecular Physics,buy,1,20",
        ));

    Ok(())
}

#[test]
fn test_cli_notify_with_wide_window() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = billing();
    cmd.args([
        "--expiry-window-hours",
        "200",
        "notify",
        "--catalog",
        CATALOG,
        "--ops",
        OPS,
    ]);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("email,status"))
        .stdout(predicate::str::contains("user@example.com,sent"))
        .stdout(predicate::str::contains("other@example.com").not());

    Ok(())
}

#[test]
fn test_cli_rejects_invalid_config() {
    let mut cmd = billing();
    cmd.args(["--rental-period-days", "0", "replay"]);
    cmd.assert().failure();
}

#[cfg(not(feature = "storage-rocksdb"))]
#[test]
fn test_cli_db_path_falls_back_to_memory() {
    let dir = tempfile::tempdir().unwrap();
    let mut cmd = billing();
    cmd.arg("--db-path")
        .arg(dir.path().join("db"))
        .args(["replay", "--catalog", CATALOG, "--ops", OPS]);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("user@example.com,1060.45"))
        .stderr(predicate::str::contains("Falling back to In-Memory storage"));
}
