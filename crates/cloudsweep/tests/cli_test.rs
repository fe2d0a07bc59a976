#![allow(deprecated)] // TODO: cargo_bin → cargo_bin_cmd! へ移行

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;

/// 環境変数と設定ファイルの影響を受けない sweep コマンド
fn sweep(dir: &tempfile::TempDir) -> Command {
    let mut cmd = Command::cargo_bin("sweep").unwrap();
    cmd.current_dir(dir.path())
        .env_remove("CLOUDSWEEP_PROVIDER")
        .env_remove("CLOUDSWEEP_SCOPE")
        .env_remove("CLOUDSWEEP_PREFIX")
        .env_remove("CLOUDSWEEP_CONFIG")
        .env("HOME", dir.path())
        .env("XDG_CONFIG_HOME", dir.path().join(".config"));
    cmd
}

/// CLIヘルプが正しく表示されることを確認
#[test]
fn test_cli_help() {
    let mut cmd = Command::cargo_bin("sweep").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("依存関係の順に片付ける"))
        .stdout(predicate::str::contains("discover"))
        .stdout(predicate::str::contains("delete"))
        .stdout(predicate::str::contains("validate"))
        .stdout(predicate::str::contains("kinds"));
}

/// バージョン表示が正しく動作することを確認
#[test]
fn test_cli_version() {
    let mut cmd = Command::cargo_bin("sweep").unwrap();
    cmd.arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains("cloudsweep"));
}

/// deleteコマンドのヘルプに安全装置のオプションが出ることを確認
#[test]
fn test_delete_help() {
    let mut cmd = Command::cargo_bin("sweep").unwrap();
    cmd.arg("delete")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--dry-run"))
        .stdout(predicate::str::contains("--yes"))
        .stdout(predicate::str::contains("--concurrency"))
        .stdout(predicate::str::contains("--prefix"))
        .stdout(predicate::str::contains("KEY=VALUE"));
}

/// 削除順位の表が出ることを確認
#[test]
fn test_kinds() {
    let mut cmd = Command::cargo_bin("sweep").unwrap();
    cmd.arg("kinds")
        .assert()
        .success()
        .stdout(predicate::str::contains("iam-role-binding"))
        .stdout(predicate::str::contains("compute-network"))
        .stdout(predicate::str::contains("resource-group"));
}

#[test]
fn test_kinds_filtered_by_provider() {
    let mut cmd = Command::cargo_bin("sweep").unwrap();
    cmd.args(["kinds", "--provider", "azure"])
        .assert()
        .success()
        .stdout(predicate::str::contains("resource-group"))
        .stdout(predicate::str::contains("iam-role-binding"))
        .stdout(predicate::str::contains("storage-bucket").not());
}

#[test]
fn test_kinds_json() {
    let output = Command::cargo_bin("sweep")
        .unwrap()
        .args(["kinds", "--json", "-p", "gcp"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let rows: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let rows = rows.as_array().unwrap();
    assert_eq!(rows[0]["kind"], "iam-role-binding");
    assert_eq!(rows[0]["rank"], 8);
    assert!(rows.iter().all(|r| r["provider"] != "azure"));
}

#[test]
fn test_unknown_provider() {
    let mut cmd = Command::cargo_bin("sweep").unwrap();
    cmd.args(["kinds", "-p", "aws"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown provider"));
}

/// 無効なコマンドでエラーになることを確認
#[test]
fn test_invalid_command() {
    let mut cmd = Command::cargo_bin("sweep").unwrap();
    cmd.arg("invalid-command").assert().failure();
}

#[test]
fn test_provider_required() {
    let dir = tempfile::tempdir().unwrap();
    sweep(&dir)
        .args(["discover", "--prefix", "dspm"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--provider"));
}

#[test]
fn test_scope_required() {
    let dir = tempfile::tempdir().unwrap();
    sweep(&dir)
        .args(["discover", "-p", "azure", "--prefix", "dspm"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--scope <subscription>"));
}

/// プレフィックスもラベルもない場合はテナント全体を対象にしない
#[test]
fn test_empty_filter_rejected() {
    let dir = tempfile::tempdir().unwrap();
    sweep(&dir)
        .args(["delete", "-p", "gcp", "--scope", "my-project", "--yes"])
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "a name prefix or a label selector is required",
        ));
}

#[test]
fn test_bad_label_selector() {
    let dir = tempfile::tempdir().unwrap();
    sweep(&dir)
        .args(["validate", "-p", "gcp", "--scope", "p", "-l", "env"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("KEY=VALUE"));
}

#[test]
fn test_zero_concurrency_rejected() {
    let dir = tempfile::tempdir().unwrap();
    sweep(&dir)
        .args(["delete", "-p", "gcp", "--scope", "p", "--prefix", "dspm", "-c", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--concurrency"));
}

/// 設定ファイルの不正な値で失敗することを確認
#[test]
fn test_invalid_config_file() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("sweep.yaml"), "concurrency: 0\n").unwrap();

    sweep(&dir)
        .args(["discover", "-p", "gcp", "--scope", "p", "--prefix", "dspm"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("concurrency"));
}

/// 環境変数で指定した設定ファイルが存在しない場合
#[test]
fn test_missing_config_from_env() {
    let dir = tempfile::tempdir().unwrap();
    sweep(&dir)
        .env("CLOUDSWEEP_CONFIG", dir.path().join("nope.yaml"))
        .args(["discover", "-p", "gcp", "--scope", "p", "--prefix", "dspm"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("CLOUDSWEEP_CONFIG"));
}

/// 設定ファイルの値が使われることを確認 (プロバイダーとスコープ)
#[test]
fn test_config_file_supplies_target() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("sweep.yaml"),
        "provider: azure\nscope: sub-1\n",
    )
    .unwrap();

    // プレフィックスがないので、クラウドに触れる前に失敗する
    sweep(&dir)
        .arg("discover")
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "a name prefix or a label selector is required",
        ));
}

/// -vv で設定解決のログが stderr に出ることを確認
#[test]
fn test_verbose_logs_resolved_settings() {
    let dir = tempfile::tempdir().unwrap();
    // gcloud を見つけられないようにして、クラウドに触れずに終わらせる
    sweep(&dir)
        .env_remove("RUST_LOG")
        .env("PATH", dir.path())
        .args(["-vv", "discover", "-p", "gcp", "--scope", "p", "--prefix", "dspm"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Settings resolved"));
}
