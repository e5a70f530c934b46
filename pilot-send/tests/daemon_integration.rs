//! Integration tests for pilot-send daemon

use assert_cmd::Command;
use libpostpilot::types::AutoresponderSetting;
use libpostpilot::{Database, Post, PostStatus};
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

/// Setup test environment with config and database
async fn setup_test_env() -> (TempDir, String, String) {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("config.toml");
    let db_path = temp_dir.path().join("test.db");

    // Point the Graph API at a closed port so nothing leaves the machine
    let config_content = format!(
        r#"
[database]
path = "{}"

[scheduler]
interval_seconds = 1

[graph]
api_base = "http://127.0.0.1:9"
timeout_seconds = 2

[generation]
api_key = "test-key"
base_url = "http://127.0.0.1:9"
"#,
        db_path.display().to_string().replace('\\', "/")
    );

    fs::write(&config_path, config_content).unwrap();

    // Initialize database
    let _db = Database::new(db_path.to_str().unwrap()).await.unwrap();

    (
        temp_dir,
        config_path.to_str().unwrap().to_string(),
        db_path.to_str().unwrap().to_string(),
    )
}

/// Create a scheduled post that is due for publishing
async fn create_due_post(db_path: &str, user_id: &str) -> String {
    let db = Database::new(db_path).await.unwrap();

    let post = Post::new(
        user_id,
        vec!["facebook".to_string()],
        "https://cdn.example.com/photo.jpg",
        "Test scheduled post",
    )
    .scheduled_for(chrono::Utc::now() - chrono::Duration::seconds(10));

    let post_id = post.id.clone();
    db.create_post(&post).await.unwrap();
    post_id
}

fn pilot_send(config_path: &str) -> Command {
    let mut cmd = Command::cargo_bin("pilot-send").unwrap();
    cmd.env("POSTPILOT_CONFIG", config_path)
        .env_remove("RUST_LOG")
        .env_remove("POSTPILOT_LOG_FORMAT")
        .env_remove("POSTPILOT_LOG_LEVEL");
    cmd
}

fn report_from(output: &[u8]) -> serde_json::Value {
    let stdout = String::from_utf8_lossy(output);
    serde_json::from_str(stdout.trim()).unwrap()
}

// BASIC FUNCTIONALITY TESTS

#[tokio::test]
async fn test_daemon_starts_with_config() {
    let (_temp_dir, config_path, _db_path) = setup_test_env().await;

    // Run with --once flag to exit immediately
    pilot_send(&config_path).arg("--once").assert().success();
}

#[tokio::test]
async fn test_daemon_requires_valid_config() {
    let temp_dir = TempDir::new().unwrap();
    let invalid_config = temp_dir.path().join("invalid.toml");

    fs::write(&invalid_config, "invalid toml content [[[").unwrap();

    pilot_send(invalid_config.to_str().unwrap())
        .arg("--once")
        .assert()
        .failure()
        .code(2);
}

#[tokio::test]
async fn test_handles_missing_config_gracefully() {
    let temp_dir = TempDir::new().unwrap();
    let nonexistent_config = temp_dir.path().join("nonexistent.toml");

    pilot_send(nonexistent_config.to_str().unwrap())
        .arg("--once")
        .assert()
        .failure()
        .code(2);
}

#[tokio::test]
async fn test_missing_generation_key_fails() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("config.toml");
    let db_path = temp_dir.path().join("test.db");
    fs::write(
        &config_path,
        format!(
            "[database]\npath = \"{}\"\n",
            db_path.display().to_string().replace('\\', "/")
        ),
    )
    .unwrap();

    pilot_send(config_path.to_str().unwrap())
        .env_remove("OPENAI_API_KEY")
        .arg("--once")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("OPENAI_API_KEY"));
}

#[tokio::test]
async fn test_once_flag_exits_immediately() {
    let (_temp_dir, config_path, _db_path) = setup_test_env().await;

    pilot_send(&config_path)
        .arg("--once")
        .assert()
        .success()
        .stderr(predicate::str::contains("pilot-send daemon starting"))
        .stderr(predicate::str::contains("ran one tick, exiting"))
        .stderr(predicate::str::contains("pilot-send daemon stopped"));
}

#[tokio::test]
async fn test_verbose_json_logging() {
    let (_temp_dir, config_path, _db_path) = setup_test_env().await;

    pilot_send(&config_path)
        .args(["--once", "--verbose", "--log-format", "json"])
        .assert()
        .success()
        .stderr(predicate::str::contains("\"level\":\"INFO\""));
}

#[tokio::test]
async fn test_custom_poll_interval() {
    let (_temp_dir, config_path, _db_path) = setup_test_env().await;

    pilot_send(&config_path)
        .args(["--once", "--poll-interval", "30"])
        .assert()
        .success()
        .stderr(predicate::str::contains("Poll interval: 30s"));
}

#[tokio::test]
async fn test_poll_interval_from_config() {
    let (_temp_dir, config_path, _db_path) = setup_test_env().await;

    pilot_send(&config_path)
        .arg("--once")
        .assert()
        .success()
        .stderr(predicate::str::contains("Poll interval: 1s"));
}

// TICK TESTS

#[tokio::test]
async fn test_no_posts_due_prints_empty_report() {
    let (_temp_dir, config_path, _db_path) = setup_test_env().await;

    let output = pilot_send(&config_path).arg("--once").output().unwrap();
    assert!(output.status.success());

    let report = report_from(&output.stdout);
    assert_eq!(report["due"], 0);
    assert_eq!(report["claimed"], 0);
    assert_eq!(report["replies_posted"], 0);
}

#[tokio::test]
async fn test_due_post_without_accounts_fails() {
    let (_temp_dir, config_path, db_path) = setup_test_env().await;
    let post_id = create_due_post(&db_path, "user-without-accounts").await;

    let output = pilot_send(&config_path).arg("--once").output().unwrap();
    assert!(output.status.success());

    let report = report_from(&output.stdout);
    assert_eq!(report["due"], 1);
    assert_eq!(report["claimed"], 1);
    assert_eq!(report["failed"], 1);

    let db = Database::new(&db_path).await.unwrap();
    let post = db.get_post(&post_id).await.unwrap().unwrap();
    assert_eq!(post.status, PostStatus::Failed);
    assert_eq!(post.error_message.as_deref(), Some("No connected social accounts"));
    assert!(post.social_post_ids.is_empty());
}

#[tokio::test]
async fn test_processes_multiple_due_posts() {
    let (_temp_dir, config_path, db_path) = setup_test_env().await;

    for _ in 0..3 {
        create_due_post(&db_path, "user-1").await;
    }

    pilot_send(&config_path)
        .arg("--once")
        .assert()
        .success()
        .stderr(predicate::str::contains("Found 3 post(s) due for publishing"));
}

#[tokio::test]
async fn test_second_run_does_not_republish() {
    let (_temp_dir, config_path, db_path) = setup_test_env().await;
    create_due_post(&db_path, "user-1").await;

    pilot_send(&config_path).arg("--once").assert().success();

    let output = pilot_send(&config_path).arg("--once").output().unwrap();
    let report = report_from(&output.stdout);
    assert_eq!(report["due"], 0);
    assert_eq!(report["claimed"], 0);
}

#[tokio::test]
async fn test_scans_enabled_autoresponders() {
    let (_temp_dir, config_path, db_path) = setup_test_env().await;
    let db = Database::new(&db_path).await.unwrap();

    let setting = AutoresponderSetting::new("post-1", "user-1");
    db.save_autoresponder_setting(&setting).await.unwrap();

    let output = pilot_send(&config_path).arg("--once").output().unwrap();
    assert!(output.status.success());

    let report = report_from(&output.stdout);
    assert_eq!(report["settings_scanned"], 1);
    assert_eq!(report["replies_posted"], 0);
}

#[cfg(unix)]
#[tokio::test]
async fn test_sigterm_stops_daemon() -> anyhow::Result<()> {
    use std::process::Stdio;
    use std::time::Duration;

    let (_temp_dir, config_path, _db_path) = setup_test_env().await;

    let mut child = std::process::Command::new(assert_cmd::cargo::cargo_bin("pilot-send"))
        .env("POSTPILOT_CONFIG", &config_path)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()?;

    tokio::time::sleep(Duration::from_millis(1500)).await;

    let status = std::process::Command::new("kill")
        .args(["-TERM", &child.id().to_string()])
        .status()?;
    assert!(status.success());

    let mut exited = None;
    for _ in 0..50 {
        if let Some(status) = child.try_wait()? {
            exited = Some(status);
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    match exited {
        Some(status) => assert!(status.success()),
        None => {
            child.kill()?;
            panic!("pilot-send did not stop after SIGTERM");
        }
    }

    Ok(())
}
