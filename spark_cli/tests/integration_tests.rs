//! Integration tests for the ignite binary.
//!
//! These tests verify end-to-end behavior including:
//! - Spark logging and effect output
//! - Mission completion and resets
//! - Status, listings and CSV export
//! - Configuration overrides

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// A Thursday afternoon, UTC
const THURSDAY: &str = "2025-10-09T15:00:00Z";
const FRIDAY: &str = "2025-10-10T09:00:00Z";

/// Helper to create a test data directory
fn setup_test_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

/// Helper to get the path to the CLI binary
fn cli() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("ignite"))
}

/// CLI pointed at a temp data dir with a UTC calendar and a fixed clock
fn ignite(dir: &Path, now: &str) -> Command {
    let config_path = dir.join("config.toml");
    if !config_path.exists() {
        fs::write(&config_path, "[calendar]\nutc_offset_minutes = 0\n")
            .expect("Failed to write config");
    }

    let mut cmd = cli();
    cmd.arg("--data-dir")
        .arg(dir.join("data"))
        .arg("--config")
        .arg(&config_path)
        .arg("--now")
        .arg(now)
        .arg("--seed")
        .arg("7");
    cmd
}

fn json_effects(output: &[u8]) -> Vec<Value> {
    String::from_utf8_lossy(output)
        .lines()
        .map(|line| serde_json::from_str(line).expect("effect line is JSON"))
        .collect()
}

#[test]
fn test_cli_help() {
    cli()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Ignition spark tracker"));
}

#[test]
fn test_log_creates_store_files() {
    let temp_dir = setup_test_dir();

    ignite(temp_dir.path(), THURSDAY)
        .args(["log", "--category", "energy"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Logged medium energy spark (+22 pts)"))
        .stdout(predicate::str::contains("Streak: 1 days"));

    let data_dir = temp_dir.path().join("data");
    for name in [
        "missions.json",
        "cards.json",
        "owned_cards.json",
        "progress.json",
        "reset_anchor.json",
        "activities.jsonl",
    ] {
        assert!(data_dir.join(name).exists(), "missing {}", name);
    }

    let log = fs::read_to_string(data_dir.join("activities.jsonl")).unwrap();
    assert_eq!(log.lines().count(), 1);
    assert!(log.contains("\"category\":\"energy\""));
}

#[test]
fn test_log_json_effects() {
    let temp_dir = setup_test_dir();

    let assert = ignite(temp_dir.path(), THURSDAY)
        .args(["--json", "log", "--category", "idea", "--intensity", "low"])
        .assert()
        .success();

    let effects = json_effects(&assert.get_output().stdout);
    let kinds: Vec<&str> = effects
        .iter()
        .map(|e| e["effect"].as_str().unwrap())
        .collect();
    let completed: Vec<&str> = effects
        .iter()
        .filter(|e| e["effect"] == "mission_completed")
        .map(|e| e["mission_id"].as_str().unwrap())
        .collect();

    // Idea Generator and First Card complete on the first idea spark
    assert!(completed.contains(&"daily_idea_generator"));
    assert!(completed.contains(&"achievement_first_card"));
    assert!(kinds[..completed.len()].iter().all(|k| *k == "mission_completed"));
    assert_eq!(kinds[kinds.len() - 2], "card_obtained");
    assert_eq!(kinds[kinds.len() - 1], "streak_updated");

    let last = effects.last().unwrap();
    assert_eq!(last["current"], 1);
    assert_eq!(last["longest"], 1);
}

#[test]
fn test_energy_mission_completes_after_three_sparks() {
    let temp_dir = setup_test_dir();

    for _ in 0..3 {
        ignite(temp_dir.path(), THURSDAY)
            .args(["log", "--category", "energy"])
            .assert()
            .success();
    }

    let assert = ignite(temp_dir.path(), THURSDAY)
        .args(["missions", "--kind", "daily"])
        .assert()
        .success();
    let stdout = String::from_utf8_lossy(&assert.get_output().stdout).to_string();

    assert_eq!(stdout.lines().count(), 15);
    let line = stdout
        .lines()
        .find(|l| l.contains("daily_energy_boost"))
        .expect("energy mission listed");
    assert!(line.starts_with("[✓]"), "not completed: {}", line);
    assert!(line.contains("3/3"));
    assert!(line.contains("100%"));
}

#[test]
fn test_complete_mission_twice() {
    let temp_dir = setup_test_dir();

    ignite(temp_dir.path(), THURSDAY)
        .args(["complete", "weekly_warrior"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Mission complete: Weekly Warrior (+500 pts)",
        ));

    ignite(temp_dir.path(), THURSDAY)
        .args(["complete", "weekly_warrior"])
        .assert()
        .success()
        .stdout(predicate::str::contains("already completed"));
}

#[test]
fn test_unknown_mission_fails() {
    let temp_dir = setup_test_dir();

    ignite(temp_dir.path(), THURSDAY)
        .args(["complete", "daily_moonwalk"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("daily_moonwalk"));
}

#[test]
fn test_invalid_category_rejected() {
    let temp_dir = setup_test_dir();

    ignite(temp_dir.path(), THURSDAY)
        .args(["log", "--category", "nap"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown category"));

    assert!(!temp_dir.path().join("data/activities.jsonl").exists());
}

#[test]
fn test_reset_next_day() {
    let temp_dir = setup_test_dir();

    ignite(temp_dir.path(), THURSDAY)
        .args(["complete", "daily_idea_generator"])
        .assert()
        .success();

    ignite(temp_dir.path(), FRIDAY)
        .arg("reset")
        .assert()
        .success()
        .stdout(predicate::str::contains("Daily missions reset"))
        .stdout(predicate::str::contains("Weekly").not());

    ignite(temp_dir.path(), FRIDAY)
        .arg("reset")
        .assert()
        .success()
        .stdout(predicate::str::contains("Nothing to reset."));

    ignite(temp_dir.path(), FRIDAY)
        .args(["missions", "--kind", "daily"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[✓]").not());
}

#[test]
fn test_status_after_sparks() {
    let temp_dir = setup_test_dir();

    for category in ["decision", "experiment"] {
        ignite(temp_dir.path(), THURSDAY)
            .args(["log", "--category", category])
            .assert()
            .success();
    }

    ignite(temp_dir.path(), THURSDAY)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("LEVEL 1: Novice Igniter"))
        .stdout(predicate::str::contains("Sparks:    2"))
        .stdout(predicate::str::contains("Streak:    1 days"))
        .stdout(predicate::str::contains("/50"));
}

#[test]
fn test_cards_listing() {
    let temp_dir = setup_test_dir();

    ignite(temp_dir.path(), THURSDAY)
        .args(["drop", "--category", "challenge"])
        .assert()
        .success()
        .stdout(predicate::str::contains("New card"));

    let all = ignite(temp_dir.path(), THURSDAY)
        .arg("cards")
        .assert()
        .success();
    assert_eq!(
        String::from_utf8_lossy(&all.get_output().stdout).lines().count(),
        50
    );

    let owned = ignite(temp_dir.path(), THURSDAY)
        .args(["cards", "--owned"])
        .assert()
        .success();
    let stdout = String::from_utf8_lossy(&owned.get_output().stdout).to_string();
    assert_eq!(stdout.lines().count(), 1);
    assert!(stdout.starts_with("challenge_"));
}

#[test]
fn test_backdated_spark_skips_today_missions() {
    let temp_dir = setup_test_dir();

    ignite(temp_dir.path(), THURSDAY)
        .args(["log", "--category", "idea", "--at", "2025-10-08T20:30:00Z"])
        .assert()
        .success();

    let assert = ignite(temp_dir.path(), THURSDAY)
        .args(["missions", "--kind", "daily"])
        .assert()
        .success();
    let stdout = String::from_utf8_lossy(&assert.get_output().stdout).to_string();
    let line = stdout
        .lines()
        .find(|l| l.contains("daily_idea_generator"))
        .expect("idea mission listed");
    assert!(line.starts_with("[ ]"), "counted toward today: {}", line);
    assert!(line.contains("0/1"));
}

#[test]
fn test_export_csv() {
    let temp_dir = setup_test_dir();

    for category in ["idea", "energy", "challenge"] {
        ignite(temp_dir.path(), THURSDAY)
            .args(["log", "--category", category])
            .assert()
            .success();
    }

    let csv_path = temp_dir.path().join("export").join("sparks.csv");
    ignite(temp_dir.path(), THURSDAY)
        .arg("export")
        .arg("--out")
        .arg(&csv_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Exported 3 sparks"));

    let csv = fs::read_to_string(&csv_path).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines[0], "id,category,intensity,points,timestamp");
    assert_eq!(lines.len(), 4);
}

#[test]
fn test_backdated_spark() {
    let temp_dir = setup_test_dir();

    ignite(temp_dir.path(), THURSDAY)
        .args(["log", "--category", "idea", "--at", "2025-10-08T20:30:00Z"])
        .assert()
        .success();

    let log = fs::read_to_string(temp_dir.path().join("data/activities.jsonl")).unwrap();
    assert!(log.contains("2025-10-08T20:30:00Z"));
}

#[test]
fn test_config_overload_threshold() {
    let temp_dir = setup_test_dir();
    fs::write(
        temp_dir.path().join("config.toml"),
        "[rewards]\noverload_threshold = 50\n\n[calendar]\nutc_offset_minutes = 0\n",
    )
    .unwrap();

    let assert = ignite(temp_dir.path(), THURSDAY)
        .args(["--json", "log", "--category", "challenge", "--intensity", "extreme"])
        .assert()
        .success();

    let effects = json_effects(&assert.get_output().stdout);
    assert!(effects
        .iter()
        .any(|e| e["effect"] == "overload_triggered"));

    let progress: Value = serde_json::from_str(
        &fs::read_to_string(temp_dir.path().join("data/progress.json")).unwrap(),
    )
    .unwrap();
    assert!(progress["fuel_level"].as_u64().unwrap() < 50);
    assert!(progress["total_overloads"].as_u64().unwrap() >= 1);
}

#[test]
fn test_invalid_config_rejected() {
    let temp_dir = setup_test_dir();
    fs::write(
        temp_dir.path().join("config.toml"),
        "[rewards]\noverload_threshold = 0\n",
    )
    .unwrap();

    ignite(temp_dir.path(), THURSDAY)
        .arg("status")
        .assert()
        .failure()
        .stderr(predicate::str::contains("overload_threshold"));
}
