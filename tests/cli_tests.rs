//! Integration tests for the LearningHub CLI
//!
//! Each test builds a small site in a temporary directory and drives the
//! binary against it with `--root`.

use assert_cmd::Command;
use learninghub::submissions::checksum::payload_checksum;
use predicates::prelude::*;
use serde_json::{json, Value};
use std::fs;
use std::path::Path;
use tempfile::{tempdir, TempDir};

const LESSON: &str = r#"<!DOCTYPE html>
<html>
<head>
    <title>Calculatorul | LearningHub</title>
</head>
<body>
    <h1>Lectia 1: Calculatorul</h1>
    <div class="atom" id="atom-1" data-quiz='[{"question": "Ce face procesorul?", "options": ["Calculeaza", "Afiseaza"], "correct": "a"}]'>
        <p>Procesorul executa instructiunile programelor.</p>
    </div>
</body>
</html>
"#;

/// Test helper to get the CLI binary
fn learninghub_cmd() -> Command {
    Command::cargo_bin("learninghub").unwrap()
}

/// Command already pointed at `root`
fn site_cmd(root: &Path) -> Command {
    let mut cmd = learninghub_cmd();
    cmd.current_dir(root).arg("--root").arg(root);
    cmd
}

/// Site with one lesson under content/tic/cls5/m1-sisteme
fn create_site() -> TempDir {
    let dir = tempdir().unwrap();
    let module = dir.path().join("content/tic/cls5/m1-sisteme");
    fs::create_dir_all(&module).unwrap();
    fs::write(module.join("lectia1-intro.html"), LESSON).unwrap();
    dir
}

fn lesson_path(root: &Path) -> std::path::PathBuf {
    root.join("content/tic/cls5/m1-sisteme/lectia1-intro.html")
}

fn signed_submission(grade: u64) -> Value {
    let payload = json!({
        "student": {"name": "Ana Popescu", "class": "5A"},
        "lesson": {"id": "cls5-m1-lectia1", "title": "Calculatorul"},
        "grading": {"grade": grade, "gradeLabel": "Foarte bine", "finalScore": 92},
        "atomicItems": [],
        "practiceItems": []
    });
    let checksum = payload_checksum(&payload).unwrap();
    json!({"payload": payload, "security": {"checksum": checksum}})
}

#[test]
fn test_cli_help() {
    learninghub_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("transform"))
        .stdout(predicate::str::contains("submissions"))
        .stdout(predicate::str::contains("onecompiler"))
        .stdout(predicate::str::contains("Commands:"));
}

#[test]
fn test_cli_version() {
    learninghub_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_print_default_config() {
    learninghub_cmd()
        .arg("print-default-config")
        .assert()
        .success()
        .stdout(predicate::str::contains("content_dir"))
        .stdout(predicate::str::contains("interval_secs: 30"));
}

#[test]
fn test_init_config_refuses_to_overwrite() {
    let dir = tempdir().unwrap();
    let config = dir.path().join("custom.yml");

    learninghub_cmd()
        .args(["init-config", "--output"])
        .arg(&config)
        .assert()
        .success();
    assert!(fs::read_to_string(&config).unwrap().contains("watch_patterns"));

    learninghub_cmd()
        .args(["init-config", "--output"])
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));

    learninghub_cmd()
        .args(["init-config", "--force", "--output"])
        .arg(&config)
        .assert()
        .success();
}

#[test]
fn test_validate_config() {
    let dir = tempdir().unwrap();
    let good = dir.path().join("good.yml");
    fs::write(&good, "sync:\n  interval_secs: 10\n").unwrap();
    learninghub_cmd()
        .arg("validate-config")
        .arg(&good)
        .assert()
        .success()
        .stdout(predicate::str::contains("valid"));

    let bad = dir.path().join("bad.yml");
    fs::write(&bad, "sync:\n  interval_secs: 0\n").unwrap();
    learninghub_cmd()
        .arg("validate-config")
        .arg(&bad)
        .assert()
        .failure()
        .stderr(predicate::str::contains("interval_secs"));
}

#[test]
fn test_transform_list() {
    learninghub_cmd()
        .args(["transform", "--list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("breadcrumbs"))
        .stdout(predicate::str::contains("fix-lessons"));
}

#[test]
fn test_unknown_transform_is_rejected() {
    learninghub_cmd()
        .args(["transform", "no-such-transform"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown transform"));
}

#[test]
fn test_transform_dry_run_leaves_files_alone() {
    let site = create_site();
    let assert = site_cmd(site.path())
        .args(["transform", "mobile-css", "--dry-run", "--json"])
        .assert()
        .success();

    let summary: Value = serde_json::from_slice(&assert.get_output().stdout).unwrap();
    assert_eq!(summary["updated"], 1);
    assert_eq!(summary["dry_run"], true);
    assert_eq!(fs::read_to_string(lesson_path(site.path())).unwrap(), LESSON);
}

#[test]
fn test_transform_is_idempotent() {
    let site = create_site();
    site_cmd(site.path())
        .args(["transform", "mobile-css", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"updated\": 1"));

    let html = fs::read_to_string(lesson_path(site.path())).unwrap();
    assert!(html.contains(r#"href="../../../../assets/css/mobile.css""#));

    site_cmd(site.path())
        .args(["transform", "mobile-css", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"updated\": 0"));
}

const CLASSIC_LESSON: &str = r#"<html>
<body>
    <section class="section-card">
        <button class="quiz-option">A</button>
    </section>
    <footer>LearningHub</footer>
    <script>
        LearningProgress.init('cls5', 'm1-sisteme', 'lectia2');
    </script>
</body>
</html>
"#;

#[test]
fn test_upgrade_lessons_on_one_file() {
    let site = create_site();
    let classic = site.path().join("content/tic/cls5/m1-sisteme/lectia2-retele.html");
    fs::write(&classic, CLASSIC_LESSON).unwrap();

    site_cmd(site.path())
        .args(["transform", "upgrade-lessons", "--json", "--file"])
        .arg(&classic)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"updated\": 1"));

    let html = fs::read_to_string(&classic).unwrap();
    assert!(html.contains("LessonSummary.init('cls5-m1-sisteme-lectia2-retele')"));
    assert!(html.contains("Descarca progresul (JSON)"));
    assert_eq!(fs::read_to_string(lesson_path(site.path())).unwrap(), LESSON);

    site_cmd(site.path())
        .args(["transform", "upgrade-lessons", "--json", "--file"])
        .arg(&classic)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"updated\": 0"));
}

#[test]
fn test_transform_folder_outside_content_fails() {
    let site = create_site();
    site_cmd(site.path())
        .args(["transform", "mobile-css", "--folder", "cls9/m0-lipsa"])
        .assert()
        .failure();
    assert_eq!(fs::read_to_string(lesson_path(site.path())).unwrap(), LESSON);
}

#[test]
fn test_log_filter_from_environment() {
    let site = create_site();
    site_cmd(site.path())
        .env("LEARNINGHUB_LOG", "debug")
        .args(["transform", "mobile-css", "--json", "--folder", "cls5/m1-sisteme"])
        .assert()
        .success()
        .stderr(predicate::str::contains("[mobile-css] updated"));
}

#[test]
fn test_audit_json() {
    let site = create_site();
    let assert = site_cmd(site.path()).args(["audit", "--json"]).assert().success();

    let report: Value = serde_json::from_slice(&assert.get_output().stdout).unwrap();
    assert_eq!(report["total_lessons"], 1);
    assert!(report["grades"]["cls5"]["m1-sisteme"].is_array());
}

#[test]
fn test_extract_exercises() {
    let site = create_site();
    let output = site.path().join("export.json");
    site_cmd(site.path())
        .args(["extract", "exercises", "--output"])
        .arg(&output)
        .assert()
        .success();

    let export: Value = serde_json::from_str(&fs::read_to_string(&output).unwrap()).unwrap();
    assert_eq!(export["meta"]["total_exercitii_quiz"], 1);
    let lesson = &export["clase"]["clasa_5"]["sisteme"]["lectia1-intro"];
    assert_eq!(lesson["exercitii"][0]["cerinta"], "Ce face procesorul?");
}

#[test]
fn test_verify_valid_and_tampered_submissions() {
    let dir = tempdir().unwrap();
    let valid = dir.path().join("valid.json");
    fs::write(&valid, serde_json::to_string_pretty(&signed_submission(9)).unwrap()).unwrap();

    learninghub_cmd()
        .current_dir(dir.path())
        .args(["submissions", "verify"])
        .arg(&valid)
        .assert()
        .success()
        .stdout(predicate::str::contains("VALID"));

    let mut edited = signed_submission(9);
    edited["payload"]["grading"]["grade"] = json!(10);
    let tampered = dir.path().join("tampered.json");
    fs::write(&tampered, edited.to_string()).unwrap();

    learninghub_cmd()
        .current_dir(dir.path())
        .args(["submissions", "verify"])
        .arg(&tampered)
        .assert()
        .code(1)
        .stdout(predicate::str::contains("CHECKSUM MISMATCH"));

    learninghub_cmd()
        .current_dir(dir.path())
        .args(["submissions", "verify", "missing.json"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("File not found"));
}

#[test]
fn test_evaluate_writes_evaluation_file() {
    let dir = tempdir().unwrap();
    let submission = dir.path().join("ana.json");
    fs::write(&submission, signed_submission(9).to_string()).unwrap();

    learninghub_cmd()
        .current_dir(dir.path())
        .args(["submissions", "evaluate"])
        .arg(&submission)
        .assert()
        .success()
        .stdout(predicate::str::contains("Ana Popescu"));

    let evaluation = dir.path().join("ana_evaluation.json");
    let report: Value = serde_json::from_str(&fs::read_to_string(evaluation).unwrap()).unwrap();
    assert_eq!(report["isValid"], true);

    learninghub_cmd()
        .current_dir(dir.path())
        .args(["submissions", "evaluate", "--batch"])
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("SUMMARY: 1/1 valid submissions"));
}

#[test]
fn test_grade_folder_requires_grade() {
    let dir = tempdir().unwrap();
    learninghub_cmd()
        .current_dir(dir.path())
        .args(["submissions", "grade", "--folder"])
        .arg(dir.path())
        .assert()
        .failure();
}

#[test]
fn test_sync_watch_once_detects_changes() {
    let site = create_site();

    site_cmd(site.path())
        .args(["sync", "watch", "--once"])
        .assert()
        .success()
        .stdout(predicate::str::contains("indexed 1 files"));

    fs::write(lesson_path(site.path()), "<html>changed</html>").unwrap();

    site_cmd(site.path())
        .args(["sync", "watch", "--once"])
        .assert()
        .success()
        .stdout(predicate::str::contains("MODIFIED (1):"))
        .stdout(predicate::str::contains("content/tic/cls5/m1-sisteme/lectia1-intro.html"));

    site_cmd(site.path())
        .args(["sync", "status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("NOT RUNNING"))
        .stdout(predicate::str::contains("Tracked files: 1"))
        .stdout(predicate::str::contains("Pending changes: 1"));

    site_cmd(site.path())
        .args(["sync", "clear"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Pending changes cleared"));

    site_cmd(site.path())
        .args(["sync", "stop"])
        .assert()
        .success()
        .stdout(predicate::str::contains("not running"));
}

#[test]
fn test_onecompiler_prepare_and_register() {
    let site = create_site();
    let page = "content/tic/cls5/m1-sisteme/lectia1-intro.html";

    site_cmd(site.path())
        .args(["onecompiler", "sync", "--file", page])
        .assert()
        .success()
        .stdout(predicate::str::contains("https://onecompiler.com/html"));

    let ready = site
        .path()
        .join("sync/onecompiler_ready/content_tic_cls5_m1-sisteme_lectia1-intro.html");
    assert!(fs::read_to_string(ready)
        .unwrap()
        .contains("<!-- TODO: Update links after creating all OneCompiler pages -->"));

    site_cmd(site.path())
        .args(["onecompiler", "register", page, "abc123"])
        .assert()
        .success()
        .stdout(predicate::str::contains("https://onecompiler.com/html/abc123"));

    site_cmd(site.path())
        .args(["onecompiler", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[OK]"))
        .stdout(predicate::str::contains("abc123"));

    site_cmd(site.path())
        .args(["onecompiler", "sync", "--all"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No pages to sync"));
}
