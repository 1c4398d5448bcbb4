//! Integration tests for the `tagref` binary.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use tempfile::TempDir;

fn write(dir: &Path, name: &str, content: &str) {
    let path = dir.join(name);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn tagref(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_tagref"))
        .args(args)
        .current_dir(dir)
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to run tagref")
}

fn stdout(out: &Output) -> String {
    String::from_utf8_lossy(&out.stdout).into_owned()
}

fn create_project() -> TempDir {
    let dir = TempDir::new().expect("Failed to create temp dir");
    write(dir.path(), "a.rs", "// [# meow who=zumi #]\n// [# bark #]\n");
    write(dir.path(), "sub/b.rs", "// [# meow #]\n");
    dir
}

#[test]
fn test_index_writes_default_file() {
    let dir = create_project();

    let out = tagref(dir.path(), &["index"]);
    assert!(out.status.success(), "{:?}", out);

    let text = fs::read_to_string(dir.path().join(".tagref/index")).unwrap();
    assert!(text.starts_with("# v4"));
    assert_eq!(text.lines().count(), 4);
    assert!(text.contains("meow a.rs:1.4-22 who=zumi"));
}

#[test]
fn test_index_to_stdout() {
    let dir = create_project();

    let out = tagref(dir.path(), &["index", "-i", "-"]);
    assert!(out.status.success());
    assert!(stdout(&out).starts_with("# v4"));
    assert!(!dir.path().join(".tagref/index").exists());
}

#[test]
fn test_search_without_index_scans() {
    let dir = create_project();

    let out = tagref(dir.path(), &["search", "meow"]);
    assert!(out.status.success());
    assert_eq!(stdout(&out).lines().count(), 2);

    let out = tagref(dir.path(), &["search", "-g", "*", "who=zumi"]);
    assert_eq!(stdout(&out).lines().collect::<Vec<_>>(), vec!["meow a.rs:1.4-22 who=zumi"]);
}

#[test]
fn test_search_json() {
    let dir = create_project();

    let out = tagref(dir.path(), &["search", "bark", "--format", "json"]);
    let found: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();

    assert_eq!(found[0]["name"], "bark");
    assert_eq!(found[0]["loc"]["path"], "a.rs");
    assert_eq!(found[0]["loc"]["line"], 2);
}

#[test]
fn test_resolve_next() {
    let dir = create_project();
    assert!(tagref(dir.path(), &["index"]).status.success());

    let out = tagref(dir.path(), &["resolve", "--loc", "./a.rs:1.8", "--next"]);
    assert!(out.status.success(), "{:?}", out);
    assert_eq!(stdout(&out).trim(), "meow sub/b.rs:1.4-13");

    let out = tagref(dir.path(), &["resolve", "--loc", "a.rs:1.8", "--next", "--prev"]);
    assert!(!out.status.success());
}

#[test]
fn test_explicit_index_must_exist() {
    let dir = create_project();

    let out = tagref(dir.path(), &["search", "-i", "missing", "meow"]);
    assert!(!out.status.success());
}

#[test]
fn test_stale_index_format_is_fatal() {
    let dir = create_project();
    write(dir.path(), ".tagref/index", "# v3\nmeow a.rs:1.1-2\n");

    let out = tagref(dir.path(), &["search", "meow"]);
    assert!(!out.status.success());
}

#[cfg(unix)]
#[test]
fn test_lint_exit_status() {
    let dir = create_project();
    write(
        dir.path(),
        ".tagref/config.yaml",
        "linter:\n  rules:\n    - name: has-who\n      shell: [sh, -c, 'test -n \"$TAGREF_ATTR_WHO\"']\n",
    );

    let out = tagref(dir.path(), &["lint"]);
    assert_eq!(out.status.code(), Some(2));

    let lines: Vec<String> = stdout(&out).lines().map(String::from).collect();
    assert_eq!(lines, vec!["a.rs:2.4-13 has-who", "sub/b.rs:1.4-13 has-who"]);
}

#[test]
fn test_lint_without_rules_passes() {
    let dir = create_project();

    let out = tagref(dir.path(), &["lint"]);
    assert!(out.status.success());
    assert!(out.stdout.is_empty());
}
