//! End-to-end checks of the module re-exec protocol: the same invocations
//! the supervisor makes against its children, driven through the real
//! binary.

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;
use tempfile::NamedTempFile;

fn vigil() -> Command {
    Command::cargo_bin("vigil-agent").unwrap()
}

#[test]
fn filechecker_reports_on_a_real_file() {
    let mut f = NamedTempFile::new().unwrap();
    f.write_all(b"hello world").unwrap();
    f.flush().unwrap();

    let args = serde_json::json!({
        "checks": [{"path": f.path(), "test": "exists"}]
    });

    let output = vigil()
        .arg("-m")
        .arg("filechecker")
        .arg(args.to_string())
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let report: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(report["checks"], 1);
    assert_eq!(report["matches"], 1);
}

#[test]
fn module_output_is_a_single_json_object() {
    let output = vigil()
        .arg("-m")
        .arg("filechecker")
        .arg(r#"{"checks": []}"#)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let text = String::from_utf8(output).unwrap();
    assert_eq!(text.lines().count(), 1);
    assert!(serde_json::from_str::<serde_json::Value>(&text).is_ok());
}

#[test]
fn unknown_module_is_an_error() {
    vigil()
        .arg("-m")
        .arg("noop")
        .arg("{}")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown module 'noop'"));
}

#[test]
fn malformed_arguments_exit_nonzero_with_an_error_envelope() {
    let output = vigil()
        .arg("-m")
        .arg("filechecker")
        .arg("not json")
        .assert()
        .failure()
        .get_output()
        .stdout
        .clone();

    let envelope: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert!(envelope["error"].as_str().unwrap().contains("arguments"));
}

#[test]
fn more_than_one_positional_argument_is_refused() {
    vigil()
        .arg("-m")
        .arg("filechecker")
        .arg("{}")
        .arg("{}")
        .assert()
        .failure()
        .stderr(predicate::str::contains("single argument"));
}
