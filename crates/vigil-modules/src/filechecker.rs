//! File-integrity checks.
//!
//! Arguments:
//!
//! ```json
//! {"checks": [
//!   {"path": "/etc/passwd", "test": "exists"},
//!   {"path": "/bin/ls", "test": "sha256", "value": "<hex digest>"},
//!   {"path": "/etc/ssh/sshd_config", "test": "contains", "value": "^PermitRootLogin no"}
//! ]}
//! ```
//!
//! Output is one object summarizing every check; an unreadable file fails
//! its check with the error recorded inline rather than failing the module.

use std::fs;

use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{Module, ModuleError};

#[derive(Debug, Deserialize)]
struct Args {
    #[serde(default)]
    checks: Vec<Check>,
}

#[derive(Debug, Deserialize)]
struct Check {
    path: String,
    test: TestKind,
    #[serde(default)]
    value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum TestKind {
    Exists,
    Sha256,
    Contains,
}

#[derive(Debug, Serialize)]
struct Report {
    checks: usize,
    matches: usize,
    results: Vec<CheckResult>,
}

#[derive(Debug, Serialize)]
struct CheckResult {
    path: String,
    test: TestKind,
    matched: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

pub struct FileChecker;

impl Module for FileChecker {
    fn name(&self) -> &'static str {
        "filechecker"
    }

    fn run(&self, args: &[u8]) -> Result<serde_json::Value, ModuleError> {
        let args: Args = serde_json::from_slice(args)?;
        let results: Vec<CheckResult> = args.checks.iter().map(evaluate).collect();
        let report = Report {
            checks: results.len(),
            matches: results.iter().filter(|r| r.matched).count(),
            results,
        };
        Ok(serde_json::to_value(report)?)
    }
}

fn evaluate(check: &Check) -> CheckResult {
    let (matched, error) = match check.test {
        TestKind::Exists => (fs::metadata(&check.path).is_ok(), None),
        TestKind::Sha256 => match fs::read(&check.path) {
            Ok(bytes) => {
                let digest = Sha256::digest(&bytes);
                let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
                (hex.eq_ignore_ascii_case(check.value.trim()), None)
            }
            Err(e) => (false, Some(e.to_string())),
        },
        TestKind::Contains => match Regex::new(&check.value) {
            Err(e) => (false, Some(format!("bad pattern: {e}"))),
            Ok(re) => match fs::read(&check.path) {
                Ok(bytes) => {
                    let text = String::from_utf8_lossy(&bytes);
                    (text.lines().any(|line| re.is_match(line)), None)
                }
                Err(e) => (false, Some(e.to_string())),
            },
        },
    };
    CheckResult {
        path: check.path.clone(),
        test: check.test,
        matched,
        error,
    }
}
