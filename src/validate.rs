//! Pipeline validator - read-only structural checks
//!
//! Every check runs, even after a failure, so the report lists all
//! problems at once:
//!
//! 1. each stage source file exists and parses as Rust
//! 2. the `MLproject` and `Cargo.toml` manifests exist and parse
//! 3. the `data/` directory exists
//! 4. a tracking backend can be built for the configured URI
//!    (no connection is attempted)

use crate::config::PipelineConfig;
use crate::tracking::backend_for_uri;
use crate::{Error, Result};
use std::fmt;
use std::path::Path;

/// Stage sources checked for syntax, relative to the project root
pub const STAGE_SOURCES: [&str; 5] = [
    "src/bin/load_data.rs",
    "src/bin/preprocess.rs",
    "src/bin/train.rs",
    "src/bin/evaluate.rs",
    "src/bin/pipeline.rs",
];

/// Project manifest describing the pipeline entry points
pub const PROJECT_MANIFEST: &str = "MLproject";

/// Build manifest
pub const BUILD_MANIFEST: &str = "Cargo.toml";

/// Data directory
pub const DATA_DIR: &str = "data";

/// Outcome of one check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Check {
    /// What was checked
    pub subject: String,
    /// Whether it passed
    pub passed: bool,
    /// Failure reason, empty on success
    pub detail: String,
}

impl Check {
    fn pass(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            passed: true,
            detail: String::new(),
        }
    }

    fn fail(subject: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            passed: false,
            detail: detail.into(),
        }
    }
}

impl fmt::Display for Check {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.passed {
            write!(f, "✅ {}", self.subject)
        } else {
            write!(f, "❌ {}: {}", self.subject, self.detail)
        }
    }
}

/// All check results, in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    checks: Vec<Check>,
}

impl ValidationReport {
    /// Every check, in execution order.
    #[must_use]
    pub fn checks(&self) -> &[Check] {
        &self.checks
    }

    /// Checks that failed.
    pub fn failures(&self) -> impl Iterator<Item = &Check> {
        self.checks.iter().filter(|check| !check.passed)
    }

    /// Whether every check passed.
    #[must_use]
    pub fn passed(&self) -> bool {
        self.checks.iter().all(|check| check.passed)
    }

    /// Convert to the aggregated pass/fail result.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] with the number of failed checks
    pub fn into_result(self) -> Result<Self> {
        let failed = self.failures().count();
        if failed == 0 {
            Ok(self)
        } else {
            Err(Error::Validation(failed))
        }
    }
}

/// Run every check against the project at `root`.
#[must_use]
pub fn run_checks(root: &Path, config: &PipelineConfig) -> ValidationReport {
    let mut checks: Vec<Check> = STAGE_SOURCES
        .iter()
        .map(|source| check_rust_source(root, source))
        .collect();
    checks.push(check_manifest(root, PROJECT_MANIFEST, |text| {
        serde_yaml::from_str::<serde_yaml::Value>(text)
            .map(|_| ())
            .map_err(|e| e.to_string())
    }));
    checks.push(check_manifest(root, BUILD_MANIFEST, |text| {
        text.parse::<toml::Table>()
            .map(|_| ())
            .map_err(|e| e.to_string())
    }));
    checks.push(check_data_dir(root));
    checks.push(check_tracking(config));

    for check in &checks {
        tracing::debug!(subject = %check.subject, passed = check.passed, "validator check");
    }
    ValidationReport { checks }
}

fn check_rust_source(root: &Path, relative: &str) -> Check {
    let subject = format!("{relative} is valid Rust");
    let path = root.join(relative);
    if !path.is_file() {
        return Check::fail(subject, "file not found");
    }
    match std::fs::read_to_string(&path) {
        Ok(source) => match syn::parse_file(&source) {
            Ok(_) => Check::pass(subject),
            Err(e) => Check::fail(subject, format!("syntax error: {e}")),
        },
        Err(e) => Check::fail(subject, e.to_string()),
    }
}

fn check_manifest<F>(root: &Path, name: &str, parse: F) -> Check
where
    F: FnOnce(&str) -> std::result::Result<(), String>,
{
    let subject = format!("{name} exists");
    let path = root.join(name);
    if !path.is_file() {
        return Check::fail(subject, "file not found");
    }
    match std::fs::read_to_string(&path) {
        Ok(text) => match parse(&text) {
            Ok(()) => Check::pass(subject),
            Err(e) => Check::fail(subject, format!("does not parse: {e}")),
        },
        Err(e) => Check::fail(subject, e.to_string()),
    }
}

fn check_data_dir(root: &Path) -> Check {
    let subject = format!("{DATA_DIR}/ directory exists");
    if root.join(DATA_DIR).is_dir() {
        Check::pass(subject)
    } else {
        Check::fail(subject, "directory not found")
    }
}

fn check_tracking(config: &PipelineConfig) -> Check {
    let subject = format!("tracking backend available for {}", config.tracking_uri);
    match backend_for_uri(&config.tracking_uri) {
        Ok(_) => Check::pass(subject),
        Err(e) => Check::fail(subject, e.to_string()),
    }
}
