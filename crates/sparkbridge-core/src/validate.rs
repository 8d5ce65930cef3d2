//! Pre-flight validation of the job configuration map.
//!
//! Runs before anything touches the network and produces a structured
//! issue list rather than a single exception, so callers can show all
//! problems at once. Configuration that fails here is never submitted.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use crate::params::{
    CONF, DRIVER_CORES, DRIVER_MEMORY, EXECUTOR_CORES, EXECUTOR_MEMORY, NUM_EXECUTORS,
    SUBMISSION_LEVEL_KEYS,
};

/// Severity of a single validation finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueSeverity {
    /// The submission can proceed but is probably not what the caller
    /// intended.
    Warning,
    /// The submission must not be sent.
    Error,
}

/// One validation finding on a specific config field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    pub severity: IssueSeverity,
    pub field: String,
    pub message: String,
}

impl ValidationIssue {
    fn error(field: &str, message: impl Into<String>) -> Self {
        Self {
            severity: IssueSeverity::Error,
            field: field.to_string(),
            message: message.into(),
        }
    }

    fn warning(field: &str, message: impl Into<String>) -> Self {
        Self {
            severity: IssueSeverity::Warning,
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// Memory sizes accept an integer or decimal count with a g/m unit
/// suffix, e.g. `4G`, `512m`, `1.5g`.
fn memory_size_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\d+(\.\d+)?[gGmM]$").expect("static pattern"))
}

/// Validate the submission-level layer of a job configuration.
///
/// Checks memory-size formats and positive-integer counts, and warns on
/// unrecognized top-level keys (raw Spark properties belong under
/// `conf`). Returns every finding; an empty list means the config is
/// clean.
pub fn validate_job_config(config: &BTreeMap<String, Value>) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    for key in [DRIVER_MEMORY, EXECUTOR_MEMORY] {
        if let Some(value) = config.get(key) {
            let text = value_text(value);
            if !memory_size_pattern().is_match(&text) {
                issues.push(ValidationIssue::error(
                    key,
                    format!("\"{text}\" is not a valid memory size (expected e.g. \"4G\" or \"512m\")"),
                ));
            }
        }
    }

    for key in [DRIVER_CORES, EXECUTOR_CORES, NUM_EXECUTORS] {
        if let Some(value) = config.get(key) {
            if !is_positive_integer(value) {
                issues.push(ValidationIssue::error(
                    key,
                    format!("\"{}\" is not a positive integer", value_text(value)),
                ));
            }
        }
    }

    for key in config.keys() {
        if key != CONF && !SUBMISSION_LEVEL_KEYS.contains(&key.as_str()) {
            issues.push(ValidationIssue::warning(
                key,
                "not a recognized submission-level key; raw Spark properties belong under \"conf\"",
            ));
        }
    }

    issues
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn is_positive_integer(value: &Value) -> bool {
    match value {
        Value::Number(n) => n.as_u64().is_some_and(|v| v > 0),
        Value::String(s) => s.parse::<u64>().is_ok_and(|v| v > 0),
        _ => false,
    }
}
