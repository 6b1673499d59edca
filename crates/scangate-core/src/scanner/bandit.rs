//! Parser for `bandit -f json` output.

use super::excerpt;
use crate::report::{Finding, Severity, ToolKind};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct BanditOutput {
    results: Vec<BanditResult>,
    #[serde(default)]
    errors: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct BanditResult {
    #[serde(default)]
    filename: Option<String>,
    #[serde(default)]
    line_number: Option<u64>,
    #[serde(default)]
    issue_severity: Option<String>,
    #[serde(default)]
    issue_text: Option<String>,
    #[serde(default)]
    test_id: Option<String>,
    #[serde(default)]
    test_name: Option<String>,
}

pub fn parse(kind: ToolKind, stdout: &str) -> Result<Vec<Finding>, String> {
    let output: BanditOutput = serde_json::from_str(stdout.trim())
        .map_err(|e| format!("expected bandit JSON report ({}): {}", e, excerpt(stdout)))?;

    if !output.errors.is_empty() {
        tracing::warn!(
            errors = output.errors.len(),
            "bandit reported files it could not scan"
        );
    }

    Ok(output
        .results
        .into_iter()
        .map(|r| {
            let severity = r
                .issue_severity
                .as_deref()
                .map(Severity::from_tool)
                .unwrap_or(Severity::Unknown);
            let message = r
                .issue_text
                .or(r.test_name)
                .unwrap_or_else(|| "bandit issue".to_string());
            let mut finding = Finding::new(kind, severity, message);
            if let Some(rule) = r.test_id {
                finding = finding.with_rule(rule);
            }
            if let Some(location) = location(r.filename.as_deref(), r.line_number) {
                finding = finding.with_location(location);
            }
            finding
        })
        .collect())
}

fn location(file: Option<&str>, line: Option<u64>) -> Option<String> {
    match (file, line) {
        (Some(file), Some(line)) => Some(format!("{}:{}", file, line)),
        (Some(file), None) => Some(file.to_string()),
        _ => None,
    }
}
