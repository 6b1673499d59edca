//! Parser for `safety check --json` output.
//!
//! Accepts the object form with a `vulnerabilities` array and the older
//! top-level array of `[package, affected, installed, advisory, id]` rows.

use super::excerpt;
use crate::report::{Finding, Severity, ToolKind};
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
struct SafetyReport {
    vulnerabilities: Vec<SafetyVulnerability>,
}

#[derive(Debug, Deserialize)]
struct SafetyVulnerability {
    #[serde(default)]
    package_name: Option<String>,
    #[serde(default)]
    analyzed_version: Option<String>,
    #[serde(default)]
    vulnerability_id: Option<String>,
    #[serde(default)]
    advisory: Option<String>,
    #[serde(default)]
    severity: Option<Value>,
}

pub fn parse(kind: ToolKind, stdout: &str) -> Result<Vec<Finding>, String> {
    let value: Value = serde_json::from_str(stdout.trim())
        .map_err(|e| format!("expected safety JSON report ({}): {}", e, excerpt(stdout)))?;

    match value {
        Value::Array(rows) => rows.iter().map(|row| legacy_row(kind, row)).collect(),
        Value::Object(_) => {
            let report: SafetyReport = serde_json::from_value(value)
                .map_err(|e| format!("unexpected safety report shape: {}", e))?;
            Ok(report
                .vulnerabilities
                .into_iter()
                .map(|v| vulnerability(kind, v))
                .collect())
        }
        _ => Err(format!(
            "expected safety JSON object or array: {}",
            excerpt(stdout)
        )),
    }
}

fn vulnerability(kind: ToolKind, v: SafetyVulnerability) -> Finding {
    let package = match (&v.package_name, &v.analyzed_version) {
        (Some(name), Some(version)) => format!("{}=={}", name, version),
        (Some(name), None) => name.clone(),
        _ => "unknown package".to_string(),
    };
    let message = match &v.advisory {
        Some(advisory) => format!("{}: {}", package, advisory.trim()),
        None => package.clone(),
    };

    let mut finding =
        Finding::new(kind, v.severity.as_ref().map_or(Severity::Unknown, severity_of), message)
            .with_location(package);
    if let Some(id) = v.vulnerability_id {
        finding = finding.with_rule(id);
    }
    finding
}

/// Safety reports severity as `null`, a plain string, or a CVSS object.
fn severity_of(value: &Value) -> Severity {
    match value {
        Value::String(s) => Severity::from_tool(s),
        Value::Object(map) => ["cvssv3", "cvssv2"]
            .iter()
            .filter_map(|key| map.get(*key))
            .filter_map(|cvss| cvss.get("base_severity").and_then(Value::as_str))
            .map(Severity::from_tool)
            .next()
            .unwrap_or(Severity::Unknown),
        _ => Severity::Unknown,
    }
}

fn legacy_row(kind: ToolKind, row: &Value) -> Result<Finding, String> {
    let cells = row
        .as_array()
        .ok_or_else(|| "legacy safety report rows must be arrays".to_string())?;
    let cell = |i: usize| cells.get(i).and_then(Value::as_str);

    let package = match (cell(0), cell(2)) {
        (Some(name), Some(version)) => format!("{}=={}", name, version),
        (Some(name), None) => name.to_string(),
        _ => return Err("legacy safety row is missing the package name".to_string()),
    };
    let message = match cell(3) {
        Some(advisory) => format!("{}: {}", package, advisory.trim()),
        None => package.clone(),
    };

    let mut finding = Finding::new(kind, Severity::Unknown, message).with_location(package);
    if let Some(id) = cell(4) {
        finding = finding.with_rule(id);
    }
    Ok(finding)
}
