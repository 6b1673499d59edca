//! Parser for `detect-secrets scan --json` output.

use super::excerpt;
use crate::report::{Finding, Severity, ToolKind};
use serde::Deserialize;
use std::collections::BTreeMap;

#[derive(Debug, Deserialize)]
struct Baseline {
    results: BTreeMap<String, Vec<PotentialSecret>>,
}

#[derive(Debug, Deserialize)]
struct PotentialSecret {
    #[serde(rename = "type", default)]
    secret_type: Option<String>,
    #[serde(default)]
    filename: Option<String>,
    #[serde(default)]
    line_number: Option<u64>,
    #[serde(default)]
    is_verified: bool,
}

/// One finding per reported secret, across all files.
pub fn parse(kind: ToolKind, stdout: &str) -> Result<Vec<Finding>, String> {
    let baseline: Baseline = serde_json::from_str(stdout.trim()).map_err(|e| {
        format!(
            "expected detect-secrets JSON baseline ({}): {}",
            e,
            excerpt(stdout)
        )
    })?;

    let mut findings = Vec::new();
    for (file, secrets) in baseline.results {
        for secret in secrets {
            let secret_type = secret
                .secret_type
                .unwrap_or_else(|| "Potential secret".to_string());
            let message = if secret.is_verified {
                format!("{} (verified)", secret_type)
            } else {
                secret_type.clone()
            };
            let file = secret.filename.unwrap_or_else(|| file.clone());
            let location = match secret.line_number {
                Some(line) => format!("{}:{}", file, line),
                None => file,
            };
            findings.push(
                Finding::new(kind, Severity::Unknown, message)
                    .with_rule(secret_type)
                    .with_location(location),
            );
        }
    }
    Ok(findings)
}
