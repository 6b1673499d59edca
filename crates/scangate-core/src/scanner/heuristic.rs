//! Last-resort text matching for tools whose structured output is missing.
//!
//! Every finding produced here is marked low confidence.

use crate::report::{Finding, Severity, ToolKind};
use regex::Regex;

fn pattern_for(kind: ToolKind) -> &'static str {
    match kind {
        ToolKind::Sast => r"(?i)\b(issue|vulnerab\w*|insecure)\b",
        ToolKind::Dependencies => r"(?i)\b(vulnerab\w*|CVE-\d{4}-\d+)\b",
        ToolKind::Secrets => r"(?i)\b(secrets?|password|private key|api[_-]?key|token)\b",
    }
}

/// Turn lines of free text that look like findings into low-confidence findings.
pub fn sniff(kind: ToolKind, stdout: &str, stderr: &str) -> Vec<Finding> {
    let re = match Regex::new(pattern_for(kind)) {
        Ok(re) => re,
        Err(error) => {
            tracing::error!(%error, "invalid heuristic pattern");
            return Vec::new();
        }
    };

    stdout
        .lines()
        .chain(stderr.lines())
        .map(str::trim)
        .filter(|line| !line.is_empty() && re.is_match(line))
        .map(|line| {
            Finding::new(kind, Severity::Unknown, crate::error::truncate_diagnostic(line))
                .with_rule("text-match")
                .low_confidence()
        })
        .collect()
}
