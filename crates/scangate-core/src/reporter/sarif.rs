use crate::policy::Decision;
use crate::report::{Confidence, Finding, Report, Severity, ToolReport};
use serde_json::json;
use std::collections::BTreeSet;

/// Generate a SARIF 2.1.0 log with one run per scanner.
/// Failed scanners appear as runs with `executionSuccessful: false`.
pub fn to_sarif(report: &Report, decision: &Decision) -> serde_json::Value {
    let runs: Vec<serde_json::Value> = report.tools().map(sarif_run).collect();

    json!({
        "$schema": "https://raw.githubusercontent.com/oasis-tcs/sarif-spec/main/sarif-2.1/schema/sarif-schema-2.1.0.json",
        "version": "2.1.0",
        "runs": runs,
        "properties": {
            "scangate": {
                "version": env!("CARGO_PKG_VERSION"),
                "verdict": decision.verdict.label(),
                "reasons": decision.verdict.reasons(),
            }
        }
    })
}

fn sarif_run(tool: &ToolReport) -> serde_json::Value {
    let findings = tool.outcome.finding_list().unwrap_or_default();

    let rule_ids: BTreeSet<String> = findings.iter().map(rule_id).collect();
    let rules: Vec<serde_json::Value> = rule_ids
        .iter()
        .map(|id| {
            json!({
                "id": id,
                "shortDescription": { "text": id },
            })
        })
        .collect();

    let results: Vec<serde_json::Value> = findings.iter().map(sarif_result).collect();

    let notifications: Vec<serde_json::Value> = tool
        .outcome
        .failure_text()
        .map(|text| {
            vec![json!({
                "level": "error",
                "message": { "text": text },
            })]
        })
        .unwrap_or_default();

    json!({
        "tool": {
            "driver": {
                "name": tool.program,
                "rules": rules,
                "properties": { "kind": tool.kind.key() },
            }
        },
        "results": results,
        "invocations": [{
            "executionSuccessful": !tool.outcome.is_failure(),
            "toolExecutionNotifications": notifications,
        }]
    })
}

fn rule_id(finding: &Finding) -> String {
    finding
        .rule
        .clone()
        .unwrap_or_else(|| format!("{}-finding", finding.kind.key()))
}

fn level(severity: Severity) -> &'static str {
    match severity {
        Severity::Critical | Severity::High | Severity::Unknown => "error",
        Severity::Medium => "warning",
        Severity::Low => "note",
    }
}

fn sarif_result(finding: &Finding) -> serde_json::Value {
    let mut result = json!({
        "ruleId": rule_id(finding),
        "level": level(finding.severity),
        "message": { "text": finding.message },
        "properties": {
            "severity": finding.severity.symbol(),
            "confidence": match finding.confidence {
                Confidence::High => "high",
                Confidence::Low => "low",
            },
        }
    });

    if let Some(location) = &finding.location {
        let (uri, line) = split_location(location);
        let mut physical = json!({
            "artifactLocation": { "uri": uri },
        });
        if let Some(line) = line {
            physical["region"] = json!({ "startLine": line });
        }
        result["locations"] = json!([{ "physicalLocation": physical }]);
    }

    result
}

/// Split `path:line` into its parts; anything else is returned as a bare uri.
fn split_location(location: &str) -> (&str, Option<u64>) {
    match location.rsplit_once(':') {
        Some((path, line)) if !path.is_empty() => match line.parse::<u64>() {
            Ok(n) => (path, Some(n)),
            Err(_) => (location, None),
        },
        _ => (location, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ToolError;
    use crate::policy::{evaluate, Policy};
    use crate::report::{ToolKind, ToolOutcome};
    use std::path::PathBuf;

    #[test]
    fn test_sarif_output_is_valid() {
        let report = Report::new(
            PathBuf::from("/src"),
            vec![
                ToolReport {
                    kind: ToolKind::Sast,
                    program: "bandit".to_string(),
                    outcome: ToolOutcome::findings(vec![
                        Finding::new(ToolKind::Sast, Severity::Medium, "exec used")
                            .with_rule("B102")
                            .with_location("./app.py:3"),
                        Finding::new(ToolKind::Sast, Severity::Low, "exec again")
                            .with_rule("B102"),
                    ]),
                    duration_ms: 0,
                },
                ToolReport {
                    kind: ToolKind::Dependencies,
                    program: "safety".to_string(),
                    outcome: ToolOutcome::error(ToolError::execution(Some(2), "bad args")),
                    duration_ms: 0,
                },
            ],
        );
        let decision = evaluate(&report, &Policy::default());
        let sarif = to_sarif(&report, &decision);

        assert_eq!(sarif["version"], "2.1.0");
        let runs = sarif["runs"].as_array().unwrap();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0]["tool"]["driver"]["name"], "bandit");
        assert_eq!(runs[0]["tool"]["driver"]["rules"].as_array().unwrap().len(), 1);
        assert_eq!(runs[0]["results"].as_array().unwrap().len(), 2);
        assert_eq!(
            runs[0]["results"][0]["locations"][0]["physicalLocation"]["region"]["startLine"],
            3
        );
        assert_eq!(runs[1]["invocations"][0]["executionSuccessful"], false);
        assert_eq!(sarif["properties"]["scangate"]["verdict"], "fail");
    }

    #[test]
    fn test_split_location() {
        assert_eq!(split_location("a/b.py:12"), ("a/b.py", Some(12)));
        assert_eq!(split_location("django==2.2"), ("django==2.2", None));
        assert_eq!(split_location("C:thing"), ("C:thing", None));
    }
}
