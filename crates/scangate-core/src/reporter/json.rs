use crate::policy::{Decision, Policy};
use crate::report::{Report, ToolKind};
use serde_json::{json, Map, Value};

/// Render the stable machine-readable report.
///
/// Each tool entry carries either a finding list with `error: null`, or an
/// empty list with a non-null `error`. Totals are `null` for tools that gave
/// no reliable count.
pub fn to_json(report: &Report, decision: &Decision, policy: &Policy) -> Value {
    let mut root = Map::new();
    root.insert(
        "target".to_string(),
        json!(report.target().display().to_string()),
    );
    root.insert(
        "generated_at".to_string(),
        json!(report.generated_at().to_rfc3339()),
    );
    root.insert("policy".to_string(), json!(policy.name));

    for kind in ToolKind::ALL {
        root.insert(kind.key().to_string(), tool_entry(report, kind, policy));
    }

    let totals = report.totals();
    root.insert(
        "totals".to_string(),
        json!({
            "sast": totals.sast,
            "dependencies": totals.dependencies,
            "secrets": totals.secrets,
        }),
    );
    root.insert("verdict".to_string(), json!(decision.verdict.label()));
    root.insert("reasons".to_string(), json!(decision.verdict.reasons()));
    root.insert("advisories".to_string(), json!(decision.advisories));

    Value::Object(root)
}

fn tool_entry(report: &Report, kind: ToolKind, policy: &Policy) -> Value {
    let advisory = policy.rule(kind).advisory;
    match report.tool(kind) {
        Some(tool) => json!({
            "tool": tool.program,
            "status": tool.outcome.status(),
            "advisory": advisory,
            "findings": tool.outcome.finding_list().unwrap_or_default(),
            "error": tool.outcome.failure_text(),
            "duration_ms": tool.duration_ms,
        }),
        None => json!({
            "tool": Value::Null,
            "status": "missing",
            "advisory": advisory,
            "findings": [],
            "error": "no result recorded",
            "duration_ms": Value::Null,
        }),
    }
}
