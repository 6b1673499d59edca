use crate::report::{Confidence, Finding, Report, Severity, ToolKind, ToolOutcome};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Named decision policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PolicyPreset {
    /// Any tool failure or any finding fails the gate.
    #[default]
    Strict,
    /// Tool failures fail the gate; findings are reported only.
    ErrorsOnly,
    /// Nothing fails the gate; everything is reported.
    Advisory,
}

impl PolicyPreset {
    pub fn name(&self) -> &'static str {
        match self {
            PolicyPreset::Strict => "strict",
            PolicyPreset::ErrorsOnly => "errors-only",
            PolicyPreset::Advisory => "advisory",
        }
    }
}

impl fmt::Display for PolicyPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PolicyPreset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "strict" => Ok(PolicyPreset::Strict),
            "errors-only" | "errors_only" => Ok(PolicyPreset::ErrorsOnly),
            "advisory" => Ok(PolicyPreset::Advisory),
            other => Err(format!(
                "unknown policy '{}' (expected strict, errors-only or advisory)",
                other
            )),
        }
    }
}

/// Threshold predicate and failure handling for one tool kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolRule {
    /// Report problems with this tool without affecting the verdict.
    pub advisory: bool,
    /// Largest acceptable number of counted findings; `None` = unlimited.
    pub max_findings: Option<usize>,
    /// Only findings at or above this severity are counted.
    pub min_severity: Option<Severity>,
}

impl ToolRule {
    pub const ZERO_TOLERANCE: ToolRule = ToolRule {
        advisory: false,
        max_findings: Some(0),
        min_severity: None,
    };

    /// Findings that count against `max_findings`. Unknown severity always counts.
    fn counted<'a>(&self, findings: &'a [Finding]) -> Vec<&'a Finding> {
        findings
            .iter()
            .filter(|f| match self.min_severity {
                Some(floor) => f.severity == Severity::Unknown || f.severity >= floor,
                None => true,
            })
            .collect()
    }
}

/// Per-tool overrides applied on top of a preset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleOverride {
    pub advisory: Option<bool>,
    pub max_findings: Option<usize>,
    /// `true` lifts the preset's finding limit. Conflicts with `max_findings`.
    pub unlimited: Option<bool>,
    /// `unknown` clears the preset's floor, counting every finding.
    pub min_severity: Option<Severity>,
}

/// The `[policy]` section of the configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicyConfig {
    #[serde(default)]
    pub preset: PolicyPreset,
    #[serde(default)]
    pub rules: PolicyRules,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicyRules {
    pub sast: Option<RuleOverride>,
    pub dependencies: Option<RuleOverride>,
    pub secrets: Option<RuleOverride>,
}

impl PolicyRules {
    pub fn get(&self, kind: ToolKind) -> Option<&RuleOverride> {
        match kind {
            ToolKind::Sast => self.sast.as_ref(),
            ToolKind::Dependencies => self.dependencies.as_ref(),
            ToolKind::Secrets => self.secrets.as_ref(),
        }
    }
}

/// A complete decision policy: one rule per tool kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Policy {
    pub name: String,
    rules: BTreeMap<ToolKind, ToolRule>,
}

impl Policy {
    pub fn from_preset(preset: PolicyPreset) -> Self {
        let rule = match preset {
            PolicyPreset::Strict => ToolRule::ZERO_TOLERANCE,
            PolicyPreset::ErrorsOnly => ToolRule {
                advisory: false,
                max_findings: None,
                min_severity: None,
            },
            PolicyPreset::Advisory => ToolRule {
                advisory: true,
                ..ToolRule::ZERO_TOLERANCE
            },
        };
        Self {
            name: preset.name().to_string(),
            rules: ToolKind::ALL.iter().map(|k| (*k, rule)).collect(),
        }
    }

    pub fn from_config(config: &PolicyConfig) -> Self {
        let mut policy = Self::from_preset(config.preset);
        for kind in ToolKind::ALL {
            if let Some(over) = config.rules.get(kind) {
                policy.apply(kind, over);
            }
        }
        policy
    }

    pub fn apply(&mut self, kind: ToolKind, over: &RuleOverride) {
        let rule = self.rules.entry(kind).or_insert(ToolRule::ZERO_TOLERANCE);
        if let Some(advisory) = over.advisory {
            rule.advisory = advisory;
        }
        if over.unlimited == Some(true) {
            rule.max_findings = None;
        } else if over.max_findings.is_some() {
            rule.max_findings = over.max_findings;
        }
        match over.min_severity {
            Some(Severity::Unknown) => rule.min_severity = None,
            Some(floor) => rule.min_severity = Some(floor),
            None => {}
        }
    }

    pub fn set_advisory(&mut self, kind: ToolKind) {
        self.apply(
            kind,
            &RuleOverride {
                advisory: Some(true),
                ..Default::default()
            },
        );
    }

    pub fn rule(&self, kind: ToolKind) -> ToolRule {
        self.rules
            .get(&kind)
            .copied()
            .unwrap_or(ToolRule::ZERO_TOLERANCE)
    }
}

impl Default for Policy {
    fn default() -> Self {
        Self::from_preset(PolicyPreset::Strict)
    }
}

/// Final pass/fail judgment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "verdict", content = "reasons", rename_all = "lowercase")]
pub enum Verdict {
    Pass,
    Fail(Vec<String>),
}

impl Verdict {
    pub fn is_pass(&self) -> bool {
        matches!(self, Verdict::Pass)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Verdict::Pass => "pass",
            Verdict::Fail(_) => "fail",
        }
    }

    pub fn reasons(&self) -> &[String] {
        match self {
            Verdict::Pass => &[],
            Verdict::Fail(reasons) => reasons,
        }
    }
}

/// Verdict plus observations from advisory tools that did not affect it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Decision {
    pub verdict: Verdict,
    pub advisories: Vec<String>,
}

/// Apply `policy` to `report`, visiting tool kinds in declared order.
///
/// Every failing rule contributes a reason; evaluation does not stop at the
/// first one.
pub fn evaluate(report: &Report, policy: &Policy) -> Decision {
    let mut reasons = Vec::new();
    let mut advisories = Vec::new();

    for kind in ToolKind::ALL {
        let rule = policy.rule(kind);
        let problem = match report.outcome(kind) {
            None => Some(format!("{}: no result recorded", kind)),
            Some(outcome) => check_outcome(kind, outcome, &rule),
        };

        if let Some(problem) = problem {
            if rule.advisory {
                advisories.push(problem);
            } else {
                reasons.push(problem);
            }
        }
    }

    let verdict = if reasons.is_empty() {
        Verdict::Pass
    } else {
        Verdict::Fail(reasons)
    };

    tracing::info!(policy = %policy.name, verdict = verdict.label(), "decision made");

    Decision {
        verdict,
        advisories,
    }
}

fn check_outcome(kind: ToolKind, outcome: &ToolOutcome, rule: &ToolRule) -> Option<String> {
    let findings = match outcome.finding_list() {
        Some(findings) => findings,
        None => {
            return Some(format!(
                "{}: {}",
                kind,
                outcome.failure_text().unwrap_or_default()
            ))
        }
    };

    let max = rule.max_findings?;
    let counted = rule.counted(findings);
    if counted.len() <= max {
        return None;
    }

    let mut reason = match rule.min_severity {
        Some(floor) => format!(
            "{}: {} findings at or above {} exceed threshold",
            kind,
            counted.len(),
            floor.symbol()
        ),
        None => format!("{}: {} findings exceed threshold", kind, counted.len()),
    };
    let low = counted
        .iter()
        .filter(|f| f.confidence == Confidence::Low)
        .count();
    if low > 0 {
        reason.push_str(&format!(" ({} low-confidence)", low));
    }
    Some(reason)
}

/// Generate the `[policy]` section of a starter config file.
pub fn default_policy_toml() -> String {
    r#"[policy]
# strict: tool failures and any finding fail the gate
# errors-only: only tool failures fail the gate
# advisory: report everything, never fail
preset = "strict"

# Per-tool overrides. Unset keys keep the preset's value.
# [policy.rules.dependencies]
# min_severity = "high"   # count only high/critical (unknown always counts)
# max_findings = 0

# [policy.rules.secrets]
# advisory = true

# [policy.rules.sast]
# unlimited = true        # report findings without failing on them
# min_severity = "unknown" # drop the preset's severity floor
"#
    .to_string()
}
