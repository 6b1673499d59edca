use crate::error::ToolError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// The three scanner families. Declaration order is the evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    Sast,
    Dependencies,
    Secrets,
}

impl ToolKind {
    pub const ALL: [ToolKind; 3] = [ToolKind::Sast, ToolKind::Dependencies, ToolKind::Secrets];

    pub fn key(&self) -> &'static str {
        match self {
            ToolKind::Sast => "sast",
            ToolKind::Dependencies => "dependencies",
            ToolKind::Secrets => "secrets",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ToolKind::Sast => "SAST Issues",
            ToolKind::Dependencies => "Dependency Vulnerabilities",
            ToolKind::Secrets => "Secrets Found",
        }
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for ToolKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sast" => Ok(ToolKind::Sast),
            "dependencies" | "deps" | "dependency" => Ok(ToolKind::Dependencies),
            "secrets" | "secret" => Ok(ToolKind::Secrets),
            other => Err(format!(
                "unknown tool kind '{}' (expected sast, dependencies or secrets)",
                other
            )),
        }
    }
}

/// Severity as reported by the source tool.
///
/// Ordered from least to most severe; `Unknown` sorts first but is treated
/// as meeting any severity floor by the policy engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Unknown,
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn symbol(&self) -> &str {
        match self {
            Severity::Critical => "CRITICAL",
            Severity::High => "HIGH",
            Severity::Medium => "MEDIUM",
            Severity::Low => "LOW",
            Severity::Unknown => "UNKNOWN",
        }
    }

    /// Lenient mapping of tool-specific severity words.
    pub fn from_tool(value: &str) -> Severity {
        match value.trim().to_lowercase().as_str() {
            "critical" => Severity::Critical,
            "high" | "error" => Severity::High,
            "medium" | "moderate" | "warning" => Severity::Medium,
            "low" | "info" | "note" => Severity::Low,
            _ => Severity::Unknown,
        }
    }
}

/// How much a finding can be trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    /// Parsed from the tool's structured output.
    High,
    /// Guessed from free text because structured output was unavailable.
    Low,
}

/// One normalized scanner result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub kind: ToolKind,
    pub severity: Severity,
    pub rule: Option<String>,
    pub message: String,
    pub location: Option<String>,
    pub confidence: Confidence,
}

impl Finding {
    pub fn new(kind: ToolKind, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity,
            rule: None,
            message: message.into(),
            location: None,
            confidence: Confidence::High,
        }
    }

    pub fn with_rule(mut self, rule: impl Into<String>) -> Self {
        self.rule = Some(rule.into());
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn low_confidence(mut self) -> Self {
        self.confidence = Confidence::Low;
        self
    }
}

/// Result of running one scanner. Exactly one variant holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ToolOutcome {
    Findings { findings: Vec<Finding> },
    ToolError { error: ToolError },
    Timeout { after_secs: u64 },
    NotInstalled { program: String },
}

impl ToolOutcome {
    pub fn findings(findings: Vec<Finding>) -> Self {
        ToolOutcome::Findings { findings }
    }

    pub fn error(error: ToolError) -> Self {
        ToolOutcome::ToolError { error }
    }

    /// Findings when the tool produced an authoritative result, else `None`.
    pub fn finding_list(&self) -> Option<&[Finding]> {
        match self {
            ToolOutcome::Findings { findings } => Some(findings),
            _ => None,
        }
    }

    pub fn is_failure(&self) -> bool {
        !matches!(self, ToolOutcome::Findings { .. })
    }

    pub fn status(&self) -> &'static str {
        match self {
            ToolOutcome::Findings { .. } => "ok",
            ToolOutcome::ToolError { .. } => "error",
            ToolOutcome::Timeout { .. } => "timeout",
            ToolOutcome::NotInstalled { .. } => "not_installed",
        }
    }

    /// Human-readable failure description, `None` for a successful run.
    pub fn failure_text(&self) -> Option<String> {
        match self {
            ToolOutcome::Findings { .. } => None,
            ToolOutcome::ToolError { error } => Some(format!("tool error: {}", error)),
            ToolOutcome::Timeout { after_secs } => Some(format!("timed out after {}s", after_secs)),
            ToolOutcome::NotInstalled { program } => {
                Some(format!("tool not installed ({})", program))
            }
        }
    }
}

/// Outcome of one tool plus run metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolReport {
    pub kind: ToolKind,
    pub program: String,
    pub outcome: ToolOutcome,
    pub duration_ms: u64,
}

/// Finding counts per kind. `None` means the tool gave no reliable count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Totals {
    pub sast: Option<usize>,
    pub dependencies: Option<usize>,
    pub secrets: Option<usize>,
}

impl Totals {
    pub fn get(&self, kind: ToolKind) -> Option<usize> {
        match kind {
            ToolKind::Sast => self.sast,
            ToolKind::Dependencies => self.dependencies,
            ToolKind::Secrets => self.secrets,
        }
    }
}

/// The aggregated result of one orchestrator run. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    target: PathBuf,
    generated_at: DateTime<Utc>,
    tools: BTreeMap<ToolKind, ToolReport>,
}

impl Report {
    pub fn new(target: PathBuf, entries: impl IntoIterator<Item = ToolReport>) -> Self {
        let tools = entries
            .into_iter()
            .map(|entry| (entry.kind, entry))
            .collect();
        Self {
            target,
            generated_at: Utc::now(),
            tools,
        }
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    pub fn generated_at(&self) -> DateTime<Utc> {
        self.generated_at
    }

    pub fn tool(&self, kind: ToolKind) -> Option<&ToolReport> {
        self.tools.get(&kind)
    }

    pub fn outcome(&self, kind: ToolKind) -> Option<&ToolOutcome> {
        self.tools.get(&kind).map(|t| &t.outcome)
    }

    /// Tool reports in evaluation order.
    pub fn tools(&self) -> impl Iterator<Item = &ToolReport> {
        self.tools.values()
    }

    pub fn totals(&self) -> Totals {
        let count = |kind| {
            self.outcome(kind)
                .and_then(|o| o.finding_list())
                .map(|f| f.len())
        };
        Totals {
            sast: count(ToolKind::Sast),
            dependencies: count(ToolKind::Dependencies),
            secrets: count(ToolKind::Secrets),
        }
    }

    pub fn has_errors(&self) -> bool {
        self.tools.values().any(|t| t.outcome.is_failure())
    }

    pub fn total_findings(&self) -> usize {
        self.tools
            .values()
            .filter_map(|t| t.outcome.finding_list())
            .map(|f| f.len())
            .sum()
    }

    /// Same report with a different timestamp; used when comparing runs.
    pub fn eq_ignoring_timing(&self, other: &Report) -> bool {
        self.target == other.target
            && self.tools.len() == other.tools.len()
            && self.tools.iter().zip(other.tools.iter()).all(|((ka, a), (kb, b))| {
                ka == kb && a.program == b.program && a.outcome == b.outcome
            })
    }
}
