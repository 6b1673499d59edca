pub mod bandit;
pub mod detect_secrets;
pub mod heuristic;
pub mod safety;

use crate::error::ToolError;
use crate::report::{Finding, ToolKind, ToolOutcome};
use crate::runner::{CommandRunner, CommandSpec, RunOutcome};
use crate::target::ScanTarget;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Placeholder in tool arguments replaced by the absolute target path.
pub const TARGET_PLACEHOLDER: &str = "{target}";

pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Where a tool process should run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkingDir {
    /// Inside the scan target (its parent directory for a file target).
    Target,
    /// The orchestrator's own working directory.
    Inherit,
}

/// Native output format of a scanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ParserKind {
    Bandit,
    Safety,
    DetectSecrets,
}

impl ParserKind {
    pub fn parse(&self, kind: ToolKind, stdout: &str) -> Result<Vec<Finding>, String> {
        match self {
            ParserKind::Bandit => bandit::parse(kind, stdout),
            ParserKind::Safety => safety::parse(kind, stdout),
            ParserKind::DetectSecrets => detect_secrets::parse(kind, stdout),
        }
    }
}

/// Declarative description of one scanner invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub kind: ToolKind,
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: WorkingDir,
    pub timeout_secs: u64,
    /// Exit codes meaning "ran successfully, stdout is authoritative".
    pub success_codes: Vec<i32>,
    pub parser: ParserKind,
    /// Fall back to low-confidence text matching when stdout is unparseable.
    pub text_fallback: bool,
}

impl ToolSpec {
    /// Built-in invocation for each tool kind.
    pub fn default_for(kind: ToolKind) -> Self {
        let (program, args, working_dir, success_codes, parser) = match kind {
            ToolKind::Sast => (
                "bandit",
                vec!["-r", "-f", "json", TARGET_PLACEHOLDER],
                WorkingDir::Target,
                vec![0, 1],
                ParserKind::Bandit,
            ),
            ToolKind::Dependencies => (
                "safety",
                vec!["check", "--json"],
                WorkingDir::Inherit,
                vec![0, 64],
                ParserKind::Safety,
            ),
            ToolKind::Secrets => (
                "detect-secrets",
                vec!["scan", "--all-files", "--json", TARGET_PLACEHOLDER],
                WorkingDir::Target,
                vec![0, 1],
                ParserKind::DetectSecrets,
            ),
        };

        Self {
            kind,
            program: program.to_string(),
            args: args.into_iter().map(String::from).collect(),
            working_dir,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            success_codes,
            parser,
            text_fallback: false,
        }
    }

    /// Resolve placeholders and working directory against a target.
    pub fn command_for(&self, target: &ScanTarget) -> CommandSpec {
        let target_str = target.path().to_string_lossy();
        CommandSpec {
            program: self.program.clone(),
            args: self
                .args
                .iter()
                .map(|arg| arg.replace(TARGET_PLACEHOLDER, &target_str))
                .collect(),
            cwd: match self.working_dir {
                WorkingDir::Target => Some(target.root_dir().to_path_buf()),
                WorkingDir::Inherit => None,
            },
            timeout: Duration::from_secs(self.timeout_secs),
        }
    }

    pub fn is_success_code(&self, code: Option<i32>) -> bool {
        code.is_some_and(|c| self.success_codes.contains(&c))
    }
}

/// Runs one configured scanner and turns whatever happened into a [`ToolOutcome`].
#[derive(Debug, Clone)]
pub struct ScannerAdapter {
    spec: ToolSpec,
}

impl ScannerAdapter {
    pub fn new(spec: ToolSpec) -> Self {
        Self { spec }
    }

    pub fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    pub fn kind(&self) -> ToolKind {
        self.spec.kind
    }

    pub async fn scan(&self, target: &ScanTarget, runner: &dyn CommandRunner) -> ToolOutcome {
        let command = self.spec.command_for(target);
        tracing::info!(tool = %self.spec.kind, command = %command.display(), "running scanner");

        let raw = runner.run(&command).await;
        let outcome = self.interpret(raw);

        match &outcome {
            ToolOutcome::Findings { findings } => {
                tracing::info!(
                    tool = %self.spec.kind,
                    findings = findings.len(),
                    "scanner finished"
                )
            }
            other => {
                tracing::warn!(
                    tool = %self.spec.kind,
                    status = other.status(),
                    detail = %other.failure_text().unwrap_or_default(),
                    "scanner did not produce a usable result"
                )
            }
        }
        outcome
    }

    /// Map a raw process result onto a tool outcome.
    pub fn interpret(&self, raw: RunOutcome) -> ToolOutcome {
        let output = match raw {
            RunOutcome::Completed(output) => output,
            RunOutcome::TimedOut { after } => {
                return ToolOutcome::Timeout {
                    after_secs: after.as_secs(),
                }
            }
            RunOutcome::NotFound { program } => return ToolOutcome::NotInstalled { program },
            RunOutcome::SpawnFailed { detail } => {
                return ToolOutcome::error(ToolError::spawn(detail))
            }
        };

        if !self.spec.is_success_code(output.exit_code) {
            let diagnostic = if output.stderr.trim().is_empty() {
                &output.stdout
            } else {
                &output.stderr
            };
            return ToolOutcome::error(ToolError::execution(output.exit_code, diagnostic));
        }

        match self.spec.parser.parse(self.spec.kind, &output.stdout) {
            Ok(findings) => ToolOutcome::findings(findings),
            Err(detail) => {
                if self.spec.text_fallback {
                    let guessed =
                        heuristic::sniff(self.spec.kind, &output.stdout, &output.stderr);
                    if !guessed.is_empty() {
                        tracing::warn!(
                            tool = %self.spec.kind,
                            findings = guessed.len(),
                            "structured output unavailable, using low-confidence text matches"
                        );
                        return ToolOutcome::findings(guessed);
                    }
                }
                tracing::debug!(tool = %self.spec.kind, %detail, "failed to parse scanner output");
                ToolOutcome::error(ToolError::parse(detail))
            }
        }
    }
}

/// Shorten tool output for use in a parse diagnostic.
pub(crate) fn excerpt(text: &str) -> String {
    let first = text.trim().lines().next().unwrap_or("");
    if first.is_empty() {
        "<empty output>".to_string()
    } else {
        first.chars().take(60).collect()
    }
}
