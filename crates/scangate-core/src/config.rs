use crate::error::ScanError;
use crate::policy::{default_policy_toml, PolicyConfig};
use crate::report::ToolKind;
use crate::reporter::{ExitCodes, USAGE_EXIT_CODE};
use crate::scanner::{ParserKind, ToolSpec, WorkingDir};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Config file picked up from the working directory when none is given.
pub const DEFAULT_CONFIG_FILE: &str = ".scangate.toml";

/// Overrides for one tool. Unset fields keep the built-in defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToolOverride {
    pub program: Option<String>,
    pub args: Option<Vec<String>>,
    pub working_dir: Option<WorkingDir>,
    pub timeout_secs: Option<u64>,
    pub success_codes: Option<Vec<i32>>,
    pub parser: Option<ParserKind>,
    pub text_fallback: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToolsConfig {
    pub sast: Option<ToolOverride>,
    pub dependencies: Option<ToolOverride>,
    pub secrets: Option<ToolOverride>,
}

impl ToolsConfig {
    fn get(&self, kind: ToolKind) -> Option<&ToolOverride> {
        match kind {
            ToolKind::Sast => self.sast.as_ref(),
            ToolKind::Dependencies => self.dependencies.as_ref(),
            ToolKind::Secrets => self.secrets.as_ref(),
        }
    }
}

/// Full configuration, loaded from `.scangate.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScanConfig {
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(default)]
    pub policy: PolicyConfig,
    #[serde(default)]
    pub exit_codes: ExitCodes,
}

impl ScanConfig {
    /// Parse configuration from TOML text. `origin` is used in error messages.
    pub fn from_toml(content: &str, origin: &Path) -> Result<Self, ScanError> {
        let config: ScanConfig =
            toml::from_str(content).map_err(|source| ScanError::ConfigParse {
                path: origin.to_path_buf(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Resolved invocation for every tool kind, in evaluation order.
    pub fn tool_specs(&self) -> Vec<ToolSpec> {
        ToolKind::ALL
            .iter()
            .map(|kind| {
                let mut spec = ToolSpec::default_for(*kind);
                if let Some(over) = self.tools.get(*kind) {
                    apply_override(&mut spec, over);
                }
                spec
            })
            .collect()
    }

    pub fn validate(&self) -> Result<(), ScanError> {
        for spec in self.tool_specs() {
            if spec.program.trim().is_empty() {
                return Err(ScanError::InvalidConfig(format!(
                    "tools.{}.program must not be empty",
                    spec.kind
                )));
            }
            if spec.timeout_secs == 0 {
                return Err(ScanError::InvalidConfig(format!(
                    "tools.{}.timeout_secs must be greater than zero",
                    spec.kind
                )));
            }
            if spec.success_codes.is_empty() {
                return Err(ScanError::InvalidConfig(format!(
                    "tools.{}.success_codes must list at least one exit code",
                    spec.kind
                )));
            }
        }

        for kind in ToolKind::ALL {
            if let Some(rule) = self.policy.rules.get(kind) {
                if rule.unlimited == Some(true) && rule.max_findings.is_some() {
                    return Err(ScanError::InvalidConfig(format!(
                        "policy.rules.{} sets both unlimited and max_findings",
                        kind
                    )));
                }
            }
        }

        let codes = &self.exit_codes;
        for code in [codes.pass, codes.fail] {
            if !(0..=255).contains(&code) {
                return Err(ScanError::InvalidConfig(format!(
                    "exit code {} is outside the range 0-255",
                    code
                )));
            }
        }
        if codes.fail == 0 || codes.fail == codes.pass {
            return Err(ScanError::InvalidConfig(format!(
                "exit_codes.fail ({}) must be nonzero and differ from exit_codes.pass ({})",
                codes.fail, codes.pass
            )));
        }
        if codes.fail == USAGE_EXIT_CODE || codes.pass == USAGE_EXIT_CODE {
            return Err(ScanError::InvalidConfig(format!(
                "exit code {} is reserved for usage errors",
                USAGE_EXIT_CODE
            )));
        }
        Ok(())
    }

    /// Override the timeout of every tool.
    pub fn set_timeout(&mut self, timeout_secs: u64) {
        for kind in ToolKind::ALL {
            let slot = match kind {
                ToolKind::Sast => &mut self.tools.sast,
                ToolKind::Dependencies => &mut self.tools.dependencies,
                ToolKind::Secrets => &mut self.tools.secrets,
            };
            slot.get_or_insert_with(ToolOverride::default).timeout_secs = Some(timeout_secs);
        }
    }
}

fn apply_override(spec: &mut ToolSpec, over: &ToolOverride) {
    if let Some(program) = &over.program {
        spec.program = program.clone();
    }
    if let Some(args) = &over.args {
        spec.args = args.clone();
    }
    if let Some(working_dir) = over.working_dir {
        spec.working_dir = working_dir;
    }
    if let Some(timeout_secs) = over.timeout_secs {
        spec.timeout_secs = timeout_secs;
    }
    if let Some(codes) = &over.success_codes {
        spec.success_codes = codes.clone();
    }
    if let Some(parser) = over.parser {
        spec.parser = parser;
    }
    if let Some(text_fallback) = over.text_fallback {
        spec.text_fallback = text_fallback;
    }
}

/// Load configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<ScanConfig, ScanError> {
    let content = std::fs::read_to_string(path).map_err(|source| ScanError::ConfigRead {
        path: path.to_path_buf(),
        source,
    })?;
    ScanConfig::from_toml(&content, path)
}

/// Load `explicit` if given, else `.scangate.toml` in `cwd` if present, else defaults.
pub fn resolve_config(
    explicit: Option<&Path>,
    cwd: &Path,
) -> Result<(ScanConfig, Option<PathBuf>), ScanError> {
    if let Some(path) = explicit {
        return Ok((load_config(path)?, Some(path.to_path_buf())));
    }

    let candidate = cwd.join(DEFAULT_CONFIG_FILE);
    if candidate.is_file() {
        return Ok((load_config(&candidate)?, Some(candidate)));
    }
    Ok((ScanConfig::default(), None))
}

/// Generate a starter configuration file.
pub fn default_config_toml() -> String {
    let mut out = String::from(
        r#"# scangate configuration
#
# Each [tools.<kind>] table overrides the built-in invocation for that
# scanner. "{target}" in args is replaced with the absolute scan path.
# success_codes lists exit codes meaning "ran fine, output is authoritative";
# any other exit code is reported as a tool error.

[tools.sast]
program = "bandit"
args = ["-r", "-f", "json", "{target}"]
working_dir = "target"
timeout_secs = 300
success_codes = [0, 1]
parser = "bandit"

[tools.dependencies]
program = "safety"
args = ["check", "--json"]
working_dir = "inherit"
timeout_secs = 300
success_codes = [0, 64]
parser = "safety"

[tools.secrets]
program = "detect-secrets"
args = ["scan", "--all-files", "--json", "{target}"]
working_dir = "target"
timeout_secs = 300
success_codes = [0, 1]
parser = "detect-secrets"
# Guess findings from plain text when JSON is missing (low confidence).
text_fallback = false

"#,
    );
    out.push_str(&default_policy_toml());
    out.push_str(
        r#"
[exit_codes]
pass = 0
fail = 1
"#,
    );
    out
}
