pub mod json;
pub mod sarif;

use crate::policy::Verdict;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Exit code for malformed invocations, bad configuration and missing targets.
pub const USAGE_EXIT_CODE: i32 = 2;

/// Process exit codes for each verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExitCodes {
    #[serde(default = "default_pass")]
    pub pass: i32,
    #[serde(default = "default_fail")]
    pub fail: i32,
}

fn default_pass() -> i32 {
    0
}

fn default_fail() -> i32 {
    1
}

impl Default for ExitCodes {
    fn default() -> Self {
        Self {
            pass: default_pass(),
            fail: default_fail(),
        }
    }
}

impl ExitCodes {
    pub fn for_verdict(&self, verdict: &Verdict) -> i32 {
        match verdict {
            Verdict::Pass => self.pass,
            Verdict::Fail(_) => self.fail,
        }
    }
}

/// Rendering formats for the final report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    Json,
    #[default]
    Text,
    Sarif,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "text" | "human" => Ok(OutputFormat::Text),
            "sarif" => Ok(OutputFormat::Sarif),
            other => Err(format!(
                "unknown format '{}' (expected json, text or sarif)",
                other
            )),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OutputFormat::Json => "json",
            OutputFormat::Text => "text",
            OutputFormat::Sarif => "sarif",
        })
    }
}
