use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Maximum length of any tool diagnostic embedded in a report.
pub const MAX_DIAGNOSTIC_CHARS: usize = 200;

/// Fatal errors raised before any scanner runs.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("target path '{0}' does not exist")]
    TargetNotFound(PathBuf),

    #[error("target path '{path}' is not readable: {source}")]
    TargetNotReadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read config file '{path}': {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Why a scanner did not produce an authoritative finding list.
///
/// Captured into the tool's outcome; never aborts the run.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolError {
    /// The process exited with a code outside the tool's success set,
    /// or was terminated by a signal (`code` is `None`).
    #[error("{}: {diagnostic}", describe_exit(.code))]
    Execution {
        code: Option<i32>,
        diagnostic: String,
    },

    /// The process ran successfully but stdout was not in the expected format.
    #[error("unparseable output: {detail}")]
    Parse { detail: String },

    /// The process could not be started for a reason other than a missing executable.
    #[error("failed to start: {detail}")]
    Spawn { detail: String },

    /// The adapter task itself failed (panic or cancellation).
    #[error("internal failure: {detail}")]
    Internal { detail: String },
}

impl ToolError {
    pub fn execution(code: Option<i32>, diagnostic: &str) -> Self {
        ToolError::Execution {
            code,
            diagnostic: truncate_diagnostic(diagnostic),
        }
    }

    pub fn parse(detail: impl AsRef<str>) -> Self {
        ToolError::Parse {
            detail: truncate_diagnostic(detail.as_ref()),
        }
    }

    pub fn spawn(detail: impl AsRef<str>) -> Self {
        ToolError::Spawn {
            detail: truncate_diagnostic(detail.as_ref()),
        }
    }

    pub fn internal(detail: impl AsRef<str>) -> Self {
        ToolError::Internal {
            detail: truncate_diagnostic(detail.as_ref()),
        }
    }
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exited with code {}", code),
        None => "terminated by signal".to_string(),
    }
}

/// Trim and cap a diagnostic at [`MAX_DIAGNOSTIC_CHARS`] characters.
pub fn truncate_diagnostic(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= MAX_DIAGNOSTIC_CHARS {
        return trimmed.to_string();
    }
    let mut out: String = trimmed.chars().take(MAX_DIAGNOSTIC_CHARS).collect();
    out.push_str("...");
    out
}
