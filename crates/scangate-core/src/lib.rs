pub mod aggregator;
pub mod config;
pub mod error;
pub mod policy;
pub mod report;
pub mod reporter;
pub mod runner;
pub mod scanner;
pub mod target;

pub use aggregator::Aggregator;
pub use config::ScanConfig;
pub use error::{ScanError, ToolError};
pub use policy::{Decision, Policy, PolicyPreset, Verdict};
pub use report::{Confidence, Finding, Report, Severity, ToolKind, ToolOutcome};
pub use reporter::{ExitCodes, OutputFormat, USAGE_EXIT_CODE};
pub use runner::{CommandRunner, SystemRunner};
pub use scanner::{ScannerAdapter, ToolSpec};
pub use target::ScanTarget;
