use async_trait::async_trait;
use scangate_core::config::ScanConfig;
use scangate_core::policy::{self, Policy, PolicyPreset, Verdict};
use scangate_core::reporter::{json, ExitCodes};
use scangate_core::runner::{CommandRunner, CommandSpec, ProcessOutput, RunOutcome};
use scangate_core::{Aggregator, ScanTarget, ToolError, ToolKind, ToolOutcome};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Get the workspace-level fixtures directory (two levels up from this crate).
fn fixtures_dir() -> PathBuf {
    let manifest_dir = env!("CARGO_MANIFEST_DIR");
    Path::new(manifest_dir)
        .parent()
        .unwrap() // crates/
        .parent()
        .unwrap() // workspace root
        .join("tests/fixtures")
}

fn fixture(tool: &str, name: &str) -> String {
    std::fs::read_to_string(fixtures_dir().join(tool).join(name)).unwrap()
}

/// Replays canned process results keyed by program name.
struct ScriptedRunner {
    outcomes: HashMap<String, RunOutcome>,
    calls: AtomicUsize,
}

impl ScriptedRunner {
    fn new(outcomes: Vec<(&str, RunOutcome)>) -> Self {
        Self {
            outcomes: outcomes
                .into_iter()
                .map(|(program, outcome)| (program.to_string(), outcome))
                .collect(),
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, spec: &CommandSpec) -> RunOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.outcomes
            .get(&spec.program)
            .cloned()
            .unwrap_or_else(|| RunOutcome::NotFound {
                program: spec.program.clone(),
            })
    }
}

fn exited(code: i32, stdout: String) -> RunOutcome {
    RunOutcome::Completed(ProcessOutput {
        stdout,
        stderr: String::new(),
        exit_code: Some(code),
    })
}

fn clean_outcomes() -> Vec<(&'static str, RunOutcome)> {
    vec![
        ("bandit", exited(0, fixture("bandit", "clean.json"))),
        ("safety", exited(0, fixture("safety", "clean.json"))),
        ("detect-secrets", exited(0, fixture("detect-secrets", "clean.json"))),
    ]
}

async fn scan(
    runner: Arc<ScriptedRunner>,
    policy: &Policy,
) -> (scangate_core::Report, policy::Decision) {
    let dir = tempfile::tempdir().unwrap();
    let target = ScanTarget::resolve(dir.path()).unwrap();
    let aggregator = Aggregator::with_runner(ScanConfig::default().tool_specs(), runner);
    let report = aggregator.run(&target).await;
    let decision = policy::evaluate(&report, policy);
    (report, decision)
}

// ─── Scenarios ───

#[tokio::test]
async fn test_all_clean_passes_with_exit_zero() {
    let runner = Arc::new(ScriptedRunner::new(clean_outcomes()));
    let (report, decision) = scan(runner.clone(), &Policy::default()).await;

    assert_eq!(runner.calls(), 3);
    assert!(!report.has_errors());
    assert_eq!(decision.verdict, Verdict::Pass);
    assert_eq!(ExitCodes::default().for_verdict(&decision.verdict), 0);
}

#[tokio::test]
async fn test_sast_exit_one_with_two_issues_fails() {
    let mut outcomes = clean_outcomes();
    outcomes[0] = ("bandit", exited(1, fixture("bandit", "two-issues.json")));
    let runner = Arc::new(ScriptedRunner::new(outcomes));
    let (report, decision) = scan(runner, &Policy::default()).await;

    assert_eq!(
        decision.verdict,
        Verdict::Fail(vec!["sast: 2 findings exceed threshold".to_string()])
    );
    let totals = report.totals();
    assert_eq!(totals.sast, Some(2));
    assert_eq!(totals.dependencies, Some(0));
    assert_eq!(totals.secrets, Some(0));
    assert_ne!(ExitCodes::default().for_verdict(&decision.verdict), 0);
}

#[tokio::test]
async fn test_dependency_tool_not_installed_fails_strict() {
    let outcomes = clean_outcomes()
        .into_iter()
        .filter(|(program, _)| *program != "safety")
        .collect();
    let runner = Arc::new(ScriptedRunner::new(outcomes));
    let (report, decision) = scan(runner, &Policy::default()).await;

    assert_eq!(
        report.outcome(ToolKind::Dependencies),
        Some(&ToolOutcome::NotInstalled {
            program: "safety".to_string()
        })
    );
    assert_eq!(
        decision.verdict.reasons(),
        &["dependencies: tool not installed (safety)".to_string()]
    );
}

#[tokio::test]
async fn test_timeout_and_execution_error_name_the_tool() {
    let runner = Arc::new(ScriptedRunner::new(vec![
        ("bandit", exited(1, fixture("bandit", "two-issues.json"))),
        (
            "safety",
            RunOutcome::TimedOut {
                after: Duration::from_secs(300),
            },
        ),
        (
            "detect-secrets",
            RunOutcome::Completed(ProcessOutput {
                stdout: String::new(),
                stderr: "error: unrecognized arguments: --all-files".to_string(),
                exit_code: Some(2),
            }),
        ),
    ]));
    let (_, decision) = scan(runner, &Policy::from_preset(PolicyPreset::ErrorsOnly)).await;

    let reasons = decision.verdict.reasons();
    assert_eq!(reasons.len(), 2);
    assert_eq!(reasons[0], "dependencies: timed out after 300s");
    assert!(reasons[1].starts_with("secrets: tool error: exited with code 2"));
}

#[tokio::test]
async fn test_parse_failure_is_flagged_not_zero() {
    let mut outcomes = clean_outcomes();
    outcomes[2] = ("detect-secrets", exited(0, "Scanning...done".to_string()));
    let runner = Arc::new(ScriptedRunner::new(outcomes));
    let (report, decision) = scan(runner, &Policy::default()).await;

    assert!(matches!(
        report.outcome(ToolKind::Secrets),
        Some(ToolOutcome::ToolError {
            error: ToolError::Parse { .. }
        })
    ));
    assert_eq!(report.totals().secrets, None);
    assert!(!decision.verdict.is_pass());

    let value = json::to_json(&report, &decision, &Policy::default());
    assert!(value["totals"]["secrets"].is_null());
    assert!(value["secrets"]["error"].is_string());
}

#[tokio::test]
async fn test_normalized_counts_match_raw_entries() {
    let runner = Arc::new(ScriptedRunner::new(vec![
        ("bandit", exited(1, fixture("bandit", "two-issues.json"))),
        ("safety", exited(64, fixture("safety", "vulnerable.json"))),
        ("detect-secrets", exited(0, fixture("detect-secrets", "two-secrets.json"))),
    ]));
    let (report, decision) = scan(runner, &Policy::default()).await;

    let totals = report.totals();
    assert_eq!(totals.sast, Some(2));
    assert_eq!(totals.dependencies, Some(2));
    assert_eq!(totals.secrets, Some(2));
    assert_eq!(decision.verdict.reasons().len(), 3);
}

#[tokio::test]
async fn test_repeated_runs_are_identical() {
    let mut outcomes = clean_outcomes();
    outcomes[0] = ("bandit", exited(1, fixture("bandit", "two-issues.json")));
    let runner = Arc::new(ScriptedRunner::new(outcomes));

    let (first, first_decision) = scan(runner.clone(), &Policy::default()).await;
    let (second, second_decision) = scan(runner, &Policy::default()).await;

    // Targets differ per tempdir; compare tool outcomes only.
    for kind in ToolKind::ALL {
        assert_eq!(first.outcome(kind), second.outcome(kind));
    }
    assert_eq!(first.totals(), second.totals());
    assert_eq!(first_decision, second_decision);
}

#[tokio::test]
async fn test_same_target_reports_compare_equal_ignoring_timing() {
    let dir = tempfile::tempdir().unwrap();
    let target = ScanTarget::resolve(dir.path()).unwrap();
    let runner = Arc::new(ScriptedRunner::new(clean_outcomes()));
    let aggregator = Aggregator::with_runner(ScanConfig::default().tool_specs(), runner);

    let first = aggregator.run(&target).await;
    let second = aggregator.run(&target).await;
    assert!(first.eq_ignoring_timing(&second));
}

#[tokio::test]
async fn test_severity_floor_from_config() {
    let config = ScanConfig::from_toml(
        r#"
[policy.rules.dependencies]
min_severity = "high"
"#,
        Path::new("inline.toml"),
    )
    .unwrap();
    let policy = Policy::from_config(&config.policy);

    let mut outcomes = clean_outcomes();
    outcomes[1] = ("safety", exited(64, fixture("safety", "vulnerable.json")));
    let runner = Arc::new(ScriptedRunner::new(outcomes));
    let (_, decision) = scan(runner, &policy).await;

    // One HIGH plus one with no severity, which always counts.
    assert_eq!(
        decision.verdict.reasons(),
        &["dependencies: 2 findings at or above HIGH exceed threshold".to_string()]
    );
}

// ─── Real processes ───

#[cfg(unix)]
mod processes {
    use super::*;
    use scangate_core::scanner::ToolSpec;
    use std::os::unix::fs::PermissionsExt;

    fn fake_tool(dir: &Path, name: &str, body: &str) -> String {
        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path.to_string_lossy().into_owned()
    }

    fn specs(sast: String, deps: String, secrets: String, timeout_secs: u64) -> Vec<ToolSpec> {
        let mut specs = ScanConfig::default().tool_specs();
        for (spec, program) in specs.iter_mut().zip([sast, deps, secrets]) {
            spec.program = program;
            spec.timeout_secs = timeout_secs;
        }
        specs
    }

    #[tokio::test]
    async fn test_end_to_end_with_fake_tools() {
        let bin = tempfile::tempdir().unwrap();
        let target_dir = tempfile::tempdir().unwrap();
        let bandit_json = fixtures_dir().join("bandit/two-issues.json");

        let sast = fake_tool(
            bin.path(),
            "bandit",
            &format!("cat '{}'\nexit 1", bandit_json.display()),
        );
        let deps = fake_tool(bin.path(), "safety", "echo '[]'");
        let secrets = fake_tool(bin.path(), "detect-secrets", "echo '{\"results\": {}}'");

        let target = ScanTarget::resolve(target_dir.path()).unwrap();
        let report = Aggregator::new(specs(sast, deps, secrets, 30))
            .run(&target)
            .await;
        let decision = policy::evaluate(&report, &Policy::default());

        assert_eq!(report.totals().sast, Some(2));
        assert_eq!(report.totals().dependencies, Some(0));
        assert_eq!(report.totals().secrets, Some(0));
        assert_eq!(
            decision.verdict.reasons(),
            &["sast: 2 findings exceed threshold".to_string()]
        );
    }

    #[tokio::test]
    async fn test_hung_tool_times_out_without_blocking_siblings() {
        let bin = tempfile::tempdir().unwrap();
        let target_dir = tempfile::tempdir().unwrap();

        let sast = fake_tool(bin.path(), "bandit", "echo '{\"results\": []}'");
        let deps = fake_tool(bin.path(), "safety", "sleep 30");
        let secrets = fake_tool(bin.path(), "detect-secrets", "echo '{\"results\": {}}'");

        let target = ScanTarget::resolve(target_dir.path()).unwrap();
        let started = std::time::Instant::now();
        let report = Aggregator::new(specs(sast, deps, secrets, 1))
            .run(&target)
            .await;

        assert!(started.elapsed() < Duration::from_secs(15));
        assert_eq!(
            report.outcome(ToolKind::Dependencies),
            Some(&ToolOutcome::Timeout { after_secs: 1 })
        );
        assert_eq!(report.totals().sast, Some(0));
        assert_eq!(report.totals().secrets, Some(0));
    }

    #[tokio::test]
    async fn test_tools_run_inside_target() {
        let bin = tempfile::tempdir().unwrap();
        let target_dir = tempfile::tempdir().unwrap();
        std::fs::write(target_dir.path().join("app.py"), "x = 1\n").unwrap();

        // Only reports a finding when started in the target directory.
        let sast = fake_tool(
            bin.path(),
            "bandit",
            r#"if [ -f app.py ]; then echo '{"results": [{"filename": "./app.py", "issue_severity": "LOW", "issue_text": "found"}]}'; else echo '{"results": []}'; fi"#,
        );
        let deps = fake_tool(bin.path(), "safety", "echo '[]'");
        let secrets = fake_tool(bin.path(), "detect-secrets", "echo '{\"results\": {}}'");

        let target = ScanTarget::resolve(target_dir.path()).unwrap();
        let report = Aggregator::new(specs(sast, deps, secrets, 30))
            .run(&target)
            .await;
        assert_eq!(report.totals().sast, Some(1));
    }

    #[tokio::test]
    async fn test_file_target_ignores_sibling_files() {
        let bin = tempfile::tempdir().unwrap();
        let target_dir = tempfile::tempdir().unwrap();
        std::fs::write(target_dir.path().join("app.py"), "x = 1\n").unwrap();
        std::fs::write(target_dir.path().join("other.py"), "eval(x)\n").unwrap();

        // One finding per .py file under the last argument.
        let sast = fake_tool(
            bin.path(),
            "bandit",
            r#"for last; do :; done
entries=""
for f in $(find "$last" -name '*.py'); do
  entries="$entries{\"filename\": \"$f\", \"issue_severity\": \"LOW\", \"issue_text\": \"seen\"},"
done
echo "{\"results\": [${entries%,}]}""#,
        );
        let deps = fake_tool(bin.path(), "safety", "echo '[]'");
        let secrets = fake_tool(bin.path(), "detect-secrets", "echo '{\"results\": {}}'");

        let target = ScanTarget::resolve(&target_dir.path().join("app.py")).unwrap();
        let report = Aggregator::new(specs(sast, deps, secrets, 30))
            .run(&target)
            .await;
        assert_eq!(report.totals().sast, Some(1));
    }
}
