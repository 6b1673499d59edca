use crate::error::ToolError;
use crate::report::{Report, ToolOutcome, ToolReport};
use crate::runner::{CommandRunner, SystemRunner};
use crate::scanner::{ScannerAdapter, ToolSpec};
use crate::target::ScanTarget;
use std::sync::Arc;
use std::time::Instant;

/// Runs every configured scanner against one target and collects the results.
///
/// Each adapter runs in its own task; results are gathered only after all of
/// them have finished. No judgment happens here.
pub struct Aggregator {
    adapters: Vec<Arc<ScannerAdapter>>,
    runner: Arc<dyn CommandRunner>,
}

impl Aggregator {
    pub fn new(specs: Vec<ToolSpec>) -> Self {
        Self::with_runner(specs, Arc::new(SystemRunner))
    }

    pub fn with_runner(specs: Vec<ToolSpec>, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            adapters: specs
                .into_iter()
                .map(|spec| Arc::new(ScannerAdapter::new(spec)))
                .collect(),
            runner,
        }
    }

    pub fn adapters(&self) -> &[Arc<ScannerAdapter>] {
        &self.adapters
    }

    pub async fn run(&self, target: &ScanTarget) -> Report {
        let mut handles = Vec::with_capacity(self.adapters.len());
        for adapter in &self.adapters {
            let task_adapter = Arc::clone(adapter);
            let runner = Arc::clone(&self.runner);
            let target = target.clone();
            let handle = tokio::spawn(async move {
                let started = Instant::now();
                let outcome = task_adapter.scan(&target, runner.as_ref()).await;
                (outcome, started.elapsed().as_millis() as u64)
            });
            handles.push((Arc::clone(adapter), handle));
        }

        let mut entries = Vec::with_capacity(handles.len());
        for (adapter, handle) in handles {
            let (outcome, duration_ms) = match handle.await {
                Ok(result) => result,
                Err(error) => {
                    tracing::error!(tool = %adapter.kind(), %error, "scanner task failed");
                    (
                        ToolOutcome::error(ToolError::internal(error.to_string())),
                        0,
                    )
                }
            };
            entries.push(ToolReport {
                kind: adapter.kind(),
                program: adapter.spec().program.clone(),
                outcome,
                duration_ms,
            });
        }

        Report::new(target.path().to_path_buf(), entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::ToolKind;
    use crate::runner::{CommandSpec, ProcessOutput, RunOutcome};
    use async_trait::async_trait;
    use std::time::Duration;

    struct CannedRunner;

    #[async_trait]
    impl CommandRunner for CannedRunner {
        async fn run(&self, spec: &CommandSpec) -> RunOutcome {
            match spec.program.as_str() {
                "bandit" => {
                    // Slow enough that a serial run would be noticeable.
                    tokio::time::sleep(Duration::from_millis(300)).await;
                    RunOutcome::Completed(ProcessOutput {
                        stdout: r#"{"results": []}"#.to_string(),
                        stderr: String::new(),
                        exit_code: Some(0),
                    })
                }
                "detect-secrets" => {
                    tokio::time::sleep(Duration::from_millis(300)).await;
                    panic!("adapter blew up");
                }
                program => RunOutcome::NotFound {
                    program: program.to_string(),
                },
            }
        }
    }

    fn specs() -> Vec<ToolSpec> {
        ToolKind::ALL.iter().map(|k| ToolSpec::default_for(*k)).collect()
    }

    #[tokio::test]
    async fn test_failures_are_isolated_per_tool() {
        let dir = tempfile::tempdir().unwrap();
        let target = ScanTarget::resolve(dir.path()).unwrap();
        let aggregator = Aggregator::with_runner(specs(), Arc::new(CannedRunner));

        let report = aggregator.run(&target).await;

        assert_eq!(
            report.outcome(ToolKind::Sast),
            Some(&ToolOutcome::findings(vec![]))
        );
        assert_eq!(
            report.outcome(ToolKind::Dependencies),
            Some(&ToolOutcome::NotInstalled {
                program: "safety".to_string()
            })
        );
        assert!(matches!(
            report.outcome(ToolKind::Secrets),
            Some(ToolOutcome::ToolError {
                error: ToolError::Internal { .. }
            })
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_adapters_run_concurrently() {
        let dir = tempfile::tempdir().unwrap();
        let target = ScanTarget::resolve(dir.path()).unwrap();
        let aggregator = Aggregator::with_runner(specs(), Arc::new(CannedRunner));

        let started = Instant::now();
        let report = aggregator.run(&target).await;
        assert_eq!(report.tools().count(), 3);
        assert!(started.elapsed() < Duration::from_millis(550));
    }
}
