use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;

/// A fully resolved command line, ready to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub timeout: Duration,
}

impl CommandSpec {
    pub fn display(&self) -> String {
        let mut parts = vec![self.program.clone()];
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }
}

/// Captured output of a process that ran to completion.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProcessOutput {
    pub stdout: String,
    pub stderr: String,
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
}

/// Everything that can happen when running one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Completed(ProcessOutput),
    TimedOut { after: Duration },
    NotFound { program: String },
    SpawnFailed { detail: String },
}

/// Executes commands. Implementations must capture every failure as a
/// [`RunOutcome`] instead of returning an error.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, spec: &CommandSpec) -> RunOutcome;
}

/// Runs commands as real child processes with tokio.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn run(&self, spec: &CommandSpec) -> RunOutcome {
        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(dir) = &spec.cwd {
            cmd.current_dir(dir);
        }
        // Own process group, so a timeout can take down anything the tool started.
        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(error) if error.kind() == ErrorKind::NotFound => {
                // A missing cwd also surfaces as NotFound; only blame the program
                // when the directory is fine.
                if spec.cwd.as_ref().is_some_and(|dir| !dir.is_dir()) {
                    return RunOutcome::SpawnFailed {
                        detail: format!("working directory unavailable: {}", error),
                    };
                }
                return RunOutcome::NotFound {
                    program: spec.program.clone(),
                };
            }
            Err(error) => {
                return RunOutcome::SpawnFailed {
                    detail: format!("failed to spawn '{}': {}", spec.program, error),
                }
            }
        };

        let pid = child.id();
        let stdout_task = tokio::spawn(read_all(child.stdout.take()));
        let stderr_task = tokio::spawn(read_all(child.stderr.take()));
        let stdout_abort = stdout_task.abort_handle();
        let stderr_abort = stderr_task.abort_handle();

        // The limit covers draining the pipes too: a background process can
        // hold them open after the direct child has exited.
        let finished = tokio::time::timeout(spec.timeout, async {
            let status = child.wait().await?;
            let stdout = stdout_task.await.unwrap_or_default();
            let stderr = stderr_task.await.unwrap_or_default();
            Ok::<_, std::io::Error>((status, stdout, stderr))
        })
        .await;

        match finished {
            Ok(Ok((status, stdout, stderr))) => RunOutcome::Completed(ProcessOutput {
                stdout,
                stderr,
                exit_code: status.code(),
            }),
            Ok(Err(error)) => {
                stdout_abort.abort();
                stderr_abort.abort();
                kill_process_group(pid);
                RunOutcome::SpawnFailed {
                    detail: format!("failed waiting on '{}': {}", spec.program, error),
                }
            }
            Err(_) => {
                kill_process_group(pid);
                if let Err(error) = child.kill().await {
                    tracing::debug!(
                        program = %spec.program,
                        %error,
                        "child already gone after timeout"
                    );
                }
                stdout_abort.abort();
                stderr_abort.abort();
                RunOutcome::TimedOut {
                    after: spec.timeout,
                }
            }
        }
    }
}

/// SIGKILL every process in the group led by `pid`.
#[cfg(unix)]
fn kill_process_group(pid: Option<u32>) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let Some(pid) = pid.and_then(|p| i32::try_from(p).ok()) else {
        return;
    };
    match killpg(Pid::from_raw(pid), Signal::SIGKILL) {
        Ok(()) | Err(nix::errno::Errno::ESRCH) => {}
        Err(error) => tracing::warn!(pid, %error, "failed to kill process group"),
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pid: Option<u32>) {}

async fn read_all<R: AsyncRead + Unpin>(reader: Option<R>) -> String {
    let Some(mut reader) = reader else {
        return String::new();
    };
    let mut buf = Vec::new();
    if let Err(error) = reader.read_to_end(&mut buf).await {
        tracing::debug!(%error, "error reading process output");
    }
    String::from_utf8_lossy(&buf).into_owned()
}
