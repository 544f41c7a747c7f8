use std::io;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Instant;

use async_trait::async_trait;
use tokio::process::{Child, Command};

use super::capture::{collect, Captured};
use super::{Supervisor, WorkerOutcome};

/// How to start the worker: `program [args...] <packageName>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
    /// Per-stream capture limit in bytes.
    pub max_capture_bytes: usize,
}

/// Spawns a real OS process per request.
#[derive(Debug, Clone)]
pub struct ProcessSupervisor {
    command: WorkerCommand,
}

impl ProcessSupervisor {
    pub fn new(command: WorkerCommand) -> Self {
        Self { command }
    }

    fn build(&self, package_name: &str) -> Command {
        let mut cmd = Command::new(&self.command.program);
        // No shell: the package name reaches the worker as exactly one argument.
        cmd.args(&self.command.args)
            .arg(package_name)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.command.working_dir {
            cmd.current_dir(dir);
        }
        cmd
    }
}

#[async_trait]
impl Supervisor for ProcessSupervisor {
    async fn run(&self, package_name: &str) -> WorkerOutcome {
        let started = Instant::now();
        let mut child = match self.build(package_name).spawn() {
            Ok(child) => child,
            Err(e) => {
                tracing::warn!(
                    program = %self.command.program.display(),
                    package_name,
                    error = %e,
                    "Failed to launch worker"
                );
                return WorkerOutcome::LaunchFailed {
                    reason: e.to_string(),
                };
            }
        };
        tracing::info!(pid = child.id(), package_name, "Worker spawned");

        let (status, stdout, stderr) =
            match supervise(&mut child, self.command.max_capture_bytes).await {
                Ok(done) => done,
                Err(e) => {
                    tracing::error!(package_name, error = %e, "Lost track of worker");
                    return WorkerOutcome::SupervisionFailed {
                        reason: e.to_string(),
                    };
                }
            };

        for (stream, captured) in [("stdout", &stdout), ("stderr", &stderr)] {
            if captured.is_truncated() {
                tracing::warn!(
                    package_name,
                    stream,
                    dropped_bytes = captured.dropped,
                    "Worker output truncated"
                );
            }
        }

        tracing::info!(
            package_name,
            code = status.code(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Worker exited"
        );

        if status.success() {
            WorkerOutcome::Completed {
                stdout: stdout.into_text(),
            }
        } else {
            WorkerOutcome::ProcessFailed {
                code: status.code(),
                signal: exit_signal(&status),
                stderr: stderr.into_text(),
            }
        }
    }
}

/// Drain both pipes concurrently, then reap the child.
async fn supervise(child: &mut Child, limit: usize) -> io::Result<(ExitStatus, Captured, Captured)> {
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| io::Error::other("worker stdout was not captured"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| io::Error::other("worker stderr was not captured"))?;

    let (stdout, stderr) = tokio::try_join!(collect(stdout, limit), collect(stderr, limit))?;
    let status = child.wait().await?;
    Ok((status, stdout, stderr))
}

#[cfg(unix)]
fn exit_signal(status: &ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

#[cfg(not(unix))]
fn exit_signal(_status: &ExitStatus) -> Option<i32> {
    None
}
