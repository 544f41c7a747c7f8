//! Per-request worker processes.
//!
//! A [`Supervisor`] runs one external computation for a package name and
//! reports exactly one [`WorkerOutcome`]. [`ProcessSupervisor`] is the real
//! implementation; tests drive the controller with their own.

mod capture;
mod process;

pub use process::{ProcessSupervisor, WorkerCommand};

use async_trait::async_trait;

/// Terminal state of one worker run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerOutcome {
    /// Exited with status 0.
    Completed { stdout: String },
    /// Ran and exited unsuccessfully.
    ProcessFailed {
        code: Option<i32>,
        signal: Option<i32>,
        stderr: String,
    },
    /// Could not be started. No output is attributed.
    LaunchFailed { reason: String },
    /// Started, but its pipes or exit status could not be read.
    SupervisionFailed { reason: String },
}

impl WorkerOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, WorkerOutcome::Completed { .. })
    }
}

/// Human-readable description of an unsuccessful exit.
pub fn describe_exit(code: Option<i32>, signal: Option<i32>) -> String {
    match (code, signal) {
        (Some(code), _) => format!("Process exited with code {code}"),
        (None, Some(signal)) => format!("Process terminated by signal {signal}"),
        (None, None) => "Process terminated without an exit code".to_owned(),
    }
}

/// Runs a worker to completion for one package. No retries, no timeout.
#[async_trait]
pub trait Supervisor: Send + Sync {
    async fn run(&self, package_name: &str) -> WorkerOutcome;
}
