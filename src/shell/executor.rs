//! Command Executor
//!
//! Runs external programs and captures their exit status and output. A
//! nonzero exit status is returned as data; only a failure to start the
//! program is an error.

use crate::error::{Error, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

// =============================================================================
// Invocation / Output
// =============================================================================

/// A program and its arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
}

impl Invocation {
    pub fn new<I, S>(program: &str, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.to_string(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Argument vector including the program name
    pub fn argv(&self) -> Vec<&str> {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect()
    }
}

impl std::fmt::Display for Invocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.argv().join(" "))
    }
}

/// Exit status and captured output of a finished command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub rc: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            rc: 0,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn failure(rc: i32, stderr: impl Into<String>) -> Self {
        Self {
            rc,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.rc == 0
    }

    /// Convert a nonzero exit into `Error::CommandFailed`
    pub fn into_result(self, invocation: &Invocation) -> Result<CommandOutput> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(Error::CommandFailed {
                command: invocation.to_string(),
                rc: self.rc,
                stdout: self.stdout,
                stderr: self.stderr,
            })
        }
    }
}

// =============================================================================
// Executor Port
// =============================================================================

/// Runs commands and returns their output
#[async_trait]
pub trait Executor: Send + Sync {
    async fn execute(&self, invocation: &Invocation) -> Result<CommandOutput>;

    /// Run a command, converting a nonzero exit into an error
    async fn try_run(&self, invocation: &Invocation) -> Result<String> {
        let output = self.execute(invocation).await?;
        Ok(output.into_result(invocation)?.stdout)
    }
}

pub type ExecutorRef = Arc<dyn Executor>;

// =============================================================================
// Host Executor
// =============================================================================

/// Executor that spawns real processes on this host
#[derive(Debug, Default)]
pub struct HostExecutor {
    counter: AtomicU64,
}

impl HostExecutor {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait]
impl Executor for HostExecutor {
    async fn execute(&self, invocation: &Invocation) -> Result<CommandOutput> {
        let id = self.counter.fetch_add(1, Ordering::Relaxed);
        info!(id, command = %invocation, "running command");

        let output = tokio::process::Command::new(&invocation.program)
            .args(&invocation.args)
            .output()
            .await
            .map_err(|e| Error::CommandSpawn {
                command: invocation.to_string(),
                reason: e.to_string(),
            })?;

        // Killed by a signal: no exit code, report as generic failure
        let result = CommandOutput {
            rc: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        info!(
            id,
            rc = result.rc,
            result = if result.is_success() { "OK" } else { "ERROR" },
            "finished command"
        );
        if !result.stdout.is_empty() {
            debug!(id, stdout = %result.stdout, "command stdout");
        }
        if !result.stderr.is_empty() {
            debug!(id, stderr = %result.stderr, "command stderr");
        }

        Ok(result)
    }
}
