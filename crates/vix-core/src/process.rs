//! External process execution
//!
//! The orchestrator only needs "run this program with these arguments and
//! tell me how it exited". [`ProcessRunner`] is that capability; the system
//! implementation spawns the program with tokio, tests substitute a fake.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::error::{HarvestError, Result};

/// How a child process ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessExit {
    code: Option<i32>,
}

impl ProcessExit {
    /// Exit with a status code
    pub fn from_code(code: i32) -> Self {
        Self { code: Some(code) }
    }

    /// Terminated without a status code (e.g., killed by a signal)
    pub fn terminated() -> Self {
        Self { code: None }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    pub fn code(&self) -> Option<i32> {
        self.code
    }
}

impl From<std::process::ExitStatus> for ProcessExit {
    fn from(status: std::process::ExitStatus) -> Self {
        Self {
            code: status.code(),
        }
    }
}

impl fmt::Display for ProcessExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "exit code {}", code),
            None => f.write_str("termination by signal"),
        }
    }
}

/// Capability to run an external program to completion
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Run `program` with `args` and wait for it to exit.
    ///
    /// # Errors
    /// - `HarvestError::ToolMissing` if the program cannot be found
    /// - `HarvestError::Filesystem` if it exists but cannot be started
    async fn run(&self, program: &str, args: &[String]) -> Result<ProcessExit>;
}

/// Shared handle to a process runner
pub type SharedRunner = Arc<dyn ProcessRunner>;

/// Runs programs as child processes of the harvester
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

#[async_trait]
impl ProcessRunner for SystemRunner {
    async fn run(&self, program: &str, args: &[String]) -> Result<ProcessExit> {
        debug!("EXEC: {} {}", program, args.join(" "));

        let status = tokio::process::Command::new(program)
            .args(args)
            .kill_on_drop(true)
            .status()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    HarvestError::ToolMissing(program.to_string())
                } else {
                    HarvestError::filesystem(program, e)
                }
            })?;

        Ok(status.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_process_exit_success() {
        assert!(ProcessExit::from_code(0).success());
        assert!(!ProcessExit::from_code(2).success());
        assert!(!ProcessExit::terminated().success());
    }

    #[test]
    fn test_process_exit_display() {
        assert_eq!(ProcessExit::from_code(3).to_string(), "exit code 3");
        assert_eq!(ProcessExit::terminated().to_string(), "termination by signal");
    }

    #[tokio::test]
    async fn test_system_runner_missing_program() {
        let result = SystemRunner
            .run("vix-core-test-no-such-program", &["--version".to_string()])
            .await;

        match result {
            Err(HarvestError::ToolMissing(program)) => {
                assert_eq!(program, "vix-core-test-no-such-program");
            }
            other => panic!("Expected ToolMissing error, got {:?}", other),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_system_runner_reports_exit_code() {
        let ok = SystemRunner.run("true", &[]).await.unwrap();
        assert!(ok.success());

        let failed = SystemRunner.run("false", &[]).await.unwrap();
        assert!(!failed.success());
        assert_eq!(failed.code(), Some(1));
    }
}
