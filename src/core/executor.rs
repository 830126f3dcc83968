//! Task Executor - runs one task as a child process and buffers its output
//!
//! Output is held back until the child exits and then written as a single
//! block, so tasks running side by side never interleave on the terminal.

use super::graph::{Task, TaskId};
use super::output::{OutputChunk, OutputSink};
use super::process::SpawnedProcess;
use chrono::{DateTime, Utc};
use std::io;
use std::process::ExitStatus;
use thiserror::Error;

/// Why a task counts as failed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExitError {
    #[error("exited with code {0}")]
    Code(i32),

    #[error("terminated abnormally ({0})")]
    Abnormal(String),

    #[error("failed to start: {0}")]
    Spawn(String),

    #[error("failed while waiting for exit: {0}")]
    Wait(String),

    #[error("never ran")]
    NotRun,
}

/// Outcome of running one task
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub task_id: TaskId,
    pub exit_error: Option<ExitError>,
    /// Captured chunks, in arrival order
    pub output: Vec<OutputChunk>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl ExecutionResult {
    /// Result for a task that produced no output and failed.
    pub fn failed(task_id: TaskId, error: ExitError) -> Self {
        let now = Utc::now();
        Self {
            task_id,
            exit_error: Some(error),
            output: Vec::new(),
            started_at: now,
            finished_at: now,
        }
    }

    pub fn is_success(&self) -> bool {
        self.exit_error.is_none()
    }
}

/// Map a child's exit to the error it counts as, if any.
fn exit_error(status: io::Result<ExitStatus>) -> Option<ExitError> {
    match status {
        Ok(status) if status.success() => None,
        Ok(status) => Some(match status.code() {
            Some(code) => ExitError::Code(code),
            None => ExitError::Abnormal(status.to_string()),
        }),
        Err(e) => Some(ExitError::Wait(e.to_string())),
    }
}

/// Spawns tasks with a fixed program and reports to a shared sink
#[derive(Clone)]
pub struct Executor {
    program: String,
    sink: OutputSink,
}

impl Executor {
    pub fn new(program: impl Into<String>, sink: OutputSink) -> Self {
        Self {
            program: program.into(),
            sink,
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn sink(&self) -> &OutputSink {
        &self.sink
    }

    /// Run a task to completion.
    ///
    /// Failures (including failure to spawn) are reported through
    /// `exit_error`, never as an `Err`, so sibling tasks keep going.
    pub async fn execute(&self, task: &Task) -> ExecutionResult {
        let started_at = Utc::now();

        // Announce right away; the output itself is held back
        let announcement = format!("Running [{}] on {}", task.operations.join(", "), task.id);
        if let Err(e) = self.sink.status(&announcement) {
            log::warn!("Failed to write output: {}", e);
        }

        let (output, exit_error) =
            match SpawnedProcess::spawn(&task.working_dir, &self.program, &task.args) {
                Ok(process) => {
                    log::debug!("Task {} started (pid {:?})", task.id, process.id());
                    let (chunks, status) = process.wait().await;
                    (chunks, exit_error(status))
                }
                Err(e) => (
                    Vec::new(),
                    Some(ExitError::Spawn(format!("{}: {}", self.program, e))),
                ),
            };

        match &exit_error {
            None => log::info!("Task {} completed", task.id),
            Some(e) => log::warn!("Task {} failed: {}", task.id, e),
        }

        ExecutionResult {
            task_id: task.id.clone(),
            exit_error,
            output,
            started_at,
            finished_at: Utc::now(),
        }
    }

    /// Write a finished task's header and buffered output as one block.
    pub fn flush(&self, result: &ExecutionResult) -> io::Result<()> {
        self.sink
            .block(&format!("From {}:", result.task_id), &result.output)
    }
}
