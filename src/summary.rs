//! Run summary - per-task outcomes and the aggregate failure count

use crate::core::{ExecutionResult, TaskId};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// How a single task ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Succeeded,
    Failed(String),
}

/// A single run of a task
#[derive(Debug, Clone)]
pub struct TaskRun {
    pub started: DateTime<Utc>,
    pub ended: DateTime<Utc>,
    pub outcome: TaskOutcome,
}

/// Aggregate result of running one graph
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Who started the run (the hub's own descriptor, or a label for it)
    pub origin: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub tasks: BTreeMap<TaskId, TaskRun>,
    failure_count: usize,
}

impl RunSummary {
    pub fn new(origin: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            started_at: Utc::now(),
            ended_at: None,
            tasks: BTreeMap::new(),
            failure_count: 0,
        }
    }

    /// Account for one finished task.
    pub fn record(&mut self, result: &ExecutionResult) {
        let outcome = match &result.exit_error {
            None => TaskOutcome::Succeeded,
            Some(e) => {
                self.failure_count += 1;
                TaskOutcome::Failed(e.to_string())
            }
        };

        self.tasks.insert(
            result.task_id.clone(),
            TaskRun {
                started: result.started_at,
                ended: result.finished_at,
                outcome,
            },
        );
    }

    /// Mark the run as over.
    pub fn finish(&mut self) {
        self.ended_at = Some(Utc::now());
    }

    pub fn failure_count(&self) -> usize {
        self.failure_count
    }

    pub fn is_success(&self) -> bool {
        self.failure_count == 0
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    pub fn failed_tasks(&self) -> Vec<&TaskId> {
        self.tasks
            .iter()
            .filter(|(_, run)| matches!(run.outcome, TaskOutcome::Failed(_)))
            .map(|(id, _)| id)
            .collect()
    }

    /// Fold another target's summary into this one.
    pub fn absorb(&mut self, other: RunSummary) {
        self.failure_count += other.failure_count;
        self.tasks.extend(other.tasks);
        if other.ended_at > self.ended_at {
            self.ended_at = other.ended_at;
        }
    }
}
