//! Task Scheduler - runs a dependency graph with as much parallelism as it allows
//!
//! Each task tracks how many of its dependencies are still outstanding. A task
//! is started the moment that count reaches zero. Failed dependencies count as
//! finished, so dependents still run.

use super::executor::{ExecutionResult, Executor, ExitError};
use super::graph::{DependencyGraph, GraphError, TaskId};
use crate::summary::RunSummary;
use std::collections::{BTreeMap, HashSet, VecDeque};
use tokio::task::JoinSet;

/// Task scheduler with dependency resolution
#[derive(Debug)]
pub struct Scheduler {
    graph: DependencyGraph,
    dependents: BTreeMap<TaskId, Vec<TaskId>>,
    remaining: BTreeMap<TaskId, usize>,
    ready: VecDeque<TaskId>,
    running: HashSet<TaskId>,
    finished: HashSet<TaskId>,
}

impl Scheduler {
    /// Create a scheduler, rejecting graphs that could never finish.
    pub fn new(graph: DependencyGraph) -> Result<Self, GraphError> {
        graph.validate()?;

        let remaining: BTreeMap<TaskId, usize> = graph
            .tasks()
            .map(|task| (task.id.clone(), task.dependencies.len()))
            .collect();
        let ready = remaining
            .iter()
            .filter(|(_, count)| **count == 0)
            .map(|(id, _)| id.clone())
            .collect();

        Ok(Self {
            dependents: graph.dependents(),
            graph,
            remaining,
            ready,
            running: HashSet::new(),
            finished: HashSet::new(),
        })
    }

    /// Take every task that is ready to start.
    pub fn schedule_next(&mut self) -> Vec<TaskId> {
        self.ready.drain(..).collect()
    }

    /// Mark task as started
    pub fn mark_started(&mut self, task_id: &TaskId) {
        self.running.insert(task_id.clone());
    }

    /// Mark task as finished (either way) and queue the dependents it unblocks.
    pub fn mark_finished(&mut self, task_id: &TaskId) {
        if !self.running.remove(task_id) || !self.finished.insert(task_id.clone()) {
            log::warn!("Ignoring completion of task that was not running: {}", task_id);
            return;
        }

        for next in self.dependents.get(task_id).into_iter().flatten() {
            if let Some(count) = self.remaining.get_mut(next) {
                *count -= 1;
                if *count == 0 {
                    self.ready.push_back(next.clone());
                }
            }
        }
    }

    /// Get currently running tasks
    pub fn get_running(&self) -> Vec<TaskId> {
        self.running.iter().cloned().collect()
    }

    /// Get graph reference
    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    /// Check if all tasks are done
    pub fn all_done(&self) -> bool {
        self.finished.len() == self.graph.len()
    }

    /// Count every task that never reported a result as failed.
    fn record_unfinished(&self, summary: &mut RunSummary) {
        if self.all_done() {
            return;
        }
        log::error!(
            "{} task(s) never ran",
            self.graph.len() - self.finished.len()
        );
        for id in self.graph.task_ids() {
            if !self.finished.contains(id) {
                summary.record(&ExecutionResult::failed(id.clone(), ExitError::NotRun));
            }
        }
    }

    /// Run every task to completion and return the summary.
    ///
    /// Completed blocks are flushed and counted one at a time on this task,
    /// so output and the failure count are never updated concurrently.
    pub async fn run(mut self, executor: &Executor, origin: &str) -> RunSummary {
        let mut summary = RunSummary::new(origin);
        let mut running = JoinSet::new();

        log::info!("Running {} task(s)", self.graph.len());

        loop {
            for task_id in self.schedule_next() {
                let Some(task) = self.graph.get(&task_id).cloned() else {
                    continue;
                };
                self.mark_started(&task_id);

                let executor = executor.clone();
                running.spawn(async move {
                    let id = task.id.clone();
                    // Run in a nested task so a panic still yields a result
                    match tokio::spawn(async move { executor.execute(&task).await }).await {
                        Ok(result) => result,
                        Err(e) => ExecutionResult::failed(id, ExitError::Abnormal(e.to_string())),
                    }
                });
            }

            match running.join_next().await {
                Some(Ok(result)) => {
                    if let Err(e) = executor.flush(&result) {
                        log::warn!("Failed to write output for {}: {}", result.task_id, e);
                    }
                    summary.record(&result);
                    self.mark_finished(&result.task_id);
                }
                Some(Err(e)) => log::error!("Task supervisor stopped unexpectedly: {}", e),
                None => break,
            }
        }

        self.record_unfinished(&mut summary);
        summary.finish();
        let line = format!(
            "From {}: {} task(s) finished, {} failed",
            summary.origin,
            summary.task_count(),
            summary.failure_count()
        );
        if let Err(e) = executor.sink().status(&line) {
            log::warn!("Failed to write output: {}", e);
        }

        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::graph::Task;

    fn id(name: &str) -> TaskId {
        TaskId::new(format!("/ws/{}/Gruntfile.js", name))
    }

    fn task(name: &str, deps: &[&str]) -> Task {
        Task::new(id(name), vec![], vec![]).with_dependencies(deps.iter().map(|d| id(d)))
    }

    fn diamond() -> DependencyGraph {
        let mut graph = DependencyGraph::new();
        graph.insert(task("a", &[]));
        graph.insert(task("b", &["a"]));
        graph.insert(task("c", &["a"]));
        graph.insert(task("d", &["b", "c"]));
        graph
    }

    #[test]
    fn test_unblocks_dependents_as_last_dependency_finishes() {
        let mut scheduler = Scheduler::new(diamond()).unwrap();

        assert_eq!(scheduler.schedule_next(), vec![id("a")]);
        assert!(scheduler.schedule_next().is_empty());

        scheduler.mark_started(&id("a"));
        scheduler.mark_finished(&id("a"));
        let ready = scheduler.schedule_next();
        assert_eq!(ready, vec![id("b"), id("c")]);

        scheduler.mark_started(&id("b"));
        scheduler.mark_started(&id("c"));
        scheduler.mark_finished(&id("b"));
        assert!(scheduler.schedule_next().is_empty());

        scheduler.mark_finished(&id("c"));
        assert_eq!(scheduler.schedule_next(), vec![id("d")]);
        assert!(!scheduler.all_done());

        scheduler.mark_started(&id("d"));
        scheduler.mark_finished(&id("d"));
        assert!(scheduler.all_done());
        assert!(scheduler.get_running().is_empty());
    }

    #[test]
    fn test_lost_tasks_count_as_failures() {
        let mut scheduler = Scheduler::new(diamond()).unwrap();
        for ready in scheduler.schedule_next() {
            scheduler.mark_started(&ready);
        }
        scheduler.mark_finished(&id("a"));
        scheduler.schedule_next();
        scheduler.mark_started(&id("b"));

        let mut summary = RunSummary::new("hub");
        scheduler.record_unfinished(&mut summary);

        assert_eq!(summary.failure_count(), 3);
        assert!(!summary.is_success());
        assert_eq!(summary.failed_tasks(), vec![&id("b"), &id("c"), &id("d")]);
    }

    #[test]
    fn test_ignores_unknown_completion() {
        let mut scheduler = Scheduler::new(diamond()).unwrap();
        scheduler.mark_finished(&id("b"));
        assert!(scheduler.schedule_next().contains(&id("a")));
        assert!(!scheduler.all_done());
    }

    #[test]
    fn test_rejects_cycles_before_running() {
        let mut graph = DependencyGraph::new();
        graph.insert(task("a", &["b"]));
        graph.insert(task("b", &["a"]));

        let err = Scheduler::new(graph).unwrap_err();
        assert!(matches!(err, GraphError::CycleDetected(_)));
    }

    #[test]
    fn test_rejects_dangling_dependency() {
        let mut graph = DependencyGraph::new();
        graph.insert(task("a", &["nowhere"]));

        let err = Scheduler::new(graph).unwrap_err();
        assert!(matches!(err, GraphError::MissingDependency { .. }));
    }
}
