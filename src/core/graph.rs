//! Task graph - the set of projects to run and the edges between them

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that make a graph impossible to schedule.
///
/// These are reported before any child process is spawned, so they are kept
/// apart from task failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    /// A dependency references a task that is not part of the graph.
    #[error("task '{from}' depends on '{to}', which is not part of this run")]
    MissingDependency { from: TaskId, to: TaskId },

    /// Some tasks can never start because they wait on each other.
    #[error("dependency cycle detected; unresolvable tasks: {}", join_ids(.0))]
    CycleDetected(Vec<TaskId>),
}

fn join_ids(ids: &[TaskId]) -> String {
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Stable task identifier: the canonical path of the task's descriptor file.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(PathBuf);

impl TaskId {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    pub fn path(&self) -> &Path {
        &self.0
    }

    /// Directory that owns the descriptor (the project directory).
    pub fn project_dir(&self) -> &Path {
        self.0.parent().unwrap_or_else(|| Path::new("."))
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

impl From<&Path> for TaskId {
    fn from(path: &Path) -> Self {
        Self(path.to_path_buf())
    }
}

/// One external project to run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub id: TaskId,
    pub working_dir: PathBuf,
    /// Operations requested from the child (also the head of `args`)
    pub operations: Vec<String>,
    /// Full argument list handed to the spawned program
    pub args: Vec<String>,
    pub dependencies: BTreeSet<TaskId>,
}

impl Task {
    /// Task that runs in its descriptor's directory with the given arguments.
    pub fn new(id: TaskId, operations: Vec<String>, args: Vec<String>) -> Self {
        Self {
            working_dir: id.project_dir().to_path_buf(),
            id,
            operations,
            args,
            dependencies: BTreeSet::new(),
        }
    }

    pub fn with_dependencies(mut self, deps: impl IntoIterator<Item = TaskId>) -> Self {
        self.dependencies.extend(deps);
        self
    }
}

/// Dependency graph keyed by task id
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    tasks: BTreeMap<TaskId, Task>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a task, returning the one it replaced if the id was taken.
    pub fn insert(&mut self, task: Task) -> Option<Task> {
        self.tasks.insert(task.id.clone(), task)
    }

    pub fn get(&self, id: &TaskId) -> Option<&Task> {
        self.tasks.get(id)
    }

    pub fn contains(&self, id: &TaskId) -> bool {
        self.tasks.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.values()
    }

    pub fn task_ids(&self) -> impl Iterator<Item = &TaskId> {
        self.tasks.keys()
    }

    /// Reverse edges: for every task, the tasks waiting on it.
    pub fn dependents(&self) -> BTreeMap<TaskId, Vec<TaskId>> {
        let mut reverse: BTreeMap<TaskId, Vec<TaskId>> = self
            .tasks
            .keys()
            .map(|id| (id.clone(), Vec::new()))
            .collect();

        for task in self.tasks.values() {
            for dep in &task.dependencies {
                reverse.entry(dep.clone()).or_default().push(task.id.clone());
            }
        }

        reverse
    }

    /// Check every edge and return the tasks in a valid start order.
    ///
    /// Dangling references are reported first; otherwise a Kahn pass that
    /// fails to consume every node reports the leftover nodes as a cycle.
    pub fn validate(&self) -> Result<Vec<TaskId>, GraphError> {
        for task in self.tasks.values() {
            if let Some(missing) = task.dependencies.iter().find(|d| !self.contains(d)) {
                return Err(GraphError::MissingDependency {
                    from: task.id.clone(),
                    to: missing.clone(),
                });
            }
        }

        let mut in_degree: BTreeMap<&TaskId, usize> = self
            .tasks
            .values()
            .map(|task| (&task.id, task.dependencies.len()))
            .collect();
        let reverse = self.dependents();

        let mut queue: VecDeque<TaskId> = in_degree
            .iter()
            .filter(|(_, degree)| **degree == 0)
            .map(|(id, _)| (*id).clone())
            .collect();

        let mut order = Vec::with_capacity(self.tasks.len());
        while let Some(id) = queue.pop_front() {
            for next in reverse.get(&id).into_iter().flatten() {
                if let Some(degree) = in_degree.get_mut(next) {
                    *degree -= 1;
                    if *degree == 0 {
                        queue.push_back(next.clone());
                    }
                }
            }
            order.push(id);
        }

        if order.len() != self.tasks.len() {
            let stuck = in_degree
                .into_iter()
                .filter(|(_, degree)| *degree > 0)
                .map(|(id, _)| id.clone())
                .collect();
            return Err(GraphError::CycleDetected(stuck));
        }

        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(name: &str) -> TaskId {
        TaskId::new(format!("/ws/{}/Gruntfile.js", name))
    }

    fn task(name: &str, deps: &[&str]) -> Task {
        Task::new(id(name), vec!["default".into()], vec![])
            .with_dependencies(deps.iter().map(|d| id(d)))
    }

    #[test]
    fn test_working_dir_is_project_dir() {
        let t = task("a", &[]);
        assert_eq!(t.working_dir, PathBuf::from("/ws/a"));
        assert_eq!(t.id.project_dir(), Path::new("/ws/a"));
    }

    #[test]
    fn test_insert_replaces_same_id() {
        let mut graph = DependencyGraph::new();
        assert!(graph.insert(task("a", &[])).is_none());
        let replaced = graph.insert(task("a", &["b"])).unwrap();
        assert!(replaced.dependencies.is_empty());
        assert_eq!(graph.len(), 1);
        assert_eq!(graph.get(&id("a")).unwrap().dependencies, BTreeSet::from([id("b")]));
    }

    #[test]
    fn test_validate_orders_dependencies_first() {
        let mut graph = DependencyGraph::new();
        graph.insert(task("c", &["a", "b"]));
        graph.insert(task("b", &["a"]));
        graph.insert(task("a", &[]));

        let order = graph.validate().unwrap();
        assert_eq!(order, vec![id("a"), id("b"), id("c")]);
    }

    #[test]
    fn test_validate_reports_missing_dependency() {
        let mut graph = DependencyGraph::new();
        graph.insert(task("a", &["ghost"]));

        let err = graph.validate().unwrap_err();
        assert_eq!(
            err,
            GraphError::MissingDependency {
                from: id("a"),
                to: id("ghost"),
            }
        );
    }

    #[test]
    fn test_validate_reports_cycle_members() {
        let mut graph = DependencyGraph::new();
        graph.insert(task("root", &[]));
        graph.insert(task("x", &["root", "y"]));
        graph.insert(task("y", &["x"]));

        match graph.validate() {
            Err(GraphError::CycleDetected(stuck)) => {
                assert_eq!(stuck, vec![id("x"), id("y")]);
            }
            other => panic!("expected cycle, got {:?}", other),
        }
    }

    #[test]
    fn test_dependents_are_reverse_edges() {
        let mut graph = DependencyGraph::new();
        graph.insert(task("a", &[]));
        graph.insert(task("b", &["a"]));
        graph.insert(task("c", &["a"]));

        let reverse = graph.dependents();
        assert_eq!(reverse[&id("a")], vec![id("b"), id("c")]);
        assert!(reverse[&id("c")].is_empty());
    }

    #[test]
    fn test_cycle_error_message_lists_tasks() {
        let err = GraphError::CycleDetected(vec![id("x"), id("y")]);
        assert_eq!(
            err.to_string(),
            "dependency cycle detected; unresolvable tasks: /ws/x/Gruntfile.js, /ws/y/Gruntfile.js"
        );
    }
}
