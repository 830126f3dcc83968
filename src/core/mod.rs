//! Core engine - task graph, dependency resolution, process execution, scheduling

mod builder;
mod executor;
mod graph;
pub mod manifest;
mod output;
mod process;
mod resolver;
mod scheduler;

pub use builder::{BuildOptions, DiscoveryGroup, GraphBuilder};
pub use executor::{ExecutionResult, Executor, ExitError};
pub use graph::{DependencyGraph, GraphError, Task, TaskId};
pub use manifest::{ManifestError, ManifestKind};
pub use output::{CapturedOutput, OutputChunk, OutputSink, Stream};
pub use process::SpawnedProcess;
pub use resolver::{DependencyFn, DependencyStrategy};
pub use scheduler::Scheduler;
