//! hubrun - run many independent projects as child processes
//!
//! Discovers project descriptors, works out which projects depend on which,
//! and runs each one as a separate process. Independent projects run side by
//! side; every project's output is printed as one block once it finishes.

pub mod args;
pub mod config;
pub mod core;
pub mod hub;
pub mod summary;
pub mod workspace;

// Re-exports
pub use config::HubConfig;
pub use crate::core::{
    DependencyGraph, DependencyStrategy, Executor, GraphError, OutputSink, Scheduler, Task, TaskId,
};
pub use hub::Hub;
pub use summary::RunSummary;

/// Result type alias
pub type Result<T> = anyhow::Result<T>;
