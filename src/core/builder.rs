//! Graph builder - turns discovered descriptors into runnable tasks

use super::graph::{DependencyGraph, Task, TaskId};
use super::resolver::DependencyStrategy;
use crate::workspace;
use anyhow::Result;
use std::path::PathBuf;

/// One set of discovery patterns and how to run what they match
#[derive(Debug, Clone, Default)]
pub struct DiscoveryGroup {
    pub patterns: Vec<String>,
    /// Operations configured for this group
    pub operations: Option<Vec<String>>,
    /// Overrides the builder's default strategy
    pub strategy: Option<DependencyStrategy>,
}

/// Settings shared by every group of one run
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Directory patterns are resolved against
    pub base_dir: PathBuf,
    /// The hub's own descriptor, excluded unless `allow_self`
    pub own_descriptor: Option<TaskId>,
    pub allow_self: bool,
    pub strategy: DependencyStrategy,
    /// Operations named on the command line; win over everything else
    pub requested_operations: Vec<String>,
    /// Arguments passed through to every child
    pub forwarded_args: Vec<String>,
    /// Flag telling the child which descriptor to load
    pub descriptor_flag: String,
    pub default_operation: String,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("."),
            own_descriptor: None,
            allow_self: false,
            strategy: DependencyStrategy::None,
            requested_operations: Vec::new(),
            forwarded_args: Vec::new(),
            descriptor_flag: "--gruntfile".to_string(),
            default_operation: "default".to_string(),
        }
    }
}

/// Builds a [`DependencyGraph`] group by group
#[derive(Debug)]
pub struct GraphBuilder {
    options: BuildOptions,
    graph: DependencyGraph,
}

impl GraphBuilder {
    pub fn new(options: BuildOptions) -> Self {
        Self {
            options,
            graph: DependencyGraph::new(),
        }
    }

    /// Discover a group's descriptors on disk and add them.
    pub fn discover_group(&mut self, group: &DiscoveryGroup) -> Result<()> {
        let found = workspace::discover(&self.options.base_dir, &group.patterns)?;
        let descriptors = found.into_iter().map(TaskId::new).collect();
        self.add_group(group, descriptors);
        Ok(())
    }

    /// Add tasks for already-discovered descriptors.
    ///
    /// Dependencies are resolved among the group's own descriptors only. A
    /// descriptor already added by an earlier group is replaced.
    pub fn add_group(&mut self, group: &DiscoveryGroup, mut descriptors: Vec<TaskId>) {
        if !self.options.allow_self {
            if let Some(own) = &self.options.own_descriptor {
                descriptors.retain(|d| d != own);
            }
        }

        if descriptors.is_empty() {
            log::warn!(
                "No descriptors matched the file patterns: \"{}\"",
                group.patterns.join(", ")
            );
            return;
        }

        let strategy = group.strategy.as_ref().unwrap_or(&self.options.strategy);
        let operations = self.operations_for(group);

        for id in &descriptors {
            let dependencies = strategy.resolve(id, &descriptors);
            let args = self.args_for(id, &operations);
            let task =
                Task::new(id.clone(), operations.clone(), args).with_dependencies(dependencies);
            if self.graph.insert(task).is_some() {
                log::debug!("Task {} was matched again; the later group wins", id);
            }
        }
    }

    /// Command line first, then the group's list, then the default.
    fn operations_for(&self, group: &DiscoveryGroup) -> Vec<String> {
        if !self.options.requested_operations.is_empty() {
            return self.options.requested_operations.clone();
        }
        group
            .operations
            .clone()
            .unwrap_or_else(|| vec![self.options.default_operation.clone()])
    }

    /// Operations, then forwarded arguments, then the descriptor flag last so
    /// nothing forwarded can shadow it.
    fn args_for(&self, id: &TaskId, operations: &[String]) -> Vec<String> {
        let mut args = operations.to_vec();
        args.extend(self.options.forwarded_args.iter().cloned());
        args.push(format!("{}={}", self.options.descriptor_flag, id));
        args
    }

    pub fn finish(self) -> DependencyGraph {
        self.graph
    }
}
