//! Hub - ties configuration, discovery, graph building and scheduling together

use crate::args::{self, Request};
use crate::config::{HubConfig, Options, Target};
use crate::core::{
    BuildOptions, DependencyStrategy, DiscoveryGroup, Executor, GraphBuilder, OutputSink,
    Scheduler, TaskId,
};
use crate::summary::RunSummary;
use crate::workspace;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// A target whose graph has been built and validated
pub struct PlannedRun {
    pub target: String,
    pub origin: String,
    pub scheduler: Scheduler,
    pub executor: Executor,
}

/// Application state for one hub invocation
pub struct Hub {
    config: HubConfig,
    base_dir: PathBuf,
    sink: OutputSink,
    descriptor: Option<PathBuf>,
    allow_self: Option<bool>,
    dependency_fn: Option<String>,
    custom_strategy: Option<DependencyStrategy>,
}

impl Hub {
    /// Create a hub; patterns resolve against `base_dir`.
    pub fn new(config: HubConfig, base_dir: impl Into<PathBuf>, sink: OutputSink) -> Self {
        Self {
            config,
            base_dir: base_dir.into(),
            sink,
            descriptor: None,
            allow_self: None,
            dependency_fn: None,
            custom_strategy: None,
        }
    }

    /// Load `config_path` and resolve patterns next to it.
    pub fn from_config_file(config_path: &Path, sink: OutputSink) -> Result<Self> {
        let config = HubConfig::load(config_path)?;
        let base_dir = config_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."))
            .to_path_buf();
        Ok(Self::new(config, base_dir, sink))
    }

    /// Use an explicit path as the hub's own descriptor.
    pub fn with_descriptor(mut self, path: Option<PathBuf>) -> Self {
        self.descriptor = path;
        self
    }

    pub fn with_allow_self(mut self, allow: Option<bool>) -> Self {
        self.allow_self = allow;
        self
    }

    /// Built-in strategy name overriding every target's setting.
    pub fn with_dependency_fn(mut self, name: Option<String>) -> Self {
        self.dependency_fn = name;
        self
    }

    /// Caller-supplied strategy used where no group names one.
    pub fn with_strategy(mut self, strategy: DependencyStrategy) -> Self {
        self.custom_strategy = Some(strategy);
        self
    }

    /// Every descriptor flag a child of this hub may receive.
    fn descriptor_flags(&self) -> Vec<String> {
        let mut flags = vec![self.config.options.clone().resolve().descriptor_flag];
        for target in self.config.targets.values() {
            let flag = self.config.options_for(target).descriptor_flag;
            if !flags.contains(&flag) {
                flags.push(flag);
            }
        }
        flags
    }

    fn target(&self, name: &str) -> Result<&Target> {
        self.config.targets.get(name).with_context(|| {
            format!(
                "Unknown target '{}' (available: {})",
                name,
                self.config.target_names().join(", ")
            )
        })
    }

    fn effective_options(&self, target: &Target) -> Options {
        let mut options = self.config.options_for(target);
        if let Some(allow) = self.allow_self {
            options.allow_self = allow;
        }
        options
    }

    fn default_strategy(&self, options: &Options) -> Result<DependencyStrategy> {
        if let Some(name) = &self.dependency_fn {
            return DependencyStrategy::from_name(name);
        }
        if let Some(custom) = &self.custom_strategy {
            return Ok(custom.clone());
        }
        match &options.dependency_fn {
            Some(name) => DependencyStrategy::from_name(name),
            None => Ok(DependencyStrategy::None),
        }
    }

    /// Build and validate the graph of every requested target.
    ///
    /// Nothing is spawned here, so a broken graph stops the run before any
    /// child starts.
    pub fn plan(&self, argv: &[String]) -> Result<Vec<PlannedRun>> {
        let tokens = args::requested_tokens(argv, &self.descriptor_flags());

        let mut requests = tokens
            .iter()
            .map(|token| Request::parse(token))
            .collect::<Result<Vec<_>>>()?;
        if requests.is_empty() {
            requests = self
                .config
                .target_names()
                .into_iter()
                .map(|target| Request {
                    target,
                    operations: Vec::new(),
                })
                .collect();
        }
        for request in &requests {
            self.target(&request.target)?;
        }

        requests
            .iter()
            .map(|request| self.plan_target(request, argv, &tokens))
            .collect()
    }

    fn plan_target(
        &self,
        request: &Request,
        argv: &[String],
        tokens: &[String],
    ) -> Result<PlannedRun> {
        let target = self.target(&request.target)?;
        let options = self.effective_options(target);
        let forwarded = args::forward_args(argv, tokens, &options.descriptor_flag);

        let own = workspace::locate_own_descriptor(
            &self.base_dir,
            self.descriptor.as_deref(),
            &options.descriptor,
        )?;
        let origin = match &own {
            Some(path) => path.display().to_string(),
            None => self.base_dir.display().to_string(),
        };

        let mut builder = GraphBuilder::new(BuildOptions {
            base_dir: self.base_dir.clone(),
            own_descriptor: own.map(TaskId::new),
            allow_self: options.allow_self,
            strategy: self.default_strategy(&options)?,
            requested_operations: request.operations.clone(),
            forwarded_args: forwarded,
            descriptor_flag: options.descriptor_flag.clone(),
            default_operation: options.default_operation.clone(),
        });

        for group in target.groups() {
            let strategy = group
                .dependency_fn
                .as_deref()
                .map(DependencyStrategy::from_name)
                .transpose()?;
            builder.discover_group(&DiscoveryGroup {
                patterns: group.src,
                operations: group.tasks,
                strategy,
            })?;
        }

        let scheduler = Scheduler::new(builder.finish())?;
        log::debug!(
            "Target '{}': {} task(s) via {}",
            request.target,
            scheduler.graph().len(),
            options.program
        );

        Ok(PlannedRun {
            target: request.target.clone(),
            origin,
            scheduler,
            executor: Executor::new(options.program, self.sink.clone()),
        })
    }

    /// Plan, then run every requested target in turn.
    ///
    /// Task failures are reported in the summary; only configuration and
    /// graph errors come back as `Err`.
    pub async fn run(&self, argv: &[String]) -> Result<RunSummary> {
        let planned = self.plan(argv)?;

        let mut total: Option<RunSummary> = None;
        for run in planned {
            log::info!("Running target '{}'", run.target);
            let summary = run.scheduler.run(&run.executor, &run.origin).await;
            match total.as_mut() {
                Some(total) => total.absorb(summary),
                None => total = Some(summary),
            }
        }

        Ok(total.unwrap_or_else(|| RunSummary::new(self.base_dir.display().to_string())))
    }
}
