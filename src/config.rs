//! Hub configuration - the `hub.yml` file describing what to run

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Default configuration file name
pub const DEFAULT_CONFIG: &str = "hub.yml";

/// Parsed `hub.yml`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HubConfig {
    #[serde(default)]
    pub options: OptionsOverride,
    #[serde(default)]
    pub targets: BTreeMap<String, Target>,
}

/// Option fields as written in the file; all optional so that target-level
/// options can override hub-level ones field by field.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OptionsOverride {
    pub allow_self: Option<bool>,
    pub dependency_fn: Option<String>,
    pub program: Option<String>,
    pub descriptor_flag: Option<String>,
    pub descriptor: Option<Vec<String>>,
    pub default_operation: Option<String>,
}

impl OptionsOverride {
    /// Fields set in `other` win.
    pub fn merged(&self, other: &OptionsOverride) -> OptionsOverride {
        OptionsOverride {
            allow_self: other.allow_self.or(self.allow_self),
            dependency_fn: other.dependency_fn.clone().or_else(|| self.dependency_fn.clone()),
            program: other.program.clone().or_else(|| self.program.clone()),
            descriptor_flag: other
                .descriptor_flag
                .clone()
                .or_else(|| self.descriptor_flag.clone()),
            descriptor: other.descriptor.clone().or_else(|| self.descriptor.clone()),
            default_operation: other
                .default_operation
                .clone()
                .or_else(|| self.default_operation.clone()),
        }
    }

    pub fn resolve(self) -> Options {
        let defaults = Options::default();
        Options {
            allow_self: self.allow_self.unwrap_or(defaults.allow_self),
            dependency_fn: self.dependency_fn.or(defaults.dependency_fn),
            program: self.program.unwrap_or(defaults.program),
            descriptor_flag: self.descriptor_flag.unwrap_or(defaults.descriptor_flag),
            descriptor: self.descriptor.unwrap_or(defaults.descriptor),
            default_operation: self.default_operation.unwrap_or(defaults.default_operation),
        }
    }
}

/// Effective options for one target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    pub allow_self: bool,
    pub dependency_fn: Option<String>,
    pub program: String,
    pub descriptor_flag: String,
    /// Patterns locating the hub's own descriptor
    pub descriptor: Vec<String>,
    pub default_operation: String,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            allow_self: false,
            dependency_fn: None,
            program: "grunt".to_string(),
            descriptor_flag: "--gruntfile".to_string(),
            descriptor: vec!["{G,g}runtfile.{js,coffee}".to_string()],
            default_operation: "default".to_string(),
        }
    }
}

/// A discovery group: patterns plus how to run what they match
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Group {
    #[serde(default)]
    pub src: Vec<String>,
    pub tasks: Option<Vec<String>>,
    pub dependency_fn: Option<String>,
}

/// A named target, run as one graph
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Target {
    #[serde(default)]
    pub options: OptionsOverride,
    #[serde(default)]
    pub src: Vec<String>,
    pub tasks: Option<Vec<String>>,
    pub dependency_fn: Option<String>,
    #[serde(default)]
    pub files: Vec<Group>,
}

impl Target {
    /// `files` when given, otherwise a single group from the inline fields.
    pub fn groups(&self) -> Vec<Group> {
        if !self.files.is_empty() {
            return self.files.clone();
        }
        if self.src.is_empty() {
            return Vec::new();
        }
        vec![Group {
            src: self.src.clone(),
            tasks: self.tasks.clone(),
            dependency_fn: self.dependency_fn.clone(),
        }]
    }
}

impl HubConfig {
    /// Load configuration from a YAML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Invalid config {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: HubConfig = serde_yaml::from_str(content)?;
        for (name, target) in &config.targets {
            if target.groups().is_empty() {
                anyhow::bail!("Target '{}' has no file patterns", name);
            }
        }
        Ok(config)
    }

    /// Effective options for `target`.
    pub fn options_for(&self, target: &Target) -> Options {
        self.options.merged(&target.options).resolve()
    }

    pub fn target_names(&self) -> Vec<String> {
        self.targets.keys().cloned().collect()
    }
}
