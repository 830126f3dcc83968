//! Dependency resolver - works out which tasks a task has to wait for

use super::graph::TaskId;
use super::manifest::{self, ManifestError, ManifestKind};
use anyhow::Result;
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

/// Caller-supplied dependency function: `(task, all tasks) -> dependencies`
pub type DependencyFn = Arc<dyn Fn(&TaskId, &[TaskId]) -> Result<Vec<TaskId>> + Send + Sync>;

/// How dependencies between discovered tasks are computed
#[derive(Clone, Default)]
pub enum DependencyStrategy {
    /// Every task is independent.
    #[default]
    None,
    /// Depend on projects declared as local paths in a package manifest.
    Manifest(ManifestKind),
    /// Arbitrary function supplied through the library API.
    Custom(DependencyFn),
}

impl fmt::Debug for DependencyStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "None"),
            Self::Manifest(kind) => write!(f, "Manifest({:?})", kind),
            Self::Custom(_) => write!(f, "Custom(..)"),
        }
    }
}

impl DependencyStrategy {
    /// Look up a built-in strategy by its configuration name.
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "none" => Ok(Self::None),
            "bower" => Ok(Self::Manifest(ManifestKind::Bower)),
            "npm" => Ok(Self::Manifest(ManifestKind::Npm)),
            other => anyhow::bail!(
                "Unknown dependency function '{}' (expected one of: none, bower, npm)",
                other
            ),
        }
    }

    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&TaskId, &[TaskId]) -> Result<Vec<TaskId>> + Send + Sync + 'static,
    {
        Self::Custom(Arc::new(f))
    }

    /// Dependencies of `task` among `all`.
    ///
    /// Never fails: a broken declaration is logged and treated as "no
    /// dependencies" so one project cannot block the whole run.
    pub fn resolve(&self, task: &TaskId, all: &[TaskId]) -> BTreeSet<TaskId> {
        match self.try_resolve(task, all) {
            Ok(deps) => deps.into_iter().filter(|dep| dep != task).collect(),
            Err(e) => {
                log::warn!(
                    "Could not get dependencies for {} ({:#}). Assuming no dependencies.",
                    task,
                    e
                );
                BTreeSet::new()
            }
        }
    }

    fn try_resolve(&self, task: &TaskId, all: &[TaskId]) -> Result<Vec<TaskId>> {
        match self {
            Self::None => Ok(Vec::new()),
            Self::Manifest(kind) => Ok(manifest_dependencies(*kind, task, all)?),
            Self::Custom(f) => f(task, all),
        }
    }
}

/// Tasks whose project directory is the target of one of `task`'s declared
/// manifest dependencies.
pub fn manifest_dependencies(
    kind: ManifestKind,
    task: &TaskId,
    all: &[TaskId],
) -> Result<Vec<TaskId>, ManifestError> {
    let project_dir = task.project_dir();
    let declared = manifest::read_dependencies(project_dir, kind)?;

    let mut deps = Vec::new();
    for (name, specifier) in &declared {
        let target = resolve_path(project_dir, kind.local_path(specifier));
        for other in all {
            if other.project_dir() == target && !deps.contains(other) {
                log::debug!("{} depends on {} (via '{}')", task, other, name);
                deps.push(other.clone());
            }
        }
    }

    Ok(deps)
}

/// Resolve `relative` against `base`, canonicalizing when the path exists.
fn resolve_path(base: &Path, relative: &str) -> PathBuf {
    let joined = normalize(&base.join(relative));
    std::fs::canonicalize(&joined).unwrap_or(joined)
}

/// Lexically collapse `.` and `..` components.
pub(crate) fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn project(root: &Path, name: &str, bower: Option<&str>) -> TaskId {
        let dir = root.join(name);
        std::fs::create_dir_all(&dir).unwrap();
        let descriptor = dir.join("Gruntfile.js");
        std::fs::write(&descriptor, "").unwrap();
        if let Some(json) = bower {
            std::fs::write(dir.join("bower.json"), json).unwrap();
        }
        TaskId::new(std::fs::canonicalize(descriptor).unwrap())
    }

    #[test]
    fn test_normalize_collapses_parent_components() {
        assert_eq!(normalize(Path::new("/a/b/../c/./d")), PathBuf::from("/a/c/d"));
    }

    #[test]
    fn test_none_strategy_has_no_dependencies() {
        let id = TaskId::new("/ws/a/Gruntfile.js");
        let deps = DependencyStrategy::None.resolve(&id, &[id.clone()]);
        assert!(deps.is_empty());
    }

    #[test]
    fn test_from_name() {
        assert!(matches!(
            DependencyStrategy::from_name("bower").unwrap(),
            DependencyStrategy::Manifest(ManifestKind::Bower)
        ));
        assert!(matches!(
            DependencyStrategy::from_name("npm").unwrap(),
            DependencyStrategy::Manifest(ManifestKind::Npm)
        ));
        assert!(DependencyStrategy::from_name("maven").is_err());
    }

    #[test]
    fn test_bower_strategy_matches_sibling_projects() {
        let root = TempDir::new().unwrap();
        let core = project(root.path(), "core", None);
        let util = project(root.path(), "util", None);
        let app = project(
            root.path(),
            "app",
            Some(r#"{ "dependencies": { "core": "../core", "jquery": "~2.0" },
                      "devDependencies": { "util": "../util/" } }"#),
        );
        let all = vec![app.clone(), core.clone(), util.clone()];

        let deps = DependencyStrategy::Manifest(ManifestKind::Bower).resolve(&app, &all);
        assert_eq!(deps, BTreeSet::from([core, util]));
    }

    #[test]
    fn test_broken_manifest_degrades_to_no_dependencies() {
        let root = TempDir::new().unwrap();
        let core = project(root.path(), "core", None);
        let app = project(root.path(), "app", Some("{ broken"));

        let all = vec![app.clone(), core];
        let deps = DependencyStrategy::Manifest(ManifestKind::Bower).resolve(&app, &all);
        assert!(deps.is_empty());
    }

    #[test]
    fn test_custom_strategy_errors_are_swallowed() {
        let strategy = DependencyStrategy::custom(|_, _| anyhow::bail!("boom"));
        let id = TaskId::new("/ws/a/Gruntfile.js");
        assert!(strategy.resolve(&id, &[id.clone()]).is_empty());
    }

    #[test]
    fn test_custom_strategy_drops_self_reference() {
        let a = TaskId::new("/ws/a/Gruntfile.js");
        let b = TaskId::new("/ws/b/Gruntfile.js");
        let strategy = DependencyStrategy::custom(|_, all| Ok(all.to_vec()));

        let deps = strategy.resolve(&a, &[a.clone(), b.clone()]);
        assert_eq!(deps, BTreeSet::from([b]));
    }
}
