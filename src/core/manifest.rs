//! Project manifest reader - declared package dependencies of a project

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Supported manifest formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestKind {
    /// `bower.json`
    Bower,
    /// `package.json`
    Npm,
}

impl ManifestKind {
    pub fn file_name(&self) -> &'static str {
        match self {
            Self::Bower => "bower.json",
            Self::Npm => "package.json",
        }
    }

    /// Turn a dependency specifier into something path-like.
    ///
    /// npm marks local paths with `file:` or `link:`; bower takes them bare.
    pub fn local_path<'a>(&self, specifier: &'a str) -> &'a str {
        match self {
            Self::Bower => specifier,
            Self::Npm => specifier
                .strip_prefix("file:")
                .or_else(|| specifier.strip_prefix("link:"))
                .unwrap_or(specifier),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Manifest {
    #[serde(default)]
    dependencies: BTreeMap<String, String>,
    #[serde(default)]
    dev_dependencies: BTreeMap<String, String>,
}

/// Read a project's manifest and return name -> specifier for both the
/// regular and development dependency groups. Dev entries win on clashes.
pub fn read_dependencies(
    project_dir: &Path,
    kind: ManifestKind,
) -> Result<BTreeMap<String, String>, ManifestError> {
    let path = project_dir.join(kind.file_name());
    let content = std::fs::read_to_string(&path).map_err(|source| ManifestError::Read {
        path: path.clone(),
        source,
    })?;
    let manifest: Manifest =
        serde_json::from_str(&content).map_err(|source| ManifestError::Parse { path, source })?;

    let mut deps = manifest.dependencies;
    deps.extend(manifest.dev_dependencies);
    Ok(deps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_merges_regular_and_dev_dependencies() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("bower.json"),
            r#"{
                "name": "app",
                "dependencies": { "core": "../core", "jquery": "~2.1.0" },
                "devDependencies": { "jquery": "../jquery", "mocha": "*" }
            }"#,
        )
        .unwrap();

        let deps = read_dependencies(dir.path(), ManifestKind::Bower).unwrap();
        assert_eq!(deps.len(), 3);
        assert_eq!(deps["core"], "../core");
        assert_eq!(deps["jquery"], "../jquery");
        assert_eq!(deps["mocha"], "*");
    }

    #[test]
    fn test_missing_groups_are_empty() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("package.json"), r#"{ "name": "x" }"#).unwrap();

        let deps = read_dependencies(dir.path(), ManifestKind::Npm).unwrap();
        assert!(deps.is_empty());
    }

    #[test]
    fn test_missing_manifest_is_read_error() {
        let dir = TempDir::new().unwrap();
        let err = read_dependencies(dir.path(), ManifestKind::Bower).unwrap_err();
        assert!(matches!(err, ManifestError::Read { .. }));
    }

    #[test]
    fn test_malformed_manifest_is_parse_error() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("bower.json"), "{ not json").unwrap();
        let err = read_dependencies(dir.path(), ManifestKind::Bower).unwrap_err();
        assert!(matches!(err, ManifestError::Parse { .. }));
    }

    #[test]
    fn test_npm_local_path_prefixes() {
        assert_eq!(ManifestKind::Npm.local_path("file:../lib"), "../lib");
        assert_eq!(ManifestKind::Npm.local_path("link:../lib"), "../lib");
        assert_eq!(ManifestKind::Npm.local_path("^1.0.0"), "^1.0.0");
        assert_eq!(ManifestKind::Bower.local_path("file:x"), "file:x");
    }
}
