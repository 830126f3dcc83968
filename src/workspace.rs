//! Descriptor discovery - find the projects a hub run should cover

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Expand `{a,b}` alternations into separate patterns.
///
/// `{G,g}runtfile.{js,coffee}` becomes four patterns. Nested groups are
/// supported; an unbalanced `{` is kept literally.
pub fn expand_braces(pattern: &str) -> Vec<String> {
    let Some(open) = pattern.find('{') else {
        return vec![pattern.to_string()];
    };

    let mut depth = 0;
    let mut close = None;
    let mut commas = Vec::new();
    for (offset, c) in pattern[open..].char_indices() {
        let i = open + offset;
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    close = Some(i);
                    break;
                }
            }
            ',' if depth == 1 => commas.push(i),
            _ => {}
        }
    }

    let Some(close) = close else {
        return vec![pattern.to_string()];
    };

    let prefix = &pattern[..open];
    let suffix = &pattern[close + 1..];
    let mut bounds = vec![open];
    bounds.extend(commas);
    bounds.push(close);

    bounds
        .windows(2)
        .flat_map(|w| {
            let alternative = &pattern[w[0] + 1..w[1]];
            expand_braces(&format!("{}{}{}", prefix, alternative, suffix))
        })
        .collect()
}

/// Find descriptor files matching `patterns`, relative to `base`.
///
/// Patterns apply in order; a leading `!` removes earlier matches. Only
/// regular files are returned, canonicalized and without duplicates, in the
/// order they were first matched.
pub fn discover(base: &Path, patterns: &[String]) -> Result<Vec<PathBuf>> {
    let mut found: Vec<PathBuf> = Vec::new();

    for pattern in patterns {
        let (exclude, pattern) = match pattern.strip_prefix('!') {
            Some(rest) => (true, rest),
            None => (false, pattern.as_str()),
        };

        for expanded in expand_braces(pattern) {
            let matches = glob_files(base, &expanded)?;
            if exclude {
                found.retain(|path| !matches.contains(path));
            } else {
                for path in matches {
                    if !found.contains(&path) {
                        found.push(path);
                    }
                }
            }
        }
    }

    Ok(found)
}

fn glob_files(base: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    let full = if Path::new(pattern).is_absolute() {
        pattern.to_string()
    } else {
        format!(
            "{}/{}",
            glob::Pattern::escape(&base.to_string_lossy()),
            pattern
        )
    };

    let entries = glob::glob(&full).with_context(|| format!("Invalid file pattern '{}'", pattern))?;

    let mut files = Vec::new();
    for entry in entries {
        match entry {
            Ok(path) if path.is_file() => match std::fs::canonicalize(&path) {
                Ok(canonical) => files.push(canonical),
                Err(e) => log::warn!("Skipping {}: {}", path.display(), e),
            },
            Ok(_) => {}
            Err(e) => log::warn!("Unreadable path while matching '{}': {}", pattern, e),
        }
    }

    Ok(files)
}

/// The hub's own descriptor: the explicit path if given, otherwise the first
/// file under `base` matching `patterns`.
pub fn locate_own_descriptor(
    base: &Path,
    explicit: Option<&Path>,
    patterns: &[String],
) -> Result<Option<PathBuf>> {
    if let Some(path) = explicit {
        let path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            base.join(path)
        };
        let canonical = std::fs::canonicalize(&path)
            .with_context(|| format!("Descriptor not found: {}", path.display()))?;
        return Ok(Some(canonical));
    }

    Ok(discover(base, patterns)?.into_iter().next())
}
