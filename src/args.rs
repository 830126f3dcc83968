//! Command-line handling for hub runs: target requests and pass-through flags

use anyhow::Result;
use regex::Regex;

/// One `TARGET[:OP[:OP...]]` request from the command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub target: String,
    /// Operations to run instead of the configured ones
    pub operations: Vec<String>,
}

impl Request {
    pub fn parse(token: &str) -> Result<Self> {
        let mut parts = token.split(':');
        let target = parts.next().unwrap_or_default().to_string();
        if target.is_empty() {
            anyhow::bail!("Invalid target request '{}'", token);
        }

        let operations: Vec<String> = parts.map(str::to_string).collect();
        if operations.iter().any(|op| op.is_empty()) {
            anyhow::bail!("Invalid target request '{}': empty operation name", token);
        }

        Ok(Self { target, operations })
    }
}

/// Tokens naming things to run: everything that is not a flag, except the
/// separate value following a bare descriptor flag (any of `descriptor_flags`).
pub fn requested_tokens(argv: &[String], descriptor_flags: &[String]) -> Vec<String> {
    argv.iter()
        .enumerate()
        .filter(|(i, arg)| {
            !arg.starts_with('-') && !(*i > 0 && descriptor_flags.contains(&argv[*i - 1]))
        })
        .map(|(_, arg)| arg.clone())
        .collect()
}

/// Arguments to hand to every child.
///
/// Drops the requested task names, `<flag>` / `<flag>=value`, and the value
/// token that follows a bare `<flag>`. Everything else passes through.
pub fn forward_args(argv: &[String], requested: &[String], descriptor_flag: &str) -> Vec<String> {
    let flag_re = Regex::new(&format!("^{}(=.*)?$", regex::escape(descriptor_flag)))
        .expect("escaped flag is a valid regex");

    argv.iter()
        .enumerate()
        .filter(|(i, arg)| {
            !requested.contains(*arg)
                && !flag_re.is_match(arg)
                && !(*i > 0 && argv[*i - 1] == descriptor_flag)
        })
        .map(|(_, arg)| arg.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_request() {
        assert_eq!(
            Request::parse("all").unwrap(),
            Request {
                target: "all".into(),
                operations: vec![],
            }
        );
        assert_eq!(
            Request::parse("all:jshint:test").unwrap().operations,
            vec!["jshint", "test"]
        );
        assert!(Request::parse(":build").is_err());
        assert!(Request::parse("all::test").is_err());
    }

    #[test]
    fn test_requested_tokens_skip_flags_and_descriptor_value() {
        let args = argv(&["all:build", "--verbose", "--gruntfile", "x/Gruntfile.js", "libs"]);
        let flags = argv(&["--gruntfile"]);
        assert_eq!(requested_tokens(&args, &flags), vec!["all:build", "libs"]);
    }

    #[test]
    fn test_requested_tokens_skip_values_of_every_flag() {
        let args = argv(&["libs", "--hubfile", "x/Hubfile", "--gruntfile", "y.js"]);
        let flags = argv(&["--gruntfile", "--hubfile"]);
        assert_eq!(requested_tokens(&args, &flags), vec!["libs"]);
    }

    #[test]
    fn test_forward_args_filters_descriptor_flags() {
        let args = argv(&[
            "all:build",
            "--verbose",
            "--gruntfile=other/Gruntfile.js",
            "--gruntfile",
            "x/Gruntfile.js",
            "--force",
        ]);
        let requested = requested_tokens(&args, &argv(&["--gruntfile"]));

        assert_eq!(
            forward_args(&args, &requested, "--gruntfile"),
            vec!["--verbose", "--force"]
        );
    }

    #[test]
    fn test_forward_args_keeps_similar_flags() {
        let args = argv(&["--gruntfile-extra", "--no-color"]);
        assert_eq!(
            forward_args(&args, &[], "--gruntfile"),
            vec!["--gruntfile-extra", "--no-color"]
        );
    }
}
