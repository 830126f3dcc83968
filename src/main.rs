//! hubrun CLI entry point

use clap::Parser;
use hubrun::config::DEFAULT_CONFIG;
use hubrun::{GraphError, Hub, OutputSink};
use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;

/// Run many projects, honoring the dependencies between them
#[derive(Debug, Parser)]
#[command(name = "hubrun", version, about)]
struct Cli {
    /// Hub configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG)]
    config: PathBuf,

    /// The hub's own descriptor (excluded from runs unless --allow-self)
    #[arg(long)]
    descriptor: Option<PathBuf>,

    /// Also run the hub's own descriptor if a pattern matches it
    #[arg(long)]
    allow_self: bool,

    /// Dependency strategy for every target: none, bower or npm
    #[arg(long, value_name = "NAME")]
    dependency_fn: Option<String>,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    /// Log debug details
    #[arg(short, long)]
    verbose: bool,

    /// Targets to run (TARGET[:OP...]), followed by flags passed to every child
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logger
    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    log::debug!("🚀 hubrun v{}", env!("CARGO_PKG_VERSION"));

    let color = !cli.no_color && std::io::stdout().is_terminal();
    let hub = match Hub::from_config_file(&cli.config, OutputSink::stdio(color)) {
        Ok(hub) => hub
            .with_descriptor(cli.descriptor)
            .with_allow_self(cli.allow_self.then_some(true))
            .with_dependency_fn(cli.dependency_fn),
        Err(e) => {
            log::error!("{:#}", e);
            return ExitCode::from(2);
        }
    };

    match hub.run(&cli.args).await {
        Ok(summary) if summary.is_success() => ExitCode::SUCCESS,
        Ok(summary) => {
            log::error!("{} task(s) failed", summary.failure_count());
            for id in summary.failed_tasks() {
                log::error!("  {}", id);
            }
            ExitCode::FAILURE
        }
        Err(e) => {
            match e.downcast_ref::<GraphError>() {
                Some(graph_err) => log::error!("Graph integrity error: {}", graph_err),
                None => log::error!("{:#}", e),
            }
            ExitCode::from(2)
        }
    }
}
