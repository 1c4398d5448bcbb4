mod cli;

use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{Cli, Commands};
use crate::config::Config;
use crate::index::ResolveOptions;

// Re-export from lib for internal use
use tagref::{config, error, index, indexer, linter};

/// Exit status when lint finds violations.
const LINT_FAILURE: u8 = 2;

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let default_filter = if cli.debug {
        "tagref=debug"
    } else if cli.verbose {
        "tagref=info"
    } else {
        "tagref=warn"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let config = Config::load(&cli.config)
        .with_context(|| format!("config {}", cli.config.display()))?;
    let index_path = cli.index_path.as_deref();

    match cli.command {
        Commands::Index {
            roots,
            watch,
            poll_interval,
        } => {
            cli::index_directory(&config, index_path, &roots, watch, poll_interval)
                .context("index")?;
        }
        Commands::Search {
            glob,
            regexp,
            args,
            format,
        } => {
            cli::search(&config, index_path, glob, regexp, &args, &format).context("search")?;
        }
        Commands::Resolve {
            loc,
            content,
            next,
            prev,
            cyclic,
            format,
        } => {
            let opts = ResolveOptions { next, prev, cyclic };
            cli::resolve_at(&config, index_path, &loc, content.as_deref(), opts, &format)
                .context("resolve")?;
        }
        Commands::Lint => {
            if !cli::lint(&config, index_path).context("lint")? {
                eprintln!("violations found");
                return Ok(ExitCode::from(LINT_FAILURE));
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}
