//! Stowage CLI - list and clear the caches of the current environment.
//!
//! Configuration comes from the `STOWAGE_*` environment variables; the
//! `--cache-root` and `--instance-id` flags override them.

mod commands;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use commands::{ClearOptions, ListOptions};
use std::path::PathBuf;
use std::process::ExitCode;
use stowage::{CacheRegistry, StowageConfig, StowageError};
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(name = "stowage")]
#[command(about = "List and clear stowage caches", version)]
struct Args {
    /// Verbose mode, more v, more verbose
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Root directory of the filesystem cache
    #[arg(long, global = true)]
    cache_root: Option<PathBuf>,

    /// Instance identifier appended to instance-scoped shared keys
    #[arg(long, global = true)]
    instance_id: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List all available caches, or every entry of one cache
    List {
        /// List entries for this cache (fs, apc)
        #[arg(long)]
        cache: Option<String>,

        /// Include entries created outside stowage
        #[arg(long)]
        show_unknown: bool,
    },

    /// Clear cache from all sources
    Clear {
        /// Report what would be cleared without clearing it
        #[arg(long)]
        dry_run: bool,
    },
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    match run(args) {
        Ok(output) => {
            print!("{output}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("Error: {err:#}");
            let code = err
                .downcast_ref::<StowageError>()
                .map(StowageError::exit_code)
                .unwrap_or(1);
            ExitCode::from(u8::try_from(code).unwrap_or(1))
        }
    }
}

/// Set up logging on stderr; `RUST_LOG` wins over the verbosity flags.
fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

fn run(args: Args) -> Result<String> {
    let mut config = StowageConfig::from_env().context("Failed to load configuration")?;
    if let Some(cache_root) = args.cache_root {
        config.cache_root = cache_root;
    }
    if let Some(instance_id) = args.instance_id {
        config.instance_id = instance_id;
        config.validate()?;
    }

    info!("Cache root: {}", config.cache_root.display());
    debug!("Configuration: {:?}", config);
    let registry = CacheRegistry::new(&config);

    let output = match args.command {
        Command::List {
            cache,
            show_unknown,
        } => commands::list(
            &registry,
            &ListOptions {
                cache,
                show_unknown,
            },
        )?,
        Command::Clear { dry_run } => commands::clear(
            &registry,
            &ClearOptions {
                verbose: args.verbose > 0,
                dry_run,
            },
        )?,
    };

    Ok(output)
}
