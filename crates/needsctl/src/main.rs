// Needs RL control CLI
// Train, inspect and reset shared Q-tables from the command line

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "needsctl")]
#[command(about = "Needs-driven Q-learning control CLI", version)]
struct Cli {
    /// Engine configuration file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run generations of agents and grow the shared tables
    Train {
        /// Stop after this many lifetimes
        #[arg(short, long)]
        generations: Option<u32>,

        /// Agents alive at once
        #[arg(short, long)]
        agents: Option<u32>,

        /// Learner tiers
        #[arg(short, long)]
        mode: Option<ModeArg>,

        /// Seed for reproducible runs
        #[arg(long)]
        seed: Option<u64>,

        /// Directory holding the shared tables
        #[arg(long)]
        save_dir: Option<PathBuf>,

        /// Directory for decision and generation logs
        #[arg(long)]
        log_dir: Option<PathBuf>,

        /// Decision log format
        #[arg(long, value_enum, default_value = "csv")]
        format: LogFormat,

        /// Tick on the wall clock instead of as fast as possible
        #[arg(long)]
        realtime: bool,
    },

    /// Show statistics and greedy actions of a persisted table
    Inspect {
        /// Which table to read
        #[arg(short, long, value_enum, default_value = "micro")]
        tier: TierArg,

        /// Read this file instead of the configured one
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// States to list, most visited first
        #[arg(short = 'n', long, default_value = "10")]
        top: usize,
    },

    /// Delete the persisted tables
    Reset {
        /// Skip the confirmation notice
        #[arg(short, long)]
        yes: bool,
    },

    /// Print the effective configuration as TOML
    Config,
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Flat,
    Hierarchical,
}

#[derive(Clone, Copy, ValueEnum)]
enum TierArg {
    Micro,
    Macro,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Csv,
    Jsonl,
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let config = commands::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Train {
            generations,
            agents,
            mode,
            seed,
            save_dir,
            log_dir,
            format,
            realtime,
        } => {
            let overrides = commands::TrainOverrides {
                generations,
                agents,
                mode: mode.map(|mode| match mode {
                    ModeArg::Flat => needs_rl_agent::ControllerMode::Flat,
                    ModeArg::Hierarchical => needs_rl_agent::ControllerMode::Hierarchical,
                }),
                seed,
                save_dir,
                log_dir,
                jsonl: matches!(format, LogFormat::Jsonl),
            };
            commands::train(config, overrides, realtime).await?;
        }
        Commands::Inspect { tier, file, top } => {
            commands::inspect(&config, matches!(tier, TierArg::Macro), file, top)?;
        }
        Commands::Reset { yes } => {
            commands::reset(&config, yes)?;
        }
        Commands::Config => {
            commands::print_config(&config)?;
        }
    }

    Ok(())
}
