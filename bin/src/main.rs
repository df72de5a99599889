//! forja CLI binary.
//!
//! Mines factors from a long-format CSV panel and manages the factor
//! registry the runs promote into.

mod cmd;
mod data;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "forja")]
#[command(about = "Genetic-programming factor mining", long_about = None)]
#[command(version)]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a mining session over a CSV panel
    Mine {
        /// Long-format CSV with timestamp, symbol and feature columns
        #[arg(short, long)]
        data: PathBuf,

        /// JSON mining configuration (defaults when omitted)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Directory for checkpoints and the final result
        #[arg(short, long, default_value = "runs/latest")]
        output: PathBuf,

        /// Registry directory to promote into
        #[arg(short, long)]
        registry: Option<PathBuf>,

        /// Label column to score against instead of the next return
        #[arg(short, long)]
        label: Option<String>,

        /// Override the number of generations
        #[arg(short, long)]
        generations: Option<usize>,

        /// Override the population size
        #[arg(short, long)]
        population: Option<usize>,

        /// Override the random seed
        #[arg(long)]
        seed: Option<u64>,

        /// Override the scoring mode (ic or portfolio)
        #[arg(long)]
        mode: Option<String>,
    },

    /// List registry entries
    List {
        /// Registry directory
        #[arg(short, long, default_value = "registry")]
        registry: PathBuf,

        /// Minimum Sharpe ratio
        #[arg(long)]
        min_sharpe: Option<f64>,

        /// Maximum turnover
        #[arg(long)]
        max_turnover: Option<f64>,

        /// Restrict to one tier (moderate or high)
        #[arg(short, long)]
        tier: Option<String>,

        /// Sort key (fitness, sharpe, ic, turnover, added_at)
        #[arg(short, long, default_value = "fitness")]
        sort: String,

        /// Maximum number of entries
        #[arg(short = 'n', long)]
        limit: Option<usize>,

        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Import externally produced candidates into the registry
    Import {
        /// JSON array of candidates
        file: PathBuf,

        /// Registry directory
        #[arg(short, long, default_value = "registry")]
        registry: PathBuf,

        /// Minimum Sharpe ratio
        #[arg(long)]
        min_sharpe: Option<f64>,

        /// Maximum turnover
        #[arg(long)]
        max_turnover: Option<f64>,
    },

    /// Export a factor as a standalone definition
    Export {
        /// Expression text or registry id
        factor: String,

        /// Registry directory used to resolve ids
        #[arg(short, long, default_value = "registry")]
        registry: PathBuf,

        /// Factor name (defaults to the registry id or "factor")
        #[arg(long)]
        name: Option<String>,

        /// Output format (json or rust)
        #[arg(short, long, default_value = "json")]
        format: String,

        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// CSV panel whose columns define the terminals
        #[arg(short, long)]
        data: Option<PathBuf>,
    },

    /// List available operators
    Operators {
        /// Filter by category
        #[arg(short, long)]
        category: Option<String>,
    },

    /// Re-score registry entries against a new panel
    Reevaluate {
        /// CSV panel to score against
        #[arg(short, long)]
        data: PathBuf,

        /// Registry directory
        #[arg(short, long, default_value = "registry")]
        registry: PathBuf,

        /// JSON mining configuration for the fitness settings
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Maximum number of entries to print
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli.command) {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "info" }));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Mine {
            data,
            config,
            output,
            registry,
            label,
            generations,
            population,
            seed,
            mode,
        } => cmd::mine::run_mine(cmd::mine::MineArgs {
            data,
            config,
            output,
            registry,
            label,
            generations,
            population,
            seed,
            mode,
        }),
        Commands::List {
            registry,
            min_sharpe,
            max_turnover,
            tier,
            sort,
            limit,
            format,
        } => cmd::list::list_factors(
            &registry,
            min_sharpe,
            max_turnover,
            tier.as_deref(),
            &sort,
            limit,
            &format,
        ),
        Commands::Import {
            file,
            registry,
            min_sharpe,
            max_turnover,
        } => cmd::import::import_candidates(&file, &registry, min_sharpe, max_turnover),
        Commands::Export {
            factor,
            registry,
            name,
            format,
            output,
            data,
        } => cmd::export::export_factor(
            &factor,
            &registry,
            name,
            &format,
            output.as_deref(),
            data.as_deref(),
        ),
        Commands::Operators { category } => cmd::operators::list_operators(category.as_deref()),
        Commands::Reevaluate {
            data,
            registry,
            config,
            limit,
        } => cmd::reevaluate::reevaluate(&data, &registry, config.as_deref(), limit),
    }
}
