mod common;
mod run_query;
mod run_sample;
mod run_simulate;

use crate::common::*;
use crate::run_query::*;
use crate::run_sample::*;
use crate::run_simulate::*;

#[derive(Parser, Debug)]
#[command(
    version,
    about = "TMAP",
    long_about = "Sampling and trajectory queries over transport maps\n\
		  between consecutive time points of single-cell data.\n\
		  Plans are dense `source x target` matrices, one file per\n\
		  pair of consecutive time points."
)]
struct Cli {
    #[command(subcommand)]
    commands: Commands,

    /// number of threads (default: all logical CPUs)
    #[arg(long, global = true)]
    threads: Option<usize>,

    /// verbosity
    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Simulate random plans between consecutive time points
    Simulate(SimArgs),

    #[command(
        about = "Sample (source, target) cell pairs from transport maps",
        long_about = "Sample cell pairs in two stages: \n\
		      (1) Draw source cells from the row marginal of the plan\n\
		      (2) Draw target cells from each source cell's conditional.\n\
		      With `--unbalanced`, target weights are corrected for growth."
    )]
    Sample(SampleArgs),

    /// Growth rates of source cells relative to a uniform marginal
    Growth(GrowthArgs),

    /// Descendant or ancestor distribution of selected cells
    Fate(FateArgs),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        std::env::set_var("RUST_LOG", "info");
    }
    env_logger::init();

    rayon::ThreadPoolBuilder::new()
        .num_threads(cli.threads.unwrap_or_else(num_cpus::get))
        .build_global()?;

    match &cli.commands {
        Commands::Simulate(args) => {
            run_simulate(args)?;
        }
        Commands::Sample(args) => {
            run_sample(args)?;
        }
        Commands::Growth(args) => {
            run_growth(args)?;
        }
        Commands::Fate(args) => {
            run_fate(args)?;
        }
    }

    info!("Done");
    Ok(())
}
