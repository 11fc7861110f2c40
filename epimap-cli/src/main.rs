use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod config;
mod error;

use config::Config;
use error::{print_error_and_exit, CliError, CliResult};

#[derive(Parser)]
#[command(name = "epimap")]
#[command(about = "epimap - Conserved-region MHC-I epitope mapping")]
#[command(version)]
#[command(long_about = "
epimap builds a consensus of homologous protein sequences, finds the regions
conserved across all of them, and maps predicted and published MHC class I
epitopes onto that consensus.

Examples:
  epimap predict proteins.fasta --allele HLA-A*02:01 --lengths 9-10
  epimap predict --sample --accession P03485 --stream
  epimap consensus proteins.fasta --min-conserved 12
  epimap align-json < proteins.fasta
  epimap config --example > epimap.toml
")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file path
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (suppress non-error output)
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Predict MHC-I binders and match published epitopes on the consensus
    Predict {
        /// Protein FASTA file (.gz accepted, '-' for stdin)
        input: Option<PathBuf>,

        /// Use the configured sample FASTA instead of an input file
        #[arg(long)]
        sample: bool,

        /// HLA allele to predict for (repeatable)
        #[arg(short, long = "allele")]
        alleles: Vec<String>,

        /// Peptide length range, e.g. '9-10' or '9'
        #[arg(long)]
        lengths: Option<String>,

        /// Minimum conserved run length in alignment columns (5-100)
        #[arg(long)]
        min_conserved: Option<usize>,

        /// UniProt accession used to look up published epitopes
        #[arg(long)]
        accession: Option<String>,

        /// Build the consensus and match published epitopes only
        #[arg(long)]
        skip_prediction: bool,

        /// Emit NDJSON progress events and the result on stdout
        #[arg(long, conflicts_with = "output")]
        stream: bool,

        /// Output JSON file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print consensus, coordinate map and conserved regions as JSON
    Consensus {
        /// Protein FASTA file (.gz accepted, '-' for stdin)
        input: Option<PathBuf>,

        /// Use the configured sample FASTA instead of an input file
        #[arg(long)]
        sample: bool,

        /// Minimum conserved run length in alignment columns (5-100)
        #[arg(long)]
        min_conserved: Option<usize>,

        /// Output JSON file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Align FASTA from stdin with Clustal Omega and print rows as JSON
    AlignJson,

    /// Print the sample FASTA
    Sample,

    /// Show configuration
    Config {
        /// Print the default configuration as TOML
        #[arg(long)]
        example: bool,

        /// Write the effective configuration to a file instead of printing it
        #[arg(long, conflicts_with = "example")]
        write: Option<PathBuf>,
    },
}

fn setup_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        "error"
    } else {
        match verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

fn run(cli: Cli) -> CliResult<()> {
    let config = Config::load(cli.config.as_deref()).map_err(|e| CliError::config(format!("{:#}", e)))?;

    match cli.command {
        Commands::Predict {
            input,
            sample,
            alleles,
            lengths,
            min_conserved,
            accession,
            skip_prediction,
            stream,
            output,
        } => commands::predict::execute(
            &config,
            input,
            sample,
            alleles,
            lengths,
            min_conserved,
            accession,
            skip_prediction,
            stream,
            output,
        ),

        Commands::Consensus {
            input,
            sample,
            min_conserved,
            output,
        } => commands::consensus::execute(&config, input, sample, min_conserved, output),

        Commands::AlignJson => commands::align_json::execute(&config),

        Commands::Sample => commands::sample::execute(&config),

        Commands::Config { write: Some(path), .. } => {
            config.save_to_file(&path).map_err(|e| CliError::config(format!("{:#}", e)))?;
            log::info!("Configuration written to: {}", path.display());
            Ok(())
        }

        Commands::Config { example, .. } => {
            let content = if example {
                Config::example_toml()
            } else {
                toml::to_string_pretty(&config).map_err(anyhow::Error::from)
            }
            .map_err(|e| CliError::config(format!("{:#}", e)))?;
            print!("{}", content);
            Ok(())
        }
    }
}

fn main() {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    if let Err(err) = run(cli) {
        print_error_and_exit(&err);
    }
}
