mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use commands::{cmd_call, cmd_locate, cmd_query, cmd_span};

#[derive(Parser)]
#[command(name = "rifty")]
#[command(
    about = "Structural-variant caller for noisy long-read sequencing",
    long_about = "rifty - Structural-variant caller for noisy long-read sequencing\n\n\
    Detects inversions, deletions, duplications, insertions and translocations\n\
    by aligning long reads against a reference assembly with a suffix-automaton\n\
    index and breakpoint-detecting partial alignment.\n\n\
    The pipeline runs in three stages, each persisting plain-text records:\n\
      locate -> where each read lands on the reference (and its orientation)\n\
      span   -> per-read breakpoints and inversion score\n\
      call   -> SV lines inferred from the persisted breakpoints\n\n\
    Examples:\n\
      rifty locate -r ref.fasta -l reads.fasta -j 8 -o locate.txt\n\
      rifty span -r ref.fasta -l reads.fasta -p locate.txt -j 8 -o dump.txt\n\
      rifty call -r ref.fasta -l reads.fasta -p locate.txt -d dump.txt\n\
      rifty query -p locate.txt -l 120000 -r 128000"
)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Locate each read on the reference (window + orientation)
    Locate {
        /// Reference FASTA file
        #[arg(short = 'r', long = "ref")]
        reference: PathBuf,

        /// Long-read FASTA file
        #[arg(short = 'l', long = "long")]
        runs: PathBuf,

        /// Number of worker threads (default: all cores)
        #[arg(short = 'j', long)]
        jobs: Option<usize>,

        /// Write locate records here instead of stdout
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,
    },

    /// Span located reads: breakpoints and inversion score per read
    Span {
        /// Reference FASTA file
        #[arg(short = 'r', long = "ref")]
        reference: PathBuf,

        /// Long-read FASTA file
        #[arg(short = 'l', long = "long")]
        runs: PathBuf,

        /// Locate records produced by `rifty locate`
        #[arg(short = 'p', long)]
        locate: PathBuf,

        /// Number of worker threads (default: all cores)
        #[arg(short = 'j', long)]
        jobs: Option<usize>,

        /// Write dump records here instead of stdout
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,
    },

    /// Infer SV events from persisted breakpoints
    Call {
        /// Reference FASTA file
        #[arg(short = 'r', long = "ref")]
        reference: PathBuf,

        /// Long-read FASTA file
        #[arg(short = 'l', long = "long")]
        runs: PathBuf,

        /// Locate records produced by `rifty locate`
        #[arg(short = 'p', long)]
        locate: PathBuf,

        /// Dump records produced by `rifty span`
        #[arg(short = 'd', long)]
        dump: PathBuf,

        /// Write SV lines here instead of stderr
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,
    },

    /// Print locate records whose window intersects a range
    Query {
        /// Locate records produced by `rifty locate`
        #[arg(short = 'p', long)]
        locate: PathBuf,

        /// Range left bound
        #[arg(short = 'l', long)]
        left: i32,

        /// Range right bound
        #[arg(short = 'r', long)]
        right: i32,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Locate {
            reference,
            runs,
            jobs,
            output,
        } => cmd_locate(&reference, &runs, jobs, output.as_deref()),
        Commands::Span {
            reference,
            runs,
            locate,
            jobs,
            output,
        } => cmd_span(&reference, &runs, &locate, jobs, output.as_deref()),
        Commands::Call {
            reference,
            runs,
            locate,
            dump,
            output,
        } => cmd_call(&reference, &runs, &locate, &dump, output.as_deref()),
        Commands::Query {
            locate,
            left,
            right,
        } => cmd_query(&locate, left, right),
    }
}
