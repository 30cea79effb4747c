use clap::{ArgAction, Parser, Subcommand};
use oxidized_rulecov::output::{DiffFormat, OutputFormat};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "oxidized-rulecov",
    version,
    about = "Verify a rule engine against an annotated fixture corpus"
)]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug). RULECOV_LOG overrides.
    #[arg(long, short, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Load and validate a corpus without running the engine
    Check {
        /// Corpus root directory
        corpus: PathBuf,

        /// Custom config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Scan the corpus with the engine and report coverage
    Scan {
        /// Corpus root directory
        corpus: PathBuf,

        /// Output format
        #[arg(long, short, default_value = "pretty", value_enum)]
        format: OutputFormat,

        /// Write output to file instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Custom config file path
        #[arg(long)]
        config: Option<PathBuf>,

        /// Reconcile against a recorded engine output instead of running the engine
        #[arg(long)]
        matches: Option<PathBuf>,

        /// Baseline report to check for regressions
        #[arg(long)]
        baseline: Option<PathBuf>,

        /// Maximum concurrent engine invocations
        #[arg(long)]
        workers: Option<usize>,

        /// Cancel the run after this many seconds
        #[arg(long)]
        deadline: Option<u64>,
    },

    /// Re-render a stored JSON report
    Report {
        /// Path to a report produced with --format json
        report: PathBuf,

        /// Output format
        #[arg(long, short, default_value = "pretty", value_enum)]
        format: OutputFormat,
    },

    /// Compare a report against a baseline
    Diff {
        /// Baseline report
        baseline: PathBuf,

        /// Current report
        current: PathBuf,

        /// Output format
        #[arg(long, short, default_value = "pretty", value_enum)]
        format: DiffFormat,
    },

    /// List rule ids referenced by the corpus
    Rules {
        /// Corpus root directory
        corpus: PathBuf,

        /// Custom config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Check whether the configured engine is available
    CheckEngine {
        /// Custom config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },
}
