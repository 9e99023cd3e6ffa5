//! CLI argument definitions for `pheno-cc`.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{Verbosity, WarnLevel};

#[derive(Parser)]
#[command(
    name = "pheno-cc",
    version,
    about = "Build case/control phenotype matrices from OMOP occurrence data",
    long_about = "Classify every eligible subject as case, control or excluded for each\n\
                  phenotype definition and write a subject x phenotype matrix.\n\n\
                  Outputs a matrix TSV (1 case, 0 control, NA otherwise), per-ancestry\n\
                  case/control counts and a JSON run manifest."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Adjust log verbosity (-v for info, -vv for debug, -q for errors only).
    #[command(flatten)]
    pub verbosity: Verbosity<WarnLevel>,

    /// Explicit log level (overrides -v/-q flags).
    #[arg(long = "log-level", value_enum, global = true)]
    pub log_level: Option<LogLevelArg>,

    /// Log output format (pretty for humans, json for machine parsing).
    #[arg(
        long = "log-format",
        value_enum,
        default_value = "pretty",
        global = true
    )]
    pub log_format: LogFormatArg,

    /// Write logs to a file instead of stderr.
    #[arg(long = "log-file", value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Classify subjects for every phenotype and write the matrix.
    Classify(ClassifyArgs),

    /// Convert a TSV definition sheet to JSONL.
    Convert(ConvertArgs),
}

#[derive(Parser)]
pub struct ClassifyArgs {
    /// Phenotype definitions (.jsonl, or .tsv export of the definition sheet).
    #[arg(value_name = "PHENOTYPES")]
    pub phenotypes: PathBuf,

    /// Demographics TSV used to build the eligible roster.
    #[arg(long, value_name = "TSV")]
    pub demographics: PathBuf,

    /// Condition and procedure occurrences TSV.
    #[arg(long, value_name = "TSV")]
    pub occurrences: PathBuf,

    /// ICD9/10 to OMOP concept mapping TSV.
    #[arg(long = "icd-map", value_name = "TSV")]
    pub icd_map: Option<PathBuf>,

    /// Concept ancestor TSV for descendant expansion.
    #[arg(long, value_name = "TSV")]
    pub ancestors: Option<PathBuf>,

    /// Matrix TSV path (default: <PHENOTYPES>.tsv).
    #[arg(long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Counts TSV path (default: <PHENOTYPES>_counts.tsv).
    #[arg(long, value_name = "PATH")]
    pub counts: Option<PathBuf>,

    /// Manifest JSON path (default: <PHENOTYPES>_manifest.json).
    #[arg(long, value_name = "PATH", conflicts_with = "no_manifest")]
    pub manifest: Option<PathBuf>,

    /// Skip writing the run manifest.
    #[arg(long = "no-manifest")]
    pub no_manifest: bool,

    /// Counts below this value are written as "<N".
    #[arg(long = "min-cell-count", value_name = "N", default_value_t = 20)]
    pub min_cell_count: usize,

    /// Classify phenotypes in parallel (requires the `parallel` feature).
    #[arg(long)]
    pub parallel: bool,

    /// Fail a phenotype when one of its ICD codes has no mapping.
    #[arg(long = "abort-on-unmapped")]
    pub abort_on_unmapped: bool,

    /// Match declared concepts only, without their descendants.
    #[arg(long = "no-descendants")]
    pub no_descendants: bool,

    /// Maximum cached descendant closures (0 disables the cache).
    #[arg(long = "cache-size", value_name = "N", default_value_t = 10_000)]
    pub cache_size: usize,
}

#[derive(Parser)]
pub struct ConvertArgs {
    /// Definition sheet exported as TSV.
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Output JSONL path (default: <INPUT>.jsonl).
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,
}

/// CLI log level choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// CLI log format choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Compact,
    Json,
}
