use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Dissociate CLI - Extract bond dissociation reactions from molecule databases and build graph neural network datasets from them.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Set the number of threads for parallel computation.
    /// Defaults to the number of available logical cores.
    #[arg(short = 'j', long, global = true, value_name = "NUM")]
    pub threads: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Summarize a molecule database by formula, charge or spin multiplicity.
    Bucket(BucketArgs),
    /// Extract one-bond-break reactions from a molecule database into a reaction archive.
    Extract(ExtractArgs),
    /// Write structure, label and feature files for a dataset built from a reaction archive.
    Dataset(DatasetArgs),
    /// Write the bond energies of every reactant in a reaction archive as JSON.
    BondEnergies(BondEnergiesArgs),
}

/// Arguments for the `bucket` subcommand.
#[derive(Args, Debug)]
pub struct BucketArgs {
    /// Path to the molecule database (JSON).
    #[arg(short, long, required = true, value_name = "PATH")]
    pub input: PathBuf,

    /// Molecule attributes to bucket by, outermost first.
    #[arg(
        short,
        long,
        value_name = "KEY",
        value_delimiter = ',',
        default_value = "formula,charge"
    )]
    pub keys: Vec<String>,
}

/// Arguments for the `extract` subcommand.
#[derive(Args, Debug)]
pub struct ExtractArgs {
    /// Path to the molecule database (JSON).
    #[arg(short, long, required = true, value_name = "PATH")]
    pub input: PathBuf,

    /// Path for the output reaction archive.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub output: PathBuf,

    /// Path to a configuration file in TOML format.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Override the reaction style ('a-to-b', 'a-to-b-c' or 'all').
    #[arg(long, value_name = "STYLE")]
    pub style: Option<String>,

    /// Record every broken bond that yields the products, not only the first.
    #[arg(long)]
    pub exhaustive: bool,

    /// Set a specific configuration value, overriding the config file.
    /// Can be used multiple times. Example: -S filter.reactant-charges=0
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}

/// Arguments for the `dataset` subcommand.
#[derive(Args, Debug)]
pub struct DatasetArgs {
    /// Path to the reaction archive written by `extract`.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub input: PathBuf,

    /// Dataset kind ('reaction-based', 'bond-classification', 'bond-regression' or 'molecule-based').
    #[arg(short, long, value_name = "KIND")]
    pub kind: Option<String>,

    /// Path for the SDF structure file.
    #[arg(long, required = true, value_name = "PATH")]
    pub struct_file: PathBuf,

    /// Path for the label file.
    #[arg(long, required = true, value_name = "PATH")]
    pub label_file: PathBuf,

    /// Path for the optional JSON feature file.
    #[arg(long, value_name = "PATH")]
    pub feature_file: Option<PathBuf>,

    /// Path to a configuration file in TOML format.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Override the number of lowest-energy reactions labelled favorable.
    #[arg(short = 'n', long, value_name = "INT")]
    pub top_n: Option<usize>,

    /// Set a specific configuration value, overriding the config file.
    /// Can be used multiple times. Example: -S dataset.complement-reactions=true
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}

/// Arguments for the `bond-energies` subcommand.
#[derive(Args, Debug)]
pub struct BondEnergiesArgs {
    /// Path to the reaction archive written by `extract`.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub input: PathBuf,

    /// Path for the output JSON file.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub output: PathBuf,
}
