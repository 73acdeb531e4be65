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
    author = "Tony Kan, Ted Yu",
    version,
    about = "TLSMD CLI - TLS rigid-body analysis of anisotropic displacement parameters: segment search, center-of-reaction analysis and predicted ANISOU rendering.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Show only errors on the console; a --log-file still records search details
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
    /// Slide a residue window along every chain and report the rigid segments.
    Search(SearchArgs),
    /// Print the center-of-reaction analysis of TLS groups.
    Analyze(AnalyzeArgs),
    /// Write a PDB file whose ADPs are the TLS model predictions.
    Anisou(AnisouArgs),
}

/// Arguments for the `search` subcommand.
#[derive(Args, Debug)]
pub struct SearchArgs {
    // --- Core Arguments ---
    /// Path to the input PDB file with ANISOU records.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub input: PathBuf,

    /// Path to a configuration file in TOML format.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Write every window and its outcome as CSV.
    #[arg(long, value_name = "PATH")]
    pub csv: Option<PathBuf>,

    /// Write the retained segments as a TLSOUT file.
    #[arg(long, value_name = "PATH")]
    pub tlsout: Option<PathBuf>,

    // --- Search Overrides ---
    /// Restrict the search to these chains. Example: --chains A,B
    #[arg(long, value_name = "IDS", value_delimiter = ',')]
    pub chains: Vec<char>,

    /// Override the number of residues per window.
    #[arg(short = 'w', long, value_name = "INT")]
    pub window_width: Option<usize>,

    /// Override the mean DP2 above which a window is rejected.
    #[arg(long, value_name = "FLOAT")]
    pub dp2_threshold: Option<f64>,

    /// Fit only the N, CA, C and O atoms.
    #[arg(long)]
    pub main_chain_only: bool,

    /// Keep hydrogen atoms.
    #[arg(long)]
    pub include_hydrogens: bool,

    /// Keep atoms with occupancy below 1.
    #[arg(long)]
    pub include_frac_occupancy: bool,

    /// Drop atoms with at most one covalent bond. Bonds are inferred from distances.
    #[arg(long)]
    pub exclude_single_bond: bool,

    /// Override the tolerance (Å) added to covalent radii when inferring bonds.
    #[arg(long, value_name = "FLOAT")]
    pub bond_tolerance: Option<f64>,

    /// Reject windows whose reduced translation tensor has a negative eigenvalue.
    #[arg(long)]
    pub reject_invalid_reduced_t: bool,

    /// Refit every window about its centroid shifted by X,Y,Z and log disagreements.
    #[arg(long, value_name = "X,Y,Z", value_delimiter = ',')]
    pub verify_origin_shift: Option<Vec<f64>>,

    /// Set a specific configuration value, overriding the config file.
    /// Can be used multiple times. Example: -S search.window-width=8
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}

/// Where the TLS group descriptions come from.
#[derive(Args, Debug, Clone)]
#[group(required = false, multiple = false)]
pub struct TlsSource {
    /// Read TLS groups from a TLSIN/TLSOUT file.
    #[arg(long, value_name = "PATH")]
    pub tls: Option<PathBuf>,
    /// Read TLS groups from the REMARK 3 records of the input PDB file.
    #[arg(long)]
    pub remark: bool,
}

/// Arguments for the `analyze` subcommand.
#[derive(Args, Debug)]
pub struct AnalyzeArgs {
    /// Path to the input PDB file with ANISOU records.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub input: PathBuf,

    /// TLS groups to analyze. Without a source, one group of every
    /// amino-acid atom is fitted.
    #[command(flatten)]
    pub source: TlsSource,

    /// Refit every group even if its description carries tensors.
    #[arg(long)]
    pub refit: bool,

    /// Write the report to a file instead of standard output.
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Write the analyzed groups, about their centers of reaction, as a TLSOUT file.
    #[arg(long, value_name = "PATH")]
    pub tlsout: Option<PathBuf>,
}

/// Arguments for the `anisou` subcommand.
#[derive(Args, Debug)]
pub struct AnisouArgs {
    /// Path to the input PDB file.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub input: PathBuf,

    /// Path for the output PDB file.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub output: PathBuf,

    /// TLS groups whose predictions replace the experimental ADPs.
    #[command(flatten)]
    pub source: TlsSource,

    /// Refit every group before predicting.
    #[arg(long)]
    pub refit: bool,
}
