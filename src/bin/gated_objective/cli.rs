#[derive(clap::Parser, Debug, Clone)]
#[clap(name = "gated_objective", about = "Evaluate the gated Poisson log-likelihood, its gradients and sensitivities")]
pub struct Cli {

    /// TOML file describing the problem
    #[clap(short, long)]
    pub config: PathBuf,

    /// Write subset gradients to `{prefix}_s{n}.raw`
    #[clap(short, long)]
    pub gradients: Option<PathBuf>,

    /// Write subset sensitivities to `{prefix}_s{n}.raw`
    #[clap(short, long)]
    pub sensitivities: Option<PathBuf>,

    /// Only process this subset (counting from 1)
    #[clap(long)]
    pub subset: Option<usize>,

    /// Override the number of subsets given in the config file
    #[clap(long)]
    pub num_subsets: Option<usize>,

    /// Maximum number of rayon threads
    #[clap(short = 'j', long, default_value = "4")]
    pub num_threads: usize,
}

// ----- Imports -----------------------------------------------------------------------------------------
use std::path::PathBuf;
