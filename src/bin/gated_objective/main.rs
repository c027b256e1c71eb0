mod cli;
use cli::*;

fn main() -> Result<(), Box<dyn Error>> {

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let Cli { config, gradients, sensitivities, subset, num_subsets, num_threads } = Cli::parse();

    let mut progress = Progress::new();
    progress.start(&format!("Reading problem described in {config:?}"));
    let config = read_config_file(&config)?;
    let Problem { kind, parts, sensitivities: supplied, estimate, .. } = config.load_problem()?;
    progress.done();

    let mut objective = PoissonGatedObjective::new(kind, parts);
    if let Some(n) = num_subsets { objective.set_num_subsets(n)?; }
    if let Some(supplied) = supplied { objective.set_sensitivities(supplied); }

    progress.start("Setting up objective function");
    objective.set_up(&estimate)?;
    progress.done();

    let balance = objective.actual_subsets_are_approximately_balanced()?;
    if let Some(warning) = balance.warning { println!("{warning}"); }

    let n_subsets = objective.num_subsets();
    let subsets: Vec<usize> = match subset {
        Some(s) if (1..=n_subsets).contains(&s) => vec![s - 1],
        Some(s) => return Err(format!("subset {s} out of range 1..={n_subsets}").into()),
        None => (0..n_subsets).collect(),
    };

    let pool = rayon::ThreadPoolBuilder::new().num_threads(num_threads).build()?;
    let bar = ProgressBar::new(subsets.len() as u64);
    bar.set_style(ProgressStyle::default_bar()
                  .template("Subset {msg}\n[{elapsed_precise}] {wide_bar} {pos}/{len} ({eta_precise})")?);

    let mut total = 0.0;
    for &s in &subsets {
        bar.set_message(format!("{}/{n_subsets}", s + 1));
        total += pool.install(|| objective.compute_subset_objective(&estimate, s))?;

        if let Some(prefix) = &sensitivities {
            let sensitivity = pool.install(|| objective.subset_sensitivity(s).cloned())?;
            write_image(&sensitivity, prefix, s)?;
        }
        if let Some(prefix) = &gradients {
            let mut gradient = objective.construct_target()?;
            pool.install(|| objective.compute_subset_gradient(&mut gradient, &estimate, s, true))?;
            write_image(&gradient, prefix, s)?;
        }
        bar.inc(1);
    }
    bar.finish_and_clear();
    progress.done_with_message("Processed subsets");

    println!("Objective function value: {total}");
    Ok(())
}

fn write_image(image: &Image, prefix: &Path, subset: usize) -> Result<(), Box<dyn Error>> {
    let path = subset_file(prefix, subset + 1);
    if let Some(parent) = path.parent() { std::fs::create_dir_all(parent)?; }
    image.write_to_raw_file(&path)?;
    tracing::info!("wrote {path:?}");
    Ok(())
}

// ----- Imports -----------------------------------------------------------------------------------------
use std::error::Error;
use std::path::Path;

use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

use gatedpet::{
    config::gated::{read_config_file, subset_file, Problem},
    image::Image,
    utils::timing::Progress,
    GatedObjectiveFunction, PoissonGatedObjective,
};
