use crate::cli::ExtractArgs;
use crate::config::PartialAppConfig;
use crate::error::Result;
use crate::utils::progress::CliProgressHandler;
use dissociate::engine::progress::ProgressReporter;
use dissociate::workflows;
use tracing::{info, warn};

pub fn run(args: ExtractArgs, progress_handler: CliProgressHandler) -> Result<()> {
    super::require_input(&args.input, "Molecule database")?;
    let partial_config = PartialAppConfig::load(args.config.as_deref())?;
    info!("Merging configuration from file and CLI arguments...");
    let config = partial_config.merge_extraction(&args)?;
    info!(
        style = %config.style,
        find_one = config.find_one,
        "Extraction configuration resolved."
    );

    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    println!("Extracting reactions from {}...", args.input.display());
    let summary = workflows::extract::run(&args.input, &args.output, &config, &reporter)?;

    if summary.num_reactions == 0 {
        warn!("Extraction finished without any reaction.");
        println!("Warning: no reaction found among {} molecule(s).", summary.num_molecules);
    }
    println!(
        "✓ {} reaction(s) ({} A -> B, {} A -> B + C before filtering) from {} molecule(s) written to: {}",
        summary.num_reactions,
        summary.num_a_to_b,
        summary.num_a_to_b_c,
        summary.num_molecules,
        args.output.display()
    );
    Ok(())
}
