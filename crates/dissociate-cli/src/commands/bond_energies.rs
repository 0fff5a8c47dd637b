use crate::cli::BondEnergiesArgs;
use crate::error::Result;
use crate::utils::progress::CliProgressHandler;
use dissociate::engine::progress::ProgressReporter;
use dissociate::workflows;
use tracing::info;

pub fn run(args: BondEnergiesArgs, progress_handler: CliProgressHandler) -> Result<()> {
    super::require_input(&args.input, "Reaction archive")?;
    info!("Loading reactions from {:?}", &args.input);
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());
    let count = workflows::bond_energies::run(&args.input, &args.output, &reporter)?;
    println!(
        "✓ Bond energies of {} reaction(s) written to: {}",
        count,
        args.output.display()
    );
    Ok(())
}
