use crate::cli::DatasetArgs;
use crate::config::PartialAppConfig;
use crate::error::Result;
use crate::utils::progress::CliProgressHandler;
use dissociate::engine::dataset::DatasetPaths;
use dissociate::engine::progress::ProgressReporter;
use dissociate::workflows;
use tracing::info;

pub fn run(args: DatasetArgs, progress_handler: CliProgressHandler) -> Result<()> {
    super::require_input(&args.input, "Reaction archive")?;
    let partial_config = PartialAppConfig::load(args.config.as_deref())?;
    let config = partial_config.merge_dataset(&args)?;
    info!(kind = %config.kind, top_n = config.top_n, "Dataset configuration resolved.");

    let paths = DatasetPaths {
        struct_file: args.struct_file.clone(),
        label_file: args.label_file.clone(),
        feature_file: args.feature_file.clone(),
    };
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    println!("Building {} dataset from {}...", config.kind, args.input.display());
    let summary = workflows::dataset::run(&args.input, &config, &paths, &reporter)?;

    println!(
        "✓ {} record(s) from {} reaction(s) written to: {}",
        summary.num_records,
        summary.num_reactions,
        paths.label_file.display()
    );
    println!("  Structures: {}", paths.struct_file.display());
    if let Some(feature_file) = &paths.feature_file {
        println!("  Features:   {}", feature_file.display());
    }
    Ok(())
}
