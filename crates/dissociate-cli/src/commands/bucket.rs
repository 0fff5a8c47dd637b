use crate::cli::BucketArgs;
use crate::error::{CliError, Result};
use dissociate::core::io::database::DatabaseFile;
use dissociate::core::io::traits::MolecularFile;
use dissociate::engine::bucket::{Buckets, MoleculeAttribute};
use dissociate::engine::extractor::ReactionExtractor;
use std::sync::Arc;
use tracing::info;

pub fn run(args: BucketArgs) -> Result<()> {
    let keys = args
        .keys
        .iter()
        .map(|key| {
            key.parse::<MoleculeAttribute>()
                .map_err(|e| CliError::Argument(e.to_string()))
        })
        .collect::<Result<Vec<_>>>()?;

    super::require_input(&args.input, "Molecule database")?;
    info!("Loading molecules from {:?}", &args.input);
    let molecules: Vec<_> = DatabaseFile::read_from_path(&args.input)
        .map_err(|e| CliError::FileParsing {
            path: args.input.clone(),
            source: e.into(),
        })?
        .into_iter()
        .map(Arc::new)
        .collect();

    let buckets = ReactionExtractor::new(molecules).bucket_molecules(&keys);
    for line in summary_lines(&buckets) {
        println!("{}", line);
    }
    println!(
        "{} molecule(s) in {} bucket(s).",
        buckets.num_molecules(),
        buckets.leaves().len()
    );
    Ok(())
}

fn summary_lines(buckets: &Buckets) -> Vec<String> {
    buckets
        .leaves()
        .into_iter()
        .map(|(path, molecules)| {
            let label = path
                .iter()
                .map(|value| value.to_string())
                .collect::<Vec<_>>()
                .join(" / ");
            let ids = molecules
                .iter()
                .map(|m| m.id())
                .collect::<Vec<_>>()
                .join(", ");
            format!("{:<24} {:>5}  [{}]", label, molecules.len(), ids)
        })
        .collect()
}
