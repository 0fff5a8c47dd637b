use crate::engine::config::DatasetConfig;
use crate::engine::dataset::DatasetPaths;
use crate::engine::error::EngineError;
use crate::engine::extractor::ReactionExtractor;
use crate::engine::progress::{ProgressReporter, Stage};
use std::path::Path;
use tracing::{info, instrument};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetSummary {
    /// Reactions left after filtering.
    pub num_reactions: usize,
    /// Label records written.
    pub num_records: usize,
}

#[instrument(skip_all, name = "dataset_workflow")]
pub fn run(
    archive: &Path,
    config: &DatasetConfig,
    paths: &DatasetPaths,
    reporter: &ProgressReporter,
) -> Result<DatasetSummary, EngineError> {
    reporter.start(Stage::LoadReactions);
    let mut extractor = ReactionExtractor::from_file(archive)?
        .with_charge_window(config.charge_window)
        .with_reporter(reporter);
    reporter.finish(Stage::LoadReactions, extractor.reactions().len());
    if !config.filter.is_empty() {
        extractor.apply_filter(&config.filter)?;
    }
    info!(
        reactions = extractor.reactions().len(),
        "Reactions ready for dataset creation."
    );

    reporter.start(Stage::WriteDataset);
    let num_records = extractor.create_dataset(config, paths)?;
    reporter.finish(Stage::WriteDataset, num_records);

    info!(
        kind = %config.kind,
        records = num_records,
        "Dataset written to {}.",
        paths.label_file.display()
    );
    Ok(DatasetSummary {
        num_reactions: extractor.reactions().len(),
        num_records,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::config::{
        DatasetConfigBuilder, DatasetKind, ExtractionConfigBuilder, ReactionStyle,
    };
    use crate::workflows::extract;
    use std::fs;

    fn extracted_archive(dir: &Path) -> std::path::PathBuf {
        let database = dir.join("molecules.json");
        let archive = dir.join("reactions.json");
        extract::tests::write_database(&database);
        let config = ExtractionConfigBuilder::new()
            .style(ReactionStyle::All)
            .find_one(true)
            .build()
            .unwrap();
        extract::run(&database, &archive, &config, &ProgressReporter::new()).unwrap();
        archive
    }

    fn paths(dir: &Path) -> DatasetPaths {
        DatasetPaths {
            struct_file: dir.join("struct.sdf"),
            label_file: dir.join("label.txt"),
            feature_file: Some(dir.join("feature.json")),
        }
    }

    #[test]
    fn molecule_dataset_has_one_line_per_reactant() {
        let dir = tempfile::tempdir().unwrap();
        let archive = extracted_archive(dir.path());
        let config = DatasetConfigBuilder::new()
            .kind(DatasetKind::MoleculeBased)
            .build()
            .unwrap();
        let paths = paths(dir.path());
        let summary = run(&archive, &config, &paths, &ProgressReporter::new()).unwrap();

        assert_eq!(summary.num_reactions, 3);
        assert_eq!(summary.num_records, 2);
        let labels = fs::read_to_string(&paths.label_file).unwrap();
        assert_eq!(labels.lines().count(), 3);
        assert!(paths.feature_file.as_ref().unwrap().exists());
    }

    #[test]
    fn neutral_only_classification_skips_charged_reactants() {
        let dir = tempfile::tempdir().unwrap();
        let archive = extracted_archive(dir.path());
        let config = DatasetConfigBuilder::new()
            .kind(DatasetKind::BondClassification)
            .lowest_across_product_charge(false)
            .build()
            .unwrap();
        let summary = run(&archive, &config, &paths(dir.path()), &ProgressReporter::new()).unwrap();
        // Only the neutral peroxide qualifies; one line per bond.
        assert_eq!(summary.num_records, 9);
    }
}
