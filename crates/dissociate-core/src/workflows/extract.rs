use crate::core::io::database::DatabaseFile;
use crate::core::io::traits::MolecularFile;
use crate::engine::config::{ExtractionConfig, ReactionStyle};
use crate::engine::error::EngineError;
use crate::engine::extractor::ReactionExtractor;
use crate::engine::progress::{ProgressReporter, Stage};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, instrument};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionSummary {
    pub num_molecules: usize,
    pub num_a_to_b: usize,
    pub num_a_to_b_c: usize,
    /// Reactions written to the archive, after filtering.
    pub num_reactions: usize,
}

#[instrument(skip_all, name = "extraction_workflow")]
pub fn run(
    database: &Path,
    archive: &Path,
    config: &ExtractionConfig,
    reporter: &ProgressReporter,
) -> Result<ExtractionSummary, EngineError> {
    reporter.start(Stage::LoadMolecules);
    let molecules: Vec<_> = DatabaseFile::read_from_path(database)?
        .into_iter()
        .map(Arc::new)
        .collect();
    info!(
        count = molecules.len(),
        "Loaded molecules from {}.",
        database.display()
    );
    let num_molecules = molecules.len();
    reporter.finish(Stage::LoadMolecules, num_molecules);

    let mut extractor = ReactionExtractor::new(molecules).with_reporter(reporter);
    let (num_a_to_b, num_a_to_b_c) = match config.style {
        ReactionStyle::AToB => (extractor.extract_a_to_b_style_reaction(config.find_one)?.len(), 0),
        ReactionStyle::AToBC => (0, extractor.extract_a_to_b_c_style_reaction(config.find_one)?.len()),
        ReactionStyle::All => extractor.extract_one_bond_break(config.find_one)?,
    };

    if !config.filter.is_empty() {
        info!("Filtering extracted reactions.");
        extractor.apply_filter(&config.filter)?;
    }
    extractor.sort_reactions_by_reactant_formula();

    reporter.start(Stage::WriteArchive);
    extractor.to_file(archive)?;
    reporter.finish(Stage::WriteArchive, extractor.reactions().len());

    let summary = ExtractionSummary {
        num_molecules,
        num_a_to_b,
        num_a_to_b_c,
        num_reactions: extractor.reactions().len(),
    };
    info!(
        reactions = summary.num_reactions,
        "Extraction complete. Archive written to {}.",
        archive.display()
    );
    Ok(summary)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::core::io::traits::MolecularFileWriter;
    use crate::core::models::molecule::Molecule;
    use crate::core::models::molecule::tests::{dimethyl_peroxide, methoxy};
    use crate::engine::config::{ExtractionConfigBuilder, ReactionFilter};
    use crate::engine::progress::Progress;

    pub(crate) fn write_database(path: &Path) {
        let molecules: Vec<Molecule> = vec![
            dimethyl_peroxide("a", 0, Some(-10.0)),
            dimethyl_peroxide("a+", 1, Some(-9.6)),
            methoxy("m0", 0, Some(-4.8)),
            methoxy("m-", -1, Some(-5.5)),
            methoxy("m+", 1, Some(-3.9)),
        ];
        DatabaseFile::write_to_path(&molecules, path).unwrap();
    }

    #[test]
    fn extraction_writes_reloadable_archive() {
        let dir = tempfile::tempdir().unwrap();
        let database = dir.path().join("molecules.json");
        let archive = dir.path().join("out").join("reactions.json");
        write_database(&database);

        let config = ExtractionConfigBuilder::new()
            .style(ReactionStyle::All)
            .find_one(true)
            .build()
            .unwrap();
        let summary = run(&database, &archive, &config, &ProgressReporter::new()).unwrap();

        // a: (-1, 1) and (0, 0); a+: (0, 1).
        assert_eq!(summary.num_molecules, 5);
        assert_eq!(summary.num_a_to_b, 0);
        assert_eq!(summary.num_a_to_b_c, 3);
        assert_eq!(summary.num_reactions, 3);

        let loaded = ReactionExtractor::from_file(&archive).unwrap();
        assert_eq!(loaded.reactions().len(), 3);
    }

    #[test]
    fn filters_apply_before_archiving() {
        let dir = tempfile::tempdir().unwrap();
        let database = dir.path().join("molecules.json");
        let archive = dir.path().join("reactions.json");
        write_database(&database);

        let config = ExtractionConfigBuilder::new()
            .style(ReactionStyle::AToBC)
            .find_one(true)
            .filter(ReactionFilter {
                reactant_charges: Some(vec![1]),
                ..Default::default()
            })
            .build()
            .unwrap();
        let summary = run(&database, &archive, &config, &ProgressReporter::new()).unwrap();
        assert_eq!(summary.num_a_to_b_c, 3);
        assert_eq!(summary.num_reactions, 1);
    }

    #[test]
    fn stages_are_reported_in_pipeline_order() {
        let dir = tempfile::tempdir().unwrap();
        let database = dir.path().join("molecules.json");
        write_database(&database);
        let config = ExtractionConfigBuilder::new()
            .style(ReactionStyle::AToBC)
            .find_one(true)
            .filter(ReactionFilter {
                reactant_charges: Some(vec![0]),
                ..Default::default()
            })
            .build()
            .unwrap();

        let finished = std::sync::Mutex::new(Vec::new());
        let reporter = ProgressReporter::with_callback(Box::new(|event| {
            if let Progress::StageFinish { stage, count } = event {
                finished.lock().unwrap().push((stage, count));
            }
        }));
        run(&database, &dir.path().join("reactions.json"), &config, &reporter).unwrap();
        drop(reporter);

        assert_eq!(
            finished.into_inner().unwrap(),
            vec![
                (Stage::LoadMolecules, 5),
                (Stage::ExtractAToBC, 3),
                (Stage::FilterReactions, 2),
                (Stage::WriteArchive, 2),
            ]
        );
    }

    #[test]
    fn missing_database_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = ExtractionConfigBuilder::new()
            .style(ReactionStyle::All)
            .find_one(false)
            .build()
            .unwrap();
        let err = run(
            &dir.path().join("missing.json"),
            &dir.path().join("out.json"),
            &config,
            &ProgressReporter::new(),
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::Database(_)));
    }
}
