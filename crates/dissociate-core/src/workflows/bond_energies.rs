use crate::engine::error::EngineError;
use crate::engine::extractor::ReactionExtractor;
use crate::engine::progress::{ProgressReporter, Stage};
use std::path::Path;
use tracing::{info, instrument};

/// Writes the per-bond energy report of an archived reaction set; returns the number of
/// reactions reported.
#[instrument(skip_all, name = "bond_energies_workflow")]
pub fn run(archive: &Path, output: &Path, reporter: &ProgressReporter) -> Result<usize, EngineError> {
    reporter.start(Stage::LoadReactions);
    let extractor = ReactionExtractor::from_file(archive)?;
    let count = extractor.reactions().len();
    reporter.finish(Stage::LoadReactions, count);

    reporter.start(Stage::WriteBondEnergies);
    extractor.write_bond_energies(output)?;
    reporter.finish(Stage::WriteBondEnergies, count);

    info!(reactions = count, "Bond energies written to {}.", output.display());
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::config::{ExtractionConfigBuilder, ReactionStyle};
    use crate::workflows::extract;

    #[test]
    fn report_covers_every_reactant() {
        let dir = tempfile::tempdir().unwrap();
        let database = dir.path().join("molecules.json");
        let archive = dir.path().join("reactions.json");
        let output = dir.path().join("bond_energies.json");
        extract::tests::write_database(&database);
        let config = ExtractionConfigBuilder::new()
            .style(ReactionStyle::AToBC)
            .find_one(true)
            .build()
            .unwrap();
        extract::run(&database, &archive, &config, &ProgressReporter::new()).unwrap();

        assert_eq!(run(&archive, &output, &ProgressReporter::new()).unwrap(), 3);
        let report: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
        assert_eq!(report.as_object().unwrap().len(), 2);
    }
}
