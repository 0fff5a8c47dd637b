use super::traits::create_file_writer;
use crate::core::models::molecule::{ModelError, Molecule, MoleculeRecord};
use crate::core::models::topology::BondIndex;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, BufReader, Write};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Malformed reaction archive: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid molecule in archive: {0}")]
    Model(#[from] ModelError),
    #[error("Reaction references unknown molecule '{0}'")]
    UnknownMolecule(String),
    #[error("Molecule id '{0}' appears more than once in archive")]
    DuplicateMolecule(String),
}

/// A reaction stored by molecule id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReactionRecord {
    pub reactant: String,
    pub products: Vec<String>,
    #[serde(default)]
    pub broken_bond: Option<BondIndex>,
}

/// Persisted extraction state: the molecules and the reactions between them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReactionArchive {
    pub molecules: Vec<MoleculeRecord>,
    pub reactions: Vec<ReactionRecord>,
}

impl ReactionArchive {
    pub fn read_from_path<P: AsRef<Path>>(path: P) -> Result<Self, ArchiveError> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }

    pub fn write_to_path<P: AsRef<Path>>(&self, path: P) -> Result<(), ArchiveError> {
        let mut writer = create_file_writer(path)?;
        serde_json::to_writer(&mut writer, self)?;
        writer.flush()?;
        Ok(())
    }

    /// Rebuilds the shared molecules, keyed by id in archive order.
    pub fn molecules(&self) -> Result<IndexMap<String, Arc<Molecule>>, ArchiveError> {
        let mut molecules = IndexMap::with_capacity(self.molecules.len());
        for record in &self.molecules {
            let molecule = Molecule::try_from(record.clone())?;
            if molecules
                .insert(record.id.clone(), Arc::new(molecule))
                .is_some()
            {
                return Err(ArchiveError::DuplicateMolecule(record.id.clone()));
            }
        }
        Ok(molecules)
    }
}

/// Looks up a molecule referenced by a [`ReactionRecord`].
pub fn resolve(
    molecules: &IndexMap<String, Arc<Molecule>>,
    id: &str,
) -> Result<Arc<Molecule>, ArchiveError> {
    molecules
        .get(id)
        .cloned()
        .ok_or_else(|| ArchiveError::UnknownMolecule(id.to_string()))
}
