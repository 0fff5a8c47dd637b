use super::traits::{MolecularFile, MolecularFileWriter};
use crate::core::models::molecule::{ModelError, Molecule, MoleculeRecord};
use std::collections::HashSet;
use std::io::{self, BufRead, Write};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Malformed molecule database: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid molecule: {0}")]
    Model(#[from] ModelError),
    #[error("Molecule id '{0}' appears more than once")]
    DuplicateId(String),
}

/// JSON molecule database: a single array of [`MoleculeRecord`]s.
pub struct DatabaseFile;

impl DatabaseFile {
    pub fn parse_records(reader: &mut impl BufRead) -> Result<Vec<MoleculeRecord>, DatabaseError> {
        Ok(serde_json::from_reader(reader)?)
    }
}

impl MolecularFile for DatabaseFile {
    type Error = DatabaseError;

    fn read_from(reader: &mut impl BufRead) -> Result<Vec<Molecule>, DatabaseError> {
        let records = Self::parse_records(reader)?;
        let mut seen = HashSet::with_capacity(records.len());
        records
            .into_iter()
            .map(|record| {
                if !seen.insert(record.id.clone()) {
                    return Err(DatabaseError::DuplicateId(record.id));
                }
                Ok(Molecule::try_from(record)?)
            })
            .collect()
    }
}

impl MolecularFileWriter for DatabaseFile {
    type Error = DatabaseError;

    fn write_to<'a>(
        molecules: impl IntoIterator<Item = &'a Molecule>,
        writer: &mut impl Write,
    ) -> Result<(), DatabaseError> {
        let records: Vec<MoleculeRecord> = molecules.into_iter().map(Molecule::to_record).collect();
        serde_json::to_writer_pretty(&mut *writer, &records)?;
        writeln!(writer)?;
        Ok(())
    }
}
