use crate::core::models::molecule::Molecule;
use std::error::Error;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// Defines the interface for reading molecule collection formats.
///
/// Implementors handle format-specific parsing; [`MolecularFile::read_from_path`] takes
/// care of buffering.
pub trait MolecularFile {
    /// The error type for I/O operations.
    type Error: Error + From<io::Error>;

    /// Reads every molecule stored in the format from a buffered reader.
    ///
    /// # Arguments
    ///
    /// * `reader` - The buffered reader to read from.
    ///
    /// # Return
    ///
    /// Returns the molecules in file order.
    ///
    /// # Errors
    ///
    /// Returns an error if parsing fails or I/O operations encounter issues.
    fn read_from(reader: &mut impl BufRead) -> Result<Vec<Molecule>, Self::Error>;

    /// Reads molecules from a file path.
    fn read_from_path<P: AsRef<Path>>(path: P) -> Result<Vec<Molecule>, Self::Error> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        Self::read_from(&mut reader)
    }
}

/// Defines the interface for writing molecule collection formats.
///
/// Output-only formats such as the dataset structure file implement this trait alone.
pub trait MolecularFileWriter {
    /// The error type for I/O operations.
    type Error: Error + From<io::Error>;

    /// Writes molecules to a writer, one record per molecule.
    ///
    /// # Arguments
    ///
    /// * `molecules` - The molecules to write, in output order.
    /// * `writer` - The writer to output to.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    fn write_to<'a>(
        molecules: impl IntoIterator<Item = &'a Molecule>,
        writer: &mut impl Write,
    ) -> Result<(), Self::Error>;

    /// Writes molecules to a file path, creating parent directories as needed.
    fn write_to_path<'a, P: AsRef<Path>>(
        molecules: impl IntoIterator<Item = &'a Molecule>,
        path: P,
    ) -> Result<(), Self::Error> {
        let mut writer = create_file_writer(path)?;
        Self::write_to(molecules, &mut writer)?;
        writer.flush()?;
        Ok(())
    }
}

/// Opens `path` for buffered writing after creating its parent directory.
pub fn create_file_writer<P: AsRef<Path>>(path: P) -> io::Result<BufWriter<File>> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(BufWriter::new(File::create(path)?))
}
