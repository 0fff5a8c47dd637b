use crate::error::{CliError, Result};
use std::path::Path;

pub mod bond_energies;
pub mod bucket;
pub mod dataset;
pub mod extract;

/// Fails early with the kind of input expected when `path` is not a file.
pub(crate) fn require_input(path: &Path, what: &'static str) -> Result<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(CliError::MissingInput {
            what,
            path: path.to_path_buf(),
        })
    }
}
