//! # Core Models Module
//!
//! Data structures describing molecules as they are loaded from a computed database.
//!
//! - [`element`] - Static element tables (atomic numbers and masses)
//! - [`topology`] - Bonds and bond orders
//! - [`molecule`] - A molecule with coordinates, connectivity, charge and free energy,
//!   together with its derived graph, fragments and SDF bond indexing
//!
//! ```ignore
//! use dissociate::core::models::molecule::{Molecule, MoleculeRecord};
//!
//! let record: MoleculeRecord = serde_json::from_str(text)?;
//! let molecule = Molecule::try_from(record)?;
//! println!("{} ({})", molecule.formula(), molecule.charge());
//! ```

pub mod element;
pub mod molecule;
pub mod topology;
