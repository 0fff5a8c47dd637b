use thiserror::Error;

use super::config::ConfigError;
use crate::core::io::archive::ArchiveError;
use crate::core::io::database::DatabaseError;
use crate::core::io::sdf::SdfError;
use crate::core::models::molecule::ModelError;
use crate::core::models::topology::BondIndex;

#[derive(Debug, Error)]
pub enum ReactionError {
    #[error(
        "A reaction needs exactly one reactant and one or two products, got {reactants} reactant(s) and {products} product(s)"
    )]
    InvalidCardinality { reactants: usize, products: usize },

    #[error("Invalid reaction, no reactant bond breaks into the products: {reaction}")]
    NoBrokenBond { reaction: String },

    #[error("Cannot find atom mapping for reaction: {reaction}")]
    MappingFailed { reaction: String },

    #[error("Reaction breaking bond {bond:?} already exists.\nExisting reaction: {existing}\nNew      reaction: {new}")]
    BondConflict {
        bond: BondIndex,
        existing: String,
        new: String,
    },

    #[error("Reaction breaks bond {found:?} but the group is fixed to bond {expected:?}")]
    BondMismatch { expected: BondIndex, found: BondIndex },

    #[error("Cannot add reaction of reactant '{found}' to the group of reactant '{expected}'")]
    ReactantMismatch { expected: String, found: String },

    #[error("Cannot order molecules '{first}' and '{second}'")]
    CannotOrder { first: String, second: String },

    #[error("Invalid complement molecule: {0}")]
    Model(#[from] ModelError),
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Reaction(#[from] ReactionError),

    #[error("Molecule database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Reaction archive error: {0}")]
    Archive(#[from] ArchiveError),

    #[error("Structure file error: {0}")]
    Sdf(#[from] SdfError),

    #[error("Failed to serialize output: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
