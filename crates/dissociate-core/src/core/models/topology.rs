use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A bond identified by the indices of the two atoms it connects.
pub type BondIndex = (usize, usize);

/// Normalizes a bond index so that the lower atom index comes first.
pub fn normalize_bond(bond: BondIndex) -> BondIndex {
    (bond.0.min(bond.1), bond.0.max(bond.1))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum BondOrder {
    #[default]
    Single = 1,
    Double = 2,
    Triple = 3,
    Aromatic = 4,
}

impl BondOrder {
    /// Bond type code used in the bond block of MDL molfiles.
    pub fn sdf_code(self) -> u8 {
        self as u8
    }
}

#[derive(Debug, Error)]
#[error("Invalid bond order string")]
pub struct ParseBondOrderError;

impl FromStr for BondOrder {
    type Err = ParseBondOrderError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "1" | "s" | "single" => Ok(Self::Single),
            "2" | "d" | "double" => Ok(Self::Double),
            "3" | "t" | "triple" => Ok(Self::Triple),
            "4" | "ar" | "aromatic" => Ok(Self::Aromatic),
            _ => Err(ParseBondOrderError),
        }
    }
}

impl fmt::Display for BondOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::Single => "Single",
                Self::Double => "Double",
                Self::Triple => "Triple",
                Self::Aromatic => "Aromatic",
            }
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Bond {
    pub atoms: BondIndex, // As declared in the source record, not normalized
    #[serde(default)]
    pub order: BondOrder,
}

impl Bond {
    pub fn new(atom1: usize, atom2: usize, order: BondOrder) -> Self {
        Self {
            atoms: (atom1, atom2),
            order,
        }
    }

    /// The bond index in graph convention, `(min, max)`.
    pub fn key(&self) -> BondIndex {
        normalize_bond(self.atoms)
    }

    pub fn contains(&self, atom: usize) -> bool {
        self.atoms.0 == atom || self.atoms.1 == atom
    }
}
