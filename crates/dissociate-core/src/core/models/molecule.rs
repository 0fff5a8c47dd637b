use super::element::{atomic_mass, atomic_number};
use super::topology::{Bond, BondIndex, BondOrder, normalize_bond};
use crate::core::graph::{self, AtomNode, MolGraph};
use indexmap::IndexMap;
use nalgebra::Point3;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModelError {
    #[error("Molecule '{molecule}' contains unknown element '{symbol}'")]
    UnknownElement { molecule: String, symbol: String },

    #[error("Molecule '{molecule}' has {species} species but {coords} coordinates")]
    CoordinateMismatch {
        molecule: String,
        species: usize,
        coords: usize,
    },

    #[error("Molecule '{molecule}' has no atoms")]
    Empty { molecule: String },

    #[error("Bond {bond:?} of molecule '{molecule}' references an atom outside 0..{num_atoms}")]
    BondOutOfRange {
        molecule: String,
        bond: BondIndex,
        num_atoms: usize,
    },

    #[error("Bond {bond:?} of molecule '{molecule}' connects an atom to itself")]
    SelfBond { molecule: String, bond: BondIndex },

    #[error("Bond {bond:?} of molecule '{molecule}' is declared more than once")]
    DuplicateBond { molecule: String, bond: BondIndex },
}

fn default_spin_multiplicity() -> u32 {
    1
}

/// A molecule as stored in the molecule database and in reaction archives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoleculeRecord {
    pub id: String,
    pub species: Vec<String>,
    pub coords: Vec<[f64; 3]>,
    #[serde(default)]
    pub bonds: Vec<Bond>,
    #[serde(default)]
    pub charge: i32,
    #[serde(default = "default_spin_multiplicity")]
    pub spin_multiplicity: u32,
    #[serde(default)]
    pub free_energy: Option<f64>,
}

/// A connected piece of a molecule left after removing one bond.
///
/// Atoms are renumbered `0..n` in ascending order of their index in the parent molecule.
#[derive(Debug, Clone)]
pub struct Fragment {
    pub graph: MolGraph,
}

impl Fragment {
    pub fn num_atoms(&self) -> usize {
        self.graph.node_count()
    }

    pub fn species(&self) -> Vec<String> {
        self.graph.node_weights().map(|n| n.specie.clone()).collect()
    }

    pub fn coords(&self) -> Vec<Point3<f64>> {
        self.graph.node_weights().map(|n| n.coords).collect()
    }

    pub fn bonds(&self) -> Vec<Bond> {
        graph::edge_list(&self.graph)
            .into_iter()
            .map(|((a, b), order)| Bond::new(a, b, order))
            .collect()
    }

    pub fn is_isomorphic_to(&self, other: &MolGraph) -> bool {
        graph::is_isomorphic(&self.graph, other)
    }

    /// Materializes the fragment as a standalone molecule with the given identity.
    pub fn to_molecule(
        &self,
        id: String,
        charge: i32,
        free_energy: Option<f64>,
    ) -> Result<Molecule, ModelError> {
        let species = self.species();
        let spin_multiplicity = lowest_spin_multiplicity(&species, charge);
        Molecule::new(
            id,
            species,
            self.coords(),
            self.bonds(),
            charge,
            spin_multiplicity,
            free_energy,
        )
    }
}

/// Lowest spin multiplicity compatible with the electron count: singlet when even,
/// doublet when odd.
pub fn lowest_spin_multiplicity(species: &[String], charge: i32) -> u32 {
    let electrons: i64 = species
        .iter()
        .map(|s| atomic_number(s).map(i64::from).unwrap_or(0))
        .sum::<i64>()
        - i64::from(charge);
    if electrons % 2 == 0 { 1 } else { 2 }
}

/// Whether two fragment sets are the same up to isomorphism, in either pairing order.
pub fn fragments_equivalent(a: &[Fragment], b: &[Fragment]) -> bool {
    match (a, b) {
        ([a0], [b0]) => a0.is_isomorphic_to(&b0.graph),
        ([a0, a1], [b0, b1]) => {
            (a0.is_isomorphic_to(&b0.graph) && a1.is_isomorphic_to(&b1.graph))
                || (a0.is_isomorphic_to(&b1.graph) && a1.is_isomorphic_to(&b0.graph))
        }
        _ => false,
    }
}

/// Numeric descriptors of a molecule written to dataset feature files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRecord {
    pub id: String,
    pub formula: String,
    pub charge: i32,
    pub spin_multiplicity: u32,
    pub num_atoms: usize,
    pub num_bonds: usize,
    pub molecular_weight: f64,
    pub atomic_numbers: Vec<u8>,
    /// Index of the broken bond in the SDF bond block, if any.
    pub broken_bond: Option<usize>,
}

/// A molecule loaded from the database: structure, connectivity, charge and energy.
///
/// Immutable after construction. Derived data (fragments, equivalent bond groups) is
/// computed on first use and cached.
#[derive(Debug, Clone)]
pub struct Molecule {
    id: String,
    species: Vec<String>,
    coords: Vec<Point3<f64>>,
    bonds: Vec<Bond>,
    charge: i32,
    spin_multiplicity: u32,
    free_energy: Option<f64>,
    graph: MolGraph,
    formula: String,
    composition: BTreeMap<String, usize>,
    weight: f64,
    bond_positions: HashMap<BondIndex, usize>,
    sdf_order: Vec<usize>,
    fragments: OnceCell<IndexMap<BondIndex, Vec<Fragment>>>,
    isomorphic_bonds: OnceCell<Vec<Vec<BondIndex>>>,
}

impl Molecule {
    pub fn new(
        id: String,
        species: Vec<String>,
        coords: Vec<Point3<f64>>,
        bonds: Vec<Bond>,
        charge: i32,
        spin_multiplicity: u32,
        free_energy: Option<f64>,
    ) -> Result<Self, ModelError> {
        if species.is_empty() {
            return Err(ModelError::Empty { molecule: id });
        }
        if species.len() != coords.len() {
            return Err(ModelError::CoordinateMismatch {
                molecule: id,
                species: species.len(),
                coords: coords.len(),
            });
        }

        let mut composition = BTreeMap::new();
        let mut masses: BTreeMap<String, f64> = BTreeMap::new();
        for symbol in &species {
            let mass = atomic_mass(symbol).ok_or_else(|| ModelError::UnknownElement {
                molecule: id.clone(),
                symbol: symbol.clone(),
            })?;
            masses.insert(symbol.trim().to_string(), mass);
            *composition.entry(symbol.trim().to_string()).or_insert(0) += 1;
        }
        // Per element in symbol order; independent of atom listing order.
        let weight: f64 = composition
            .iter()
            .map(|(symbol, &count)| masses[symbol] * count as f64)
            .sum();

        let mut graph = MolGraph::with_capacity(species.len(), bonds.len());
        let nodes: Vec<_> = species
            .iter()
            .zip(&coords)
            .enumerate()
            .map(|(index, (specie, coords))| {
                graph.add_node(AtomNode {
                    specie: specie.trim().to_string(),
                    coords: *coords,
                    index,
                })
            })
            .collect();

        let mut bond_positions = HashMap::with_capacity(bonds.len());
        for (position, bond) in bonds.iter().enumerate() {
            let (u, v) = bond.atoms;
            if u >= species.len() || v >= species.len() {
                return Err(ModelError::BondOutOfRange {
                    molecule: id,
                    bond: bond.atoms,
                    num_atoms: species.len(),
                });
            }
            if u == v {
                return Err(ModelError::SelfBond {
                    molecule: id,
                    bond: bond.atoms,
                });
            }
            if bond_positions.insert(bond.key(), position).is_some() {
                return Err(ModelError::DuplicateBond {
                    molecule: id,
                    bond: bond.atoms,
                });
            }
            graph.add_edge(nodes[u], nodes[v], bond.order);
        }

        let mut sdf_order: Vec<usize> = (0..bonds.len()).collect();
        sdf_order.sort_by_key(|&i| bonds[i].key());

        let formula = composition
            .iter()
            .map(|(symbol, &count)| {
                if count == 1 {
                    symbol.clone()
                } else {
                    format!("{}{}", symbol, count)
                }
            })
            .collect();

        Ok(Self {
            id,
            species,
            coords,
            bonds,
            charge,
            spin_multiplicity,
            free_energy,
            graph,
            formula,
            composition,
            weight,
            bond_positions,
            sdf_order,
            fragments: OnceCell::new(),
            isomorphic_bonds: OnceCell::new(),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn species(&self) -> &[String] {
        &self.species
    }

    pub fn coords(&self) -> &[Point3<f64>] {
        &self.coords
    }

    pub fn bonds(&self) -> &[Bond] {
        &self.bonds
    }

    pub fn num_atoms(&self) -> usize {
        self.species.len()
    }

    pub fn charge(&self) -> i32 {
        self.charge
    }

    pub fn spin_multiplicity(&self) -> u32 {
        self.spin_multiplicity
    }

    pub fn free_energy(&self) -> Option<f64> {
        self.free_energy
    }

    pub fn graph(&self) -> &MolGraph {
        &self.graph
    }

    /// Alphabetical formula, counts omitted when 1 (e.g. `"C2H6O2"`).
    pub fn formula(&self) -> &str {
        &self.formula
    }

    pub fn composition(&self) -> &BTreeMap<String, usize> {
        &self.composition
    }

    /// Molecular weight in g/mol.
    pub fn weight(&self) -> f64 {
        self.weight
    }

    pub fn diameter(&self) -> Option<usize> {
        graph::diameter(&self.graph)
    }

    pub fn is_isomorphic_to(&self, other: &Molecule) -> bool {
        graph::is_isomorphic(&self.graph, &other.graph)
    }

    /// Identifier used in dataset headers and reports: `formula_charge_id_energy`.
    pub fn label(&self) -> String {
        let energy = self
            .free_energy
            .map_or_else(|| "None".to_string(), |e| e.to_string());
        format!("{}_{}_{}_{}", self.formula, self.charge, self.id, energy)
    }

    /// Bond order of the bond between `u` and `v`, if bonded.
    pub fn bond_order(&self, u: usize, v: usize) -> Option<BondOrder> {
        self.bond_position(normalize_bond((u, v)))
            .map(|i| self.bonds[i].order)
    }

    /// Position of a bond (graph convention) in the bond list.
    pub fn bond_position(&self, bond: BondIndex) -> Option<usize> {
        self.bond_positions.get(&normalize_bond(bond)).copied()
    }

    /// Bond indices in the order they appear in the SDF bond block, oriented as declared.
    pub fn sdf_bond_indices(&self) -> Vec<BondIndex> {
        self.sdf_order.iter().map(|&i| self.bonds[i].atoms).collect()
    }

    /// Bonds in the order they appear in the SDF bond block.
    pub fn sdf_bonds(&self) -> impl Iterator<Item = &Bond> {
        self.sdf_order.iter().map(|&i| &self.bonds[i])
    }

    /// Position of a bond (graph convention) in the SDF bond block.
    pub fn sdf_bond_position(&self, bond: BondIndex) -> Option<usize> {
        let position = self.bond_position(bond)?;
        self.sdf_order.iter().position(|&i| i == position)
    }

    pub fn sdf_bond_to_graph_bond(&self, bond: BondIndex) -> BondIndex {
        normalize_bond(bond)
    }

    pub fn graph_bond_to_sdf_bond(&self, bond: BondIndex) -> Option<BondIndex> {
        self.bond_position(bond).map(|i| self.bonds[i].atoms)
    }

    /// Fragments obtained by removing each bond, keyed by bond (graph convention) in
    /// bond-list order.
    pub fn fragments(&self) -> &IndexMap<BondIndex, Vec<Fragment>> {
        self.fragments.get_or_init(|| {
            self.bonds
                .iter()
                .map(|bond| {
                    let (u, v) = bond.key();
                    let fragments = match graph::without_bond(&self.graph, u, v) {
                        Some(cut) => graph::connected_components(&cut)
                            .iter()
                            .map(|nodes| Fragment {
                                graph: graph::induced_subgraph(&cut, nodes),
                            })
                            .collect(),
                        None => Vec::new(),
                    };
                    ((u, v), fragments)
                })
                .collect()
        })
    }

    pub fn fragments_of(&self, bond: BondIndex) -> Option<&[Fragment]> {
        self.fragments()
            .get(&normalize_bond(bond))
            .map(Vec::as_slice)
    }

    /// Groups of bonds whose removal yields isomorphic fragment sets.
    ///
    /// Only groups with at least two members are returned; members keep bond-list order.
    pub fn isomorphic_bond_groups(&self) -> &[Vec<BondIndex>] {
        self.isomorphic_bonds.get_or_init(|| {
            let fragments = self.fragments();
            let mut groups: Vec<Vec<BondIndex>> = Vec::new();
            for (bond, frags) in fragments {
                let existing = groups
                    .iter_mut()
                    .find(|g| fragments_equivalent(&fragments[&g[0]], frags));
                match existing {
                    Some(group) => group.push(*bond),
                    None => groups.push(vec![*bond]),
                }
            }
            groups.retain(|g| g.len() > 1);
            groups
        })
    }

    pub fn pack_features(&self, broken_bond: Option<BondIndex>) -> FeatureRecord {
        FeatureRecord {
            id: self.id.clone(),
            formula: self.formula.clone(),
            charge: self.charge,
            spin_multiplicity: self.spin_multiplicity,
            num_atoms: self.num_atoms(),
            num_bonds: self.bonds.len(),
            molecular_weight: self.weight,
            atomic_numbers: self
                .species
                .iter()
                .map(|s| atomic_number(s).unwrap_or(0))
                .collect(),
            broken_bond: broken_bond.and_then(|b| self.sdf_bond_position(b)),
        }
    }

    pub fn to_record(&self) -> MoleculeRecord {
        MoleculeRecord {
            id: self.id.clone(),
            species: self.species.clone(),
            coords: self.coords.iter().map(|p| [p.x, p.y, p.z]).collect(),
            bonds: self.bonds.clone(),
            charge: self.charge,
            spin_multiplicity: self.spin_multiplicity,
            free_energy: self.free_energy,
        }
    }
}

impl TryFrom<MoleculeRecord> for Molecule {
    type Error = ModelError;

    fn try_from(record: MoleculeRecord) -> Result<Self, Self::Error> {
        Molecule::new(
            record.id,
            record.species,
            record
                .coords
                .into_iter()
                .map(|[x, y, z]| Point3::new(x, y, z))
                .collect(),
            record.bonds,
            record.charge,
            record.spin_multiplicity,
            record.free_energy,
        )
    }
}

impl PartialEq for Molecule {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Molecule {}

impl fmt::Display for Molecule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}) [{}]", self.formula, self.charge, self.id)
    }
}

/// Ids of a set of molecules, used to detect already-considered candidate reactions.
pub fn id_set<'a>(molecules: impl IntoIterator<Item = &'a Molecule>) -> HashSet<&'a str> {
    molecules.into_iter().map(Molecule::id).collect()
}
