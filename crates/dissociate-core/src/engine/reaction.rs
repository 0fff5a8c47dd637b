use super::error::ReactionError;
use super::validity::{is_valid_a_to_b_c_reaction, is_valid_a_to_b_reaction};
use crate::core::graph;
use crate::core::models::molecule::Molecule;
use crate::core::models::topology::{BondIndex, BondOrder, normalize_bond};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::Arc;

/// Product atom index to reactant atom index, one map per product.
pub type AtomMapping = BTreeMap<usize, usize>;

/// Serializable overview of a reaction, as written to bond-energy reports and
/// regression label comments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReactionSummary {
    pub reactants: Vec<String>,
    pub products: Vec<String>,
    pub charge: Vec<i32>,
    pub broken_bond: BondIndex,
    pub bond_energy: Option<f64>,
}

impl fmt::Display for ReactionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{reactants: {:?}, products: {:?}, charge: {:?}, broken_bond: {:?}, bond_energy: {:?}}}",
            self.reactants, self.products, self.charge, self.broken_bond, self.bond_energy
        )
    }
}

/// Species of the two atoms joined by the broken bond, and its order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokenBondAttr {
    pub species: [String; 2],
    pub order: Option<BondOrder>,
}

/// A single-bond dissociation: one reactant, one (`A -> B`) or two (`A -> B + C`)
/// products.
///
/// Products are kept in canonical order. The broken bond is stored in graph
/// convention `(min, max)` and, when not supplied, searched for on first use.
#[derive(Debug, Clone)]
pub struct Reaction {
    reactant: Arc<Molecule>,
    products: Vec<Arc<Molecule>>,
    broken_bond: OnceCell<BondIndex>,
}

impl Reaction {
    pub fn new(
        reactants: Vec<Arc<Molecule>>,
        products: Vec<Arc<Molecule>>,
        broken_bond: Option<BondIndex>,
    ) -> Result<Self, ReactionError> {
        if reactants.len() != 1 || !(1..=2).contains(&products.len()) {
            return Err(ReactionError::InvalidCardinality {
                reactants: reactants.len(),
                products: products.len(),
            });
        }
        let reactant = reactants.into_iter().next().ok_or(ReactionError::InvalidCardinality {
            reactants: 0,
            products: products.len(),
        })?;
        let products = order_molecules(products)?;
        let cell = OnceCell::new();
        if let Some(bond) = broken_bond {
            let _ = cell.set(normalize_bond(bond));
        }
        Ok(Self {
            reactant,
            products,
            broken_bond: cell,
        })
    }

    pub fn reactant(&self) -> &Arc<Molecule> {
        &self.reactant
    }

    pub fn products(&self) -> &[Arc<Molecule>] {
        &self.products
    }

    /// Reactant followed by products.
    pub fn molecules(&self) -> impl Iterator<Item = &Arc<Molecule>> {
        std::iter::once(&self.reactant).chain(&self.products)
    }

    pub fn is_a_to_b(&self) -> bool {
        self.products.len() == 1
    }

    /// `Σ E(products) − E(reactant)`, absent when any participant has no energy.
    pub fn free_energy(&self) -> Option<f64> {
        let mut energy = -self.reactant.free_energy()?;
        for product in &self.products {
            energy += product.free_energy()?;
        }
        Some(energy)
    }

    pub fn broken_bond(&self) -> Result<&BondIndex, ReactionError> {
        self.broken_bond.get_or_try_init(|| {
            let bonds = match self.products.as_slice() {
                [p] => is_valid_a_to_b_reaction(&self.reactant, p, true),
                [p1, p2] => is_valid_a_to_b_c_reaction(&self.reactant, p1, p2, true),
                _ => Vec::new(),
            };
            bonds.first().copied().ok_or_else(|| ReactionError::NoBrokenBond {
                reaction: self.to_string(),
            })
        })
    }

    pub fn broken_bond_attr(&self) -> Result<BrokenBondAttr, ReactionError> {
        let (u, v) = *self.broken_bond()?;
        let species = self.reactant.species();
        Ok(BrokenBondAttr {
            species: [species[u].clone(), species[v].clone()],
            order: self.reactant.bond_order(u, v),
        })
    }

    /// Maps the atoms of each product onto the reactant atoms they come from.
    ///
    /// When both fragments are isomorphic to the first product, the first fragment is
    /// assigned to it.
    pub fn atom_mapping(&self) -> Result<Vec<AtomMapping>, ReactionError> {
        let bond = *self.broken_bond()?;
        let failed = || ReactionError::MappingFailed {
            reaction: self.to_string(),
        };
        let fragments = self.reactant.fragments_of(bond).ok_or_else(failed)?;
        if fragments.len() != self.products.len() {
            return Err(failed());
        }

        let correspondence: &[usize] = match fragments {
            [_] => &[0],
            [first, _] if first.is_isomorphic_to(self.products[0].graph()) => &[0, 1],
            _ => &[1, 0],
        };

        self.products
            .iter()
            .zip(correspondence)
            .map(|(product, &fidx)| {
                let sub = &fragments[fidx].graph;
                let mapping = graph::atom_mapping(product.graph(), sub).ok_or_else(failed)?;
                Ok(mapping
                    .into_iter()
                    .map(|(p, f)| (p, sub[petgraph::graph::NodeIndex::new(f)].index))
                    .collect())
            })
            .collect()
    }

    /// Maps each product bond (position in its bond list) to the reactant bond
    /// (position in the reactant bond list).
    pub fn bond_mapping_by_int_index(&self) -> Result<Vec<BTreeMap<usize, usize>>, ReactionError> {
        let tuple_mapping = self.bond_mapping_by_tuple_index()?;
        self.products
            .iter()
            .zip(tuple_mapping)
            .map(|(product, p2r)| {
                product
                    .bonds()
                    .iter()
                    .enumerate()
                    .map(|(p_pos, bond)| {
                        let r_pos = p2r
                            .get(&bond.key())
                            .and_then(|&r| self.reactant.bond_position(r))
                            .ok_or_else(|| self.mapping_failed())?;
                        Ok((p_pos, r_pos))
                    })
                    .collect()
            })
            .collect()
    }

    /// Maps each product bond to the reactant bond, both as `(min, max)` atom pairs.
    pub fn bond_mapping_by_tuple_index(
        &self,
    ) -> Result<Vec<BTreeMap<BondIndex, BondIndex>>, ReactionError> {
        let atom_mapping = self.atom_mapping()?;
        self.products
            .iter()
            .zip(atom_mapping)
            .map(|(product, amp)| {
                product
                    .bonds()
                    .iter()
                    .map(|bond| {
                        let (i, j) = bond.key();
                        match (amp.get(&i), amp.get(&j)) {
                            (Some(&ri), Some(&rj)) => Ok(((i, j), normalize_bond((ri, rj)))),
                            _ => Err(self.mapping_failed()),
                        }
                    })
                    .collect()
            })
            .collect()
    }

    /// Maps each product bond to the reactant bond, both as positions in the SDF bond
    /// block.
    pub fn bond_mapping_by_sdf_int_index(
        &self,
    ) -> Result<Vec<BTreeMap<usize, usize>>, ReactionError> {
        let reactant = &self.reactant;
        let tuple_mapping = self.bond_mapping_by_tuple_index()?;
        self.products
            .iter()
            .zip(tuple_mapping)
            .map(|(product, p2r)| {
                product
                    .sdf_bond_indices()
                    .into_iter()
                    .enumerate()
                    .map(|(ib, sdf_bond)| {
                        let product_graph_bond = product.sdf_bond_to_graph_bond(sdf_bond);
                        let reactant_graph_bond = p2r
                            .get(&product_graph_bond)
                            .ok_or_else(|| self.mapping_failed())?;
                        let reactant_sdf_index = reactant
                            .graph_bond_to_sdf_bond(*reactant_graph_bond)
                            .and_then(|b| reactant.sdf_bond_position(b))
                            .ok_or_else(|| self.mapping_failed())?;
                        Ok((ib, reactant_sdf_index))
                    })
                    .collect()
            })
            .collect()
    }

    pub fn summary(&self) -> Result<ReactionSummary, ReactionError> {
        Ok(ReactionSummary {
            reactants: vec![self.reactant.label()],
            products: self.products.iter().map(|m| m.label()).collect(),
            charge: self.molecules().map(|m| m.charge()).collect(),
            broken_bond: *self.broken_bond()?,
            bond_energy: self.free_energy(),
        })
    }

    pub fn molecule_ids(&self) -> HashSet<&str> {
        self.molecules().map(|m| m.id()).collect()
    }

    fn mapping_failed(&self) -> ReactionError {
        ReactionError::MappingFailed {
            reaction: self.to_string(),
        }
    }
}

impl PartialEq for Reaction {
    fn eq(&self, other: &Self) -> bool {
        self.molecule_ids() == other.molecule_ids()
    }
}

impl fmt::Display for Reaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_a_to_b() {
            writeln!(f, "A -> B style reaction")?;
        } else {
            writeln!(f, "A -> B + C style reaction")?;
        }
        writeln!(f, "reactants:")?;
        writeln!(f, "    {} ({})", self.reactant.formula(), self.reactant.charge())?;
        writeln!(f, "products:")?;
        for p in &self.products {
            writeln!(f, "    {} ({})", p.formula(), p.charge())?;
        }
        Ok(())
    }
}

/// Orders energies ascending; absent energies sort after all present ones.
pub fn compare_energy(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.total_cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Stable ascending sort of reactions by free energy.
pub fn sort_by_energy(reactions: &mut [Reaction]) {
    reactions.sort_by(|a, b| compare_energy(a.free_energy(), b.free_energy()));
}

fn first_difference(a: &Molecule, b: &Molecule) -> Ordering {
    // A disconnected graph has no finite diameter and sorts as the largest.
    let diameter = |m: &Molecule| m.diameter().unwrap_or(usize::MAX);
    a.weight()
        .partial_cmp(&b.weight())
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.num_atoms().cmp(&b.num_atoms()))
        .then_with(|| a.bonds().len().cmp(&b.bonds().len()))
        .then_with(|| a.formula().cmp(b.formula()))
        .then_with(|| diameter(a).cmp(&diameter(b)))
}

/// Puts two products in canonical order: weight, atom count, bond count, formula,
/// graph diameter, then charge for isomorphic products. Equal isomorphic products keep
/// their input order.
fn order_molecules(mut mols: Vec<Arc<Molecule>>) -> Result<Vec<Arc<Molecule>>, ReactionError> {
    if mols.len() != 2 {
        return Ok(mols);
    }
    let ordering = match first_difference(&mols[0], &mols[1]) {
        Ordering::Equal if mols[0].is_isomorphic_to(&mols[1]) => {
            mols[0].charge().cmp(&mols[1].charge())
        }
        Ordering::Equal => {
            return Err(ReactionError::CannotOrder {
                first: mols[0].id().to_string(),
                second: mols[1].id().to_string(),
            });
        }
        other => other,
    };
    if ordering == Ordering::Greater {
        mols.swap(0, 1);
    }
    Ok(mols)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::molecule::tests::{dimethyl_peroxide, methoxy, molecule};

    fn arc(m: Molecule) -> Arc<Molecule> {
        Arc::new(m)
    }

    /// H-O-C-N-H with the N-H hydrogen broken off: HOCN + H.
    fn hocnh() -> (Arc<Molecule>, Arc<Molecule>, Arc<Molecule>) {
        let reactant = arc(molecule(
            "r",
            &["H", "O", "C", "N", "H"],
            &[(0, 1), (1, 2), (2, 3), (3, 4)],
            0,
            Some(-10.0),
        ));
        // Product atoms listed in a different order than in the reactant.
        let big = arc(molecule("b", &["N", "C", "O", "H"], &[(1, 0), (2, 1), (3, 2)], 0, Some(-9.0)));
        let h = arc(molecule("h", &["H"], &[], 0, Some(-0.5)));
        (reactant, big, h)
    }

    #[test]
    fn cardinality_is_enforced() {
        let m = arc(methoxy("m", 0, None));
        let err = Reaction::new(vec![], vec![m.clone()], None).unwrap_err();
        assert!(matches!(err, ReactionError::InvalidCardinality { reactants: 0, products: 1 }));
        let err = Reaction::new(vec![m.clone()], vec![m.clone(), m.clone(), m.clone()], None)
            .unwrap_err();
        assert!(matches!(err, ReactionError::InvalidCardinality { products: 3, .. }));
        assert!(Reaction::new(vec![m.clone()], vec![], None).is_err());
    }

    #[test]
    fn products_are_ordered_lightest_first() {
        let (reactant, big, h) = hocnh();
        let rxn = Reaction::new(vec![reactant], vec![big, h], None).unwrap();
        assert_eq!(rxn.products()[0].id(), "h");
        assert_eq!(rxn.products()[1].id(), "b");
    }

    #[test]
    fn isomorphic_products_are_ordered_by_charge() {
        let reactant = arc(dimethyl_peroxide("a", 0, None));
        let plus = arc(methoxy("p", 1, None));
        let minus = arc(methoxy("n", -1, None));
        let rxn = Reaction::new(vec![reactant], vec![plus, minus], None).unwrap();
        assert_eq!(rxn.products()[0].charge(), -1);
        assert_eq!(rxn.products()[1].charge(), 1);
    }

    #[test]
    fn isomorphic_products_listed_in_different_atom_order_are_ordered_by_charge() {
        let reactant = arc(dimethyl_peroxide("a", 0, None));
        let plus = arc(methoxy("plus", 1, None));
        let minus = arc(molecule(
            "minus",
            &["H", "O", "H", "C", "H"],
            &[(3, 1), (3, 0), (3, 2), (3, 4)],
            -1,
            None,
        ));
        let rxn = Reaction::new(vec![reactant.clone()], vec![plus.clone(), minus.clone()], None).unwrap();
        let ids: Vec<&str> = rxn.products().iter().map(|p| p.id()).collect();
        assert_eq!(ids, vec!["minus", "plus"]);

        let swapped = Reaction::new(vec![reactant], vec![minus, plus], None).unwrap();
        assert_eq!(swapped.products()[0].id(), "minus");
        assert_eq!(*swapped.broken_bond().unwrap(), (1, 2));
    }

    #[test]
    fn non_isomorphic_tie_cannot_be_ordered() {
        // Same formula, atom count, bond count and diameter, different connectivity.
        let reactant = arc(molecule("r", &["C", "C"], &[(0, 1)], 0, None));
        let a = arc(molecule("a", &["C", "C", "H", "H"], &[(2, 0), (0, 1), (1, 3)], 0, None));
        let b = arc(molecule("b", &["C", "H", "C", "H"], &[(0, 1), (1, 2), (2, 3)], 0, None));
        let err = Reaction::new(vec![reactant], vec![a, b], None).unwrap_err();
        assert!(matches!(err, ReactionError::CannotOrder { .. }));
    }

    #[test]
    fn broken_bond_is_found_when_not_supplied() {
        let (reactant, big, h) = hocnh();
        let rxn = Reaction::new(vec![reactant.clone()], vec![big, h], None).unwrap();
        let bond = *rxn.broken_bond().unwrap();
        assert_eq!(bond, (3, 4));
        assert!(reactant.bonds().iter().any(|b| b.key() == bond));
    }

    #[test]
    fn supplied_broken_bond_is_normalized() {
        let (reactant, big, h) = hocnh();
        let rxn = Reaction::new(vec![reactant], vec![big, h], Some((4, 3))).unwrap();
        assert_eq!(*rxn.broken_bond().unwrap(), (3, 4));
    }

    #[test]
    fn missing_broken_bond_is_an_error() {
        let reactant = arc(dimethyl_peroxide("a", 0, None));
        let h = arc(molecule("h", &["H"], &[], 0, None));
        let rxn = Reaction::new(vec![reactant], vec![h.clone(), h], None).unwrap();
        assert!(matches!(rxn.broken_bond(), Err(ReactionError::NoBrokenBond { .. })));
    }

    #[test]
    fn free_energy_is_products_minus_reactant() {
        let (reactant, big, h) = hocnh();
        let rxn = Reaction::new(vec![reactant], vec![big, h], None).unwrap();
        assert!((rxn.free_energy().unwrap() - 0.5).abs() < 1e-12);

        let unknown = arc(molecule("hx", &["H"], &[], 0, None));
        let (reactant, big, _) = hocnh();
        let rxn = Reaction::new(vec![reactant], vec![big, unknown], None).unwrap();
        assert_eq!(rxn.free_energy(), None);
    }

    #[test]
    fn broken_bond_attr_reports_species_and_order() {
        let (reactant, big, h) = hocnh();
        let rxn = Reaction::new(vec![reactant], vec![big, h], None).unwrap();
        let attr = rxn.broken_bond_attr().unwrap();
        assert_eq!(attr.species, ["N".to_string(), "H".to_string()]);
        assert_eq!(attr.order, Some(BondOrder::Single));
    }

    #[test]
    fn atom_mapping_maps_products_onto_reactant_atoms() {
        let (reactant, big, h) = hocnh();
        let rxn = Reaction::new(vec![reactant], vec![big, h], None).unwrap();
        let mapping = rxn.atom_mapping().unwrap();
        // products()[0] is the hydrogen atom
        assert_eq!(mapping[0], BTreeMap::from([(0, 4)]));
        // N C O H -> reactant atoms 3 2 1 0
        assert_eq!(mapping[1], BTreeMap::from([(0, 3), (1, 2), (2, 1), (3, 0)]));
    }

    #[test]
    fn bond_mappings_agree_across_conventions() {
        let (reactant, big, h) = hocnh();
        let rxn = Reaction::new(vec![reactant], vec![big, h], None).unwrap();

        let by_tuple = rxn.bond_mapping_by_tuple_index().unwrap();
        assert!(by_tuple[0].is_empty());
        assert_eq!(
            by_tuple[1],
            BTreeMap::from([((0, 1), (2, 3)), ((1, 2), (1, 2)), ((2, 3), (0, 1))])
        );

        let by_int = rxn.bond_mapping_by_int_index().unwrap();
        assert_eq!(by_int[1], BTreeMap::from([(0, 2), (1, 1), (2, 0)]));

        // Product bonds are declared (1,0),(2,1),(3,2): the SDF block keeps that order
        // because the sorted keys are already ascending.
        let by_sdf = rxn.bond_mapping_by_sdf_int_index().unwrap();
        assert!(by_sdf[0].is_empty());
        assert_eq!(by_sdf[1], BTreeMap::from([(0, 2), (1, 1), (2, 0)]));
    }

    #[test]
    fn sdf_bond_mapping_follows_file_order() {
        // Reactant bonds declared out of order: the SDF block sorts them.
        let reactant = arc(molecule(
            "r",
            &["H", "O", "C", "N", "H"],
            &[(3, 4), (2, 3), (1, 2), (0, 1)],
            0,
            None,
        ));
        let big = arc(molecule("b", &["H", "O", "C", "N"], &[(0, 1), (1, 2), (2, 3)], 0, None));
        let h = arc(molecule("h", &["H"], &[], 0, None));
        let rxn = Reaction::new(vec![reactant], vec![big, h], Some((3, 4))).unwrap();

        let by_int = rxn.bond_mapping_by_int_index().unwrap();
        assert_eq!(by_int[1], BTreeMap::from([(0, 3), (1, 2), (2, 1)]));
        let by_sdf = rxn.bond_mapping_by_sdf_int_index().unwrap();
        assert_eq!(by_sdf[1], BTreeMap::from([(0, 0), (1, 1), (2, 2)]));
    }

    #[test]
    fn symmetric_split_maps_each_product_to_a_distinct_fragment() {
        let reactant = arc(dimethyl_peroxide("a", 0, None));
        let m1 = arc(methoxy("m1", 0, None));
        let m2 = arc(methoxy("m2", 0, None));
        let rxn = Reaction::new(vec![reactant], vec![m1, m2], None).unwrap();
        let mapping = rxn.atom_mapping().unwrap();
        let first: HashSet<usize> = mapping[0].values().copied().collect();
        let second: HashSet<usize> = mapping[1].values().copied().collect();
        assert_eq!(first.len(), 5);
        assert!(first.is_disjoint(&second));
        assert_eq!(first.len() + second.len(), 10);
    }

    #[test]
    fn equality_compares_molecule_ids() {
        let (reactant, big, h) = hocnh();
        let a = Reaction::new(vec![reactant.clone()], vec![big.clone(), h.clone()], None).unwrap();
        let b = Reaction::new(vec![reactant], vec![h, big], Some((3, 4))).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn display_and_summary_describe_the_reaction() {
        let (reactant, big, h) = hocnh();
        let rxn = Reaction::new(vec![reactant], vec![big, h], None).unwrap();
        let text = rxn.to_string();
        assert!(text.starts_with("A -> B + C style reaction"));
        assert!(text.contains("    CH2NO (0)"));

        let summary = rxn.summary().unwrap();
        assert_eq!(summary.reactants, vec!["CH2NO_0_r_-10"]);
        assert_eq!(summary.products, vec!["H_0_h_-0.5", "CHNO_0_b_-9"]);
        assert_eq!(summary.charge, vec![0, 0, 0]);
        assert_eq!(summary.broken_bond, (3, 4));
    }

    #[test]
    fn energy_sort_puts_unknown_energies_last() {
        assert_eq!(compare_energy(Some(1.0), None), Ordering::Less);
        assert_eq!(compare_energy(None, Some(-5.0)), Ordering::Greater);
        assert_eq!(compare_energy(Some(-1.0), Some(2.0)), Ordering::Less);
        assert_eq!(compare_energy(None, None), Ordering::Equal);
    }
}
