//! Structural tests deciding whether breaking one reactant bond yields given products.

use crate::core::models::molecule::Molecule;
use crate::core::models::topology::BondIndex;

/// Reactant bonds whose removal leaves a single fragment isomorphic to `product`.
///
/// Bonds are returned in reactant bond-list order. With `first_only` the search stops
/// at the first match.
pub fn is_valid_a_to_b_reaction(
    reactant: &Molecule,
    product: &Molecule,
    first_only: bool,
) -> Vec<BondIndex> {
    let mut bonds = Vec::new();
    for (bond, fragments) in reactant.fragments() {
        if let [fragment] = fragments.as_slice() {
            if fragment.is_isomorphic_to(product.graph()) {
                bonds.push(*bond);
                if first_only {
                    break;
                }
            }
        }
    }
    bonds
}

/// Reactant bonds whose removal leaves two fragments isomorphic to `product1` and
/// `product2`, in either pairing.
pub fn is_valid_a_to_b_c_reaction(
    reactant: &Molecule,
    product1: &Molecule,
    product2: &Molecule,
    first_only: bool,
) -> Vec<BondIndex> {
    let (g1, g2) = (product1.graph(), product2.graph());
    let mut bonds = Vec::new();
    for (bond, fragments) in reactant.fragments() {
        if let [f0, f1] = fragments.as_slice() {
            let matches = (f0.is_isomorphic_to(g1) && f1.is_isomorphic_to(g2))
                || (f0.is_isomorphic_to(g2) && f1.is_isomorphic_to(g1));
            if matches {
                bonds.push(*bond);
                if first_only {
                    break;
                }
            }
        }
    }
    bonds
}
