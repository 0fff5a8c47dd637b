use super::{AtomNode, MolGraph};
use crate::core::models::topology::BondOrder;
use petgraph::algo::{is_isomorphic_matching, subgraph_isomorphisms_iter};
use std::collections::HashMap;

fn species_match(a: &AtomNode, b: &AtomNode) -> bool {
    a.specie == b.specie
}

// Bond orders are not compared: connectivity and atom species decide equivalence.
fn any_bond(_: &BondOrder, _: &BondOrder) -> bool {
    true
}

fn species_multiset(graph: &MolGraph) -> Vec<&str> {
    let mut species: Vec<&str> = graph.node_weights().map(|n| n.specie.as_str()).collect();
    species.sort_unstable();
    species
}

fn cheap_invariants_match(a: &MolGraph, b: &MolGraph) -> bool {
    a.node_count() == b.node_count()
        && a.edge_count() == b.edge_count()
        && species_multiset(a) == species_multiset(b)
}

/// Decides whether two molecular graphs are isomorphic, matching atoms by species.
pub fn is_isomorphic(a: &MolGraph, b: &MolGraph) -> bool {
    if !cheap_invariants_match(a, b) {
        return false;
    }
    is_isomorphic_matching(a, b, species_match, any_bond)
}

/// Finds a species-preserving isomorphism from `a` to `b`.
///
/// The result maps every node index of `a` to a node index of `b`, or is `None` if
/// the graphs are not isomorphic.
pub fn atom_mapping(a: &MolGraph, b: &MolGraph) -> Option<HashMap<usize, usize>> {
    if !cheap_invariants_match(a, b) {
        return None;
    }
    let mut node_match = species_match;
    let mut edge_match = any_bond;
    // With equal node and edge counts an induced subgraph match is a full isomorphism.
    let mut matches = subgraph_isomorphisms_iter(&a, &b, &mut node_match, &mut edge_match)?;
    let mapping = matches.next()?;
    Some(mapping.into_iter().enumerate().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::graph::tests::chain;
    use crate::core::graph::without_bond;

    #[test]
    fn identical_chains_are_isomorphic() {
        assert!(is_isomorphic(&chain(&["C", "O", "H"]), &chain(&["C", "O", "H"])));
    }

    #[test]
    fn reversed_chain_is_isomorphic() {
        assert!(is_isomorphic(&chain(&["C", "O", "H"]), &chain(&["H", "O", "C"])));
    }

    #[test]
    fn different_species_order_is_not_isomorphic() {
        assert!(!is_isomorphic(&chain(&["C", "O", "H"]), &chain(&["O", "C", "H"])));
    }

    #[test]
    fn different_connectivity_is_not_isomorphic() {
        let g = chain(&["C", "O", "H"]);
        let cut = without_bond(&g, 1, 2).unwrap();
        assert!(!is_isomorphic(&g, &cut));
    }

    #[test]
    fn atom_mapping_maps_every_node_preserving_species() {
        let a = chain(&["H", "O", "C"]);
        let b = chain(&["C", "O", "H"]);
        let mapping = atom_mapping(&a, &b).unwrap();
        assert_eq!(mapping.len(), 3);
        assert_eq!(mapping[&0], 2);
        assert_eq!(mapping[&1], 1);
        assert_eq!(mapping[&2], 0);
    }

    #[test]
    fn atom_mapping_is_none_for_non_isomorphic_graphs() {
        assert!(atom_mapping(&chain(&["C", "O"]), &chain(&["C", "N"])).is_none());
        assert!(atom_mapping(&chain(&["C", "O"]), &chain(&["C", "O", "H"])).is_none());
    }
}
