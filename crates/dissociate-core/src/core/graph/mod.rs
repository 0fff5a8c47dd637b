//! Graph algorithms over molecular connectivity.
//!
//! Molecules are represented as undirected [`petgraph`] graphs whose nodes carry the
//! atom species and coordinates and whose edges carry the bond order. Node `i` of a
//! molecule graph is atom `i` of the molecule.

pub mod isomorphism;

use crate::core::models::topology::{BondIndex, BondOrder};
use nalgebra::Point3;
use petgraph::algo::dijkstra;
use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::visit::{Bfs, EdgeRef};
use std::collections::HashMap;

pub use isomorphism::{atom_mapping, is_isomorphic};

#[derive(Debug, Clone, PartialEq)]
pub struct AtomNode {
    /// Element symbol.
    pub specie: String,
    pub coords: Point3<f64>,
    /// Index of the atom in the molecule this graph (or subgraph) was built from.
    pub index: usize,
}

pub type MolGraph = UnGraph<AtomNode, BondOrder>;

/// Returns the bonds of a graph as normalized atom index pairs, in edge order.
pub fn edge_list(graph: &MolGraph) -> Vec<(BondIndex, BondOrder)> {
    graph
        .edge_references()
        .map(|e| {
            let (a, b) = (e.source().index(), e.target().index());
            ((a.min(b), a.max(b)), *e.weight())
        })
        .collect()
}

/// Returns a copy of `graph` with the bond between `u` and `v` removed, or `None`
/// if the two atoms are not bonded.
pub fn without_bond(graph: &MolGraph, u: usize, v: usize) -> Option<MolGraph> {
    if u >= graph.node_count() || v >= graph.node_count() {
        return None;
    }
    let mut cut = graph.clone();
    let edge = cut.find_edge(NodeIndex::new(u), NodeIndex::new(v))?;
    cut.remove_edge(edge);
    Some(cut)
}

/// Partitions the nodes into connected components.
///
/// Each component is sorted ascending and components are ordered by their lowest node.
pub fn connected_components(graph: &MolGraph) -> Vec<Vec<usize>> {
    let mut seen = vec![false; graph.node_count()];
    let mut components = Vec::new();
    for start in graph.node_indices() {
        if seen[start.index()] {
            continue;
        }
        let mut component = Vec::new();
        let mut bfs = Bfs::new(graph, start);
        while let Some(node) = bfs.next(graph) {
            seen[node.index()] = true;
            component.push(node.index());
        }
        component.sort_unstable();
        components.push(component);
    }
    components
}

/// Builds the subgraph induced by `nodes`, renumbering them `0..nodes.len()` in the
/// given order. Node weights (including their original `index`) are cloned.
pub fn induced_subgraph(graph: &MolGraph, nodes: &[usize]) -> MolGraph {
    let mut index_map = HashMap::with_capacity(nodes.len());
    let mut sub = MolGraph::with_capacity(nodes.len(), nodes.len());
    for &n in nodes {
        let id = sub.add_node(graph[NodeIndex::new(n)].clone());
        index_map.insert(n, id);
    }
    for edge in graph.edge_references() {
        let a = index_map.get(&edge.source().index());
        let b = index_map.get(&edge.target().index());
        if let (Some(&a), Some(&b)) = (a, b) {
            sub.add_edge(a, b, *edge.weight());
        }
    }
    sub
}

/// The largest shortest-path distance between any two nodes.
///
/// Returns `None` for an empty or disconnected graph.
pub fn diameter(graph: &MolGraph) -> Option<usize> {
    let n = graph.node_count();
    if n == 0 {
        return None;
    }
    let mut longest = 0;
    for start in graph.node_indices() {
        let distances = dijkstra(graph, start, None, |_| 1usize);
        if distances.len() < n {
            return None;
        }
        longest = longest.max(distances.values().copied().max().unwrap_or(0));
    }
    Some(longest)
}
