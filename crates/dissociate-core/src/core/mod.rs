//! # Core Module
//!
//! Fundamental building blocks for reaction extraction: molecular data models,
//! graph algorithms over molecular connectivity, and file I/O.
//!
//! - **Molecular Representation** ([`models`]) - Elements, bonds, molecules and fragments
//! - **Graph Algorithms** ([`graph`]) - Bond removal, connected components, diameter and
//!   species-labelled graph isomorphism
//! - **File I/O** ([`io`]) - Molecule database reader, SDF writer and reaction archive

pub mod graph;
pub mod io;
pub mod models;
