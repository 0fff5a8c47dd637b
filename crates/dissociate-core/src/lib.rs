//! # Dissociate Core Library
//!
//! Extraction of single-bond dissociation reactions from a database of computed
//! molecules, and preparation of bond-energy datasets for graph neural networks.
//!
//! ## Architectural Philosophy
//!
//! The library follows a three-layer architecture:
//!
//! - **[`core`]: The Foundation.** Stateless data models (`Molecule`, molecular graphs,
//!   fragments), the graph isomorphism capability, and file I/O (molecule database,
//!   SDF structure files, reaction archives).
//!
//! - **[`engine`]: The Logic Core.** Reactions, reaction groups with pluggable insertion
//!   policies, the `ReactionExtractor` that enumerates and validates candidate reactions,
//!   and dataset emission.
//!
//! - **[`workflows`]: The Public API.** End-to-end procedures (extract reactions from a
//!   database, write a dataset from an archive) that tie `core` and `engine` together.

pub mod core;
pub mod engine;
pub mod workflows;
