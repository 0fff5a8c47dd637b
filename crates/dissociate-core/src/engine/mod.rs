//! # Engine Module
//!
//! This module implements reaction extraction: it turns a collection of molecules into
//! validated single-bond dissociation reactions, organizes them per reactant, and emits
//! training datasets from them.
//!
//! ## Overview
//!
//! A reaction breaks exactly one bond of its reactant and yields one product (ring
//! opening, `A -> B`) or two products (`A -> B + C`). Candidate reactions are found by
//! bucketing molecules on formula and charge, keeping only combinations that conserve
//! composition and charge, and checking that the fragments of some reactant bond are
//! isomorphic to the candidate products.
//!
//! ## Architecture
//!
//! - **Reactions** ([`reaction`], [`validity`]) - The reaction entity, its energy, and the
//!   atom and bond correspondences between products and reactant
//! - **Reaction Groups** ([`groups`]) - Reactions sharing a reactant, with pluggable
//!   admission policies, energy ordering and charge-complement synthesis
//! - **Extraction** ([`extractor`], [`bucket`]) - Candidate enumeration, filtering,
//!   grouping and persistence of the reaction set
//! - **Datasets** ([`dataset`]) - Structure, label and feature files per dataset kind
//! - **Configuration** ([`config`]) - Extraction and dataset parameters
//! - **Progress Monitoring** ([`progress`]) - Progress reporting callbacks
//! - **Error Handling** ([`error`]) - Reaction and engine error types
//!
//! ## Key Capabilities
//!
//! - **Parallel enumeration** of `A -> B + C` candidates over reactant formulas
//! - **Exhaustive or early-exit** bond search for each candidate
//! - **Charge-complement reactions** for charge combinations missing from the data
//! - **Deterministic output** independent of thread scheduling

pub mod bucket;
pub mod config;
pub mod dataset;
pub mod error;
pub mod extractor;
pub mod groups;
pub mod progress;
pub mod reaction;
pub mod validity;
