//! # Workflows Module
//!
//! High-level procedures that take the pipeline from files on disk to files on disk.
//!
//! ## Overview
//!
//! Workflows are the entry points used by the command-line tool. Each one loads its
//! inputs, drives the [`crate::engine`] components with a validated configuration,
//! reports progress through a [`crate::engine::progress::ProgressReporter`], and
//! returns a summary of what was written.
//!
//! ## Architecture
//!
//! - **Extraction Workflow** ([`extract`]) - Molecule database to reaction archive
//! - **Dataset Workflow** ([`dataset`]) - Reaction archive to structure, label and
//!   feature files
//! - **Bond Energy Workflow** ([`bond_energies`]) - Reaction archive to a per-bond energy
//!   report

pub mod bond_energies;
pub mod dataset;
pub mod extract;
