//! Provides input/output for molecule collections and extraction results.
//!
//! The molecule database is read through [`traits::MolecularFile`]; it and the
//! output-only structure file are written through [`traits::MolecularFileWriter`]. The
//! reaction archive stores molecules together with the reactions
//! extracted from them so that a pipeline can resume from any stage.

pub mod archive;
pub mod database;
pub mod sdf;
pub mod traits;
