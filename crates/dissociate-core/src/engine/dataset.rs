//! Structure, label and feature files for training bond-energy models.
//!
//! Every dataset pairs an SDF structure file with a label file whose layout depends on
//! the [`DatasetKind`]. Bonds are always enumerated in SDF bond-block order so that the
//! labels line up with the structures a model reads.

use super::config::{DatasetConfig, DatasetKind};
use super::error::EngineError;
use super::extractor::ReactionExtractor;
use super::groups::ReactionsOnePerBond;
use super::reaction::{AtomMapping, Reaction};
use crate::core::io::sdf::SdfFile;
use crate::core::io::traits::{MolecularFileWriter, create_file_writer};
use crate::core::models::molecule::{FeatureRecord, Molecule};
use crate::core::models::topology::BondIndex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

const CLASSIFICATION_HEADER: &str = "# Each line lists the energy class of a bond in a molecule. \
Each line has three items: \
1st: an integer of of {0,1,2}, indicating the class of bond energy, \
0 stands for feasible reaction, 1 stands for nonfeasize reaction \
and 2 stands for unknown, i.e. we do not have info about the reaction.\
2nd: index of the bond in the molecule {0,1,2,num_bonds-1}.\
3rd: molecule idx from which the bond come.";

const REGRESSION_HEADER: &str = "# Each line lists the energy of a bond in a molecule. \
The number of items in each line is equal to 2*N+1, where N is the number bonds in the \
molecule. The first N items are bond energies and the next N items are indicators (0 or 1) \
specifying whether the bond energy exists. A value of 0 means the corresponding bond energy \
should be ignored, whatever its value is. The last item specifies the molecule from which the \
bond come.";

const MOLECULE_HEADER: &str = "# Each line lists the bond energies of a molecule. \
The number of items in each line is equal to 2*N, where N is the number bonds. The first N \
items are bond energies and the next N items are indicators (0 or 1) to specify whether the \
bond energy exists in the dataset. A value of 0 means the corresponding bond energy should be \
ignored, whatever its value is.";

/// Output locations of a dataset. The feature file is skipped when `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetPaths {
    pub struct_file: PathBuf,
    pub label_file: PathBuf,
    pub feature_file: Option<PathBuf>,
}

/// Label of one reaction in a reaction-based dataset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReactionLabel {
    pub class: u8,
    pub num_mols: usize,
    pub atom_mapping: Vec<AtomMapping>,
    pub bond_mapping: Vec<BTreeMap<usize, usize>>,
}

/// Energy class of a reaction ranked `order` among its reactant's reactions:
/// 0 favorable, 1 unfavorable, 2 unknown.
fn energy_class(order: Option<usize>, top_n: usize) -> u8 {
    match order {
        None => 2,
        Some(i) if i < top_n => 0,
        Some(_) => 1,
    }
}

impl ReactionExtractor<'_> {
    /// Writes the dataset selected by `config.kind` and returns the number of label
    /// records written.
    pub fn create_dataset(&self, config: &DatasetConfig, paths: &DatasetPaths) -> Result<usize, EngineError> {
        info!(kind = %config.kind, "Creating dataset.");
        match config.kind {
            DatasetKind::ReactionBased => self.create_struct_label_dataset_reaction_based(
                paths,
                config.complement_reactions,
                config.one_per_iso_bond_group,
                config.top_n,
            ),
            DatasetKind::BondClassification => self
                .create_struct_label_dataset_bond_based_classification(
                    paths,
                    config.lowest_across_product_charge,
                    config.top_n,
                ),
            DatasetKind::BondRegression => self.create_struct_label_dataset_bond_based_regression(
                paths,
                config.lowest_across_product_charge,
            ),
            DatasetKind::MoleculeBased => {
                self.create_struct_label_dataset_mol_based(paths, config.lowest_across_product_charge)
            }
        }
    }

    fn one_per_bond_groups(&self, lowest_across_product_charge: bool) -> Result<Vec<ReactionsOnePerBond>, EngineError> {
        Ok(if lowest_across_product_charge {
            self.group_by_reactant_lowest_energy()?
        } else {
            self.group_by_reactant_charge_0()?
        })
    }

    /// One label per reaction, with the reaction's molecules written consecutively
    /// (reactant first) to the structure file.
    ///
    /// Reactions of each reactant are ranked by energy; the first `top_n` are class 0,
    /// the rest class 1, and reactions without energy class 2.
    pub fn create_struct_label_dataset_reaction_based(
        &self,
        paths: &DatasetPaths,
        complement_reactions: bool,
        one_per_iso_bond_group: bool,
        top_n: usize,
    ) -> Result<usize, EngineError> {
        let mut molecules: Vec<Arc<Molecule>> = Vec::new();
        let mut labels = Vec::new();

        for group in self.group_by_reactant_all()? {
            let reactions = group.order_reactions(complement_reactions, one_per_iso_bond_group)?;
            for (i, rxn) in reactions.iter().enumerate() {
                let class = energy_class(rxn.free_energy().map(|_| i), top_n);
                molecules.extend(rxn.molecules().cloned());
                labels.push(ReactionLabel {
                    class,
                    num_mols: 1 + rxn.products().len(),
                    atom_mapping: rxn.atom_mapping()?,
                    bond_mapping: rxn.bond_mapping_by_sdf_int_index()?,
                });
            }
        }

        write_struct_file(&molecules, &paths.struct_file)?;
        write_json(&labels, &paths.label_file)?;
        if let Some(path) = &paths.feature_file {
            let features: Vec<FeatureRecord> = molecules.iter().map(|m| m.pack_features(None)).collect();
            write_feature_file(&features, path)?;
        }
        Ok(labels.len())
    }

    /// One line per reactant bond: `<class> <sdf bond index> <molecule id>`.
    ///
    /// The reactant is written to the structure file once per bond.
    pub fn create_struct_label_dataset_bond_based_classification(
        &self,
        paths: &DatasetPaths,
        lowest_across_product_charge: bool,
        top_n: usize,
    ) -> Result<usize, EngineError> {
        let mut rows: Vec<(Arc<Molecule>, usize, u8, BondIndex)> = Vec::new();
        for group in self.one_per_bond_groups(lowest_across_product_charge)? {
            let reactant = group.reactant();
            let rankings = group.order_reactions(true)?;
            for (ib, sdf_bond) in reactant.sdf_bond_indices().into_iter().enumerate() {
                let bond = reactant.sdf_bond_to_graph_bond(sdf_bond);
                // Reactions without energy are ranked but still unknown.
                let order = rankings.get(&bond).and_then(|r| r.energy.and(r.order));
                rows.push((reactant.clone(), ib, energy_class(order, top_n), bond));
            }
        }

        let mut writer = create_file_writer(&paths.label_file)?;
        writeln!(writer, "{}", CLASSIFICATION_HEADER)?;
        for (reactant, ib, class, _) in &rows {
            writeln!(writer, "{} {} {}", class, ib, reactant.id())?;
        }
        writer.flush()?;

        let reactants: Vec<Arc<Molecule>> = rows.iter().map(|(m, ..)| m.clone()).collect();
        write_struct_file(&reactants, &paths.struct_file)?;
        if let Some(path) = &paths.feature_file {
            let features: Vec<FeatureRecord> = rows
                .iter()
                .map(|(m, _, _, bond)| m.pack_features(Some(*bond)))
                .collect();
            write_feature_file(&features, path)?;
        }
        Ok(rows.len())
    }

    /// One line per bond with a known reaction energy: `N` energies, `N` indicators, the
    /// molecule id and a comment describing the reaction.
    pub fn create_struct_label_dataset_bond_based_regression(
        &self,
        paths: &DatasetPaths,
        lowest_across_product_charge: bool,
    ) -> Result<usize, EngineError> {
        let mut rows: Vec<(Reaction, usize, f64)> = Vec::new();
        for group in self.one_per_bond_groups(lowest_across_product_charge)? {
            let reactant = group.reactant();
            let rankings = group.order_reactions(true)?;
            for (ib, sdf_bond) in reactant.sdf_bond_indices().into_iter().enumerate() {
                let bond = reactant.sdf_bond_to_graph_bond(sdf_bond);
                let Some(ranking) = rankings.get(&bond) else {
                    continue;
                };
                if let (Some(rxn), Some(energy)) = (&ranking.reaction, ranking.energy) {
                    rows.push((rxn.clone(), ib, energy));
                }
            }
        }

        let mut writer = create_file_writer(&paths.label_file)?;
        writeln!(writer, "{}", REGRESSION_HEADER)?;
        for (rxn, ib, energy) in &rows {
            let reactant = rxn.reactant();
            let num_bonds = reactant.bonds().len();
            let mut line = String::new();
            for j in 0..num_bonds {
                if j == *ib {
                    line.push_str(&format_general(*energy));
                    line.push(' ');
                } else {
                    line.push_str("0.0 ");
                }
            }
            line.push_str("   ");
            for j in 0..num_bonds {
                line.push_str(if j == *ib { "1 " } else { "0 " });
            }
            line.push_str(&format!("    {}", reactant.id()));

            let summary = rxn.summary()?;
            let sdf_bond = reactant.graph_bond_to_sdf_bond(summary.broken_bond);
            let sdf_bond = sdf_bond.map_or_else(|| "None".to_string(), |b| format!("{:?}", b));
            writeln!(
                writer,
                "{}    # {} {} {} {}",
                line,
                quoted_list(&summary.reactants),
                quoted_list(&summary.products),
                sdf_bond,
                format_general(*energy)
            )?;
        }
        writer.flush()?;

        let reactants: Vec<Arc<Molecule>> = rows.iter().map(|(r, ..)| r.reactant().clone()).collect();
        write_struct_file(&reactants, &paths.struct_file)?;
        if let Some(path) = &paths.feature_file {
            let features = rows
                .iter()
                .map(|(rxn, ..)| Ok(rxn.reactant().pack_features(Some(*rxn.broken_bond()?))))
                .collect::<Result<Vec<FeatureRecord>, EngineError>>()?;
            write_feature_file(&features, path)?;
        }
        Ok(rows.len())
    }

    /// One line per reactant: `N` bond energies followed by `N` indicators, both in SDF
    /// bond order.
    pub fn create_struct_label_dataset_mol_based(
        &self,
        paths: &DatasetPaths,
        lowest_across_product_charge: bool,
    ) -> Result<usize, EngineError> {
        let groups = self.one_per_bond_groups(lowest_across_product_charge)?;

        let mut writer = create_file_writer(&paths.label_file)?;
        writeln!(writer, "{}", MOLECULE_HEADER)?;
        for group in &groups {
            let reactant = group.reactant();
            let mut energies: Vec<Option<f64>> = vec![None; reactant.bonds().len()];
            for rxn in group.reactions() {
                let position = reactant.sdf_bond_position(*rxn.broken_bond()?);
                if let Some(ib) = position {
                    energies[ib] = rxn.free_energy();
                }
            }

            let mut line = String::new();
            for energy in &energies {
                line.push_str(&format_general(energy.unwrap_or(0.0)));
                line.push(' ');
            }
            line.push_str("    ");
            for energy in &energies {
                line.push_str(if energy.is_some() { "1 " } else { "0 " });
            }
            writeln!(writer, "{}", line)?;
        }
        writer.flush()?;

        let reactants: Vec<Arc<Molecule>> = groups.iter().map(|g| g.reactant().clone()).collect();
        write_struct_file(&reactants, &paths.struct_file)?;
        if let Some(path) = &paths.feature_file {
            let features: Vec<FeatureRecord> = reactants.iter().map(|m| m.pack_features(None)).collect();
            write_feature_file(&features, path)?;
        }
        Ok(groups.len())
    }
}

fn write_struct_file(molecules: &[Arc<Molecule>], path: &Path) -> Result<(), EngineError> {
    info!("Start writing sdf file: {}", path.display());
    SdfFile::write_to_path(molecules.iter().map(|m| m.as_ref()), path)?;
    info!("Finish writing sdf file: {}", path.display());
    Ok(())
}

fn write_feature_file(features: &[FeatureRecord], path: &Path) -> Result<(), EngineError> {
    info!("Start writing feature file: {}", path.display());
    write_json(features, path)?;
    info!("Finish writing feature file: {}", path.display());
    Ok(())
}

fn write_json<T: Serialize + ?Sized>(value: &T, path: &Path) -> Result<(), EngineError> {
    let mut writer = create_file_writer(path)?;
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.flush()?;
    Ok(())
}

/// `['a', 'b']`, the list notation the label comments are read back with.
fn quoted_list(items: &[String]) -> String {
    let quoted: Vec<String> = items
        .iter()
        .map(|item| format!("'{}'", item.replace('\\', "\\\\").replace('\'', "\\'")))
        .collect();
    format!("[{}]", quoted.join(", "))
}

/// Formats `x` with 15 significant digits, dropping trailing zeros, switching to
/// exponent notation below `1e-4` or from `1e15`.
fn format_general(x: f64) -> String {
    const PRECISION: i32 = 15;
    if !x.is_finite() {
        return if x.is_nan() {
            "nan".to_string()
        } else if x > 0.0 {
            "inf".to_string()
        } else {
            "-inf".to_string()
        };
    }
    if x == 0.0 {
        return if x.is_sign_negative() { "-0" } else { "0" }.to_string();
    }

    let scientific = format!("{:.*e}", (PRECISION - 1) as usize, x);
    let (mantissa, exponent) = scientific.split_once('e').unwrap_or((scientific.as_str(), "0"));
    let exponent: i32 = exponent.parse().unwrap_or(0);

    if exponent < -4 || exponent >= PRECISION {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", trim_fraction(mantissa), sign, exponent.abs())
    } else {
        let decimals = (PRECISION - 1 - exponent) as usize;
        trim_fraction(&format!("{:.*}", decimals, x)).to_string()
    }
}

fn trim_fraction(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}
