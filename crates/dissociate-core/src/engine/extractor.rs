use super::bucket::{AttributeValue, Buckets, MoleculeAttribute};
use super::config::{ChargeWindow, ReactionFilter, ReactionStyle};
use super::error::{EngineError, ReactionError};
use super::groups::{
    MultiplePerBond, ReactionsGroup, ReactionsMultiplePerBond, ReactionsOnePerBond,
    same_bond_breaking_reactions_between,
};
use super::progress::{Progress, ProgressReporter, Stage};
use super::reaction::{Reaction, ReactionSummary, compare_energy};
use super::validity::{is_valid_a_to_b_c_reaction, is_valid_a_to_b_reaction};
use crate::core::io::archive::{ReactionArchive, ReactionRecord, resolve};
use crate::core::io::traits::create_file_writer;
use crate::core::models::molecule::Molecule;
use crate::core::models::topology::{BondIndex, BondOrder};
use indexmap::IndexMap;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Reactions keyed by the charges of the two isomorphic reactants they break, lower
/// charge first.
pub type ChargePairReactions = BTreeMap<(i32, i32), Vec<(Reaction, Reaction)>>;

/// Molecules of one formula, split by charge.
struct FormulaBucket<'b> {
    formula: &'b str,
    composition: &'b BTreeMap<String, usize>,
    by_charge: Vec<(i32, &'b [Arc<Molecule>])>,
}

/// Finds single-bond dissociation reactions among a set of molecules and groups them
/// for dataset emission.
///
/// The extractor owns the current molecule and reaction lists. Extraction replaces the
/// reaction list; filters replace both lists.
#[derive(Debug)]
pub struct ReactionExtractor<'r> {
    molecules: Vec<Arc<Molecule>>,
    reactions: Vec<Reaction>,
    charge_window: ChargeWindow,
    reporter: Option<&'r ProgressReporter<'r>>,
}

impl<'r> ReactionExtractor<'r> {
    pub fn new(molecules: Vec<Arc<Molecule>>) -> Self {
        Self {
            molecules,
            reactions: Vec::new(),
            charge_window: ChargeWindow::default(),
            reporter: None,
        }
    }

    /// Builds an extractor over already known reactions; the molecule list is the set of
    /// their participants in first-seen order.
    pub fn from_reactions(reactions: Vec<Reaction>) -> Self {
        Self {
            molecules: molecules_of(&reactions),
            reactions,
            charge_window: ChargeWindow::default(),
            reporter: None,
        }
    }

    pub fn with_reporter(mut self, reporter: &'r ProgressReporter<'r>) -> Self {
        self.reporter = Some(reporter);
        self
    }

    /// Charge range used when synthesizing complement reactions.
    pub fn with_charge_window(mut self, charge_window: ChargeWindow) -> Self {
        self.charge_window = charge_window;
        self
    }

    pub fn molecules(&self) -> &[Arc<Molecule>] {
        &self.molecules
    }

    pub fn reactions(&self) -> &[Reaction] {
        &self.reactions
    }

    pub fn into_reactions(self) -> Vec<Reaction> {
        self.reactions
    }

    pub fn charge_window(&self) -> ChargeWindow {
        self.charge_window
    }

    fn report(&self, event: Progress) {
        if let Some(reporter) = self.reporter {
            reporter.report(event);
        }
    }

    pub fn bucket_molecules(&self, keys: &[MoleculeAttribute]) -> Buckets {
        info!("Start bucketing molecules...");
        Buckets::build(&self.molecules, keys)
    }

    /// Runs the extraction selected by `style` and returns the number of reactions found.
    pub fn extract(&mut self, style: ReactionStyle, find_one: bool) -> Result<usize, ReactionError> {
        match style {
            ReactionStyle::AToB => self.extract_a_to_b_style_reaction(find_one).map(<[_]>::len),
            ReactionStyle::AToBC => self.extract_a_to_b_c_style_reaction(find_one).map(<[_]>::len),
            ReactionStyle::All => self.extract_one_bond_break(find_one).map(|(a2b, a2bc)| a2b + a2bc),
        }
    }

    /// Extracts `A -> B` reactions between molecules of equal formula and charge.
    ///
    /// With `find_one`, at most one reaction is kept per ordered molecule pair even when
    /// several reactant bonds yield the product.
    pub fn extract_a_to_b_style_reaction(&mut self, find_one: bool) -> Result<&[Reaction], ReactionError> {
        info!("Start extracting A -> B style reactions");
        self.report(Progress::StageStart(Stage::ExtractAToB));

        let buckets = self.bucket_molecules(&[MoleculeAttribute::Formula, MoleculeAttribute::Charge]);
        let mut a2b = Vec::new();
        for bucket in formula_buckets(&buckets) {
            for (_, molecules) in &bucket.by_charge {
                for (i, a) in molecules.iter().enumerate() {
                    for (j, b) in molecules.iter().enumerate() {
                        if i == j {
                            continue;
                        }
                        for bond in is_valid_a_to_b_reaction(a, b, find_one) {
                            a2b.push(Reaction::new(vec![a.clone()], vec![b.clone()], Some(bond))?);
                        }
                    }
                }
            }
        }

        info!("{} A -> B style reactions extracted", a2b.len());
        self.report(Progress::StageFinish {
            stage: Stage::ExtractAToB,
            count: a2b.len(),
        });
        self.reactions = a2b;
        Ok(&self.reactions)
    }

    /// Extracts `A -> B + C` reactions (`B` and `C` may be the same molecule) whose
    /// products conserve the reactant's elemental composition and charge.
    ///
    /// Reactant formulas are processed in parallel; results keep formula order.
    pub fn extract_a_to_b_c_style_reaction(
        &mut self,
        find_one: bool,
    ) -> Result<&[Reaction], ReactionError> {
        info!("Start extracting A -> B + C style reactions");
        self.report(Progress::StageStart(Stage::ExtractAToBC));

        let buckets = self.bucket_molecules(&[MoleculeAttribute::Formula, MoleculeAttribute::Charge]);
        let formulas = formula_buckets(&buckets);
        self.report(Progress::FormulasStart {
            total: formulas.len() as u64,
        });

        #[cfg(not(feature = "parallel"))]
        let iterator = formulas.iter();

        #[cfg(feature = "parallel")]
        let iterator = formulas.par_iter();

        let results: Vec<Result<Vec<Reaction>, ReactionError>> = iterator
            .map(|bucket| {
                let found = a_to_b_c_reactions_of(bucket, &formulas, find_one);
                self.report(Progress::FormulaDone {
                    reactions: found.as_ref().map_or(0, Vec::len),
                });
                found
            })
            .collect();
        self.report(Progress::FormulasFinish);

        let mut a2bc = Vec::new();
        for result in results {
            a2bc.extend(result?);
        }

        info!("{} A -> B + C style reactions extracted", a2bc.len());
        self.report(Progress::StageFinish {
            stage: Stage::ExtractAToBC,
            count: a2bc.len(),
        });
        self.reactions = a2bc;
        Ok(&self.reactions)
    }

    /// Extracts both reaction styles; the reaction list becomes `A -> B` followed by
    /// `A -> B + C`. Returns the count of each.
    pub fn extract_one_bond_break(&mut self, find_one: bool) -> Result<(usize, usize), ReactionError> {
        let a2b = self.extract_a_to_b_style_reaction(find_one)?.to_vec();
        let a2bc = self.extract_a_to_b_c_style_reaction(find_one)?.to_vec();
        let counts = (a2b.len(), a2bc.len());
        self.reactions = a2b;
        self.reactions.extend(a2bc);
        Ok(counts)
    }

    fn replace_reactions(&mut self, reactions: Vec<Reaction>) {
        debug!(remaining = reactions.len(), "Reactions filtered.");
        self.molecules = molecules_of(&reactions);
        self.reactions = reactions;
    }

    pub fn filter_reactions_by_reactant_charge(&mut self, charges: &[i32]) {
        let retained = self
            .reactions
            .drain(..)
            .filter(|rxn| charges.contains(&rxn.reactant().charge()))
            .collect();
        self.replace_reactions(retained);
    }

    pub fn filter_reactions_by_reactant_formula(&mut self, formulas: &[String]) {
        let retained = self
            .reactions
            .drain(..)
            .filter(|rxn| formulas.iter().any(|f| f == rxn.reactant().formula()))
            .collect();
        self.replace_reactions(retained);
    }

    /// Keeps reactions whose broken bond joins the given species (in either order) and,
    /// when given, has the given order.
    pub fn filter_reactions_by_bond_type_and_order(
        &mut self,
        species: (&str, &str),
        order: Option<BondOrder>,
    ) -> Result<(), ReactionError> {
        let wanted = sorted_pair(species.0, species.1);
        let mut retained = Vec::new();
        for rxn in &self.reactions {
            let attr = rxn.broken_bond_attr()?;
            let found = sorted_pair(&attr.species[0], &attr.species[1]);
            if found == wanted && order.is_none_or(|o| attr.order == Some(o)) {
                retained.push(rxn.clone());
            }
        }
        self.replace_reactions(retained);
        Ok(())
    }

    /// Applies every criterion set in `filter`.
    pub fn apply_filter(&mut self, filter: &ReactionFilter) -> Result<(), ReactionError> {
        self.report(Progress::StageStart(Stage::FilterReactions));
        if let Some(charges) = &filter.reactant_charges {
            self.filter_reactions_by_reactant_charge(charges);
        }
        if let Some(formulas) = &filter.reactant_formulas {
            self.filter_reactions_by_reactant_formula(formulas);
        }
        if let Some((a, b)) = &filter.bond_species {
            self.filter_reactions_by_bond_type_and_order((a.as_str(), b.as_str()), filter.bond_order)?;
        }
        self.report(Progress::StageFinish {
            stage: Stage::FilterReactions,
            count: self.reactions.len(),
        });
        Ok(())
    }

    pub fn sort_reactions_by_reactant_formula(&mut self) {
        self.reactions
            .sort_by(|a, b| a.reactant().formula().cmp(b.reactant().formula()));
    }

    /// Reactions grouped by reactant, in order of first appearance.
    pub fn group_by_reactant(&self) -> Vec<(Arc<Molecule>, Vec<Reaction>)> {
        let mut groups: IndexMap<&str, (Arc<Molecule>, Vec<Reaction>)> = IndexMap::new();
        for rxn in &self.reactions {
            groups
                .entry(rxn.reactant().id())
                .or_insert_with(|| (rxn.reactant().clone(), Vec::new()))
                .1
                .push(rxn.clone());
        }
        groups.into_values().collect()
    }

    /// Per reactant, the reactions in which every molecule is neutral. Reactants without
    /// such reactions are left out.
    pub fn group_by_reactant_charge_0(&self) -> Result<Vec<ReactionsOnePerBond>, ReactionError> {
        let mut groups = Vec::new();
        for (reactant, reactions) in self.group_by_reactant() {
            let neutral: Vec<Reaction> = reactions
                .into_iter()
                .filter(|rxn| rxn.molecules().all(|m| m.charge() == 0))
                .collect();
            if !neutral.is_empty() {
                groups.push(ReactionsGroup::with_reactions(reactant, neutral)?);
            }
        }
        Ok(groups)
    }

    /// Per reactant, the lowest-energy reaction of each broken bond across product
    /// charges.
    ///
    /// A reaction with an energy beats one without; on equal energies the first seen
    /// is kept.
    pub fn group_by_reactant_lowest_energy(&self) -> Result<Vec<ReactionsOnePerBond>, ReactionError> {
        let mut groups = Vec::new();
        for (reactant, reactions) in self.group_by_reactant() {
            let mut lowest: IndexMap<BondIndex, Reaction> = IndexMap::new();
            for rxn in reactions {
                let bond = *rxn.broken_bond()?;
                let replace = match lowest.get(&bond) {
                    Some(current) => {
                        compare_energy(rxn.free_energy(), current.free_energy()) == Ordering::Less
                    }
                    None => true,
                };
                if replace {
                    lowest.insert(bond, rxn);
                }
            }
            groups.push(ReactionsGroup::with_reactions(reactant, lowest.into_values())?);
        }
        Ok(groups)
    }

    pub fn group_by_reactant_all(&self) -> Result<Vec<ReactionsMultiplePerBond>, ReactionError> {
        let policy = MultiplePerBond {
            charge_window: self.charge_window,
        };
        self.group_by_reactant()
            .into_iter()
            .map(|(reactant, reactions)| {
                let mut group = ReactionsGroup::with_policy(reactant, policy);
                group.extend(reactions)?;
                Ok(group)
            })
            .collect()
    }

    /// Pairs the lowest-energy reactions of isomorphic reactants with different charges
    /// that break equivalent bonds.
    ///
    /// Reactants are clustered by graph isomorphism; every pair of reactants within a
    /// cluster contributes under the key `(lower charge, higher charge)`.
    pub fn group_by_reactant_charge_pair(&self) -> Result<ChargePairReactions, ReactionError> {
        let grouped = self.group_by_reactant_lowest_energy()?;

        let mut clusters: Vec<Vec<&ReactionsOnePerBond>> = Vec::new();
        for group in &grouped {
            let existing = clusters
                .iter_mut()
                .find(|c| c[0].reactant().is_isomorphic_to(group.reactant()));
            match existing {
                Some(cluster) => cluster.push(group),
                None => clusters.push(vec![group]),
            }
        }
        debug!(clusters = clusters.len(), "Reactants clustered by isomorphism.");

        let mut result = ChargePairReactions::new();
        for cluster in &clusters {
            for (i, &first) in cluster.iter().enumerate() {
                for &second in &cluster[i + 1..] {
                    let (low, high) = if second.reactant().charge() < first.reactant().charge() {
                        (second, first)
                    } else {
                        (first, second)
                    };
                    let pairs = same_bond_breaking_reactions_between(
                        low.reactant(),
                        &reactions_by_bond(low)?,
                        high.reactant(),
                        &reactions_by_bond(high)?,
                    );
                    result
                        .entry((low.reactant().charge(), high.reactant().charge()))
                        .or_default()
                        .extend(pairs);
                }
            }
        }
        Ok(result)
    }

    pub fn reactions_with_zero_charge(&self) -> Result<Vec<Reaction>, ReactionError> {
        Ok(self
            .group_by_reactant_charge_0()?
            .into_iter()
            .flat_map(ReactionsGroup::into_reactions)
            .collect())
    }

    pub fn reactions_with_lowest_energy(&self) -> Result<Vec<Reaction>, ReactionError> {
        Ok(self
            .group_by_reactant_lowest_energy()?
            .into_iter()
            .flat_map(ReactionsGroup::into_reactions)
            .collect())
    }

    /// Writes every reaction's summary as JSON nested by reactant label, broken bond and
    /// product charges. Equivalent bonds are collapsed onto the first of their group.
    pub fn write_bond_energies<P: AsRef<Path>>(&self, path: P) -> Result<(), EngineError> {
        let path = path.as_ref();
        info!("Start writing bond energies: {}", path.display());

        type ByCharge = IndexMap<String, ReactionSummary>;
        let mut report: IndexMap<String, IndexMap<String, ByCharge>> = IndexMap::new();
        for group in self.group_by_reactant_all()? {
            let mut by_bond = IndexMap::new();
            for same_bond in group.group_by_bond(true)? {
                let mut by_charge = ByCharge::new();
                for rxn in same_bond.reactions() {
                    by_charge.insert(product_charge_key(rxn), rxn.summary()?);
                }
                by_bond.insert(format!("{:?}", same_bond.broken_bond()?), by_charge);
            }
            report.insert(group.reactant().label(), by_bond);
        }

        let mut writer = create_file_writer(path)?;
        serde_json::to_writer_pretty(&mut writer, &report)?;
        writer.flush()?;
        info!("Finish writing bond energies: {}", path.display());
        Ok(())
    }

    /// Saves the molecules and reactions to a reaction archive.
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), EngineError> {
        let path = path.as_ref();
        info!("Start writing reactions to file: {}", path.display());

        let mut molecules = self.molecules.clone();
        let mut known: HashSet<&str> = self.molecules.iter().map(|m| m.id()).collect();
        for m in self.reactions.iter().flat_map(Reaction::molecules) {
            if known.insert(m.id()) {
                molecules.push(m.clone());
            }
        }

        let reactions = self
            .reactions
            .iter()
            .map(|rxn| {
                Ok(ReactionRecord {
                    reactant: rxn.reactant().id().to_string(),
                    products: rxn.products().iter().map(|p| p.id().to_string()).collect(),
                    broken_bond: Some(*rxn.broken_bond()?),
                })
            })
            .collect::<Result<Vec<_>, ReactionError>>()?;

        let archive = ReactionArchive {
            molecules: molecules.iter().map(|m| m.to_record()).collect(),
            reactions,
        };
        archive.write_to_path(path)?;
        Ok(())
    }

    /// Restores an extractor saved with [`ReactionExtractor::to_file`].
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, EngineError> {
        let path = path.as_ref();
        let archive = ReactionArchive::read_from_path(path)?;
        let molecules = archive.molecules()?;
        let reactions = archive
            .reactions
            .iter()
            .map(|record| {
                let reactant = resolve(&molecules, &record.reactant)?;
                let products = record
                    .products
                    .iter()
                    .map(|id| resolve(&molecules, id))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Reaction::new(vec![reactant], products, record.broken_bond)?)
            })
            .collect::<Result<Vec<_>, EngineError>>()?;
        info!(
            "{} reactions loaded from file: {}",
            reactions.len(),
            path.display()
        );

        Ok(Self {
            molecules: molecules.into_values().collect(),
            reactions,
            charge_window: ChargeWindow::default(),
            reporter: None,
        })
    }
}

fn formula_buckets(buckets: &Buckets) -> Vec<FormulaBucket<'_>> {
    let mut formulas: Vec<FormulaBucket<'_>> = Vec::new();
    for (path, molecules) in buckets.leaves() {
        let (Some(AttributeValue::Text(formula)), Some(AttributeValue::Int(charge))) =
            (path.first().copied(), path.get(1).copied())
        else {
            continue;
        };
        let Some(first) = molecules.first() else {
            continue;
        };
        let charge = *charge as i32;
        match formulas.last_mut() {
            Some(bucket) if bucket.formula == formula.as_str() => {
                bucket.by_charge.push((charge, molecules));
            }
            _ => formulas.push(FormulaBucket {
                formula,
                composition: first.composition(),
                by_charge: vec![(charge, molecules)],
            }),
        }
    }
    formulas
}

fn is_valid_a_to_b_c_composition(
    a: &BTreeMap<String, usize>,
    b: &BTreeMap<String, usize>,
    c: &BTreeMap<String, usize>,
) -> bool {
    let mut combined = b.clone();
    for (element, count) in c {
        *combined.entry(element.clone()).or_default() += count;
    }
    *a == combined
}

/// All `A -> B + C` reactions with reactant formula `bucket`, trying every unordered
/// pair of product formulas.
fn a_to_b_c_reactions_of(
    bucket: &FormulaBucket<'_>,
    formulas: &[FormulaBucket<'_>],
    find_one: bool,
) -> Result<Vec<Reaction>, ReactionError> {
    let mut reactions = Vec::new();
    for (i, bucket_b) in formulas.iter().enumerate() {
        for bucket_c in &formulas[i..] {
            if !is_valid_a_to_b_c_composition(bucket.composition, bucket_b.composition, bucket_c.composition) {
                continue;
            }
            debug!(
                "Checking {} -> {} + {}",
                bucket.formula, bucket_b.formula, bucket_c.formula
            );

            // The same unordered product pair is reached twice when both product slots
            // share a formula.
            let mut seen: HashSet<BTreeSet<&str>> = HashSet::new();
            for &(charge_a, mols_a) in &bucket.by_charge {
                for &(charge_b, mols_b) in &bucket_b.by_charge {
                    for &(charge_c, mols_c) in &bucket_c.by_charge {
                        if charge_a != charge_b + charge_c {
                            continue;
                        }
                        for a in mols_a {
                            for b in mols_b {
                                for c in mols_c {
                                    let ids: BTreeSet<&str> = [a.id(), b.id(), c.id()].into_iter().collect();
                                    if seen.contains(&ids) {
                                        continue;
                                    }
                                    let bonds = is_valid_a_to_b_c_reaction(a, b, c, find_one);
                                    if bonds.is_empty() {
                                        continue;
                                    }
                                    seen.insert(ids);
                                    for bond in bonds {
                                        reactions.push(Reaction::new(
                                            vec![a.clone()],
                                            vec![b.clone(), c.clone()],
                                            Some(bond),
                                        )?);
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }
    }
    Ok(reactions)
}

fn reactions_by_bond(group: &ReactionsOnePerBond) -> Result<IndexMap<BondIndex, Reaction>, ReactionError> {
    group
        .reactions()
        .iter()
        .map(|rxn| Ok((*rxn.broken_bond()?, rxn.clone())))
        .collect()
}

/// Participants of `reactions`, deduplicated by id in first-seen order.
fn molecules_of(reactions: &[Reaction]) -> Vec<Arc<Molecule>> {
    let mut seen = HashSet::new();
    reactions
        .iter()
        .flat_map(Reaction::molecules)
        .filter(|m| seen.insert(m.id().to_string()))
        .cloned()
        .collect()
}

fn sorted_pair<'s>(a: &'s str, b: &'s str) -> (&'s str, &'s str) {
    if a <= b { (a, b) } else { (b, a) }
}

fn product_charge_key(reaction: &Reaction) -> String {
    match reaction.products() {
        [p] => format!("({},)", p.charge()),
        [p0, p1] => format!("({}, {})", p0.charge(), p1.charge()),
        products => format!("{:?}", products.iter().map(|p| p.charge()).collect::<Vec<_>>()),
    }
}
