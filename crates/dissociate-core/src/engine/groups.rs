//! Collections of reactions sharing one reactant.
//!
//! A [`ReactionsGroup`] owns the reactant and its reactions and delegates admission to
//! a [`GroupPolicy`]. Three policies exist:
//!
//! - [`MultiplePerBond`]: any number of reactions per bond, differing in product charges.
//! - [`OnePerBond`]: at most one reaction per broken bond.
//! - [`SameBond`]: every reaction breaks the same bond; used to synthesize the charge
//!   combinations missing from the database.

use super::config::ChargeWindow;
use super::error::ReactionError;
use super::reaction::{Reaction, sort_by_energy};
use crate::core::models::molecule::{Molecule, fragments_equivalent};
use crate::core::models::topology::BondIndex;
use indexmap::IndexMap;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Decides whether a reaction may join a group.
///
/// The shared-reactant check is performed by [`ReactionsGroup::add`] before the
/// policy is consulted.
pub trait GroupPolicy {
    fn admit(&mut self, existing: &[Reaction], reaction: &Reaction) -> Result<(), ReactionError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MultiplePerBond {
    pub charge_window: ChargeWindow,
}

impl GroupPolicy for MultiplePerBond {
    fn admit(&mut self, _: &[Reaction], _: &Reaction) -> Result<(), ReactionError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct OnePerBond;

impl GroupPolicy for OnePerBond {
    fn admit(&mut self, existing: &[Reaction], reaction: &Reaction) -> Result<(), ReactionError> {
        let bond = *reaction.broken_bond()?;
        for other in existing {
            if *other.broken_bond()? == bond {
                return Err(ReactionError::BondConflict {
                    bond,
                    existing: other.summary()?.to_string(),
                    new: reaction.summary()?.to_string(),
                });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SameBond {
    pub broken_bond: Option<BondIndex>,
    pub charge_window: ChargeWindow,
}

impl SameBond {
    pub fn new(broken_bond: BondIndex, charge_window: ChargeWindow) -> Self {
        Self {
            broken_bond: Some(broken_bond),
            charge_window,
        }
    }
}

impl GroupPolicy for SameBond {
    fn admit(&mut self, _: &[Reaction], reaction: &Reaction) -> Result<(), ReactionError> {
        let found = *reaction.broken_bond()?;
        match self.broken_bond {
            Some(expected) if expected != found => {
                Err(ReactionError::BondMismatch { expected, found })
            }
            Some(_) => Ok(()),
            None => {
                self.broken_bond = Some(found);
                Ok(())
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReactionsGroup<P> {
    reactant: Arc<Molecule>,
    reactions: Vec<Reaction>,
    policy: P,
}

pub type ReactionsMultiplePerBond = ReactionsGroup<MultiplePerBond>;
pub type ReactionsOnePerBond = ReactionsGroup<OnePerBond>;
pub type ReactionsOfSameBond = ReactionsGroup<SameBond>;

impl<P: GroupPolicy> ReactionsGroup<P> {
    pub fn with_policy(reactant: Arc<Molecule>, policy: P) -> Self {
        Self {
            reactant,
            reactions: Vec::new(),
            policy,
        }
    }

    /// Builds a group with the default policy and adds `reactions` in order.
    pub fn with_reactions(
        reactant: Arc<Molecule>,
        reactions: impl IntoIterator<Item = Reaction>,
    ) -> Result<Self, ReactionError>
    where
        P: Default,
    {
        let mut group = Self::with_policy(reactant, P::default());
        group.extend(reactions)?;
        Ok(group)
    }

    pub fn reactant(&self) -> &Arc<Molecule> {
        &self.reactant
    }

    pub fn reactions(&self) -> &[Reaction] {
        &self.reactions
    }

    pub fn into_reactions(self) -> Vec<Reaction> {
        self.reactions
    }

    pub fn policy(&self) -> &P {
        &self.policy
    }

    pub fn len(&self) -> usize {
        self.reactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reactions.is_empty()
    }

    pub fn add(&mut self, reaction: Reaction) -> Result<(), ReactionError> {
        if reaction.reactant().id() != self.reactant.id() {
            return Err(ReactionError::ReactantMismatch {
                expected: self.reactant.id().to_string(),
                found: reaction.reactant().id().to_string(),
            });
        }
        self.policy.admit(&self.reactions, &reaction)?;
        self.reactions.push(reaction);
        Ok(())
    }

    pub fn extend(&mut self, reactions: impl IntoIterator<Item = Reaction>) -> Result<(), ReactionError> {
        reactions.into_iter().try_for_each(|r| self.add(r))
    }
}

impl ReactionsGroup<SameBond> {
    pub fn broken_bond(&self) -> Result<BondIndex, ReactionError> {
        self.policy
            .broken_bond
            .ok_or_else(|| ReactionError::NoBrokenBond {
                reaction: format!("empty group of reactant '{}'", self.reactant.id()),
            })
    }

    /// Product charges of the existing reactions, oriented to the reactant's fragment
    /// order. Isomorphic products count in both orientations.
    fn observed_charge_pairs(&self, bond: BondIndex) -> Result<BTreeSet<(i32, i32)>, ReactionError> {
        let fragments = self
            .reactant
            .fragments_of(bond)
            .ok_or_else(|| ReactionError::NoBrokenBond {
                reaction: format!("bond {:?} of reactant '{}'", bond, self.reactant.id()),
            })?;
        let mut observed = BTreeSet::new();
        for rxn in &self.reactions {
            if let [p0, p1] = rxn.products() {
                let (c0, c1) = (p0.charge(), p1.charge());
                if p0.is_isomorphic_to(p1) {
                    observed.insert((c0, c1));
                    observed.insert((c1, c0));
                } else if fragments[0].is_isomorphic_to(p0.graph()) {
                    observed.insert((c0, c1));
                } else {
                    observed.insert((c1, c0));
                }
            }
        }
        Ok(observed)
    }

    /// Synthesizes the reactions for charge assignments of the broken bond's fragments
    /// that are not yet present.
    ///
    /// Products of synthesized reactions have no free energy and ids of the form
    /// `{reactant}-{u}-{v}-{fragment}-{charge}`.
    pub fn create_complement_reactions(&self) -> Result<Vec<Reaction>, ReactionError> {
        let bond = self.broken_bond()?;
        let fragments = self
            .reactant
            .fragments_of(bond)
            .ok_or_else(|| ReactionError::NoBrokenBond {
                reaction: format!("bond {:?} of reactant '{}'", bond, self.reactant.id()),
            })?;

        let missing: Vec<Vec<i32>> = match fragments.len() {
            1 if self.reactions.is_empty() => vec![vec![self.reactant.charge()]],
            2 => {
                let observed = self.observed_charge_pairs(bond)?;
                self.policy
                    .charge_window
                    .charge_pairs(self.reactant.charge())
                    .into_iter()
                    .filter(|pair| !observed.contains(pair))
                    .map(|(a, b)| vec![a, b])
                    .collect()
            }
            _ => Vec::new(),
        };

        let (u, v) = bond;
        missing
            .into_iter()
            .map(|charges| {
                let products = fragments
                    .iter()
                    .zip(&charges)
                    .enumerate()
                    .map(|(i, (fragment, &charge))| {
                        let id = format!("{}-{}-{}-{}-{}", self.reactant.id(), u, v, i, charge);
                        fragment.to_molecule(id, charge, None).map(Arc::new)
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Reaction::new(vec![self.reactant.clone()], products, Some(bond))
            })
            .collect()
    }

    /// Reactions ordered by free energy; synthesized complements follow when requested.
    pub fn order_reactions(&self, complement_reactions: bool) -> Result<Vec<Reaction>, ReactionError> {
        let mut ordered = self.reactions.clone();
        sort_by_energy(&mut ordered);
        if complement_reactions {
            ordered.extend(self.create_complement_reactions()?);
        }
        Ok(ordered)
    }
}

/// Rank of the reaction breaking one bond, within a [`ReactionsOnePerBond`] group.
#[derive(Debug, Clone, Default)]
pub struct BondRanking {
    pub reaction: Option<Reaction>,
    pub order: Option<usize>,
    pub energy: Option<f64>,
}

impl ReactionsGroup<OnePerBond> {
    /// Ranks reactions by free energy, keyed by broken bond.
    ///
    /// With `complement_reactions`, every reactant bond without a reaction gets an
    /// empty ranking.
    pub fn order_reactions(
        &self,
        complement_reactions: bool,
    ) -> Result<IndexMap<BondIndex, BondRanking>, ReactionError> {
        let mut ordered = self.reactions.clone();
        sort_by_energy(&mut ordered);

        let mut rankings = IndexMap::with_capacity(self.reactant.bonds().len());
        for (i, rxn) in ordered.into_iter().enumerate() {
            let bond = *rxn.broken_bond()?;
            let energy = rxn.free_energy();
            rankings.insert(
                bond,
                BondRanking {
                    reaction: Some(rxn),
                    order: Some(i),
                    energy,
                },
            );
        }
        if complement_reactions {
            for bond in self.reactant.bonds() {
                rankings.entry(bond.key()).or_default();
            }
        }
        Ok(rankings)
    }
}

impl ReactionsGroup<MultiplePerBond> {
    /// Splits the reactions by broken bond, one [`ReactionsOfSameBond`] per reactant
    /// bond (bonds without reactions included) in bond-list order.
    ///
    /// With `find_one`, only the first bond of each isomorphic bond group is kept. This
    /// assumes extraction ran in exhaustive mode so that all members of a group carry
    /// the same reactions.
    pub fn group_by_bond(&self, find_one: bool) -> Result<Vec<ReactionsOfSameBond>, ReactionError> {
        let mut by_bond: IndexMap<BondIndex, Vec<Reaction>> = self
            .reactant
            .bonds()
            .iter()
            .map(|b| (b.key(), Vec::new()))
            .collect();
        for rxn in &self.reactions {
            by_bond.entry(*rxn.broken_bond()?).or_default().push(rxn.clone());
        }

        if find_one {
            for group in self.reactant.isomorphic_bond_groups() {
                for bond in &group[1..] {
                    by_bond.shift_remove(bond);
                }
            }
        }

        by_bond
            .into_iter()
            .map(|(bond, reactions)| {
                let policy = SameBond::new(bond, self.policy.charge_window);
                let mut group = ReactionsGroup::with_policy(self.reactant.clone(), policy);
                group.extend(reactions)?;
                Ok(group)
            })
            .collect()
    }

    /// Reactions with energies ordered ascending, followed by synthesized complements
    /// when requested.
    pub fn order_reactions(
        &self,
        complement_reactions: bool,
        one_per_iso_bond_group: bool,
    ) -> Result<Vec<Reaction>, ReactionError> {
        let mut existing = Vec::new();
        let mut complements = Vec::new();
        for group in self.group_by_bond(one_per_iso_bond_group)? {
            if complement_reactions {
                complements.extend(group.create_complement_reactions()?);
            }
            existing.extend(group.into_reactions());
        }
        sort_by_energy(&mut existing);
        existing.extend(complements);
        Ok(existing)
    }
}

/// Pairs reactions of two isomorphic reactants that break equivalent bonds, i.e. bonds
/// whose removal yields isomorphic fragment sets.
pub fn same_bond_breaking_reactions_between(
    reactant1: &Molecule,
    group1: &IndexMap<BondIndex, Reaction>,
    reactant2: &Molecule,
    group2: &IndexMap<BondIndex, Reaction>,
) -> Vec<(Reaction, Reaction)> {
    let mut pairs = Vec::new();
    for (b1, rxn1) in group1 {
        let Some(frags1) = reactant1.fragments_of(*b1) else {
            continue;
        };
        for (b2, rxn2) in group2 {
            let Some(frags2) = reactant2.fragments_of(*b2) else {
                continue;
            };
            if fragments_equivalent(frags1, frags2) {
                pairs.push((rxn1.clone(), rxn2.clone()));
            }
        }
    }
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::molecule::tests::{dimethyl_peroxide, methoxy, molecule};

    fn arc(m: Molecule) -> Arc<Molecule> {
        Arc::new(m)
    }

    fn peroxide_split(
        reactant: &Arc<Molecule>,
        charges: (i32, i32),
        energies: (Option<f64>, Option<f64>),
    ) -> Reaction {
        let (c0, c1) = charges;
        let p0 = arc(methoxy(&format!("m{}a", c0), c0, energies.0));
        let p1 = arc(methoxy(&format!("m{}b", c1), c1, energies.1));
        Reaction::new(vec![reactant.clone()], vec![p0, p1], Some((1, 2))).unwrap()
    }

    /// H-O-O-H together with HOO + H splits of either hydrogen.
    fn hooh_group() -> (Arc<Molecule>, Vec<Reaction>) {
        let reactant = arc(molecule("hooh", &["H", "O", "O", "H"], &[(0, 1), (1, 2), (2, 3)], 0, Some(-10.0)));
        let hoo = arc(molecule("hoo", &["H", "O", "O"], &[(0, 1), (1, 2)], 0, Some(-9.0)));
        let h = arc(molecule("h", &["H"], &[], 0, Some(-0.4)));
        let hoo_minus = arc(molecule("hoo-", &["H", "O", "O"], &[(0, 1), (1, 2)], -1, Some(-9.5)));
        let h_plus = arc(molecule("h+", &["H"], &[], 1, Some(0.2)));
        let reactions = vec![
            Reaction::new(vec![reactant.clone()], vec![hoo.clone(), h.clone()], Some((0, 1))).unwrap(),
            Reaction::new(vec![reactant.clone()], vec![hoo.clone(), h.clone()], Some((2, 3))).unwrap(),
            Reaction::new(vec![reactant.clone()], vec![hoo_minus, h_plus], Some((0, 1))).unwrap(),
        ];
        (reactant, reactions)
    }

    #[test]
    fn adding_reaction_of_other_reactant_fails() {
        let (reactant, reactions) = hooh_group();
        let other = arc(molecule("other", &["H", "O", "O", "H"], &[(0, 1), (1, 2), (2, 3)], 0, None));
        let mut group = ReactionsMultiplePerBond::with_policy(other, MultiplePerBond::default());
        assert!(matches!(
            group.add(reactions[0].clone()),
            Err(ReactionError::ReactantMismatch { .. })
        ));
        assert!(ReactionsMultiplePerBond::with_reactions(reactant, reactions).is_ok());
    }

    #[test]
    fn one_per_bond_rejects_second_reaction_for_a_bond() {
        let (reactant, reactions) = hooh_group();
        let mut group = ReactionsOnePerBond::with_reactions(reactant, reactions[..2].to_vec()).unwrap();
        let err = group.add(reactions[2].clone()).unwrap_err();
        match err {
            ReactionError::BondConflict { bond, existing, new } => {
                assert_eq!(bond, (0, 1));
                assert!(existing.contains("hoo_"));
                assert!(new.contains("hoo-"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn same_bond_group_rejects_other_bonds() {
        let (reactant, reactions) = hooh_group();
        let mut group = ReactionsOfSameBond::with_reactions(reactant, vec![reactions[0].clone()]).unwrap();
        assert_eq!(group.broken_bond().unwrap(), (0, 1));
        assert!(matches!(
            group.add(reactions[1].clone()),
            Err(ReactionError::BondMismatch { expected: (0, 1), found: (2, 3) })
        ));
        group.add(reactions[2].clone()).unwrap();
        assert_eq!(group.len(), 2);
    }

    #[test]
    fn empty_same_bond_group_has_no_bond() {
        let reactant = arc(methoxy("m", 0, None));
        let group = ReactionsOfSameBond::with_policy(reactant, SameBond::default());
        assert!(matches!(group.broken_bond(), Err(ReactionError::NoBrokenBond { .. })));
    }

    #[test]
    fn group_by_bond_seeds_every_bond() {
        let (reactant, reactions) = hooh_group();
        let group = ReactionsMultiplePerBond::with_reactions(reactant, reactions).unwrap();
        let by_bond = group.group_by_bond(false).unwrap();
        let bonds: Vec<_> = by_bond.iter().map(|g| g.broken_bond().unwrap()).collect();
        assert_eq!(bonds, vec![(0, 1), (1, 2), (2, 3)]);
        assert_eq!(by_bond[0].len(), 2);
        assert!(by_bond[1].is_empty());
        assert_eq!(by_bond[2].len(), 1);
    }

    #[test]
    fn group_by_bond_with_find_one_keeps_first_bond_of_each_isomorphic_group() {
        let (reactant, reactions) = hooh_group();
        assert_eq!(reactant.isomorphic_bond_groups(), &[vec![(0, 1), (2, 3)]]);
        let group = ReactionsMultiplePerBond::with_reactions(reactant, reactions.clone()).unwrap();

        let by_bond = group.group_by_bond(true).unwrap();
        let bonds: Vec<_> = by_bond.iter().map(|g| g.broken_bond().unwrap()).collect();
        assert_eq!(bonds, vec![(0, 1), (1, 2)]);
        // The representative keeps its own reactions, not the union of the group.
        assert_eq!(by_bond[0].reactions(), &[reactions[0].clone(), reactions[2].clone()]);
    }

    #[test]
    fn complement_reactions_fill_missing_charge_pairs() {
        let reactant = arc(dimethyl_peroxide("a", 0, Some(-20.0)));
        let existing = peroxide_split(&reactant, (0, 0), (Some(-9.0), Some(-9.0)));
        let group = ReactionsOfSameBond::with_reactions(reactant.clone(), vec![existing]).unwrap();

        let complements = group.create_complement_reactions().unwrap();
        assert_eq!(complements.len(), 2);
        let mut seen = BTreeSet::new();
        for rxn in &complements {
            assert_eq!(*rxn.broken_bond().unwrap(), (1, 2));
            assert_eq!(rxn.free_energy(), None);
            let charges: Vec<i32> = rxn.products().iter().map(|p| p.charge()).collect();
            assert_eq!(charges.iter().sum::<i32>(), reactant.charge());
            assert_ne!(charges, vec![0, 0]);
            seen.insert(charges);
            for p in rxn.products() {
                assert!(p.id().starts_with("a-1-2-"));
                assert_eq!(p.formula(), "CH3O");
                assert_eq!(p.spin_multiplicity(), 1);
            }
        }
        assert_eq!(seen, BTreeSet::from([vec![-1, 1]]));
        let ids: BTreeSet<&str> = complements.iter().flat_map(|r| r.products().iter().map(|p| p.id())).collect();
        assert_eq!(ids, BTreeSet::from(["a-1-2-0--1", "a-1-2-1-1", "a-1-2-0-1", "a-1-2-1--1"]));
    }

    #[test]
    fn no_complements_when_all_charge_pairs_exist() {
        let reactant = arc(dimethyl_peroxide("a", 0, None));
        let group = ReactionsOfSameBond::with_reactions(
            reactant.clone(),
            vec![
                peroxide_split(&reactant, (0, 0), (None, None)),
                peroxide_split(&reactant, (-1, 1), (None, None)),
            ],
        )
        .unwrap();
        assert!(group.create_complement_reactions().unwrap().is_empty());
    }

    #[test]
    fn ring_bond_complement_keeps_reactant_charge() {
        let ring = arc(molecule("ring", &["C", "C", "O", "H"], &[(0, 1), (1, 2), (2, 0), (0, 3)], -1, None));
        let group = ReactionsOfSameBond::with_policy(ring.clone(), SameBond::new((0, 2), ChargeWindow::default()));
        let complements = group.create_complement_reactions().unwrap();
        assert_eq!(complements.len(), 1);
        assert_eq!(complements[0].products().len(), 1);
        assert_eq!(complements[0].products()[0].charge(), -1);
        assert_eq!(complements[0].products()[0].id(), "ring-0-2-0--1");

        let mut group = group;
        group.add(complements[0].clone()).unwrap();
        assert!(group.create_complement_reactions().unwrap().is_empty());
    }

    #[test]
    fn same_bond_order_puts_complements_last() {
        let reactant = arc(dimethyl_peroxide("a", 0, Some(-20.0)));
        let high = peroxide_split(&reactant, (0, 0), (Some(-9.0), Some(-9.0)));
        let low = peroxide_split(&reactant, (-1, 1), (Some(-9.5), Some(-9.6)));
        let window = ChargeWindow::new(-2, 2).unwrap();
        let mut group = ReactionsOfSameBond::with_policy(reactant, SameBond::new((1, 2), window));
        group.extend([high.clone(), low.clone()]).unwrap();

        // (-2, 2) and (2, -2) are missing from the wider window.
        let ordered = group.order_reactions(true).unwrap();
        assert_eq!(ordered.len(), 4);
        assert_eq!(ordered[0], low);
        assert_eq!(ordered[1], high);
        assert!(ordered[2..].iter().all(|r| r.free_energy().is_none()));
        assert_eq!(group.order_reactions(false).unwrap().len(), 2);
    }

    #[test]
    fn one_per_bond_ranking_covers_bonds_without_reactions() {
        let (reactant, reactions) = hooh_group();
        // 0.6 for H + HOO at (2, 3), 0.7 for H+ + HOO- at (0, 1)
        let group = ReactionsOnePerBond::with_reactions(
            reactant,
            vec![reactions[1].clone(), reactions[2].clone()],
        )
        .unwrap();

        let ranking = group.order_reactions(true).unwrap();
        assert_eq!(ranking.len(), 3);
        assert_eq!(ranking[&(0, 1)].order, Some(1));
        assert_eq!(ranking[&(2, 3)].order, Some(0));
        assert!(ranking[&(1, 2)].reaction.is_none());
        assert_eq!(ranking[&(1, 2)].energy, None);

        assert_eq!(group.order_reactions(false).unwrap().len(), 2);
    }

    #[test]
    fn multiple_per_bond_order_keeps_one_per_isomorphic_group() {
        let (reactant, reactions) = hooh_group();
        let group = ReactionsMultiplePerBond::with_reactions(reactant, reactions.clone()).unwrap();

        let ordered = group.order_reactions(false, true).unwrap();
        assert_eq!(ordered, vec![reactions[0].clone(), reactions[2].clone()]);

        let all = group.order_reactions(false, false).unwrap();
        assert_eq!(all.len(), 3);
    }

    #[test]
    fn multiple_per_bond_complements_come_after_known_reactions() {
        let (reactant, reactions) = hooh_group();
        let group = ReactionsMultiplePerBond::with_reactions(reactant.clone(), reactions).unwrap();
        let ordered = group.order_reactions(true, true).unwrap();

        let first_unknown = ordered.iter().position(|r| r.free_energy().is_none()).unwrap();
        assert!(ordered[first_unknown..].iter().all(|r| r.free_energy().is_none()));
        assert!(ordered[..first_unknown].iter().all(|r| r.free_energy().is_some()));
        assert!(ordered[first_unknown..]
            .iter()
            .any(|r| *r.broken_bond().unwrap() == (1, 2)));
    }

    #[test]
    fn same_bond_breaking_pairs_match_equivalent_bonds_across_charges() {
        let neutral = arc(molecule("n", &["H", "O", "O", "H"], &[(0, 1), (1, 2), (2, 3)], 0, None));
        let anion = arc(molecule("a", &["H", "O", "O", "H"], &[(2, 3), (1, 2), (0, 1)], -1, None));
        let oh = arc(molecule("oh", &["O", "H"], &[(0, 1)], 0, None));
        let oh_minus = arc(molecule("oh-", &["O", "H"], &[(0, 1)], -1, None));

        let r1 = Reaction::new(vec![neutral.clone()], vec![oh.clone(), oh.clone()], Some((1, 2))).unwrap();
        let r2 = Reaction::new(vec![anion.clone()], vec![oh, oh_minus], Some((1, 2))).unwrap();

        let g1 = IndexMap::from([((1, 2), r1.clone())]);
        let g2 = IndexMap::from([((1, 2), r2.clone())]);
        let pairs = same_bond_breaking_reactions_between(&neutral, &g1, &anion, &g2);
        assert_eq!(pairs, vec![(r1, r2)]);
    }
}
