use super::config::ConfigError;
use crate::core::models::molecule::Molecule;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Molecule property used as a bucketing key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MoleculeAttribute {
    Formula,
    Charge,
    SpinMultiplicity,
}

impl MoleculeAttribute {
    pub fn value_of(&self, molecule: &Molecule) -> AttributeValue {
        match self {
            Self::Formula => AttributeValue::Text(molecule.formula().to_string()),
            Self::Charge => AttributeValue::Int(i64::from(molecule.charge())),
            Self::SpinMultiplicity => AttributeValue::Int(i64::from(molecule.spin_multiplicity())),
        }
    }
}

impl FromStr for MoleculeAttribute {
    type Err = ConfigError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "formula" => Ok(Self::Formula),
            "charge" => Ok(Self::Charge),
            "spin" | "spin_multiplicity" | "spin-multiplicity" => Ok(Self::SpinMultiplicity),
            other => Err(ConfigError::InvalidValue {
                parameter: "keys",
                reason: format!("unknown molecule attribute '{}'", other),
            }),
        }
    }
}

impl fmt::Display for MoleculeAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Formula => "formula",
            Self::Charge => "charge",
            Self::SpinMultiplicity => "spin_multiplicity",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AttributeValue {
    Text(String),
    Int(i64),
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::Int(i) => write!(f, "{}", i),
        }
    }
}

/// Molecules classified by a sequence of attributes, one nesting level per attribute.
///
/// Keys at every level are sorted; molecules in a leaf keep input order.
#[derive(Debug, Clone, PartialEq)]
pub enum Buckets {
    Nested(BTreeMap<AttributeValue, Buckets>),
    Leaf(Vec<Arc<Molecule>>),
}

impl Buckets {
    pub fn build(molecules: &[Arc<Molecule>], keys: &[MoleculeAttribute]) -> Self {
        let Some((first, rest)) = keys.split_first() else {
            return Self::Leaf(molecules.to_vec());
        };
        let mut grouped: BTreeMap<AttributeValue, Vec<Arc<Molecule>>> = BTreeMap::new();
        for m in molecules {
            grouped.entry(first.value_of(m)).or_default().push(m.clone());
        }
        Self::Nested(
            grouped
                .into_iter()
                .map(|(value, members)| (value, Self::build(&members, rest)))
                .collect(),
        )
    }

    /// Number of keys at this level, or molecules for a leaf.
    pub fn len(&self) -> usize {
        match self {
            Self::Nested(map) => map.len(),
            Self::Leaf(molecules) => molecules.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn num_molecules(&self) -> usize {
        match self {
            Self::Nested(map) => map.values().map(Buckets::num_molecules).sum(),
            Self::Leaf(molecules) => molecules.len(),
        }
    }

    pub fn get(&self, key: &AttributeValue) -> Option<&Buckets> {
        match self {
            Self::Nested(map) => map.get(key),
            Self::Leaf(_) => None,
        }
    }

    pub fn children(&self) -> impl Iterator<Item = (&AttributeValue, &Buckets)> {
        let map = match self {
            Self::Nested(map) => Some(map),
            Self::Leaf(_) => None,
        };
        map.into_iter().flat_map(|m| m.iter())
    }

    pub fn molecules(&self) -> &[Arc<Molecule>] {
        match self {
            Self::Leaf(molecules) => molecules,
            Self::Nested(_) => &[],
        }
    }

    /// Every leaf with the path of keys leading to it, in key order.
    pub fn leaves(&self) -> Vec<(Vec<&AttributeValue>, &[Arc<Molecule>])> {
        let mut out = Vec::new();
        self.collect_leaves(&mut Vec::new(), &mut out);
        out
    }

    fn collect_leaves<'a>(
        &'a self,
        path: &mut Vec<&'a AttributeValue>,
        out: &mut Vec<(Vec<&'a AttributeValue>, &'a [Arc<Molecule>])>,
    ) {
        match self {
            Self::Leaf(molecules) => out.push((path.clone(), molecules.as_slice())),
            Self::Nested(map) => {
                for (key, child) in map {
                    path.push(key);
                    child.collect_leaves(path, out);
                    path.pop();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::molecule::tests::{dimethyl_peroxide, methoxy};

    fn five_molecules() -> Vec<Arc<Molecule>> {
        vec![
            Arc::new(dimethyl_peroxide("p0", 0, None)),
            Arc::new(methoxy("m0", 0, None)),
            Arc::new(methoxy("m1", -1, None)),
            Arc::new(dimethyl_peroxide("p1", 0, None)),
            Arc::new(methoxy("m2", 0, None)),
        ]
    }

    #[test]
    fn formula_charge_buckets_have_three_keys_and_all_molecules() {
        let buckets = Buckets::build(
            &five_molecules(),
            &[MoleculeAttribute::Formula, MoleculeAttribute::Charge],
        );
        let leaves = buckets.leaves();
        assert_eq!(leaves.len(), 3);
        assert_eq!(leaves.iter().map(|(_, m)| m.len()).sum::<usize>(), 5);
        assert_eq!(buckets.num_molecules(), 5);
        assert_eq!(buckets.len(), 2);

        let ch3o = buckets.get(&AttributeValue::Text("CH3O".into())).unwrap();
        assert_eq!(ch3o.len(), 2);
        let neutral = ch3o.get(&AttributeValue::Int(0)).unwrap();
        let ids: Vec<&str> = neutral.molecules().iter().map(|m| m.id()).collect();
        assert_eq!(ids, vec!["m0", "m2"]);
    }

    #[test]
    fn charge_keys_are_ordered_numerically() {
        let buckets = Buckets::build(&five_molecules(), &[MoleculeAttribute::Charge]);
        let keys: Vec<String> = buckets.children().map(|(k, _)| k.to_string()).collect();
        assert_eq!(keys, vec!["-1", "0"]);
    }

    #[test]
    fn no_keys_yields_a_single_leaf() {
        let buckets = Buckets::build(&five_molecules(), &[]);
        assert_eq!(buckets.molecules().len(), 5);
        assert!(buckets.get(&AttributeValue::Int(0)).is_none());
    }

    #[test]
    fn attributes_parse_from_names() {
        assert_eq!("formula".parse::<MoleculeAttribute>().unwrap(), MoleculeAttribute::Formula);
        assert_eq!(" Charge".parse::<MoleculeAttribute>().unwrap(), MoleculeAttribute::Charge);
        assert_eq!(
            "spin_multiplicity".parse::<MoleculeAttribute>().unwrap(),
            MoleculeAttribute::SpinMultiplicity
        );
        assert!("weight".parse::<MoleculeAttribute>().is_err());
    }
}
