use crate::core::models::topology::BondOrder;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),
    #[error("Invalid value for {parameter}: {reason}")]
    InvalidValue {
        parameter: &'static str,
        reason: String,
    },
}

/// Inclusive range of charges a single fragment may carry in a synthesized reaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChargeWindow {
    pub low: i32,
    pub high: i32,
}

impl ChargeWindow {
    pub fn new(low: i32, high: i32) -> Result<Self, ConfigError> {
        if low > high {
            return Err(ConfigError::InvalidValue {
                parameter: "charge_window",
                reason: format!("low charge {} exceeds high charge {}", low, high),
            });
        }
        Ok(Self { low, high })
    }

    pub fn contains(&self, charge: i32) -> bool {
        (self.low..=self.high).contains(&charge)
    }

    /// All ordered pairs of in-window charges that sum to `total`.
    pub fn charge_pairs(&self, total: i32) -> Vec<(i32, i32)> {
        (self.low..=self.high)
            .filter_map(|first| {
                let second = total - first;
                self.contains(second).then_some((first, second))
            })
            .collect()
    }
}

impl Default for ChargeWindow {
    fn default() -> Self {
        Self { low: -1, high: 1 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReactionStyle {
    /// `A -> B`, breaking a ring bond.
    AToB,
    /// `A -> B + C`, breaking a chain bond.
    AToBC,
    #[default]
    All,
}

impl FromStr for ReactionStyle {
    type Err = ConfigError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "a-to-b" | "a2b" => Ok(Self::AToB),
            "a-to-b-c" | "a2bc" => Ok(Self::AToBC),
            "all" | "one-bond-break" => Ok(Self::All),
            other => Err(ConfigError::InvalidValue {
                parameter: "style",
                reason: format!("unknown reaction style '{}'", other),
            }),
        }
    }
}

impl fmt::Display for ReactionStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::AToB => "a-to-b",
            Self::AToBC => "a-to-b-c",
            Self::All => "all",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetKind {
    ReactionBased,
    BondClassification,
    BondRegression,
    MoleculeBased,
}

impl FromStr for DatasetKind {
    type Err = ConfigError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "reaction-based" | "reaction" => Ok(Self::ReactionBased),
            "bond-classification" | "classification" => Ok(Self::BondClassification),
            "bond-regression" | "regression" => Ok(Self::BondRegression),
            "molecule-based" | "molecule" => Ok(Self::MoleculeBased),
            other => Err(ConfigError::InvalidValue {
                parameter: "kind",
                reason: format!("unknown dataset kind '{}'", other),
            }),
        }
    }
}

impl fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ReactionBased => "reaction-based",
            Self::BondClassification => "bond-classification",
            Self::BondRegression => "bond-regression",
            Self::MoleculeBased => "molecule-based",
        })
    }
}

/// Which reactions survive the filtering stage. Unset criteria keep everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReactionFilter {
    pub reactant_charges: Option<Vec<i32>>,
    pub reactant_formulas: Option<Vec<String>>,
    pub bond_species: Option<(String, String)>,
    pub bond_order: Option<BondOrder>,
}

impl ReactionFilter {
    pub fn is_empty(&self) -> bool {
        self.reactant_charges.is_none()
            && self.reactant_formulas.is_none()
            && self.bond_species.is_none()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionConfig {
    pub style: ReactionStyle,
    pub find_one: bool,
    pub filter: ReactionFilter,
}

#[derive(Default)]
pub struct ExtractionConfigBuilder {
    style: Option<ReactionStyle>,
    find_one: Option<bool>,
    filter: ReactionFilter,
}

impl ExtractionConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn style(mut self, style: ReactionStyle) -> Self {
        self.style = Some(style);
        self
    }
    pub fn find_one(mut self, find_one: bool) -> Self {
        self.find_one = Some(find_one);
        self
    }
    pub fn filter(mut self, filter: ReactionFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn build(self) -> Result<ExtractionConfig, ConfigError> {
        if self.filter.bond_order.is_some() && self.filter.bond_species.is_none() {
            return Err(ConfigError::MissingParameter("bond_species"));
        }
        Ok(ExtractionConfig {
            style: self.style.ok_or(ConfigError::MissingParameter("style"))?,
            find_one: self
                .find_one
                .ok_or(ConfigError::MissingParameter("find_one"))?,
            filter: self.filter,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DatasetConfig {
    pub kind: DatasetKind,
    /// Number of lowest-energy reactions per reactant labelled favorable.
    pub top_n: usize,
    pub lowest_across_product_charge: bool,
    pub complement_reactions: bool,
    pub one_per_iso_bond_group: bool,
    pub charge_window: ChargeWindow,
    pub filter: ReactionFilter,
}

pub struct DatasetConfigBuilder {
    kind: Option<DatasetKind>,
    top_n: usize,
    lowest_across_product_charge: bool,
    complement_reactions: bool,
    one_per_iso_bond_group: bool,
    charge_window: ChargeWindow,
    filter: ReactionFilter,
}

impl Default for DatasetConfigBuilder {
    fn default() -> Self {
        Self {
            kind: None,
            top_n: 2,
            lowest_across_product_charge: true,
            complement_reactions: false,
            one_per_iso_bond_group: true,
            charge_window: ChargeWindow::default(),
            filter: ReactionFilter::default(),
        }
    }
}

impl DatasetConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn kind(mut self, kind: DatasetKind) -> Self {
        self.kind = Some(kind);
        self
    }
    pub fn top_n(mut self, n: usize) -> Self {
        self.top_n = n;
        self
    }
    pub fn lowest_across_product_charge(mut self, enabled: bool) -> Self {
        self.lowest_across_product_charge = enabled;
        self
    }
    pub fn complement_reactions(mut self, enabled: bool) -> Self {
        self.complement_reactions = enabled;
        self
    }
    pub fn one_per_iso_bond_group(mut self, enabled: bool) -> Self {
        self.one_per_iso_bond_group = enabled;
        self
    }
    pub fn charge_window(mut self, window: ChargeWindow) -> Self {
        self.charge_window = window;
        self
    }
    pub fn filter(mut self, filter: ReactionFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn build(self) -> Result<DatasetConfig, ConfigError> {
        if self.filter.bond_order.is_some() && self.filter.bond_species.is_none() {
            return Err(ConfigError::MissingParameter("bond_species"));
        }
        Ok(DatasetConfig {
            kind: self.kind.ok_or(ConfigError::MissingParameter("kind"))?,
            top_n: self.top_n,
            lowest_across_product_charge: self.lowest_across_product_charge,
            complement_reactions: self.complement_reactions,
            one_per_iso_bond_group: self.one_per_iso_bond_group,
            charge_window: self.charge_window,
            filter: self.filter,
        })
    }
}
