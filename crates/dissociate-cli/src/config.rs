use crate::cli::{DatasetArgs, ExtractArgs};
use crate::error::{CliError, Result};
use dissociate::core::models::topology::BondOrder;
use dissociate::engine::config as core_config;
use serde::Deserialize;
use std::path::Path;
use std::str::FromStr;
use tracing::debug;

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields)]
struct PartialExtractionConfig {
    #[serde(rename = "find-one")]
    find_one: Option<bool>,
    style: Option<String>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields)]
struct PartialDatasetConfig {
    kind: Option<String>,
    #[serde(rename = "top-n")]
    top_n: Option<usize>,
    #[serde(rename = "lowest-across-product-charge")]
    lowest_across_product_charge: Option<bool>,
    #[serde(rename = "complement-reactions")]
    complement_reactions: Option<bool>,
    #[serde(rename = "one-per-iso-bond-group")]
    one_per_iso_bond_group: Option<bool>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields)]
struct PartialComplementConfig {
    #[serde(rename = "charge-low")]
    charge_low: Option<i32>,
    #[serde(rename = "charge-high")]
    charge_high: Option<i32>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields)]
struct PartialFilterConfig {
    #[serde(rename = "reactant-charges")]
    reactant_charges: Option<Vec<i32>>,
    #[serde(rename = "reactant-formulas")]
    reactant_formulas: Option<Vec<String>>,
    #[serde(rename = "bond-species")]
    bond_species: Option<Vec<String>>,
    #[serde(rename = "bond-order")]
    bond_order: Option<String>,
}

impl TryFrom<PartialFilterConfig> for core_config::ReactionFilter {
    type Error = CliError;

    fn try_from(p: PartialFilterConfig) -> Result<Self> {
        let bond_species = match p.bond_species {
            None => None,
            Some(species) => match <[String; 2]>::try_from(species) {
                Ok([a, b]) => Some((a, b)),
                Err(species) => {
                    return Err(CliError::Config(format!(
                        "`filter.bond-species` needs exactly two elements, got {}.",
                        species.len()
                    )));
                }
            },
        };
        let bond_order = p
            .bond_order
            .map(|s| {
                BondOrder::from_str(&s).map_err(|_| {
                    CliError::Config(format!("Invalid value for filter.bond-order: {}", s))
                })
            })
            .transpose()?;
        Ok(Self {
            reactant_charges: p.reactant_charges,
            reactant_formulas: p.reactant_formulas,
            bond_species,
            bond_order,
        })
    }
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
pub struct PartialAppConfig {
    extraction: Option<PartialExtractionConfig>,
    dataset: Option<PartialDatasetConfig>,
    complement: Option<PartialComplementConfig>,
    filter: Option<PartialFilterConfig>,
}

impl PartialAppConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })
    }

    /// Reads the file when one is given, otherwise starts from an empty configuration.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    pub fn merge_extraction(mut self, args: &ExtractArgs) -> Result<core_config::ExtractionConfig> {
        self.apply_set_values(&args.set_values)?;
        let extraction = self.extraction.take().unwrap_or_default();

        let style = match args.style.as_ref().or(extraction.style.as_ref()) {
            Some(name) => parse_enum::<core_config::ReactionStyle>(name)?,
            None => core_config::ReactionStyle::default(),
        };
        let find_one = if args.exhaustive {
            false
        } else {
            extraction.find_one.unwrap_or(true)
        };

        core_config::ExtractionConfigBuilder::new()
            .style(style)
            .find_one(find_one)
            .filter(self.take_filter()?)
            .build()
            .map_err(|e| CliError::Config(e.to_string()))
    }

    pub fn merge_dataset(mut self, args: &DatasetArgs) -> Result<core_config::DatasetConfig> {
        self.apply_set_values(&args.set_values)?;
        let dataset = self.dataset.take().unwrap_or_default();
        let complement = self.complement.take().unwrap_or_default();

        let kind_name = args.kind.as_ref().or(dataset.kind.as_ref()).ok_or_else(|| {
            CliError::Config(
                "A dataset kind is required either in the config file or via --kind.".to_string(),
            )
        })?;
        let kind = parse_enum::<core_config::DatasetKind>(kind_name)?;

        let default_window = core_config::ChargeWindow::default();
        let charge_window = core_config::ChargeWindow::new(
            complement.charge_low.unwrap_or(default_window.low),
            complement.charge_high.unwrap_or(default_window.high),
        )
        .map_err(|e| CliError::Config(e.to_string()))?;

        let mut builder = core_config::DatasetConfigBuilder::new()
            .kind(kind)
            .charge_window(charge_window)
            .filter(self.take_filter()?);
        if let Some(n) = args.top_n.or(dataset.top_n) {
            builder = builder.top_n(n);
        }
        if let Some(enabled) = dataset.lowest_across_product_charge {
            builder = builder.lowest_across_product_charge(enabled);
        }
        if let Some(enabled) = dataset.complement_reactions {
            builder = builder.complement_reactions(enabled);
        }
        if let Some(enabled) = dataset.one_per_iso_bond_group {
            builder = builder.one_per_iso_bond_group(enabled);
        }

        builder.build().map_err(|e| CliError::Config(e.to_string()))
    }

    fn take_filter(&mut self) -> Result<core_config::ReactionFilter> {
        self.filter.take().unwrap_or_default().try_into()
    }

    fn apply_set_values(&mut self, set_values: &[String]) -> Result<()> {
        for kv_pair in set_values {
            let (key, value_str) = kv_pair.split_once('=').ok_or_else(|| {
                CliError::Config(format!(
                    "Invalid --set format: '{}'. Expected KEY=VALUE.",
                    kv_pair
                ))
            })?;

            match key {
                "extraction.find-one" => {
                    self.extraction.get_or_insert_with(Default::default).find_one =
                        Some(parse_value(key, value_str)?);
                }
                "extraction.style" => {
                    self.extraction.get_or_insert_with(Default::default).style =
                        Some(value_str.to_string());
                }
                "dataset.kind" => {
                    self.dataset.get_or_insert_with(Default::default).kind =
                        Some(value_str.to_string());
                }
                "dataset.top-n" => {
                    self.dataset.get_or_insert_with(Default::default).top_n =
                        Some(parse_value(key, value_str)?);
                }
                "dataset.lowest-across-product-charge" => {
                    self.dataset
                        .get_or_insert_with(Default::default)
                        .lowest_across_product_charge = Some(parse_value(key, value_str)?);
                }
                "dataset.complement-reactions" => {
                    self.dataset
                        .get_or_insert_with(Default::default)
                        .complement_reactions = Some(parse_value(key, value_str)?);
                }
                "dataset.one-per-iso-bond-group" => {
                    self.dataset
                        .get_or_insert_with(Default::default)
                        .one_per_iso_bond_group = Some(parse_value(key, value_str)?);
                }
                "complement.charge-low" => {
                    self.complement.get_or_insert_with(Default::default).charge_low =
                        Some(parse_value(key, value_str)?);
                }
                "complement.charge-high" => {
                    self.complement.get_or_insert_with(Default::default).charge_high =
                        Some(parse_value(key, value_str)?);
                }
                "filter.reactant-charges" => {
                    self.filter.get_or_insert_with(Default::default).reactant_charges =
                        Some(parse_list(key, value_str)?);
                }
                "filter.reactant-formulas" => {
                    self.filter.get_or_insert_with(Default::default).reactant_formulas =
                        Some(parse_list(key, value_str)?);
                }
                "filter.bond-species" => {
                    self.filter.get_or_insert_with(Default::default).bond_species =
                        Some(parse_list(key, value_str)?);
                }
                "filter.bond-order" => {
                    self.filter.get_or_insert_with(Default::default).bond_order =
                        Some(value_str.to_string());
                }
                _ => {
                    return Err(CliError::Config(format!(
                        "Unsupported configuration key for --set: '{}'",
                        key
                    )));
                }
            }
        }
        Ok(())
    }
}

fn parse_value<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| CliError::Config(format!("Invalid value for {}: {}", key, value)))
}

/// Parses a comma-separated list such as `-1,0,1` or `C,O`.
fn parse_list<T: FromStr>(key: &str, value: &str) -> Result<Vec<T>> {
    value
        .split(',')
        .filter(|item| !item.trim().is_empty())
        .map(|item| parse_value(key, item))
        .collect()
}

fn parse_enum<T>(name: &str) -> Result<T>
where
    T: FromStr<Err = core_config::ConfigError>,
{
    name.parse().map_err(|e: core_config::ConfigError| CliError::Argument(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Commands};
    use clap::Parser;
    use once_cell::sync::Lazy;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::{TempDir, tempdir};

    static TEST_DIR: Lazy<TempDir> = Lazy::new(|| tempdir().expect("Failed to create temp dir"));

    fn write_config_file(name: &str, content: &str) -> PathBuf {
        let file_path = TEST_DIR.path().join(name);
        fs::write(&file_path, content).unwrap();
        file_path
    }

    fn extract_args(extra: &[&str]) -> ExtractArgs {
        let mut args = vec!["dissociate", "extract", "-i", "mols.json", "-o", "rxns.json"];
        args.extend_from_slice(extra);
        match Cli::parse_from(args).command {
            Commands::Extract(args) => args,
            _ => panic!("Expected 'extract' subcommand"),
        }
    }

    fn dataset_args(extra: &[&str]) -> DatasetArgs {
        let mut args = vec![
            "dissociate",
            "dataset",
            "-i",
            "rxns.json",
            "--struct-file",
            "struct.sdf",
            "--label-file",
            "label.txt",
        ];
        args.extend_from_slice(extra);
        match Cli::parse_from(args).command {
            Commands::Dataset(args) => args,
            _ => panic!("Expected 'dataset' subcommand"),
        }
    }

    #[test]
    fn extraction_defaults_without_a_config_file() {
        let config = PartialAppConfig::load(None)
            .unwrap()
            .merge_extraction(&extract_args(&[]))
            .unwrap();
        assert_eq!(config.style, core_config::ReactionStyle::All);
        assert!(config.find_one);
        assert!(config.filter.is_empty());
    }

    #[test]
    fn file_values_are_overridden_by_cli_flags() {
        let path = write_config_file(
            "extract.toml",
            r#"
            [extraction]
            find-one = true
            style = "a-to-b"

            [filter]
            reactant-charges = [0, 1]
            bond-species = ["C", "O"]
            bond-order = "single"
            "#,
        );
        let partial = PartialAppConfig::from_file(&path).unwrap();
        let config = partial
            .merge_extraction(&extract_args(&["--style", "a-to-b-c", "--exhaustive"]))
            .unwrap();

        assert_eq!(config.style, core_config::ReactionStyle::AToBC);
        assert!(!config.find_one);
        assert_eq!(config.filter.reactant_charges, Some(vec![0, 1]));
        assert_eq!(
            config.filter.bond_species,
            Some(("C".to_string(), "O".to_string()))
        );
        assert_eq!(config.filter.bond_order, Some(BondOrder::Single));
    }

    #[test]
    fn dataset_config_merges_file_flags_and_set_values() {
        let path = write_config_file(
            "dataset.toml",
            r#"
            [dataset]
            kind = "bond-classification"
            top-n = 3
            complement-reactions = true

            [complement]
            charge-low = -2
            charge-high = 2
            "#,
        );
        let partial = PartialAppConfig::from_file(&path).unwrap();
        let config = partial
            .merge_dataset(&dataset_args(&[
                "--top-n",
                "1",
                "-S",
                "dataset.one-per-iso-bond-group=false",
                "-S",
                "filter.reactant-charges=-1,0",
            ]))
            .unwrap();

        assert_eq!(config.kind, core_config::DatasetKind::BondClassification);
        assert_eq!(config.top_n, 1);
        assert!(config.complement_reactions);
        assert!(config.lowest_across_product_charge);
        assert!(!config.one_per_iso_bond_group);
        assert_eq!(config.charge_window, core_config::ChargeWindow { low: -2, high: 2 });
        assert_eq!(config.filter.reactant_charges, Some(vec![-1, 0]));
    }

    #[test]
    fn dataset_kind_is_required() {
        let result = PartialAppConfig::default().merge_dataset(&dataset_args(&[]));
        assert!(matches!(result, Err(CliError::Config(msg)) if msg.contains("kind")));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let path = write_config_file("unknown.toml", "[dataset]\ntop-k = 2\n");
        let result = PartialAppConfig::from_file(&path);
        assert!(matches!(result, Err(CliError::FileParsing { .. })));

        let result = PartialAppConfig::default()
            .merge_extraction(&extract_args(&["-S", "extraction.depth=2"]));
        assert!(matches!(result, Err(CliError::Config(_))));
    }

    #[test]
    fn malformed_set_values_are_rejected() {
        let result =
            PartialAppConfig::default().merge_extraction(&extract_args(&["-S", "find-one"]));
        assert!(matches!(result, Err(CliError::Config(msg)) if msg.contains("KEY=VALUE")));

        let result = PartialAppConfig::default()
            .merge_dataset(&dataset_args(&["-k", "regression", "-S", "dataset.top-n=two"]));
        assert!(matches!(result, Err(CliError::Config(_))));
    }

    #[test]
    fn invalid_charge_window_and_bond_species_are_rejected() {
        let result = PartialAppConfig::default().merge_dataset(&dataset_args(&[
            "-k",
            "molecule-based",
            "-S",
            "complement.charge-low=2",
            "-S",
            "complement.charge-high=-2",
        ]));
        assert!(matches!(result, Err(CliError::Config(_))));

        let result = PartialAppConfig::default()
            .merge_extraction(&extract_args(&["-S", "filter.bond-species=C,O,H"]));
        assert!(matches!(result, Err(CliError::Config(msg)) if msg.contains("two elements")));
    }

    #[test]
    fn unknown_style_is_an_argument_error() {
        let result =
            PartialAppConfig::default().merge_extraction(&extract_args(&["--style", "a-to-z"]));
        assert!(matches!(result, Err(CliError::Argument(_))));
    }
}
