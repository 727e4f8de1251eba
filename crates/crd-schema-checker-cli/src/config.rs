//! The optional configuration file.
//!
//! ```yaml
//! disabledComparators:
//!   - NoBools
//! costBudget:
//!   perRuleLimit: 1000000
//!   perCrdLimit: 100000000
//! ```

use std::path::{Path, PathBuf};

use crd_schema_checker::{ComparatorRegistry, comparators::MustNotExceedCostBudget};
use serde::Deserialize;
use snafu::{ResultExt, Snafu, ensure};

/// The file looked up in the working directory when no configuration file is
/// given explicitly.
pub const DEFAULT_CONFIG_FILE: &str = ".crd-schema-checker.yaml";

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to read configuration file at {path}", path = path.display()))]
    ReadConfig {
        source: std::io::Error,
        path: PathBuf,
    },

    #[snafu(display("failed to parse configuration file at {path}", path = path.display()))]
    ParseConfig {
        source: serde_yaml::Error,
        path: PathBuf,
    },

    #[snafu(display(
        "cannot disable unknown comparator {name:?}, known comparators are: {known}"
    ))]
    UnknownComparator { name: String, known: String },
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Config {
    /// Names of comparators which are not run.
    #[serde(default)]
    pub disabled_comparators: Vec<String>,

    #[serde(default)]
    pub cost_budget: CostBudget,
}

/// Overrides of the API server's CEL cost limits.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CostBudget {
    pub per_rule_limit: Option<u64>,
    pub per_crd_limit: Option<u64>,
}

impl Config {
    /// Loads the configuration from `explicit_path`, or from
    /// [`DEFAULT_CONFIG_FILE`] inside `working_dir`.
    ///
    /// A missing explicit file is an error, a missing default file yields the
    /// default configuration.
    pub fn resolve(explicit_path: Option<&Path>, working_dir: &Path) -> Result<Self> {
        if let Some(path) = explicit_path {
            return Self::load(path);
        }

        let default_path = working_dir.join(DEFAULT_CONFIG_FILE);
        if default_path.is_file() {
            Self::load(&default_path)
        } else {
            tracing::debug!("no configuration file found, using defaults");
            Ok(Self::default())
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).context(ReadConfigSnafu { path })?;
        let config = serde_yaml::from_str(&contents).context(ParseConfigSnafu { path })?;

        tracing::debug!(path = %path.display(), ?config, "loaded configuration");
        Ok(config)
    }

    /// Builds the registry of all comparators which are not disabled.
    pub fn registry(&self) -> Result<ComparatorRegistry> {
        let mut cost_budget = MustNotExceedCostBudget::default();
        if let Some(limit) = self.cost_budget.per_rule_limit {
            cost_budget = cost_budget.with_per_rule_limit(limit);
        }
        if let Some(limit) = self.cost_budget.per_crd_limit {
            cost_budget = cost_budget.with_per_crd_limit(limit);
        }

        let mut registry = ComparatorRegistry::all_with_cost_budget(cost_budget);
        let known = registry.names().join(", ");

        for name in &self.disabled_comparators {
            ensure!(
                registry.remove(name),
                UnknownComparatorSnafu {
                    name,
                    known: known.as_str(),
                }
            );
        }

        Ok(registry)
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;

    use super::*;

    #[test]
    fn parses_config() {
        let config: Config = serde_yaml::from_str(indoc! {"
            disabledComparators:
              - NoBools
              - NoMaps
            costBudget:
              perRuleLimit: 42
        "})
        .expect("configuration must parse");

        assert_eq!(config.disabled_comparators, vec!["NoBools", "NoMaps"]);
        assert_eq!(config.cost_budget.per_rule_limit, Some(42));
        assert_eq!(config.cost_budget.per_crd_limit, None);

        let registry = config.registry().expect("all comparators are known");
        assert!(!registry.contains("NoBools"));
        assert!(!registry.contains("NoMaps"));
        assert!(registry.contains("NoFieldRemoval"));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let result = serde_yaml::from_str::<Config>("disabledComparator: [NoBools]");
        assert!(result.is_err());
    }

    #[test]
    fn unknown_comparators_are_an_error() {
        let config = Config {
            disabled_comparators: vec!["NoSuchThing".to_owned()],
            ..Default::default()
        };

        let error = config.registry().expect_err("comparator is unknown");
        assert!(matches!(error, Error::UnknownComparator { ref name, .. } if name == "NoSuchThing"));
    }

    #[test]
    fn falls_back_to_default_file() {
        let dir = tempfile::tempdir().expect("create temporary directory");
        assert_eq!(
            Config::resolve(None, dir.path()).expect("defaults apply"),
            Config::default()
        );

        std::fs::write(
            dir.path().join(DEFAULT_CONFIG_FILE),
            "disabledComparators: [NoFloats]\n",
        )
        .expect("write configuration");

        let config = Config::resolve(None, dir.path()).expect("default file must load");
        assert_eq!(config.disabled_comparators, vec!["NoFloats"]);
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().expect("create temporary directory");
        let path = dir.path().join("missing.yaml");

        let error = Config::resolve(Some(&path), dir.path()).expect_err("file is missing");
        assert!(matches!(error, Error::ReadConfig { .. }));
    }
}
