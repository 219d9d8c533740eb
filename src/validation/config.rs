//! Per-run configuration.
use super::error::Category;
use crate::math::SymbolBindings;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration document: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("max_diagnostics must be at least 1")]
    ZeroLimit,
}

/// Which rule families run. Unknown family names are rejected when loading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CategorySet {
    pub general: bool,
    pub identifier: bool,
    pub math: bool,
    pub units: bool,
    pub sbo: bool,
    pub overdetermined: bool,
    pub modeling_practice: bool,
}

impl Default for CategorySet {
    fn default() -> Self {
        Self {
            general: true,
            identifier: true,
            math: true,
            units: true,
            sbo: true,
            overdetermined: true,
            modeling_practice: false,
        }
    }
}

impl CategorySet {
    pub fn contains(&self, category: Category) -> bool {
        match category {
            Category::General => self.general,
            Category::Identifier => self.identifier,
            Category::Math => self.math,
            Category::Units | Category::UnitAdvisory => self.units,
            Category::Sbo => self.sbo,
            Category::Overdetermined => self.overdetermined,
            Category::ModelingPractice => self.modeling_practice,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
    pub categories: CategorySet,
    /// Run the advisory unit tier alongside the hard unit rules.
    pub unit_warnings: bool,
    /// Plain names the host wants treated as `time`, `delay` and `avogadro`.
    pub symbols: SymbolBindings,
    /// Dispatch targets on the rayon pool. Output order is unchanged.
    pub parallel: bool,
    pub max_diagnostics: Option<usize>,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            categories: CategorySet::default(),
            unit_warnings: true,
            symbols: SymbolBindings::default(),
            parallel: false,
            max_diagnostics: None,
        }
    }
}

impl ValidatorConfig {
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(s)?;
        if config.max_diagnostics == Some(0) {
            return Err(ConfigError::ZeroLimit);
        }
        Ok(config)
    }

    /// Is a rule of this category switched on?
    pub fn enables(&self, category: Category) -> bool {
        match category {
            Category::UnitAdvisory => self.unit_warnings && self.categories.units,
            other => self.categories.contains(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_leave_modeling_practice_off() {
        let config = ValidatorConfig::default();
        assert!(config.enables(Category::Units));
        assert!(config.enables(Category::UnitAdvisory));
        assert!(!config.enables(Category::ModelingPractice));
    }

    #[test]
    fn test_partial_document_keeps_defaults() {
        let config = ValidatorConfig::from_json_str(
            r#"{ "unit_warnings": false, "categories": { "sbo": false }, "symbols": { "time": "t" } }"#,
        )
        .unwrap();
        assert!(!config.enables(Category::UnitAdvisory));
        assert!(config.enables(Category::Units));
        assert!(!config.enables(Category::Sbo));
        assert_eq!(config.symbols.time.as_deref(), Some("t"));
    }

    #[test]
    fn test_rejects_unknown_category_and_zero_limit() {
        assert!(matches!(
            ValidatorConfig::from_json_str(r#"{ "categories": { "spelling": true } }"#),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            ValidatorConfig::from_json_str(r#"{ "max_diagnostics": 0 }"#),
            Err(ConfigError::ZeroLimit)
        ));
    }
}
