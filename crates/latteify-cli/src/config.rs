//! Converter settings loaded from a TOML file.
//!
//! ```toml
//! lenient = true
//!
//! [filters]
//! md = "markdown"
//!
//! [functions]
//! asset_url = "asset"
//!
//! [optimizations]
//! for_loop = false
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use latteify_parser::{Environment, Optimizations};
use log::debug;
use serde::Deserialize;

use crate::CliError;

#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConverterConfig {
    /// Accept filters and functions the converter does not know.
    pub lenient: bool,
    /// Twig filter name to Latte filter name.
    pub filters: BTreeMap<String, String>,
    /// Twig function name to Latte function name.
    pub functions: BTreeMap<String, String>,
    pub optimizations: OptimizationConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OptimizationConfig {
    pub for_loop: bool,
    pub raw_filter: bool,
}

impl Default for OptimizationConfig {
    fn default() -> Self {
        let defaults = Optimizations::default();
        Self {
            for_loop: defaults.for_loop,
            raw_filter: defaults.raw_filter,
        }
    }
}

impl ConverterConfig {
    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    pub fn load(path: &Path) -> Result<Self, CliError> {
        let text = std::fs::read_to_string(path).map_err(|source| CliError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml(&text).map_err(|source| CliError::Config {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(
            path = path.display().to_string().as_str(),
            filters = config.filters.len(),
            functions = config.functions.len();
            "Loaded converter config"
        );
        Ok(config)
    }

    /// Build the frozen environment; `lenient` forces lenient mode on.
    pub fn environment(&self, lenient: bool) -> Environment {
        let lenient = lenient || self.lenient;
        let builder = Environment::builder()
            .accept_undefined_filters(lenient)
            .accept_undefined_functions(lenient)
            .optimizations(Optimizations {
                for_loop: self.optimizations.for_loop,
                raw_filter: self.optimizations.raw_filter,
            });
        let builder = self
            .filters
            .iter()
            .fold(builder, |builder, (twig, latte)| builder.latte_filter(twig, latte));
        self.functions
            .iter()
            .fold(builder, |builder, (twig, latte)| builder.latte_function(twig, latte))
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    // =========================================================================
    // Parsing
    // =========================================================================

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = ConverterConfig::from_toml("").unwrap();
        assert_eq!(config, ConverterConfig::default());
        assert!(config.optimizations.for_loop);
        assert!(config.optimizations.raw_filter);
    }

    #[test]
    fn test_full_config() {
        let config = ConverterConfig::from_toml(
            r#"
            lenient = true

            [filters]
            md = "markdown"

            [functions]
            asset_url = "asset"

            [optimizations]
            raw_filter = false
            "#,
        )
        .unwrap();
        assert!(config.lenient);
        assert_eq!(config.filters["md"], "markdown");
        assert_eq!(config.functions["asset_url"], "asset");
        assert!(config.optimizations.for_loop);
        assert!(!config.optimizations.raw_filter);
    }

    #[test]
    fn test_unknown_key_rejected() {
        assert!(ConverterConfig::from_toml("strict = true").is_err());
    }

    // =========================================================================
    // Environment
    // =========================================================================

    #[test]
    fn test_environment_applies_remaps() {
        let mut config = ConverterConfig::default();
        config.filters.insert("upper".into(), "uppercase".into());
        config.functions.insert("max".into(), "maximum".into());
        let env = config.environment(false);
        assert_eq!(env.latte_filter_name("upper"), "uppercase");
        assert_eq!(env.latte_function_name("max"), "maximum");
    }

    #[test]
    fn test_environment_optimizations() {
        let config = ConverterConfig {
            optimizations: OptimizationConfig {
                for_loop: false,
                raw_filter: true,
            },
            ..ConverterConfig::default()
        };
        let optimizations = config.environment(false).optimizations();
        assert!(!optimizations.for_loop);
        assert!(optimizations.raw_filter);
    }

    #[test]
    fn test_lenient_flag_accepts_unknown_filter() {
        let config = ConverterConfig::default();
        assert!(config.environment(false).filter("shout").is_none());
        assert!(config.environment(true).filter("shout").is_some());
    }
}
