use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::logging::LoggingConfig;

/// Top-level `cascade.toml` configuration: where the digested application
/// bundle and rule definitions live, plus the call-graph search depth and
/// logging setup.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CascadeConfig {
    pub apk_fixture: PathBuf,
    pub rules_dir: PathBuf,
    /// Overrides [`cascade_core::MAX_SEARCH_LAYER`] for this run.
    pub max_search_layer: u8,
    pub logging: LoggingConfig,
}

impl Default for CascadeConfig {
    fn default() -> Self {
        Self {
            apk_fixture: PathBuf::from("fixture.json"),
            rules_dir: PathBuf::from("rules"),
            max_search_layer: cascade_core::MAX_SEARCH_LAYER,
            logging: LoggingConfig::default(),
        }
    }
}

impl CascadeConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("parsing cascade.toml")
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        Self::from_toml_str(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_all_defaults() {
        let config = CascadeConfig::from_toml_str("").unwrap();
        assert_eq!(config.max_search_layer, cascade_core::MAX_SEARCH_LAYER);
        assert_eq!(config.rules_dir, PathBuf::from("rules"));
    }

    #[test]
    fn overrides_apply_on_top_of_defaults() {
        let config = CascadeConfig::from_toml_str(
            r#"
            apk_fixture = "samples/app.json"
            max_search_layer = 5
            "#,
        )
        .unwrap();
        assert_eq!(config.apk_fixture, PathBuf::from("samples/app.json"));
        assert_eq!(config.max_search_layer, 5);
        assert_eq!(config.rules_dir, PathBuf::from("rules"));
    }
}
