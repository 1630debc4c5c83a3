//! Loader configuration.
//!
//! Every field has a default matching the common plugin layout, so an empty
//! TOML document is a valid configuration:
//!
//! ```toml
//! placeholder = "$ARGUMENTS"
//! delimiter = "---"
//! commands_dir = "commands"
//! agents_dir = "agents"
//! extension = "md"
//! manifest_paths = [".claude-plugin/plugin.json", "plugin.toml"]
//! strict_manifest = true
//!
//! [ranker]
//! min_score = 1
//! limit = 3
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::frontmatter::DEFAULT_DELIMITER;
use crate::interpolate::DEFAULT_PLACEHOLDER;
use crate::{PluginError, Result};

/// Configuration for loading and routing a plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoaderConfig {
    /// Placeholder token substituted with command arguments.
    #[serde(default = "default_placeholder")]
    pub placeholder: String,

    /// Frontmatter delimiter line.
    #[serde(default = "default_delimiter")]
    pub delimiter: String,

    /// Top-level directory holding command templates.
    #[serde(default = "default_commands_dir")]
    pub commands_dir: String,

    /// Top-level directory holding agent templates.
    #[serde(default = "default_agents_dir")]
    pub agents_dir: String,

    /// Template file extension, without the dot.
    #[serde(default = "default_extension")]
    pub extension: String,

    /// Manifest locations relative to the plugin root, tried in order.
    #[serde(default = "default_manifest_paths")]
    pub manifest_paths: Vec<PathBuf>,

    /// Fail the load when a manifest entry does not resolve.
    #[serde(default = "default_true")]
    pub strict_manifest: bool,

    /// Settings for the built-in keyword ranker.
    #[serde(default)]
    pub ranker: RankerConfig,
}

/// Settings for [`KeywordRanker`](crate::ranking::KeywordRanker).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RankerConfig {
    /// Minimum number of shared keywords for an agent to be returned.
    #[serde(default = "default_min_score")]
    pub min_score: usize,

    /// Maximum number of agents returned.
    #[serde(default)]
    pub limit: Option<usize>,
}

fn default_placeholder() -> String {
    DEFAULT_PLACEHOLDER.to_string()
}

fn default_delimiter() -> String {
    DEFAULT_DELIMITER.to_string()
}

fn default_commands_dir() -> String {
    "commands".to_string()
}

fn default_agents_dir() -> String {
    "agents".to_string()
}

fn default_extension() -> String {
    "md".to_string()
}

fn default_manifest_paths() -> Vec<PathBuf> {
    vec![
        PathBuf::from(".claude-plugin/plugin.json"),
        PathBuf::from("plugin.toml"),
    ]
}

fn default_true() -> bool {
    true
}

fn default_min_score() -> usize {
    1
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            placeholder: default_placeholder(),
            delimiter: default_delimiter(),
            commands_dir: default_commands_dir(),
            agents_dir: default_agents_dir(),
            extension: default_extension(),
            manifest_paths: default_manifest_paths(),
            strict_manifest: true,
            ranker: RankerConfig::default(),
        }
    }
}

impl Default for RankerConfig {
    fn default() -> Self {
        Self {
            min_score: default_min_score(),
            limit: None,
        }
    }
}

impl LoaderConfig {
    /// Parse and validate a configuration from TOML.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    /// Keep manifest failures as warnings instead of failing the load.
    pub fn lenient(mut self) -> Self {
        self.strict_manifest = false;
        self
    }

    /// Check the configuration for values that would break loading.
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("placeholder", &self.placeholder),
            ("delimiter", &self.delimiter),
            ("commands_dir", &self.commands_dir),
            ("agents_dir", &self.agents_dir),
            ("extension", &self.extension),
        ] {
            if value.trim().is_empty() {
                return Err(PluginError::config(format!("{field} cannot be empty")));
            }
        }

        if self.delimiter.contains('\n') {
            return Err(PluginError::config("delimiter must be a single line"));
        }

        if self.commands_dir == self.agents_dir {
            return Err(PluginError::config(format!(
                "commands_dir and agents_dir must differ (both are '{}')",
                self.commands_dir
            )));
        }

        if self.extension.starts_with('.') {
            return Err(PluginError::config(
                "extension must not include the leading dot",
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_is_default() {
        let config = LoaderConfig::from_toml_str("").unwrap();
        assert_eq!(config, LoaderConfig::default());
        assert_eq!(config.placeholder, "$ARGUMENTS");
        assert!(config.strict_manifest);
        assert_eq!(config.ranker.min_score, 1);
    }

    #[test]
    fn test_partial_toml() {
        let config = LoaderConfig::from_toml_str(
            r#"
placeholder = "{{input}}"
strict_manifest = false

[ranker]
limit = 2
"#,
        )
        .unwrap();

        assert_eq!(config.placeholder, "{{input}}");
        assert!(!config.strict_manifest);
        assert_eq!(config.ranker.limit, Some(2));
        assert_eq!(config.commands_dir, "commands");
    }

    #[test]
    fn test_unknown_field_rejected() {
        let result = LoaderConfig::from_toml_str("hot_reload = true");
        assert!(matches!(result, Err(PluginError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_same_dirs() {
        let config = LoaderConfig {
            agents_dir: "commands".to_string(),
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("must differ"));
    }

    #[test]
    fn test_validate_rejects_empty_placeholder() {
        let result = LoaderConfig::from_toml_str(r#"placeholder = " ""#);
        let err = result.unwrap_err();
        assert!(err.to_string().contains("placeholder cannot be empty"));
    }

    #[test]
    fn test_validate_rejects_dotted_extension() {
        let result = LoaderConfig::from_toml_str(r#"extension = ".md""#);
        assert!(result.is_err());
    }

    #[test]
    fn test_from_file() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("quire.toml");
        std::fs::write(&path, "agents_dir = \"personas\"\n").unwrap();

        let config = LoaderConfig::from_file(&path).unwrap();
        assert_eq!(config.agents_dir, "personas");
    }
}
