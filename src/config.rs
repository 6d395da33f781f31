//! Configuration management for pommerge.
//!
//! This module handles loading configuration from multiple sources:
//! - TOML configuration files following XDG Base Directory specification
//! - Environment variables
//! - Command-line arguments
//!
//! ## Example
//!
//! ```rust,no_run
//! use pommerge::Config;
//!
//! // Load configuration from file, with fallback to defaults
//! let config = Config::load_from_file().unwrap();
//!
//! // Environment variables take precedence over the file
//! let merged = Config::default().merge(config).merge(Config::load_from_env());
//! let settings = merged.resolve().unwrap();
//! println!("Trunk branch: {}", settings.trunk_branch);
//! ```

use crate::{
    driver::DriverSettings,
    encoding::TextEncoding,
    error::ConfigError,
    git::MergeLabels,
    models::Args,
    parsed_property::ParsedProperty,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Temporary struct for deserializing TOML configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct ConfigFile {
    pub trunk_branch: Option<String>,
    pub aux_tag: Option<String>,
    pub default_encoding: Option<String>,
    pub merge_labels: Option<Vec<String>>,
}

/// Driver configuration assembled from CLI arguments, environment variables, config file, and defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Branch on which the incoming version is kept after a merge.
    pub trunk_branch: Option<ParsedProperty<String>>,
    /// Element changed in lockstep with the version.
    pub aux_tag: Option<ParsedProperty<String>>,
    /// Encoding label for files without an XML declaration.
    pub default_encoding: Option<ParsedProperty<String>>,
    /// Conflict marker labels for mine, base and theirs.
    pub merge_labels: Option<ParsedProperty<Vec<String>>>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            trunk_branch: Some(ParsedProperty::Default("master".to_string())),
            aux_tag: Some(ParsedProperty::Default("tag".to_string())),
            default_encoding: Some(ParsedProperty::Default("utf-8".to_string())),
            merge_labels: Some(ParsedProperty::Default(vec![
                "mine".to_string(),
                "base".to_string(),
                "theirs".to_string(),
            ])),
        }
    }
}

impl Config {
    /// A config with no values set, the identity for [`Config::merge`].
    pub fn empty() -> Self {
        Self {
            trunk_branch: None,
            aux_tag: None,
            default_encoding: None,
            merge_labels: None,
        }
    }

    /// Load configuration from the XDG config directory.
    ///
    /// A missing file yields an empty config.
    pub fn load_from_file() -> Result<Self, ConfigError> {
        let config_path = Self::get_config_path()?;

        if !config_path.exists() {
            return Ok(Self::empty());
        }

        let config_content =
            fs::read_to_string(&config_path).map_err(|e| ConfigError::FileReadError {
                path: config_path.clone(),
                message: e.to_string(),
            })?;

        let config_file: ConfigFile =
            toml::from_str(&config_content).map_err(|e| ConfigError::ParseError {
                path: config_path.clone(),
                message: e.to_string(),
            })?;

        Ok(Self {
            trunk_branch: config_file
                .trunk_branch
                .map(|v| ParsedProperty::File(v.clone(), config_path.clone(), v)),
            aux_tag: config_file
                .aux_tag
                .map(|v| ParsedProperty::File(v.clone(), config_path.clone(), v)),
            default_encoding: config_file
                .default_encoding
                .map(|v| ParsedProperty::File(v.clone(), config_path.clone(), v)),
            merge_labels: config_file.merge_labels.map(|v| {
                let original = format!("{:?}", v);
                ParsedProperty::File(v, config_path.clone(), original)
            }),
        })
    }

    /// Load configuration from environment variables
    pub fn load_from_env() -> Self {
        Self {
            trunk_branch: std::env::var("POMMERGE_TRUNK_BRANCH")
                .ok()
                .map(|v| ParsedProperty::Env(v.clone(), v)),
            aux_tag: std::env::var("POMMERGE_AUX_TAG")
                .ok()
                .map(|v| ParsedProperty::Env(v.clone(), v)),
            default_encoding: std::env::var("POMMERGE_DEFAULT_ENCODING")
                .ok()
                .map(|v| ParsedProperty::Env(v.clone(), v)),
            merge_labels: std::env::var("POMMERGE_MERGE_LABELS")
                .ok()
                .map(|s| ParsedProperty::Env(split_labels(&s), s)),
        }
    }

    /// Build a Config from CLI values.
    pub fn from_args(args: &Args) -> Self {
        Self {
            trunk_branch: args
                .trunk_branch
                .as_ref()
                .map(|v| ParsedProperty::Cli(v.clone(), v.clone())),
            aux_tag: args
                .aux_tag
                .as_ref()
                .map(|v| ParsedProperty::Cli(v.clone(), v.clone())),
            default_encoding: args
                .default_encoding
                .as_ref()
                .map(|v| ParsedProperty::Cli(v.clone(), v.clone())),
            merge_labels: args
                .merge_labels
                .as_ref()
                .map(|s| ParsedProperty::Cli(split_labels(s), s.clone())),
        }
    }

    /// Defaults, then the config file, then the environment, then `args`.
    pub fn load(args: &Args) -> Result<Self, ConfigError> {
        Ok(Self::default()
            .merge(Self::load_from_file()?)
            .merge(Self::load_from_env())
            .merge(Self::from_args(args)))
    }

    /// Get the XDG config file path for pommerge
    pub fn get_config_path() -> Result<PathBuf, ConfigError> {
        // Use XDG_CONFIG_HOME if set, otherwise ~/.config
        let config_dir = match std::env::var("XDG_CONFIG_HOME") {
            Ok(dir) if !dir.is_empty() => PathBuf::from(dir),
            _ => dirs::home_dir()
                .ok_or(ConfigError::NoHomeDirectory)?
                .join(".config"),
        };

        Ok(config_dir.join("pommerge").join("config.toml"))
    }

    /// Merge this config with another, preferring values from other when they exist
    pub fn merge(self, other: Self) -> Self {
        Self {
            trunk_branch: other.trunk_branch.or(self.trunk_branch),
            aux_tag: other.aux_tag.or(self.aux_tag),
            default_encoding: other.default_encoding.or(self.default_encoding),
            merge_labels: other.merge_labels.or(self.merge_labels),
        }
    }

    /// Validate the merged values and turn them into driver settings.
    ///
    /// Unset values take their defaults.
    pub fn resolve(self) -> Result<DriverSettings, ConfigError> {
        let Config {
            trunk_branch,
            aux_tag,
            default_encoding,
            merge_labels,
        } = Self::default().merge(self);
        let defaults = DriverSettings::default();

        let trunk_branch = match trunk_branch {
            Some(branch) if branch.trim().is_empty() => {
                return Err(invalid(
                    "trunk_branch",
                    format!("branch name must not be empty ({})", provenance(&branch)),
                ));
            }
            Some(branch) => branch.into_value(),
            None => defaults.trunk_branch,
        };

        let aux_tag = match aux_tag {
            Some(tag) if tag.is_empty() || tag.contains(['<', '>', '/', ' ']) => {
                return Err(invalid(
                    "aux_tag",
                    format!("'{}' is not an element name ({})", tag, provenance(&tag)),
                ));
            }
            Some(tag) => tag.into_value(),
            None => defaults.aux_tag,
        };

        let default_encoding = match default_encoding {
            Some(label) => TextEncoding::for_label(&label).ok_or_else(|| {
                invalid(
                    "default_encoding",
                    format!("unknown encoding '{}' ({})", label, provenance(&label)),
                )
            })?,
            None => defaults.default_encoding,
        };

        let merge_labels = match merge_labels {
            Some(labels) => match labels.as_slice() {
                [mine, base, theirs] => MergeLabels {
                    mine: mine.clone(),
                    base: base.clone(),
                    theirs: theirs.clone(),
                },
                other => {
                    return Err(invalid(
                        "merge_labels",
                        format!(
                            "expected 3 labels for mine, base and theirs, got {} ({})",
                            other.len(),
                            provenance(&labels)
                        ),
                    ));
                }
            },
            None => defaults.merge_labels,
        };

        Ok(DriverSettings {
            trunk_branch,
            aux_tag,
            default_encoding,
            merge_labels,
        })
    }

    /// Create a sample config file for user reference.
    ///
    /// Returns the path of the file. An existing file is left untouched.
    pub fn create_sample_config() -> Result<PathBuf, ConfigError> {
        let config_path = Self::get_config_path()?;

        // Don't overwrite existing config
        if config_path.exists() {
            return Ok(config_path);
        }

        if let Some(dir) = config_path.parent() {
            fs::create_dir_all(dir).map_err(|e| ConfigError::DirectoryCreationError {
                path: dir.to_path_buf(),
                message: e.to_string(),
            })?;
        }

        let sample_config = r#"# pommerge Configuration File
# This file follows the XDG Base Directory specification
# Location: ~/.config/pommerge/config.toml

# Branch on which merged versions are kept (optional, defaults to "master").
# On every other branch the local version is restored after merging.
trunk_branch = "master"

# Element changed together with the version (optional, defaults to "tag")
aux_tag = "tag"

# Encoding for files without an XML declaration (optional, defaults to "utf-8")
default_encoding = "utf-8"

# Conflict marker labels for mine, base and theirs (optional)
merge_labels = ["mine", "base", "theirs"]
"#;

        fs::write(&config_path, sample_config).map_err(|e| ConfigError::FileReadError {
            path: config_path.clone(),
            message: format!("failed to write sample config: {}", e),
        })?;

        Ok(config_path)
    }
}

fn split_labels(s: &str) -> Vec<String> {
    s.split(',').map(|label| label.trim().to_string()).collect()
}

/// Where a value came from and how it was written, for error messages.
fn provenance<T>(property: &ParsedProperty<T>) -> String {
    match property.original() {
        Some(original) => format!("from {} '{}'", property.source_name(), original),
        None => format!("from {}", property.source_name()),
    }
}

fn invalid(field: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        message: message.into(),
    }
}
