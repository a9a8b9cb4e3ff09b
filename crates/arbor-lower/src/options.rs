//! Lowering options, loadable from an `arbor.toml`-style document.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Knobs for [`lower`](crate::lower) and [`reduce_with`](crate::reduce_with).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LowerOptions {
    /// Run the optimizer over the reduced tree.
    pub optimize: bool,
    /// Run the label-preserving optimizer over every loop, switch and
    /// statement block as soon as it is lowered.
    pub optimize_lowered_nodes: bool,
    /// Spill constant arguments too when an argument list is reordered.
    pub spill_constants: bool,
    /// Prefix for the names of synthesized locals and labels.
    pub temp_prefix: String,
}

impl Default for LowerOptions {
    fn default() -> Self {
        LowerOptions {
            optimize: true,
            optimize_lowered_nodes: false,
            spill_constants: false,
            temp_prefix: String::new(),
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io { path: String, message: String },
    Parse(toml::de::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io { path, message } => write!(f, "failed to read {path}: {message}"),
            ConfigError::Parse(e) => write!(f, "invalid lowering options: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        ConfigError::Parse(e)
    }
}

impl LowerOptions {
    pub fn from_toml(content: &str) -> Result<LowerOptions, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn from_file(path: &Path) -> Result<LowerOptions, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        LowerOptions::from_toml(&content)
    }

    /// Options used inside the reducer when lowered nodes are optimized
    /// eagerly: no further optimization of the whole tree is implied.
    pub fn without_optimizer() -> LowerOptions {
        LowerOptions {
            optimize: false,
            ..LowerOptions::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_keys_take_defaults() {
        let opts = LowerOptions::from_toml("temp_prefix = \"$\"\n").unwrap();
        assert!(opts.optimize);
        assert!(!opts.spill_constants);
        assert_eq!(opts.temp_prefix, "$");
    }

    #[test]
    fn empty_document_is_default() {
        assert_eq!(LowerOptions::from_toml("").unwrap(), LowerOptions::default());
    }

    #[test]
    fn wrong_type_is_a_parse_error() {
        let err = LowerOptions::from_toml("optimize = \"yes\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(err.to_string().starts_with("invalid lowering options"));
    }
}
