use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A session config file, usually `dynir.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub interpreter: InterpreterConfig,
    pub optimizer: OptimizerConfig,
}

/// Limits of the interpreter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterpreterConfig {
    /// Nested calls deeper than this raise a stack overflow.
    pub max_call_depth: usize,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self {
            max_call_depth: 1024,
        }
    }
}

/// Which passes run before interpretation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    /// Whether to propagate constants.
    pub simplify: bool,
    /// Whether simplification may replace operands by constant arrays.
    pub force_simplify: bool,
    /// Whether to inline calls on self.
    pub inline: bool,
    /// Callees longer than this are never inlined.
    pub max_inline_size: usize,
    /// Upper bound of inlined call sites per method.
    pub max_inlined_calls: usize,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            simplify: true,
            force_simplify: false,
            inline: true,
            max_inline_size: 64,
            max_inlined_calls: 16,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

impl Config {
    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&contents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        assert_eq!(Config::from_toml("").unwrap(), Config::default());
    }

    #[test]
    fn partial_sections() {
        let config = Config::from_toml(
            r#"
            [optimizer]
            inline = false
            "#,
        )
        .unwrap();
        assert!(!config.optimizer.inline);
        assert!(config.optimizer.simplify);
        assert_eq!(config.optimizer.max_inline_size, 64);
        assert_eq!(config.interpreter.max_call_depth, 1024);
    }

    #[test]
    fn bad_types_are_rejected() {
        let err = Config::from_toml("[interpreter]\nmax_call_depth = \"deep\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
