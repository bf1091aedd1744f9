//! Compile options for the semantic passes.

use serde::Deserialize;
use thiserror::Error;

/// Knobs the driver passes to [`crate::Sema`].
///
/// Parsed from the `[compile]`-style TOML fragment of a project file;
/// missing keys take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct CompileOptions {
    /// Fold constant subexpressions wherever it is profitable. Contexts
    /// that require a constant fold regardless.
    pub fold_constants: bool,
    /// Stop recording diagnostics after this many; further ones are only
    /// counted.
    pub max_errors: Option<usize>,
    pub warnings_as_errors: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            fold_constants: true,
            max_errors: None,
            warnings_as_errors: false,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid compile options: {0}")]
    Parse(#[from] toml::de::Error),
}

impl CompileOptions {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }
}
