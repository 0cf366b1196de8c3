use std::fs;
use std::path::Path;

use anyhow::Context;
use serde::Deserialize;
use thiserror::Error;

use crate::kind::Kind;

/// C type emitted for values of kind `float`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FloatType {
    #[default]
    Float,
    Double,
}

impl FloatType {
    pub fn c_name(self) -> &'static str {
        match self {
            Self::Float => "float",
            Self::Double => "double",
        }
    }
}

/// A runtime call added on top of the built-in table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CallEntry {
    pub name: String,
    /// Name emitted in the output, when it differs from `name`.
    #[serde(default)]
    pub target: Option<String>,
    /// Kind of the returned value; absent means the call returns nothing.
    #[serde(default)]
    pub returns: Option<Kind>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConstantEntry {
    pub name: String,
    #[serde(default = "default_constant_kind")]
    pub kind: Kind,
}

fn default_constant_kind() -> Kind {
    Kind::Int
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Spaces per block level in the output.
    pub indent_width: usize,
    pub float_type: FloatType,
    pub calls: Vec<CallEntry>,
    pub constants: Vec<ConstantEntry>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            indent_width: 4,
            float_type: FloatType::Float,
            calls: Vec::new(),
            constants: Vec::new(),
        }
    }
}

impl Config {
    pub fn from_yaml_str(raw: &str) -> anyhow::Result<Self> {
        let config: Config = serde_yaml::from_str(raw).context("Parsing configuration")?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Reading configuration {}", path.display()))?;
        Self::from_yaml_str(&raw).with_context(|| format!("Loading {}", path.display()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.indent_width == 0 {
            return Err(ConfigError::ZeroIndentWidth);
        }
        Ok(())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("'{0}' is already a known call or constant; configuration can only add names")]
    DuplicateName(String),
    #[error("'{name}' cannot use kind {kind}; only scalar kinds are allowed")]
    UnsupportedKind { name: String, kind: Kind },
    #[error("indent_width must be at least 1")]
    ZeroIndentWidth,
}
