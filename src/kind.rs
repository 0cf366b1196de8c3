//! Concrete output types assigned to bindings.
//!
//! The input language carries no types, so every binding gets the kind of the
//! first value assigned to it. Kinds display in source-language spelling
//! (`int`, `str`, `list[int; 3]`) for diagnostics; the generator maps them to
//! Arduino types.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "String")]
pub enum Kind {
    Int,
    Long,
    UnsignedLong,
    Float,
    Bool,
    Str,
    /// Fixed-size homogeneous sequence.
    Array {
        element: Box<Kind>,
        len: usize,
    },
    /// Return kind of functions that produce no value.
    Void,
}

impl Kind {
    pub fn array(element: Kind, len: usize) -> Self {
        Self::Array {
            element: Box::new(element),
            len,
        }
    }

    /// Kinds accepted in a `name: T` annotation of the input language.
    pub fn from_annotation(name: &str) -> Option<Self> {
        match name {
            "int" => Some(Self::Int),
            "float" => Some(Self::Float),
            "bool" => Some(Self::Bool),
            "str" => Some(Self::Str),
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        self.numeric_rank().is_some()
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, Self::Int | Self::Long | Self::UnsignedLong)
    }

    pub fn is_scalar(&self) -> bool {
        !matches!(self, Self::Array { .. } | Self::Void)
    }

    fn numeric_rank(&self) -> Option<u8> {
        match self {
            Self::Int => Some(0),
            Self::Long => Some(1),
            Self::UnsignedLong => Some(2),
            Self::Float => Some(3),
            _ => None,
        }
    }

    /// Result kind of mixed numeric arithmetic, following the usual C
    /// conversions: `int` < `long` < `unsigned long` < `float`.
    pub fn promote(&self, other: &Kind) -> Option<Kind> {
        let left = self.numeric_rank()?;
        let right = other.numeric_rank()?;
        Some(if left >= right {
            self.clone()
        } else {
            other.clone()
        })
    }

    /// Whether a value of kind `found` may initialize a binding declared as
    /// `self`. Identical kinds always match; numeric values may widen.
    pub fn accepts(&self, found: &Kind) -> bool {
        if self == found {
            return true;
        }
        match (self.numeric_rank(), found.numeric_rank()) {
            (Some(target), Some(source)) => source <= target,
            _ => false,
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int => f.write_str("int"),
            Self::Long => f.write_str("long"),
            Self::UnsignedLong => f.write_str("unsigned long"),
            Self::Float => f.write_str("float"),
            Self::Bool => f.write_str("bool"),
            Self::Str => f.write_str("str"),
            Self::Array { element, len } => write!(f, "list[{element}; {len}]"),
            Self::Void => f.write_str("None"),
        }
    }
}

impl FromStr for Kind {
    type Err = String;

    /// Parses the scalar kind names used in configuration files.
    fn from_str(name: &str) -> Result<Self, Self::Err> {
        if let Some(kind) = Self::from_annotation(name) {
            return Ok(kind);
        }
        match name {
            "long" => Ok(Self::Long),
            "unsigned long" => Ok(Self::UnsignedLong),
            "void" | "None" => Ok(Self::Void),
            _ => Err(format!("unknown kind '{name}'")),
        }
    }
}

impl TryFrom<String> for Kind {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}
