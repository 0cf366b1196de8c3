use std::fmt::Display;

use thiserror::Error;

use crate::lexer::LexError;

/// Tag for the error families a translation can fail with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Lex,
    Parse,
    UnsupportedConstruct,
    TypeInconsistency,
    UnboundName,
    Internal,
}

impl ErrorKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::Lex => "lex",
            Self::Parse => "parse",
            Self::UnsupportedConstruct => "unsupported_construct",
            Self::TypeInconsistency => "type_inconsistency",
            Self::UnboundName => "unbound_name",
            Self::Internal => "internal",
        }
    }
}

/// Typed errors produced by the translation pipeline. Every variant carries
/// the source line it refers to.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error("Cannot parse line {line} `{text}`: {message}")]
    Parse {
        line: usize,
        text: String,
        message: String,
    },
    #[error("Unsupported construct at line {line}: {construct}")]
    UnsupportedConstruct { line: usize, construct: String },
    #[error("Inconsistent types at line {line}: {subject} is {expected} but got {found}")]
    TypeInconsistency {
        line: usize,
        subject: String,
        expected: String,
        found: String,
    },
    #[error("Unbound name '{name}' at line {line}: {reason}")]
    UnboundName {
        line: usize,
        name: String,
        reason: String,
    },
    #[error("Internal error at line {line}: {message}")]
    Internal { line: usize, message: String },
}

impl Error {
    pub fn parse(line: usize, text: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            line,
            text: text.into(),
            message: message.into(),
        }
    }

    pub fn unsupported(line: usize, construct: impl Into<String>) -> Self {
        Self::UnsupportedConstruct {
            line,
            construct: construct.into(),
        }
    }

    pub fn inconsistent(
        line: usize,
        subject: impl Into<String>,
        expected: impl Display,
        found: impl Display,
    ) -> Self {
        Self::TypeInconsistency {
            line,
            subject: subject.into(),
            expected: expected.to_string(),
            found: found.to_string(),
        }
    }

    pub fn unbound(line: usize, name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::UnboundName {
            line,
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub fn internal(line: usize, message: impl Into<String>) -> Self {
        Self::Internal {
            line,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Lex(_) => ErrorKind::Lex,
            Self::Parse { .. } => ErrorKind::Parse,
            Self::UnsupportedConstruct { .. } => ErrorKind::UnsupportedConstruct,
            Self::TypeInconsistency { .. } => ErrorKind::TypeInconsistency,
            Self::UnboundName { .. } => ErrorKind::UnboundName,
            Self::Internal { .. } => ErrorKind::Internal,
        }
    }

    pub fn line(&self) -> usize {
        match self {
            Self::Lex(error) => error.line(),
            Self::Parse { line, .. }
            | Self::UnsupportedConstruct { line, .. }
            | Self::TypeInconsistency { line, .. }
            | Self::UnboundName { line, .. }
            | Self::Internal { line, .. } => *line,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
