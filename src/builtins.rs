//! Runtime calls and constants the translator knows about.

use std::borrow::Cow;

use crate::config::{CallEntry, ConfigError, ConstantEntry};
use crate::kind::Kind;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rewrite {
    /// Emitted under its own name, `delay(ms)`.
    Same,
    /// Emitted under another name.
    Rename(Cow<'static, str>),
    /// `print(...)` becomes `Serial.println(...)`; several arguments are
    /// printed one by one with spaces between them.
    Print,
    /// `len(xs)` becomes the element count of a fixed-size array.
    ArrayLen,
    /// `range(...)`, only valid as a counted-loop header.
    LoopRange,
    /// `int(x)`, `float(x)`, `bool(x)`, `str(x)`: a conversion to the
    /// call's return kind.
    Cast,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Returns {
    Void,
    Fixed(Kind),
    /// Promoted kind of the numeric arguments (`abs`, `min`, `max`).
    Promoted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallRule {
    pub name: Cow<'static, str>,
    pub rewrite: Rewrite,
    pub returns: Returns,
    /// Exact argument count, for calls that have one.
    pub arity: Option<usize>,
}

const fn rule(
    name: &'static str,
    rewrite: Rewrite,
    returns: Returns,
    arity: Option<usize>,
) -> CallRule {
    CallRule {
        name: Cow::Borrowed(name),
        rewrite,
        returns,
        arity,
    }
}

static BUILTIN_CALLS: &[CallRule] = &[
    rule("print", Rewrite::Print, Returns::Void, None),
    rule("range", Rewrite::LoopRange, Returns::Void, None),
    rule("len", Rewrite::ArrayLen, Returns::Fixed(Kind::Int), Some(1)),
    rule("int", Rewrite::Cast, Returns::Fixed(Kind::Int), Some(1)),
    rule("float", Rewrite::Cast, Returns::Fixed(Kind::Float), Some(1)),
    rule("bool", Rewrite::Cast, Returns::Fixed(Kind::Bool), Some(1)),
    rule("str", Rewrite::Cast, Returns::Fixed(Kind::Str), Some(1)),
    rule("abs", Rewrite::Same, Returns::Promoted, Some(1)),
    rule("min", Rewrite::Same, Returns::Promoted, Some(2)),
    rule("max", Rewrite::Same, Returns::Promoted, Some(2)),
    rule("constrain", Rewrite::Same, Returns::Promoted, Some(3)),
    rule("map", Rewrite::Same, Returns::Fixed(Kind::Long), Some(5)),
    rule("random", Rewrite::Same, Returns::Fixed(Kind::Long), None),
    rule("millis", Rewrite::Same, Returns::Fixed(Kind::UnsignedLong), Some(0)),
    rule("micros", Rewrite::Same, Returns::Fixed(Kind::UnsignedLong), Some(0)),
    rule("analogRead", Rewrite::Same, Returns::Fixed(Kind::Int), Some(1)),
    rule("digitalRead", Rewrite::Same, Returns::Fixed(Kind::Int), Some(1)),
    rule("pinMode", Rewrite::Same, Returns::Void, Some(2)),
    rule("digitalWrite", Rewrite::Same, Returns::Void, Some(2)),
    rule("analogWrite", Rewrite::Same, Returns::Void, Some(2)),
    rule("delay", Rewrite::Same, Returns::Void, Some(1)),
    rule("delayMicroseconds", Rewrite::Same, Returns::Void, Some(1)),
    rule("tone", Rewrite::Same, Returns::Void, None),
    rule("noTone", Rewrite::Same, Returns::Void, Some(1)),
    rule("Serial.begin", Rewrite::Same, Returns::Void, Some(1)),
    rule("Serial.print", Rewrite::Same, Returns::Void, None),
    rule("Serial.println", Rewrite::Same, Returns::Void, None),
    rule("Serial.available", Rewrite::Same, Returns::Fixed(Kind::Int), Some(0)),
    rule("Serial.read", Rewrite::Same, Returns::Fixed(Kind::Int), Some(0)),
];

static BUILTIN_CONSTANTS: &[&str] = &[
    "HIGH",
    "LOW",
    "INPUT",
    "OUTPUT",
    "INPUT_PULLUP",
    "LED_BUILTIN",
    "A0",
    "A1",
    "A2",
    "A3",
    "A4",
    "A5",
    "A6",
    "A7",
];

/// Rewrite rules and runtime constants in effect for one translator.
/// Starts from the built-in entries; configuration may only append.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallTable {
    calls: Vec<CallRule>,
    constants: Vec<(Cow<'static, str>, Kind)>,
}

impl Default for CallTable {
    fn default() -> Self {
        Self::builtin()
    }
}

impl CallTable {
    pub fn builtin() -> Self {
        Self {
            calls: BUILTIN_CALLS.to_vec(),
            constants: BUILTIN_CONSTANTS
                .iter()
                .map(|name| (Cow::Borrowed(*name), Kind::Int))
                .collect(),
        }
    }

    pub fn extend(
        &mut self,
        calls: &[CallEntry],
        constants: &[ConstantEntry],
    ) -> Result<(), ConfigError> {
        for entry in calls {
            if self.is_known(&entry.name) {
                return Err(ConfigError::DuplicateName(entry.name.clone()));
            }
            let returns = match &entry.returns {
                None | Some(Kind::Void) => Returns::Void,
                Some(kind) if kind.is_scalar() => Returns::Fixed(kind.clone()),
                Some(kind) => {
                    return Err(ConfigError::UnsupportedKind {
                        name: entry.name.clone(),
                        kind: kind.clone(),
                    });
                }
            };
            let rewrite = match &entry.target {
                Some(target) if *target != entry.name => Rewrite::Rename(Cow::Owned(target.clone())),
                _ => Rewrite::Same,
            };
            self.calls.push(CallRule {
                name: Cow::Owned(entry.name.clone()),
                rewrite,
                returns,
                arity: None,
            });
        }

        for entry in constants {
            if self.is_known(&entry.name) {
                return Err(ConfigError::DuplicateName(entry.name.clone()));
            }
            if !entry.kind.is_scalar() {
                return Err(ConfigError::UnsupportedKind {
                    name: entry.name.clone(),
                    kind: entry.kind.clone(),
                });
            }
            self.constants
                .push((Cow::Owned(entry.name.clone()), entry.kind.clone()));
        }
        Ok(())
    }

    pub fn call(&self, name: &str) -> Option<&CallRule> {
        self.calls.iter().find(|rule| rule.name == name)
    }

    pub fn constant(&self, name: &str) -> Option<&Kind> {
        self.constants
            .iter()
            .find(|(constant, _)| constant == name)
            .map(|(_, kind)| kind)
    }

    fn is_known(&self, name: &str) -> bool {
        self.call(name).is_some() || self.constant(name).is_some()
    }
}
