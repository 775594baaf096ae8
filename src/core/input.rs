//! Input value types for translation calls

use serde::{Deserialize, Serialize};

/// One string to translate, optionally paired with its own instructions.
///
/// Per-unit instructions override the record-level instructions for that unit
/// only. They are meaningful for the LLM backends; the MT services accept
/// plain strings exclusively.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslationUnit {
    pub text: String,
    pub instructions: Option<String>,
}

impl TranslationUnit {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            instructions: None,
        }
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }
}

/// Caller input: a single string, an ordered list of strings, or prepared
/// translation units
#[derive(Debug, Clone, PartialEq)]
pub enum TextInput {
    /// Single string; the result is unwrapped to a scalar
    Single(String),
    /// Ordered list of strings; the result is an ordered list of equal length
    Many(Vec<String>),
    /// Single prepared unit (LLM backends only)
    Unit(TranslationUnit),
    /// Ordered list of prepared units (LLM backends only)
    Units(Vec<TranslationUnit>),
}

impl TextInput {
    /// Whether the final result collapses to a scalar
    pub fn is_scalar(&self) -> bool {
        matches!(self, TextInput::Single(_) | TextInput::Unit(_))
    }

    /// Whether the input carries prepared units rather than plain strings
    pub fn is_units(&self) -> bool {
        matches!(self, TextInput::Unit(_) | TextInput::Units(_))
    }

    /// Number of units the input expands to
    pub fn len(&self) -> usize {
        match self {
            TextInput::Single(_) | TextInput::Unit(_) => 1,
            TextInput::Many(v) => v.len(),
            TextInput::Units(v) => v.len(),
        }
    }

    /// True for an empty batch input
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Borrow the raw texts in input order
    pub fn texts(&self) -> Vec<&str> {
        match self {
            TextInput::Single(s) => vec![s.as_str()],
            TextInput::Many(v) => v.iter().map(String::as_str).collect(),
            TextInput::Unit(u) => vec![u.text.as_str()],
            TextInput::Units(v) => v.iter().map(|u| u.text.as_str()).collect(),
        }
    }

    /// Flatten into the ordered batch of units
    pub(crate) fn into_units(self) -> Vec<TranslationUnit> {
        match self {
            TextInput::Single(s) => vec![TranslationUnit::new(s)],
            TextInput::Many(v) => v.into_iter().map(TranslationUnit::new).collect(),
            TextInput::Unit(u) => vec![u],
            TextInput::Units(v) => v,
        }
    }
}

impl From<&str> for TextInput {
    fn from(s: &str) -> Self {
        TextInput::Single(s.to_string())
    }
}

impl From<String> for TextInput {
    fn from(s: String) -> Self {
        TextInput::Single(s)
    }
}

impl From<Vec<String>> for TextInput {
    fn from(v: Vec<String>) -> Self {
        TextInput::Many(v)
    }
}

impl From<Vec<&str>> for TextInput {
    fn from(v: Vec<&str>) -> Self {
        TextInput::Many(v.into_iter().map(String::from).collect())
    }
}

impl From<&[&str]> for TextInput {
    fn from(v: &[&str]) -> Self {
        TextInput::Many(v.iter().map(|s| s.to_string()).collect())
    }
}

impl From<TranslationUnit> for TextInput {
    fn from(u: TranslationUnit) -> Self {
        TextInput::Unit(u)
    }
}

impl From<Vec<TranslationUnit>> for TextInput {
    fn from(v: Vec<TranslationUnit>) -> Self {
        TextInput::Units(v)
    }
}
