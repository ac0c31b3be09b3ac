use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::MatchError;

// ---------------------------------------------------------------------------
// Scalar cell values
// ---------------------------------------------------------------------------

/// A single cell value as loaded from a tabular source.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
    /// Spreadsheet error value (`#N/A`, `#DIV/0!`, ...).
    Error(String),
}

impl Scalar {
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Text(s) => s.is_empty(),
            _ => false,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::Text(_) => "text",
            Self::Number(_) => "number",
            Self::Bool(_) => "boolean",
            Self::Error(_) => "error",
        }
    }

    /// Text as shown in a sheet. Whole numbers render without decimals.
    pub fn display(&self) -> String {
        match self {
            Self::Empty => String::new(),
            Self::Text(s) => s.clone(),
            Self::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    format!("{}", *n as i64)
                } else {
                    format!("{}", n)
                }
            }
            Self::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
            Self::Error(e) => e.clone(),
        }
    }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        if s.is_empty() {
            Self::Empty
        } else {
            Self::Text(s.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// Normalization policy
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseFold {
    Preserve,
    #[default]
    Lower,
}

/// How raw cell text becomes a key. Persist it next to the column choice,
/// metric and threshold: a run is only reproducible with all four.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(default)]
pub struct Normalization {
    pub trim: bool,
    pub case: CaseFold,
    /// Collapse internal whitespace runs to one space (implies trim).
    pub collapse_whitespace: bool,
    /// Permit zero-length keys. Two empty keys score 100.
    pub allow_empty: bool,
}

impl Default for Normalization {
    fn default() -> Self {
        Self {
            trim: true,
            case: CaseFold::Lower,
            collapse_whitespace: true,
            allow_empty: false,
        }
    }
}

impl Normalization {
    /// Keys are compared exactly as they appear in the source.
    pub fn verbatim() -> Self {
        Self {
            trim: false,
            case: CaseFold::Preserve,
            collapse_whitespace: false,
            allow_empty: false,
        }
    }

    pub fn apply(&self, raw: &str) -> String {
        let spaced = if self.collapse_whitespace {
            raw.split_whitespace().collect::<Vec<_>>().join(" ")
        } else if self.trim {
            raw.trim().to_string()
        } else {
            raw.to_string()
        };
        match self.case {
            CaseFold::Preserve => spaced,
            CaseFold::Lower => spaced.to_lowercase(),
        }
    }

    /// First way in which `key` is not a fixed point of this policy.
    pub fn check(&self, key: &str) -> Option<KeyDefect> {
        if key.chars().any(|c| c.is_control() && !c.is_whitespace()) {
            return Some(KeyDefect::ControlCharacter);
        }
        if key.is_empty() {
            return (!self.allow_empty).then_some(KeyDefect::Empty);
        }
        if (self.trim || self.collapse_whitespace) && key.trim() != key {
            return Some(KeyDefect::Untrimmed);
        }
        if self.collapse_whitespace && key.split_whitespace().collect::<Vec<_>>().join(" ") != key {
            return Some(KeyDefect::Uncollapsed);
        }
        if self.case == CaseFold::Lower && key.to_lowercase() != key {
            return Some(KeyDefect::NotCaseFolded);
        }
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyDefect {
    Empty,
    Untrimmed,
    Uncollapsed,
    NotCaseFolded,
    ControlCharacter,
    /// Source cell held a value that has no key form (boolean, error).
    NonText(&'static str),
}

impl fmt::Display for KeyDefect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "empty key (policy does not allow empty keys)"),
            Self::Untrimmed => write!(f, "leading or trailing whitespace"),
            Self::Uncollapsed => write!(f, "uncollapsed internal whitespace"),
            Self::NotCaseFolded => write!(f, "not lowercased"),
            Self::ControlCharacter => write!(f, "contains a control character"),
            Self::NonText(kind) => write!(f, "{kind} value cannot be used as a key"),
        }
    }
}

// ---------------------------------------------------------------------------
// Column resolution
// ---------------------------------------------------------------------------

/// Resolve a key column spec against a header row: header name
/// (case-insensitive) first, then column letter, then 1-indexed number.
pub fn resolve_column(spec: &str, headers: &[String]) -> Result<usize, MatchError> {
    let spec = spec.trim();
    let spec_lower = spec.to_lowercase();
    if let Some(i) = headers.iter().position(|h| h.trim().to_lowercase() == spec_lower) {
        return Ok(i);
    }

    // Column letter (A=0, B=1, ...). Three letters covers XFD, the last Excel column.
    if (1..=3).contains(&spec.len()) && spec.chars().all(|c| c.is_ascii_alphabetic()) {
        let col = spec
            .to_ascii_uppercase()
            .bytes()
            .fold(0usize, |acc, c| acc * 26 + (c - b'A' + 1) as usize);
        if col <= headers.len() {
            return Ok(col - 1);
        }
    }

    if let Ok(n) = spec.parse::<usize>() {
        if n >= 1 && n <= headers.len() {
            return Ok(n - 1);
        }
    }

    Err(MatchError::MissingColumn {
        column: spec.to_string(),
        available: headers.to_vec(),
    })
}

/// Excel column letter for a 0-indexed column (0 = A, 26 = AA).
pub fn col_letter(col: usize) -> String {
    let mut result = String::new();
    let mut n = col;
    loop {
        result.insert(0, (b'A' + (n % 26) as u8) as char);
        if n < 26 {
            break;
        }
        n = n / 26 - 1;
    }
    result
}

// ---------------------------------------------------------------------------
// KeySet
// ---------------------------------------------------------------------------

/// Keys for one dataset, index-aligned with its records.
#[derive(Debug, Clone, PartialEq)]
pub struct KeySet {
    keys: Vec<String>,
    policy: Normalization,
}

impl KeySet {
    /// Wrap keys that are already normalized. Any key the policy would still
    /// change is rejected rather than fixed.
    pub fn new(keys: Vec<String>, policy: Normalization) -> Result<Self, MatchError> {
        for (index, key) in keys.iter().enumerate() {
            if let Some(defect) = policy.check(key) {
                return Err(MatchError::InvalidKey {
                    index,
                    value: key.clone(),
                    defect,
                });
            }
        }
        Ok(Self { keys, policy })
    }

    /// Normalize raw strings, then validate.
    pub fn normalize<I, S>(raw: I, policy: Normalization) -> Result<Self, MatchError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keys = raw.into_iter().map(|s| policy.apply(s.as_ref())).collect();
        Self::new(keys, policy)
    }

    /// Project one column's cells into keys.
    ///
    /// Text is normalized, numbers use their display form, empty cells become
    /// empty keys. Booleans and error cells are rejected.
    pub fn extract(values: &[Scalar], policy: Normalization) -> Result<Self, MatchError> {
        let mut keys = Vec::with_capacity(values.len());
        for (index, value) in values.iter().enumerate() {
            match value {
                Scalar::Empty | Scalar::Text(_) | Scalar::Number(_) => {
                    keys.push(policy.apply(&value.display()));
                }
                Scalar::Bool(_) | Scalar::Error(_) => {
                    return Err(MatchError::InvalidKey {
                        index,
                        value: value.display(),
                        defect: KeyDefect::NonText(value.kind()),
                    });
                }
            }
        }
        Self::new(keys, policy)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.keys.get(index).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(String::as_str)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.keys
    }

    pub fn policy(&self) -> Normalization {
        self.policy
    }
}
