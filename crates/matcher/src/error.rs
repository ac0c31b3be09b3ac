use std::fmt;

use crate::key::KeyDefect;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchError {
    /// TOML parse / deserialization error.
    ConfigParse(String),
    /// Config validation error (missing column, bad label, etc.).
    Configuration(String),
    /// Similarity metric name not recognized.
    UnknownMetric(String),
    /// Threshold outside [0, 100]. Never clamped.
    ThresholdOutOfRange(i64),
    /// A key is not a well-formed normalized string.
    InvalidKey {
        index: usize,
        value: String,
        defect: KeyDefect,
    },
    /// Key column spec matches no header, letter, or position.
    MissingColumn {
        column: String,
        available: Vec<String>,
    },
    /// Target and reference keys were built under different normalization policies.
    PolicyMismatch,
    /// Cancelled between target keys; no decisions were produced.
    Cancelled,
}

impl MatchError {
    /// Errors raised before any scoring starts because the run itself is misconfigured.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::ConfigParse(_)
                | Self::Configuration(_)
                | Self::UnknownMetric(_)
                | Self::ThresholdOutOfRange(_)
                | Self::MissingColumn { .. }
        )
    }

    /// Errors caused by keys that upstream normalization should have fixed.
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, Self::InvalidKey { .. } | Self::PolicyMismatch)
    }
}

impl fmt::Display for MatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigParse(msg) => write!(f, "config parse error: {msg}"),
            Self::Configuration(msg) => write!(f, "config validation error: {msg}"),
            Self::UnknownMetric(name) => write!(
                f,
                "unknown similarity metric: \"{name}\" (expected one of: {})",
                crate::metric::Metric::NAMES.join(", ")
            ),
            Self::ThresholdOutOfRange(value) => {
                write!(f, "threshold must be between 0 and 100, got {value}")
            }
            Self::InvalidKey { index, value, defect } => {
                write!(f, "key {index} ({value:?}) is not normalized: {defect}")
            }
            Self::MissingColumn { column, available } => write!(
                f,
                "unknown column: {column:?} (available columns: {})",
                available.join(", ")
            ),
            Self::PolicyMismatch => write!(
                f,
                "target and reference keys were normalized under different policies"
            ),
            Self::Cancelled => write!(f, "matching cancelled"),
        }
    }
}

impl std::error::Error for MatchError {}
