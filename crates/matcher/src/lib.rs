//! `fuzzylookup-matcher`: fuzzy key matching engine.
//!
//! Pure engine crate: receives pre-extracted key sets, returns one decision
//! per target key. No file IO.

pub mod annotate;
pub mod blocking;
pub mod config;
pub mod engine;
pub mod error;
pub mod key;
pub mod metric;
pub mod model;

pub use annotate::{annotate, Labels};
pub use blocking::Blocking;
pub use config::LookupConfig;
pub use engine::{match_keys, match_keys_with, CancelToken, MatchOptions};
pub use error::MatchError;
pub use key::{col_letter, resolve_column, CaseFold, KeySet, Normalization, Scalar};
pub use metric::{Metric, Scorer, Threshold};
pub use model::{MatchDecision, MatchSummary};
