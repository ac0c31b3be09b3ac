use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::key::KeySet;

/// Candidate pre-filtering applied before full scoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Blocking {
    /// Score every reference key.
    #[default]
    None,
    /// Bucket reference keys by length; skip buckets that cannot beat the best score so far.
    Length,
}

// ---------------------------------------------------------------------------
// Length index
// ---------------------------------------------------------------------------

/// Reference indices bucketed by key length in chars.
///
/// The engine visits buckets nearest in length first and skips a bucket only
/// when `Scorer::admits` rules out every key in it reaching the best score
/// found so far. Decisions are identical to a full scan.
#[derive(Debug)]
pub struct LengthIndex {
    buckets: BTreeMap<usize, Vec<usize>>,
}

impl LengthIndex {
    pub fn build(reference: &KeySet) -> Self {
        let mut buckets: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for (i, key) in reference.iter().enumerate() {
            buckets.entry(key.chars().count()).or_default().push(i);
        }
        Self { buckets }
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Buckets as `(key length, ascending indices)`, ordered by distance from
    /// `target_len`, shorter first on equal distance.
    pub fn nearest(&self, target_len: usize) -> Vec<(usize, &[usize])> {
        let mut out: Vec<(usize, &[usize])> = self
            .buckets
            .iter()
            .map(|(len, indices)| (*len, indices.as_slice()))
            .collect();
        out.sort_by_key(|(len, _)| (len.abs_diff(target_len), *len));
        out
    }
}
