use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::MatchError;

pub const MAX_SCORE: u8 = 100;

// ---------------------------------------------------------------------------
// Threshold
// ---------------------------------------------------------------------------

/// Minimum score, inclusive, for two keys to count as a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Threshold(u8);

impl Threshold {
    pub fn new(value: i64) -> Result<Self, MatchError> {
        if (0..=MAX_SCORE as i64).contains(&value) {
            Ok(Self(value as u8))
        } else {
            Err(MatchError::ThresholdOutOfRange(value))
        }
    }

    pub fn value(self) -> u8 {
        self.0
    }

    /// A score reused as a pruning floor; values above 100 saturate.
    pub(crate) fn at_least(score: u8) -> Self {
        Self(score.min(MAX_SCORE))
    }

    pub fn admits(self, score: u8) -> bool {
        score >= self.0
    }
}

impl fmt::Display for Threshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Scorer
// ---------------------------------------------------------------------------

/// Similarity between two keys on a 0..=100 scale.
///
/// Implementations must be symmetric, deterministic, and return 100 for two
/// identical non-empty keys. The engine clamps anything above 100 to 100.
pub trait Scorer: Sync {
    fn score(&self, a: &str, b: &str) -> u8;

    /// Cheap necessary condition on key lengths (in chars): can two keys of
    /// these lengths score `threshold` or more? Used only to prune blocking
    /// buckets, so it must never return `false` for a pair that could.
    fn admits(&self, len_a: usize, len_b: usize, threshold: Threshold) -> bool {
        let _ = (len_a, len_b, threshold);
        true
    }
}

impl<F> Scorer for F
where
    F: Fn(&str, &str) -> u8 + Sync,
{
    fn score(&self, a: &str, b: &str) -> u8 {
        self(a, b)
    }
}

// ---------------------------------------------------------------------------
// Built-in metrics
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    /// `1 - levenshtein / max_len`.
    Levenshtein,
    /// Insertion/deletion ratio: `2 * lcs / (len_a + len_b)`.
    Indel,
    /// Indel ratio over whitespace tokens sorted alphabetically.
    TokenSort,
    /// Best indel ratio between the shared tokens and each side's remainder.
    TokenSet,
    /// 100 on equality, 0 otherwise.
    Exact,
}

impl Metric {
    pub const ALL: [Metric; 5] = [
        Self::Levenshtein,
        Self::Indel,
        Self::TokenSort,
        Self::TokenSet,
        Self::Exact,
    ];

    pub const NAMES: [&'static str; 5] = ["levenshtein", "indel", "token_sort", "token_set", "exact"];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Levenshtein => "levenshtein",
            Self::Indel => "indel",
            Self::TokenSort => "token_sort",
            Self::TokenSet => "token_set",
            Self::Exact => "exact",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Metric {
    type Err = MatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "levenshtein" | "edit" => Ok(Self::Levenshtein),
            "indel" | "ratio" => Ok(Self::Indel),
            "token_sort" => Ok(Self::TokenSort),
            "token_set" => Ok(Self::TokenSet),
            "exact" => Ok(Self::Exact),
            _ => Err(MatchError::UnknownMetric(s.to_string())),
        }
    }
}

impl Scorer for Metric {
    fn score(&self, a: &str, b: &str) -> u8 {
        match (a.is_empty(), b.is_empty()) {
            (true, true) => return MAX_SCORE,
            (true, false) | (false, true) => return 0,
            (false, false) => {}
        }
        match self {
            Self::Levenshtein => levenshtein_score(a, b),
            Self::Indel => indel_score(a, b),
            Self::TokenSort => token_sort_score(a, b),
            Self::TokenSet => token_set_score(a, b),
            Self::Exact => {
                if a == b {
                    MAX_SCORE
                } else {
                    0
                }
            }
        }
    }

    fn admits(&self, len_a: usize, len_b: usize, threshold: Threshold) -> bool {
        let diff = len_a.abs_diff(len_b);
        // score >= t  <=>  200 * dist <= den * (201 - 2t), and dist >= diff
        let slack = 201 - 2 * threshold.value() as usize;
        match self {
            Self::Levenshtein => 200 * diff <= len_a.max(len_b) * slack,
            Self::Indel => 200 * diff <= (len_a + len_b) * slack,
            Self::Exact => threshold.value() == 0 || diff == 0,
            Self::TokenSort | Self::TokenSet => true,
        }
    }
}

/// `100 * num / den` rounded half-up. Only an exact ratio of 1 yields 100.
fn percent(num: usize, den: usize) -> u8 {
    if den == 0 || num >= den {
        return MAX_SCORE;
    }
    let rounded = (200 * num + den) / (2 * den);
    rounded.min(MAX_SCORE as usize - 1) as u8
}

fn levenshtein_score(a: &str, b: &str) -> u8 {
    let longest = a.chars().count().max(b.chars().count());
    let distance = strsim::levenshtein(a, b);
    percent(longest - distance, longest)
}

fn indel_score(a: &str, b: &str) -> u8 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    percent(2 * lcs_len(&a, &b), a.len() + b.len())
}

/// Longest common subsequence length, two-row table.
fn lcs_len(a: &[char], b: &[char]) -> usize {
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];
    for &ca in a {
        for (j, &cb) in b.iter().enumerate() {
            curr[j + 1] = if ca == cb {
                prev[j] + 1
            } else {
                prev[j + 1].max(curr[j])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

fn token_sort_score(a: &str, b: &str) -> u8 {
    let sort = |s: &str| {
        let mut tokens: Vec<&str> = s.split_whitespace().collect();
        tokens.sort_unstable();
        tokens.join(" ")
    };
    let (a, b) = (sort(a), sort(b));
    match (a.is_empty(), b.is_empty()) {
        (true, true) => MAX_SCORE,
        (false, false) => indel_score(&a, &b),
        _ => 0,
    }
}

fn token_set_score(a: &str, b: &str) -> u8 {
    let tokens_a: BTreeSet<&str> = a.split_whitespace().collect();
    let tokens_b: BTreeSet<&str> = b.split_whitespace().collect();
    match (tokens_a.is_empty(), tokens_b.is_empty()) {
        (true, true) => return MAX_SCORE,
        (true, false) | (false, true) => return 0,
        (false, false) => {}
    }

    let join = |tokens: Vec<&str>| tokens.join(" ");
    let shared = join(tokens_a.intersection(&tokens_b).copied().collect());
    let with_rest = |rest: Vec<&str>| {
        let rest = join(rest);
        format!("{shared} {rest}").trim().to_string()
    };
    let combined_a = with_rest(tokens_a.difference(&tokens_b).copied().collect());
    let combined_b = with_rest(tokens_b.difference(&tokens_a).copied().collect());

    let ratio = |x: &str, y: &str| match (x.is_empty(), y.is_empty()) {
        (true, true) => MAX_SCORE,
        (false, false) => indel_score(x, y),
        _ => 0,
    };
    ratio(&shared, &combined_a)
        .max(ratio(&shared, &combined_b))
        .max(ratio(&combined_a, &combined_b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_bounds() {
        assert_eq!(Threshold::new(0).unwrap().value(), 0);
        assert_eq!(Threshold::new(100).unwrap().value(), 100);
        assert_eq!(Threshold::new(101), Err(MatchError::ThresholdOutOfRange(101)));
        assert_eq!(Threshold::new(-1), Err(MatchError::ThresholdOutOfRange(-1)));
    }

    #[test]
    fn threshold_is_inclusive() {
        let t = Threshold::new(85).unwrap();
        assert!(t.admits(85));
        assert!(t.admits(100));
        assert!(!t.admits(84));
    }

    #[test]
    fn parse_metric_names() {
        assert_eq!("levenshtein".parse::<Metric>().unwrap(), Metric::Levenshtein);
        assert_eq!("Token-Sort".parse::<Metric>().unwrap(), Metric::TokenSort);
        assert_eq!(" token_set ".parse::<Metric>().unwrap(), Metric::TokenSet);
        assert_eq!("ratio".parse::<Metric>().unwrap(), Metric::Indel);
        assert_eq!(
            "jaro".parse::<Metric>(),
            Err(MatchError::UnknownMetric("jaro".into()))
        );
        for m in Metric::ALL {
            assert_eq!(m.name().parse::<Metric>().unwrap(), m);
        }
    }

    #[test]
    fn percent_rounds_half_up_and_caps() {
        assert_eq!(percent(9, 10), 90);
        assert_eq!(percent(18, 19), 95); // 94.7
        assert_eq!(percent(1, 8), 13); // 12.5
        assert_eq!(percent(199, 200), 99); // 99.5 would round to 100
        assert_eq!(percent(0, 5), 0);
        assert_eq!(percent(0, 0), 100);
    }

    #[test]
    fn levenshtein_ratio() {
        let m = Metric::Levenshtein;
        assert_eq!(m.score("acme corp", "acme corp"), 100);
        assert_eq!(m.score("acme corp", "acme corpp"), 90);
        assert_eq!(m.score("kitten", "sitting"), 57); // 1 - 3/7
        assert_eq!(m.score("abc", "xyz"), 0);
    }

    #[test]
    fn levenshtein_counts_chars_not_bytes() {
        assert_eq!(Metric::Levenshtein.score("café", "cafe"), 75);
    }

    #[test]
    fn indel_ratio_matches_fuzzywuzzy() {
        let m = Metric::Indel;
        assert_eq!(m.score("Acme Corp", "Acme Corpp"), 95);
        assert_eq!(m.score("this is a test", "this is a test!"), 97);
        assert_eq!(m.score("abc", "abc"), 100);
    }

    #[test]
    fn empty_string_rules() {
        for m in Metric::ALL {
            assert_eq!(m.score("", ""), 100, "{m}");
            assert_eq!(m.score("", "a"), 0, "{m}");
            assert_eq!(m.score("a", ""), 0, "{m}");
        }
    }

    #[test]
    fn whitespace_only_against_text_is_zero_for_token_metrics() {
        assert_eq!(Metric::TokenSort.score("   ", "abc"), 0);
        assert_eq!(Metric::TokenSet.score("abc", "  "), 0);
        assert_eq!(Metric::TokenSet.score("  ", "  "), 100);
    }

    #[test]
    fn token_sort_ignores_order() {
        assert_eq!(Metric::TokenSort.score("corp acme", "acme corp"), 100);
        assert!(Metric::Levenshtein.score("corp acme", "acme corp") < 100);
    }

    #[test]
    fn token_set_ignores_extra_tokens() {
        assert_eq!(Metric::TokenSet.score("acme", "acme corp ltd"), 100);
        assert_eq!(
            Metric::TokenSet.score("fuzzy was a bear", "fuzzy fuzzy was a bear"),
            100
        );
        assert!(Metric::TokenSet.score("acme", "globex") < 50);
    }

    #[test]
    fn exact_metric() {
        assert_eq!(Metric::Exact.score("a", "a"), 100);
        assert_eq!(Metric::Exact.score("a", "A"), 0);
    }

    #[test]
    fn closures_are_scorers() {
        let first_char = |a: &str, b: &str| -> u8 {
            if a.chars().next() == b.chars().next() {
                100
            } else {
                0
            }
        };
        assert_eq!(first_char.score("apple", "avocado"), 100);
        assert!(first_char.admits(1, 50, Threshold::new(100).unwrap()));
    }

    #[test]
    fn length_bounds_are_sound() {
        let words = ["", "a", "ab", "abc", "abcd", "acme", "acme corp", "acme corpp", "zz", "bca"];
        for m in Metric::ALL {
            for t in [0, 1, 50, 67, 75, 85, 90, 99, 100] {
                let t = Threshold::new(t).unwrap();
                for a in words {
                    for b in words {
                        let score = m.score(a, b);
                        if t.admits(score) {
                            assert!(
                                m.admits(a.chars().count(), b.chars().count(), t),
                                "{m} pruned {a:?}/{b:?} scoring {score} at {t}"
                            );
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn length_bounds_prune() {
        let t = Threshold::new(90).unwrap();
        assert!(!Metric::Levenshtein.admits(3, 10, t));
        assert!(Metric::Levenshtein.admits(9, 10, t));
        assert!(!Metric::Exact.admits(3, 4, t));
        assert!(Metric::TokenSet.admits(1, 100, t));
    }
}
