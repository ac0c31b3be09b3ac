use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rayon::prelude::*;

use crate::blocking::{Blocking, LengthIndex};
use crate::error::MatchError;
use crate::key::KeySet;
use crate::metric::{Scorer, Threshold, MAX_SCORE};
use crate::model::MatchDecision;

/// Minimum target size before the outer loop moves to the rayon pool.
pub const PARALLEL_THRESHOLD: usize = 256;

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Cooperative cancellation flag, checked between target keys.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone, Default)]
pub struct MatchOptions {
    pub blocking: Blocking,
    pub parallel: bool,
    pub cancel: Option<CancelToken>,
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Best reference match for every target key, in target order.
///
/// Each target key is scored against every reference key (O(|target| x
/// |reference|) scorer calls); the highest score wins and ties go to the
/// smallest reference index. `matched` is `best_score >= threshold`.
pub fn match_keys<S: Scorer + ?Sized>(
    target: &KeySet,
    reference: &KeySet,
    threshold: Threshold,
    scorer: &S,
) -> Result<Vec<MatchDecision>, MatchError> {
    match_keys_with(target, reference, threshold, scorer, &MatchOptions::default())
}

/// [`match_keys`] with blocking, parallelism and cancellation.
///
/// [`Blocking::Length`] only saves scorer calls: decisions, including the
/// best score and index of unmatched keys, equal those of a full scan.
pub fn match_keys_with<S: Scorer + ?Sized>(
    target: &KeySet,
    reference: &KeySet,
    threshold: Threshold,
    scorer: &S,
    options: &MatchOptions,
) -> Result<Vec<MatchDecision>, MatchError> {
    if target.policy() != reference.policy() {
        return Err(MatchError::PolicyMismatch);
    }
    if target.is_empty() {
        return Ok(Vec::new());
    }
    if reference.is_empty() {
        return Ok(vec![MatchDecision::unmatched(); target.len()]);
    }

    let index = match options.blocking {
        Blocking::None => None,
        Blocking::Length => Some(LengthIndex::build(reference)),
    };
    let search = Search {
        reference,
        threshold,
        scorer,
        index: index.as_ref(),
    };
    let cancel = options.cancel.as_ref();

    let evaluate = |key: &String| -> Result<(MatchDecision, usize), MatchError> {
        if cancel.is_some_and(CancelToken::is_cancelled) {
            return Err(MatchError::Cancelled);
        }
        Ok(search.best_match(key))
    };

    let parallel = options.parallel && target.len() >= PARALLEL_THRESHOLD;
    let results: Vec<(MatchDecision, usize)> = if parallel {
        target.as_slice().par_iter().map(evaluate).collect::<Result<_, _>>()?
    } else {
        target.as_slice().iter().map(evaluate).collect::<Result<_, _>>()?
    };

    let scored: usize = results.iter().map(|(_, n)| n).sum();
    log::debug!(
        "scored {} of {} pairs (blocking={:?}, parallel={}, buckets={})",
        scored,
        target.len() * reference.len(),
        options.blocking,
        parallel,
        index.as_ref().map_or(0, LengthIndex::bucket_count),
    );

    Ok(results.into_iter().map(|(decision, _)| decision).collect())
}

// ---------------------------------------------------------------------------
// Search
// ---------------------------------------------------------------------------

struct Search<'a, S: ?Sized> {
    reference: &'a KeySet,
    threshold: Threshold,
    scorer: &'a S,
    index: Option<&'a LengthIndex>,
}

/// Best `(reference index, score)` seen so far.
type Best = Option<(usize, u8)>;

impl<S: Scorer + ?Sized> Search<'_, S> {
    /// Returns the decision and the number of scorer calls made.
    fn best_match(&self, key: &str) -> (MatchDecision, usize) {
        let mut best: Best = None;
        let mut scored = 0;

        match self.index {
            Some(index) => {
                let len = key.chars().count();
                for (bucket_len, indices) in index.nearest(len) {
                    if let Some((top_index, top)) = best {
                        // Nothing here can reach the current best
                        if !self.scorer.admits(len, bucket_len, Threshold::at_least(top)) {
                            continue;
                        }
                        // A perfect score can only be displaced by an earlier tie
                        if top == MAX_SCORE && indices[0] > top_index {
                            continue;
                        }
                    }
                    scored += self.scan(key, indices.iter().copied(), &mut best);
                }
            }
            None => {
                scored += self.scan(key, 0..self.reference.len(), &mut best);
            }
        }

        let decision = match best {
            Some((j, score)) => MatchDecision {
                matched: self.threshold.admits(score),
                best_score: score,
                best_reference_index: Some(j),
            },
            None => MatchDecision::unmatched(),
        };
        (decision, scored)
    }

    /// Score `key` against ascending reference indices, stopping at the first
    /// perfect score. Returns the number of scorer calls.
    fn scan(&self, key: &str, indices: impl Iterator<Item = usize>, best: &mut Best) -> usize {
        let keys = self.reference.as_slice();
        let mut scored = 0;
        for j in indices {
            let score = self.scorer.score(key, &keys[j]).min(MAX_SCORE);
            scored += 1;
            let better = match *best {
                None => true,
                Some((top_index, top)) => score > top || (score == top && j < top_index),
            };
            if better {
                *best = Some((j, score));
            }
            if score == MAX_SCORE {
                break;
            }
        }
        scored
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    use crate::key::{CaseFold, Normalization};
    use crate::metric::Metric;

    fn keys(raw: &[&str]) -> KeySet {
        KeySet::normalize(raw.iter().copied(), Normalization::verbatim()).unwrap()
    }

    fn t(v: i64) -> Threshold {
        Threshold::new(v).unwrap()
    }

    #[test]
    fn exact_match_at_threshold_100() {
        let out = match_keys(
            &keys(&["Acme Corp"]),
            &keys(&["Acme Corp", "Other"]),
            t(100),
            &Metric::Levenshtein,
        )
        .unwrap();
        assert_eq!(
            out,
            vec![MatchDecision {
                matched: true,
                best_score: 100,
                best_reference_index: Some(0),
            }]
        );
    }

    #[test]
    fn fuzzy_boundary() {
        let target = keys(&["Acme Corp"]);
        let reference = keys(&["Acme Corpp"]);
        for metric in [Metric::Levenshtein, Metric::Indel] {
            let at_85 = match_keys(&target, &reference, t(85), &metric).unwrap();
            assert!(at_85[0].matched, "{metric}");
            let at_99 = match_keys(&target, &reference, t(99), &metric).unwrap();
            assert!(!at_99[0].matched, "{metric}");
            assert_eq!(at_85[0].best_score, at_99[0].best_score);
        }
    }

    #[test]
    fn tie_goes_to_first_reference() {
        for threshold in [0, 50, 100] {
            let out = match_keys(&keys(&["AB"]), &keys(&["AB", "AB"]), t(threshold), &Metric::Levenshtein)
                .unwrap();
            assert_eq!(out[0].best_reference_index, Some(0));
        }
        // Equal non-perfect scores too.
        let out = match_keys(&keys(&["abcd"]), &keys(&["xbcd", "abcx"]), t(0), &Metric::Levenshtein).unwrap();
        assert_eq!(out[0].best_score, 75);
        assert_eq!(out[0].best_reference_index, Some(0));
    }

    #[test]
    fn best_score_wins_over_order() {
        let out = match_keys(&keys(&["acme"]), &keys(&["zzzz", "acmx", "acme"]), t(90), &Metric::Levenshtein)
            .unwrap();
        assert_eq!(out[0].best_reference_index, Some(2));
        assert!(out[0].matched);
    }

    #[test]
    fn empty_reference() {
        let out = match_keys(&keys(&["a", "b"]), &keys(&[]), t(0), &Metric::Levenshtein).unwrap();
        assert_eq!(out, vec![MatchDecision::unmatched(); 2]);
    }

    #[test]
    fn empty_target() {
        let out = match_keys(&keys(&[]), &keys(&["a"]), t(50), &Metric::Levenshtein).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn unmatched_still_reports_best_candidate() {
        let out = match_keys(&keys(&["abc"]), &keys(&["xyz", "abx"]), t(90), &Metric::Levenshtein).unwrap();
        assert_eq!(
            out[0],
            MatchDecision {
                matched: false,
                best_score: 67,
                best_reference_index: Some(1),
            }
        );
    }

    #[test]
    fn policy_mismatch_rejected() {
        let target = KeySet::normalize(["a"], Normalization::default()).unwrap();
        let reference = KeySet::normalize(
            ["a"],
            Normalization {
                case: CaseFold::Preserve,
                ..Normalization::default()
            },
        )
        .unwrap();
        let err = match_keys(&target, &reference, t(50), &Metric::Levenshtein).unwrap_err();
        assert_eq!(err, MatchError::PolicyMismatch);
    }

    #[test]
    fn custom_scorer() {
        let same_len = |a: &str, b: &str| -> u8 {
            if a.len() == b.len() {
                100
            } else {
                0
            }
        };
        let out = match_keys(&keys(&["abc"]), &keys(&["x", "xyz"]), t(100), &same_len).unwrap();
        assert_eq!(out[0].best_reference_index, Some(1));
        assert!(out[0].matched);
    }

    #[test]
    fn dyn_scorer() {
        let scorer: Box<dyn Scorer> = Box::new(Metric::Exact);
        let out = match_keys(&keys(&["a"]), &keys(&["b", "a"]), t(100), scorer.as_ref()).unwrap();
        assert_eq!(out[0].best_reference_index, Some(1));
    }

    #[test]
    fn cancelled_before_start() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let options = MatchOptions {
            cancel: Some(cancel),
            ..MatchOptions::default()
        };
        let err = match_keys_with(&keys(&["a"]), &keys(&["a"]), t(0), &Metric::Levenshtein, &options)
            .unwrap_err();
        assert_eq!(err, MatchError::Cancelled);
    }

    #[test]
    fn cancelled_mid_run_produces_no_output() {
        let cancel = CancelToken::new();
        let trip = cancel.clone();
        let scorer = move |a: &str, b: &str| -> u8 {
            trip.cancel();
            Metric::Levenshtein.score(a, b)
        };
        let options = MatchOptions {
            cancel: Some(cancel),
            ..MatchOptions::default()
        };
        let err = match_keys_with(&keys(&["a", "b", "c"]), &keys(&["a"]), t(0), &scorer, &options)
            .unwrap_err();
        assert_eq!(err, MatchError::Cancelled);
    }

    fn length_blocked() -> MatchOptions {
        MatchOptions {
            blocking: Blocking::Length,
            ..MatchOptions::default()
        }
    }

    #[test]
    fn blocking_keeps_decisions() {
        let target = keys(&["acme corp", "globex", "initech"]);
        let reference = keys(&["initech llc", "acme corpp", "globex", "umbrella"]);
        let plain = match_keys(&target, &reference, t(85), &Metric::Levenshtein).unwrap();
        let blocked =
            match_keys_with(&target, &reference, t(85), &Metric::Levenshtein, &length_blocked()).unwrap();
        assert_eq!(plain, blocked);
        assert!(blocked[0].matched);
        assert!(blocked[1].matched);
        assert!(!blocked[2].matched);
    }

    #[test]
    fn blocking_reports_near_miss_from_other_length() {
        // job-1002b is one char longer and cannot reach 90, but it is still the best
        let target = keys(&["job-1002"]);
        let reference = keys(&["job-1001", "job-1002b"]);
        let blocked =
            match_keys_with(&target, &reference, t(90), &Metric::Levenshtein, &length_blocked()).unwrap();
        assert_eq!(
            blocked[0],
            MatchDecision {
                matched: false,
                best_score: 89,
                best_reference_index: Some(1),
            }
        );
        assert_eq!(blocked, match_keys(&target, &reference, t(90), &Metric::Levenshtein).unwrap());
    }

    #[test]
    fn blocking_keeps_earliest_tie_across_buckets() {
        // "abcd" ties at 75 with "abc" (index 0) and "abce" (index 1, same length)
        let target = keys(&["abcd"]);
        let reference = keys(&["abc", "abce"]);
        let blocked =
            match_keys_with(&target, &reference, t(0), &Metric::Levenshtein, &length_blocked()).unwrap();
        assert_eq!(blocked[0].best_score, 75);
        assert_eq!(blocked[0].best_reference_index, Some(0));

        // token_set scores 100 across lengths; the earlier index still wins
        let target = keys(&["acme"]);
        let reference = keys(&["acme corp ltd", "acme"]);
        let blocked = match_keys_with(&target, &reference, t(100), &Metric::TokenSet, &length_blocked()).unwrap();
        assert_eq!(blocked, match_keys(&target, &reference, t(100), &Metric::TokenSet).unwrap());
        assert_eq!(blocked[0].best_reference_index, Some(0));
    }

    // -------------------------------------------------------------------------
    // Scorer calls
    // -------------------------------------------------------------------------

    /// Levenshtein that counts its calls.
    #[derive(Default)]
    struct Counting(AtomicUsize);

    impl Counting {
        fn calls(&self) -> usize {
            self.0.load(Ordering::Relaxed)
        }
    }

    impl Scorer for Counting {
        fn score(&self, a: &str, b: &str) -> u8 {
            self.0.fetch_add(1, Ordering::Relaxed);
            Metric::Levenshtein.score(a, b)
        }

        fn admits(&self, len_a: usize, len_b: usize, threshold: Threshold) -> bool {
            Metric::Levenshtein.admits(len_a, len_b, threshold)
        }
    }

    #[test]
    fn full_scan_scores_every_pair() {
        let target = keys(&["alpha", "beta", "gamma"]);
        let reference = keys(&["delta", "epsilon", "zeta", "eta"]);
        let scorer = Counting::default();
        let out = match_keys(&target, &reference, t(50), &scorer).unwrap();
        assert!(out.iter().all(|d| d.best_score < MAX_SCORE));
        assert_eq!(scorer.calls(), target.len() * reference.len());
    }

    #[test]
    fn perfect_score_stops_the_scan() {
        let target = keys(&["alpha", "beta"]);
        let reference = keys(&["alpha", "delta", "beta", "zeta"]);
        let scorer = Counting::default();
        match_keys(&target, &reference, t(50), &scorer).unwrap();
        // alpha stops after 1 call, beta after 3
        assert_eq!(scorer.calls(), 4);
        assert!(scorer.calls() < target.len() * reference.len());
    }

    #[test]
    fn length_blocking_skips_distant_buckets() {
        let target = keys(&["acme", "acmx"]);
        let mut raw = vec!["acne"];
        raw.extend(["a very long company name ltd"; 6]);
        raw.push("an even longer company name plc");
        let reference = keys(&raw);

        let plain_scorer = Counting::default();
        let plain = match_keys(&target, &reference, t(90), &plain_scorer).unwrap();
        let blocked_scorer = Counting::default();
        let blocked = match_keys_with(&target, &reference, t(90), &blocked_scorer, &length_blocked()).unwrap();

        assert_eq!(plain, blocked);
        assert_eq!(plain_scorer.calls(), target.len() * reference.len());
        assert_eq!(blocked_scorer.calls(), target.len());
    }

    #[test]
    fn out_of_range_scores_are_clamped() {
        let loud = |a: &str, b: &str| -> u8 {
            if a == b {
                250
            } else {
                180
            }
        };
        let out = match_keys(&keys(&["b"]), &keys(&["a", "b"]), t(100), &loud).unwrap();
        assert_eq!(
            out[0],
            MatchDecision {
                matched: true,
                best_score: MAX_SCORE,
                best_reference_index: Some(0),
            }
        );
    }

    #[test]
    fn parallel_matches_sequential() {
        let target: Vec<String> = (0..PARALLEL_THRESHOLD * 2).map(|i| format!("item {}", i % 97)).collect();
        let reference: Vec<String> = (0..50).map(|i| format!("item {}", i * 3)).collect();
        let target = KeySet::new(target, Normalization::verbatim()).unwrap();
        let reference = KeySet::new(reference, Normalization::verbatim()).unwrap();

        let sequential = match_keys(&target, &reference, t(90), &Metric::Indel).unwrap();
        let parallel = match_keys_with(
            &target,
            &reference,
            t(90),
            &Metric::Indel,
            &MatchOptions {
                parallel: true,
                ..MatchOptions::default()
            },
        )
        .unwrap();
        assert_eq!(sequential, parallel);
        assert_eq!(parallel.len(), target.len());
    }
}
