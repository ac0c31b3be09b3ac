use serde::Serialize;

// ---------------------------------------------------------------------------
// Decisions
// ---------------------------------------------------------------------------

/// Outcome for one target key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MatchDecision {
    pub matched: bool,
    pub best_score: u8,
    /// Smallest reference index reaching `best_score`. `None` when nothing was scored.
    pub best_reference_index: Option<usize>,
}

impl MatchDecision {
    pub fn unmatched() -> Self {
        Self {
            matched: false,
            best_score: 0,
            best_reference_index: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Summary
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MatchSummary {
    pub targets: usize,
    pub references: usize,
    pub matched: usize,
    pub unmatched: usize,
    /// Unmatched decisions scoring at or above the review floor.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub near_misses: Option<usize>,
}

impl MatchSummary {
    pub fn from_decisions(
        decisions: &[MatchDecision],
        references: usize,
        review_floor: Option<u8>,
    ) -> Self {
        let matched = decisions.iter().filter(|d| d.matched).count();
        let near_misses = review_floor.map(|floor| {
            decisions
                .iter()
                .filter(|d| !d.matched && d.best_reference_index.is_some() && d.best_score >= floor)
                .count()
        });
        Self {
            targets: decisions.len(),
            references,
            matched,
            unmatched: decisions.len() - matched,
            near_misses,
        }
    }
}
