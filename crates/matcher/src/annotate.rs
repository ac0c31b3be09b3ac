use serde::{Deserialize, Serialize};

use crate::model::MatchDecision;

/// Report label for each side of a decision.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Labels {
    pub matched: String,
    pub unmatched: String,
}

impl Default for Labels {
    fn default() -> Self {
        Self {
            matched: "Yes".into(),
            unmatched: "No".into(),
        }
    }
}

impl Labels {
    pub fn label(&self, decision: &MatchDecision) -> &str {
        if decision.matched {
            &self.matched
        } else {
            &self.unmatched
        }
    }
}

/// One label per decision, in order. A pure projection of `matched`.
pub fn annotate<'a>(decisions: &[MatchDecision], labels: &'a Labels) -> Vec<&'a str> {
    decisions.iter().map(|d| labels.label(d)).collect()
}
