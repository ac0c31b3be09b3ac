// Annotated target report: the target table plus a presence label column.

use fuzzylookup_matcher::{annotate, Labels, MatchDecision, Scalar};

use crate::table::Table;

pub const SCORE_COLUMN: &str = "Best Score";
pub const MATCH_COLUMN: &str = "Best Match";

#[derive(Debug, Clone)]
pub struct ReportOptions {
    pub label_column: String,
    pub labels: Labels,
    /// Also write the best score and the best reference value per row.
    pub include_scores: bool,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            label_column: "On Scan".to_string(),
            labels: Labels::default(),
            include_scores: false,
        }
    }
}

/// Copy `target` and label every row from its decision. `reference_values`
/// are the raw reference key cells, used for the best match column.
pub fn build(
    target: &Table,
    decisions: &[MatchDecision],
    reference_values: &[Scalar],
    options: &ReportOptions,
) -> Result<Table, String> {
    if decisions.len() != target.len() {
        return Err(format!(
            "{} decisions for {} target rows",
            decisions.len(),
            target.len()
        ));
    }

    let mut report = target.clone();
    let labels = annotate(decisions, &options.labels)
        .into_iter()
        .map(Scalar::from)
        .collect();
    report.set_column(&options.label_column, labels);

    if options.include_scores {
        let scores = decisions
            .iter()
            .map(|d| match d.best_reference_index {
                Some(_) => Scalar::Number(d.best_score as f64),
                None => Scalar::Empty,
            })
            .collect();
        let best = decisions
            .iter()
            .map(|d| {
                d.best_reference_index
                    .and_then(|j| reference_values.get(j))
                    .cloned()
                    .unwrap_or(Scalar::Empty)
            })
            .collect();
        report.set_column(SCORE_COLUMN, scores);
        report.set_column(MATCH_COLUMN, best);
    }

    Ok(report)
}
