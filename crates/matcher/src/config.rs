use serde::{Deserialize, Serialize};

use crate::annotate::Labels;
use crate::blocking::Blocking;
use crate::error::MatchError;
use crate::key::Normalization;
use crate::metric::{Metric, Threshold};

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// A complete, reproducible lookup run: which column of which file is looked
/// up in which other file, how keys are normalized and scored, and where the
/// annotated target goes.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LookupConfig {
    #[serde(default)]
    pub name: String,
    /// Dataset whose records get annotated.
    pub target: SourceConfig,
    /// Dataset the target keys are looked up in.
    pub reference: SourceConfig,
    pub matching: MatchingConfig,
    #[serde(default)]
    pub normalization: Normalization,
    #[serde(default)]
    pub output: OutputConfig,
}

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SourceConfig {
    pub file: String,
    /// Header name (case-insensitive), column letter, or 1-indexed number.
    pub key_column: String,
    /// 1-indexed row holding the headers; rows above it are skipped.
    #[serde(default = "default_header_row")]
    pub header_row: usize,
    #[serde(default)]
    pub sheet: Option<String>,
}

fn default_header_row() -> usize {
    1
}

// ---------------------------------------------------------------------------
// Matching
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MatchingConfig {
    #[serde(default = "default_metric")]
    pub metric: String,
    /// Required: there is no implicit threshold.
    pub threshold: i64,
    #[serde(default)]
    pub blocking: Blocking,
}

fn default_metric() -> String {
    Metric::Levenshtein.name().into()
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default = "default_label_column")]
    pub label_column: String,
    #[serde(default = "default_matched_label")]
    pub matched_label: String,
    #[serde(default = "default_unmatched_label")]
    pub unmatched_label: String,
    /// Add best score / best match columns next to the label.
    #[serde(default)]
    pub include_scores: bool,
    /// Unmatched rows scoring at or above this are counted as near misses.
    #[serde(default)]
    pub review_floor: Option<i64>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            file: None,
            label_column: default_label_column(),
            matched_label: default_matched_label(),
            unmatched_label: default_unmatched_label(),
            include_scores: false,
            review_floor: None,
        }
    }
}

fn default_label_column() -> String {
    "On Scan".into()
}

fn default_matched_label() -> String {
    Labels::default().matched
}

fn default_unmatched_label() -> String {
    Labels::default().unmatched
}

impl OutputConfig {
    pub fn labels(&self) -> Labels {
        Labels {
            matched: self.matched_label.clone(),
            unmatched: self.unmatched_label.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl LookupConfig {
    pub fn from_toml(input: &str) -> Result<Self, MatchError> {
        let config: LookupConfig =
            toml::from_str(input).map_err(|e| MatchError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, MatchError> {
        toml::to_string_pretty(self).map_err(|e| MatchError::ConfigParse(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), MatchError> {
        for (side, source) in [("target", &self.target), ("reference", &self.reference)] {
            if source.file.trim().is_empty() {
                return Err(MatchError::Configuration(format!("{side}: file is empty")));
            }
            if source.key_column.trim().is_empty() {
                return Err(MatchError::Configuration(format!("{side}: key_column is empty")));
            }
            if source.header_row == 0 {
                return Err(MatchError::Configuration(format!(
                    "{side}: header_row is 1-indexed, got 0"
                )));
            }
        }

        let policy = &self.normalization;
        if !policy.trim && policy.collapse_whitespace {
            return Err(MatchError::Configuration(
                "normalization: trim = false needs collapse_whitespace = false (collapsing trims)".into(),
            ));
        }

        self.metric()?;
        self.threshold()?;
        self.review_floor()?;

        let out = &self.output;
        if out.label_column.trim().is_empty() {
            return Err(MatchError::Configuration("output: label_column is empty".into()));
        }
        if out.matched_label == out.unmatched_label {
            return Err(MatchError::Configuration(format!(
                "output: matched_label and unmatched_label are both {:?}",
                out.matched_label
            )));
        }

        Ok(())
    }

    pub fn metric(&self) -> Result<Metric, MatchError> {
        self.matching.metric.parse()
    }

    pub fn threshold(&self) -> Result<Threshold, MatchError> {
        Threshold::new(self.matching.threshold)
    }

    pub fn review_floor(&self) -> Result<Option<u8>, MatchError> {
        match self.output.review_floor {
            None => Ok(None),
            Some(floor) => Threshold::new(floor).map(|t| Some(t.value())).map_err(|_| {
                MatchError::Configuration(format!(
                    "output: review_floor must be between 0 and 100, got {floor}"
                ))
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::CaseFold;

    const MINIMAL: &str = r#"
[target]
file = "weekly.xlsx"
key_column = "number"

[reference]
file = "scan.xlsx"
key_column = "matched_job"

[matching]
threshold = 90
"#;

    #[test]
    fn parse_minimal_applies_defaults() {
        let config = LookupConfig::from_toml(MINIMAL).unwrap();
        assert_eq!(config.name, "");
        assert_eq!(config.target.header_row, 1);
        assert_eq!(config.target.sheet, None);
        assert_eq!(config.metric().unwrap(), Metric::Levenshtein);
        assert_eq!(config.threshold().unwrap().value(), 90);
        assert_eq!(config.matching.blocking, Blocking::None);
        assert_eq!(config.normalization, Normalization::default());
        assert_eq!(config.output.label_column, "On Scan");
        assert_eq!(config.output.labels(), Labels::default());
        assert_eq!(config.review_floor().unwrap(), None);
    }

    #[test]
    fn parse_full() {
        let input = r#"
name = "Weekly scan"

[target]
file = "weekly.xlsx"
header_row = 3
key_column = "B"
sheet = "Jobs"

[reference]
file = "scan.csv"
key_column = "2"

[matching]
metric = "token_sort"
threshold = 85
blocking = "length"

[normalization]
trim = true
case = "preserve"
collapse_whitespace = false
allow_empty = true

[output]
file = "report.xlsx"
label_column = "Present"
matched_label = "Y"
unmatched_label = "N"
include_scores = true
review_floor = 70
"#;
        let config = LookupConfig::from_toml(input).unwrap();
        assert_eq!(config.name, "Weekly scan");
        assert_eq!(config.target.header_row, 3);
        assert_eq!(config.target.sheet.as_deref(), Some("Jobs"));
        assert_eq!(config.metric().unwrap(), Metric::TokenSort);
        assert_eq!(config.matching.blocking, Blocking::Length);
        assert_eq!(config.normalization.case, CaseFold::Preserve);
        assert!(!config.normalization.collapse_whitespace);
        assert!(config.normalization.allow_empty);
        assert_eq!(config.output.file.as_deref(), Some("report.xlsx"));
        assert!(config.output.include_scores);
        assert_eq!(config.review_floor().unwrap(), Some(70));
    }

    #[test]
    fn missing_threshold_is_a_parse_error() {
        let input = MINIMAL.replace("threshold = 90", "");
        let err = LookupConfig::from_toml(&input).unwrap_err();
        assert!(matches!(err, MatchError::ConfigParse(_)));
        assert!(err.to_string().contains("threshold"));
    }

    #[test]
    fn reject_threshold_out_of_range() {
        let input = MINIMAL.replace("threshold = 90", "threshold = 101");
        let err = LookupConfig::from_toml(&input).unwrap_err();
        assert_eq!(err, MatchError::ThresholdOutOfRange(101));

        let input = MINIMAL.replace("threshold = 90", "threshold = -5");
        assert_eq!(
            LookupConfig::from_toml(&input).unwrap_err(),
            MatchError::ThresholdOutOfRange(-5)
        );
    }

    #[test]
    fn reject_unknown_metric() {
        let input = MINIMAL.replace("threshold = 90", "threshold = 90\nmetric = \"soundex\"");
        let err = LookupConfig::from_toml(&input).unwrap_err();
        assert_eq!(err, MatchError::UnknownMetric("soundex".into()));
        assert!(err.is_configuration());
    }

    #[test]
    fn reject_unknown_blocking() {
        let input = MINIMAL.replace("threshold = 90", "threshold = 90\nblocking = \"phonetic\"");
        assert!(matches!(
            LookupConfig::from_toml(&input).unwrap_err(),
            MatchError::ConfigParse(_)
        ));
    }

    #[test]
    fn reject_zero_header_row() {
        let input = MINIMAL.replace("key_column = \"number\"", "key_column = \"number\"\nheader_row = 0");
        let err = LookupConfig::from_toml(&input).unwrap_err();
        assert!(err.to_string().contains("target: header_row"));
    }

    #[test]
    fn reject_empty_key_column() {
        let input = MINIMAL.replace("\"matched_job\"", "\"  \"");
        let err = LookupConfig::from_toml(&input).unwrap_err();
        assert!(err.to_string().contains("reference: key_column is empty"));
    }

    #[test]
    fn reject_identical_labels() {
        let input = format!("{MINIMAL}\n[output]\nmatched_label = \"X\"\nunmatched_label = \"X\"\n");
        let err = LookupConfig::from_toml(&input).unwrap_err();
        assert!(err.to_string().contains("both \"X\""));
    }

    #[test]
    fn reject_untrimmed_collapse() {
        let input = format!("{MINIMAL}\n[normalization]\ntrim = false\n");
        let err = LookupConfig::from_toml(&input).unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("collapse_whitespace = false"));

        let input = format!("{MINIMAL}\n[normalization]\ntrim = false\ncollapse_whitespace = false\n");
        let config = LookupConfig::from_toml(&input).unwrap();
        assert_eq!(config.normalization.apply("  a  b "), "  a  b ");
    }

    #[test]
    fn reject_review_floor_out_of_range() {
        let input = format!("{MINIMAL}\n[output]\nreview_floor = 150\n");
        let err = LookupConfig::from_toml(&input).unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("review_floor"));
    }

    #[test]
    fn toml_round_trip_keeps_settings() {
        let config = LookupConfig::from_toml(MINIMAL).unwrap();
        let again = LookupConfig::from_toml(&config.to_toml().unwrap()).unwrap();
        assert_eq!(again.target.key_column, "number");
        assert_eq!(again.matching.threshold, 90);
        assert_eq!(again.normalization, config.normalization);
    }
}
