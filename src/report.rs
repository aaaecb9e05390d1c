use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::error::{SignSenseError, SignSenseResult};
use crate::types::Color;

/// The scored dimensions of a contract analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Metric {
    Risk,
    Clarity,
    Professionalism,
    Favorability,
    DeadlinePressure,
    ConfidenceToSign,
    OverallScore,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    HigherIsRiskier,
    HigherIsSafer,
}

impl Metric {
    pub const ALL: [Metric; 7] = [
        Metric::Risk,
        Metric::Clarity,
        Metric::Professionalism,
        Metric::Favorability,
        Metric::DeadlinePressure,
        Metric::ConfidenceToSign,
        Metric::OverallScore,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Metric::Risk => "risk",
            Metric::Clarity => "clarity",
            Metric::Professionalism => "professionalism",
            Metric::Favorability => "favorability",
            Metric::DeadlinePressure => "deadlinePressure",
            Metric::ConfidenceToSign => "confidenceToSign",
            Metric::OverallScore => "overallScore",
        }
    }

    pub fn from_key(raw: &str) -> Option<Self> {
        let wanted = raw.trim();
        Metric::ALL
            .into_iter()
            .find(|metric| metric.key().eq_ignore_ascii_case(wanted))
    }

    pub fn polarity(self) -> Polarity {
        match self {
            Metric::Risk | Metric::DeadlinePressure => Polarity::HigherIsRiskier,
            Metric::Clarity
            | Metric::Professionalism
            | Metric::Favorability
            | Metric::ConfidenceToSign
            | Metric::OverallScore => Polarity::HigherIsSafer,
        }
    }
}

/// Three-way verdict derived from a metric value. Never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Band {
    Favorable,
    Caution,
    Unfavorable,
}

impl Band {
    pub fn classify(metric: Metric, value: f64) -> Band {
        let value = clamp_score(value);
        // Thresholds are expressed on the risk scale; safer-is-higher metrics are mirrored.
        let risk_equivalent = match metric.polarity() {
            Polarity::HigherIsRiskier => value,
            Polarity::HigherIsSafer => 100.0 - value,
        };
        if risk_equivalent < 30.0 {
            Band::Favorable
        } else if risk_equivalent < 63.0 {
            Band::Caution
        } else {
            Band::Unfavorable
        }
    }

    pub fn color(self) -> Color {
        match self {
            Band::Favorable => Color::rgb8(0x22, 0xC5, 0x5E),
            Band::Caution => Color::rgb8(0xF5, 0x9E, 0x0B),
            Band::Unfavorable => Color::rgb8(0xEF, 0x44, 0x44),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Band::Favorable => "favorable",
            Band::Caution => "caution",
            Band::Unfavorable => "unfavorable",
        }
    }
}

/// Clamps into [0,100]; NaN becomes 0.
pub fn clamp_score(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 100.0)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Scores(BTreeMap<Metric, f64>);

impl Scores {
    pub fn get(&self, metric: Metric) -> f64 {
        self.0.get(&metric).copied().map(clamp_score).unwrap_or(0.0)
    }

    pub fn set(&mut self, metric: Metric, value: f64) {
        self.0.insert(metric, clamp_score(value));
    }

    pub fn with(mut self, metric: Metric, value: f64) -> Self {
        self.set(metric, value);
        self
    }

    pub fn band(&self, metric: Metric) -> Band {
        Band::classify(metric, self.get(metric))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub title: String,
    #[serde(default)]
    pub summary: Vec<String>,
    #[serde(default)]
    pub scores: Scores,
    #[serde(default)]
    pub clauses: Vec<String>,
    #[serde(default)]
    pub issues: Vec<String>,
    #[serde(default)]
    pub suggestions: Vec<String>,
}

impl AnalysisReport {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn from_json_str(raw: &str) -> SignSenseResult<Self> {
        let value: Value = serde_json::from_str(raw)
            .map_err(|err| SignSenseError::parse(format!("invalid analysis json: {err}"), raw))?;
        Self::from_json_value(&value)
    }

    /// Normalizes the loosely-shaped JSON returned upstream.
    ///
    /// Lists may be missing or a single string, scores may be numbers or numeric strings.
    /// Only the `scores` object is read; `meters` and `analysis.bars` are ignored.
    pub fn from_json_value(value: &Value) -> SignSenseResult<Self> {
        let Some(object) = value.as_object() else {
            return Err(SignSenseError::input_validation(
                "analysis payload must be a json object",
            ));
        };

        if object.contains_key("meters")
            || value.pointer("/analysis/bars").is_some_and(|v| !v.is_null())
        {
            tracing::warn!(
                "analysis payload carries legacy `meters`/`analysis.bars` values; only `scores` is used"
            );
        }

        let title = object
            .get("title")
            .and_then(Value::as_str)
            .map(|s| s.trim().to_string())
            .unwrap_or_default();

        let mut scores = Scores::default();
        if let Some(raw_scores) = object.get("scores").and_then(Value::as_object) {
            for (key, raw) in raw_scores {
                let Some(metric) = Metric::from_key(key) else {
                    tracing::debug!(key = key.as_str(), "ignoring unknown score key");
                    continue;
                };
                scores.set(metric, score_from_value(raw));
            }
        }

        Ok(Self {
            title,
            summary: summary_from_value(object.get("summary")),
            scores,
            clauses: strings_from_value(object.get("clauses")),
            issues: strings_from_value(object.get("issues")),
            suggestions: strings_from_value(object.get("suggestions")),
        })
    }

    pub fn score(&self, metric: Metric) -> f64 {
        self.scores.get(metric)
    }

    pub fn band(&self, metric: Metric) -> Band {
        self.scores.band(metric)
    }
}

fn score_from_value(value: &Value) -> f64 {
    let raw = match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s
            .trim()
            .trim_end_matches('%')
            .trim()
            .parse::<f64>()
            .unwrap_or(0.0),
        _ => 0.0,
    };
    clamp_score(raw)
}

fn strings_from_value(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.trim().to_string()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .filter(|s| !s.is_empty())
            .collect(),
        Some(Value::String(s)) if !s.trim().is_empty() => vec![s.trim().to_string()],
        _ => Vec::new(),
    }
}

fn summary_from_value(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::String(s)) => split_sentences(s),
        other => strings_from_value(other),
    }
}

/// Splits a paragraph after `.`, `!` or `?` followed by whitespace.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();
    while let Some(ch) = chars.next() {
        current.push(ch);
        let terminal = matches!(ch, '.' | '!' | '?');
        let at_break = chars.peek().is_none_or(|next| next.is_whitespace());
        if terminal && at_break {
            let sentence = current.trim();
            if !sentence.is_empty() {
                out.push(sentence.to_string());
            }
            current.clear();
        }
    }
    let rest = current.trim();
    if !rest.is_empty() {
        out.push(rest.to_string());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn risk_band_boundaries() {
        assert_eq!(Band::classify(Metric::Risk, 29.0), Band::Favorable);
        assert_eq!(Band::classify(Metric::Risk, 30.0), Band::Caution);
        assert_eq!(Band::classify(Metric::Risk, 62.0), Band::Caution);
        assert_eq!(Band::classify(Metric::Risk, 63.0), Band::Unfavorable);
        assert_eq!(Band::classify(Metric::DeadlinePressure, 75.0), Band::Unfavorable);
    }

    #[test]
    fn safer_metrics_are_mirrored() {
        assert_eq!(Band::classify(Metric::Clarity, 71.0), Band::Favorable);
        assert_eq!(Band::classify(Metric::Clarity, 70.0), Band::Caution);
        assert_eq!(Band::classify(Metric::Clarity, 40.0), Band::Caution);
        assert_eq!(Band::classify(Metric::Clarity, 38.0), Band::Caution);
        assert_eq!(Band::classify(Metric::Clarity, 37.0), Band::Unfavorable);
        assert_eq!(Band::classify(Metric::OverallScore, 55.0), Band::Caution);
    }

    #[test]
    fn classify_clamps_out_of_range_values() {
        assert_eq!(
            Band::classify(Metric::Risk, -40.0),
            Band::classify(Metric::Risk, 0.0)
        );
        assert_eq!(
            Band::classify(Metric::Clarity, 400.0),
            Band::classify(Metric::Clarity, 100.0)
        );
        assert_eq!(Band::classify(Metric::Risk, f64::NAN), Band::Favorable);
    }

    #[test]
    fn missing_scores_default_to_zero() {
        let report = AnalysisReport::from_json_value(&json!({
            "title": "NDA",
            "scores": { "risk": 120, "clarity": "45%", "bogus": 3 }
        }))
        .expect("report");
        assert_eq!(report.score(Metric::Risk), 100.0);
        assert_eq!(report.score(Metric::Clarity), 45.0);
        assert_eq!(report.score(Metric::Favorability), 0.0);
        assert!(report.issues.is_empty());
    }

    #[test]
    fn legacy_meter_paths_are_not_read() {
        let report = AnalysisReport::from_json_value(&json!({
            "title": "Lease",
            "meters": { "favorability": 50 },
            "analysis": { "bars": { "confidenceToSign": 70 } }
        }))
        .expect("report");
        assert_eq!(report.score(Metric::Favorability), 0.0);
        assert_eq!(report.score(Metric::ConfidenceToSign), 0.0);
    }

    #[test]
    fn summary_string_is_split_into_sentences() {
        let report = AnalysisReport::from_json_value(&json!({
            "title": "Lease",
            "summary": "Twelve month term. Rent is due monthly! Is a deposit required? Yes",
            "clauses": "Single clause"
        }))
        .expect("report");
        assert_eq!(
            report.summary,
            vec![
                "Twelve month term.",
                "Rent is due monthly!",
                "Is a deposit required?",
                "Yes"
            ]
        );
        assert_eq!(report.clauses, vec!["Single clause"]);
    }

    #[test]
    fn decimals_inside_sentences_do_not_split() {
        assert_eq!(
            split_sentences("Fee is 2.5 percent. Done."),
            vec!["Fee is 2.5 percent.", "Done."]
        );
    }

    #[test]
    fn non_object_payload_is_rejected() {
        let err = AnalysisReport::from_json_value(&json!(["not", "an", "object"]))
            .expect_err("array payload");
        assert!(matches!(err, SignSenseError::InputValidation(_)));
    }

    #[test]
    fn metric_keys_round_trip() {
        for metric in Metric::ALL {
            assert_eq!(Metric::from_key(metric.key()), Some(metric));
        }
        assert_eq!(Metric::from_key("DEADLINEPRESSURE"), Some(Metric::DeadlinePressure));
    }
}
