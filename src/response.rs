use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{SignSenseError, SignSenseResult};
use crate::report::AnalysisReport;

/// Extracted text beyond this many characters is not sent for analysis.
pub const ANALYSIS_CHAR_BUDGET: usize = 15_000;

const ANALYSIS_INSTRUCTIONS: &str = "You are a contract analyst. Read the contract below and reply with a single JSON object \
and nothing else, using exactly these keys:
{
  \"title\": string,
  \"summary\": [string],
  \"scores\": {
    \"risk\": number, \"clarity\": number, \"professionalism\": number,
    \"favorability\": number, \"deadlinePressure\": number,
    \"confidenceToSign\": number, \"overallScore\": number
  },
  \"clauses\": [string],
  \"issues\": [string],
  \"suggestions\": [string]
}
All scores are integers from 0 to 100. Higher risk and deadlinePressure are worse; higher values are better for every other score.";

pub fn build_analysis_prompt(text: &str) -> String {
    let truncated = match text.char_indices().nth(ANALYSIS_CHAR_BUDGET) {
        Some((cut, _)) => {
            tracing::debug!(budget = ANALYSIS_CHAR_BUDGET, "contract text truncated for analysis");
            &text[..cut]
        }
        None => text,
    };
    format!("{ANALYSIS_INSTRUCTIONS}\n\nContract:\n\"\"\"\n{truncated}\n\"\"\"")
}

/// The JSON object embedded in model output: from the first `{` to the last `}`.
pub fn extract_json_object(raw: &str) -> SignSenseResult<Value> {
    let (Some(start), Some(end)) = (raw.find('{'), raw.rfind('}')) else {
        return Err(SignSenseError::parse("response contains no json object", raw));
    };
    if end < start {
        return Err(SignSenseError::parse("response contains no json object", raw));
    }
    serde_json::from_str(&raw[start..=end])
        .map_err(|err| SignSenseError::parse(format!("malformed json in response: {err}"), raw))
}

pub fn parse_analysis_response(raw: &str) -> SignSenseResult<AnalysisReport> {
    let value = extract_json_object(raw)?;
    AnalysisReport::from_json_value(&value)
}

/// Maps a non-success status to `UpstreamService`. The body is logged, never returned.
pub fn check_upstream_status(status: u16, body: &str) -> SignSenseResult<()> {
    if (200..300).contains(&status) {
        return Ok(());
    }
    tracing::error!(status, body, "upstream service call failed");
    Err(SignSenseError::upstream(
        status,
        "the analysis service could not complete the request",
    ))
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TranslatableText {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub summary: Vec<String>,
    #[serde(default)]
    pub clauses: Vec<String>,
    #[serde(default)]
    pub issues: Vec<String>,
    #[serde(default)]
    pub suggestions: Vec<String>,
}

impl From<&AnalysisReport> for TranslatableText {
    fn from(report: &AnalysisReport) -> Self {
        Self {
            title: report.title.clone(),
            summary: report.summary.clone(),
            clauses: report.clauses.clone(),
            issues: report.issues.clone(),
            suggestions: report.suggestions.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslationRequest {
    pub source_lang: String,
    pub target_lang: String,
    pub payload: TranslatableText,
}

impl TranslationRequest {
    pub fn new(
        report: &AnalysisReport,
        source_lang: &str,
        target_lang: &str,
    ) -> SignSenseResult<Self> {
        let (source_lang, target_lang) = (source_lang.trim(), target_lang.trim());
        if source_lang.is_empty() || target_lang.is_empty() {
            return Err(SignSenseError::input_validation(
                "source and target language codes are required",
            ));
        }
        Ok(Self {
            source_lang: source_lang.to_string(),
            target_lang: target_lang.to_string(),
            payload: TranslatableText::from(report),
        })
    }
}

/// Merges a translated payload into the original report. Every list must keep its
/// length; scores always come from the original.
pub fn apply_translation(original: &AnalysisReport, raw: &str) -> SignSenseResult<AnalysisReport> {
    let value = extract_json_object(raw)?;
    let translated: TranslatableText = serde_json::from_value(value)
        .map_err(|err| SignSenseError::parse(format!("translation has the wrong shape: {err}"), raw))?;

    let checks = [
        ("summary", original.summary.len(), translated.summary.len()),
        ("clauses", original.clauses.len(), translated.clauses.len()),
        ("issues", original.issues.len(), translated.issues.len()),
        ("suggestions", original.suggestions.len(), translated.suggestions.len()),
    ];
    for (field, expected, got) in checks {
        if expected != got {
            tracing::error!(field, expected, got, "translation changed list length");
            return Err(SignSenseError::upstream(
                502,
                format!("translation returned {got} {field} entries, expected {expected}"),
            ));
        }
    }

    let title = if translated.title.trim().is_empty() {
        original.title.clone()
    } else {
        translated.title
    };
    Ok(AnalysisReport {
        title,
        summary: translated.summary,
        scores: original.scores.clone(),
        clauses: translated.clauses,
        issues: translated.issues,
        suggestions: translated.suggestions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{Metric, Scores};

    fn report() -> AnalysisReport {
        AnalysisReport {
            title: "Lease Agreement".to_string(),
            summary: vec!["A lease.".to_string()],
            scores: Scores::default().with(Metric::Risk, 75.0),
            clauses: vec!["Clause A".to_string()],
            issues: Vec::new(),
            suggestions: vec!["Add a termination clause".to_string()],
        }
    }

    #[test]
    fn prompt_truncates_on_char_boundary() {
        let long = "\u{e9}".repeat(ANALYSIS_CHAR_BUDGET + 10);
        let prompt = build_analysis_prompt(&long);
        assert_eq!(prompt.matches('\u{e9}').count(), ANALYSIS_CHAR_BUDGET);
        assert!(prompt.starts_with(ANALYSIS_INSTRUCTIONS));

        let short = build_analysis_prompt("Tenant pays rent.");
        assert!(short.contains("Tenant pays rent."));
    }

    #[test]
    fn analysis_response_tolerates_surrounding_text() {
        let raw = "Sure! Here is the analysis:\n```json\n{\"title\":\"Lease\",\"scores\":{\"risk\":\"80\"},\"clauses\":[\"Clause A\"]}\n```\nLet me know.";
        let parsed = parse_analysis_response(raw).expect("parsed");
        assert_eq!(parsed.title, "Lease");
        assert_eq!(parsed.score(Metric::Risk), 80.0);
        assert_eq!(parsed.clauses, vec!["Clause A".to_string()]);
    }

    #[test]
    fn malformed_response_keeps_raw_text() {
        let err = parse_analysis_response("no json here").expect_err("no object");
        assert_eq!(err.raw_text(), Some("no json here"));
        let err = parse_analysis_response("} backwards {").expect_err("reversed");
        assert!(matches!(err, SignSenseError::Parse { .. }));
        let err = parse_analysis_response("{\"title\": }").expect_err("broken");
        assert_eq!(err.raw_text(), Some("{\"title\": }"));
    }

    #[test]
    fn non_success_status_is_generic() {
        assert!(check_upstream_status(200, "ok").is_ok());
        let err = check_upstream_status(503, "secret upstream detail").expect_err("503");
        assert!(matches!(err, SignSenseError::UpstreamService { status: 503, .. }));
        assert!(!err.to_string().contains("secret"));
    }

    #[test]
    fn translation_preserves_scores_and_shape() {
        let original = report();
        let request = TranslationRequest::new(&original, "en", "es").expect("request");
        let json = serde_json::to_value(&request).expect("json");
        assert_eq!(json["targetLang"], "es");
        assert!(json["payload"].get("scores").is_none());

        let raw = r#"{"title":"Contrato de arrendamiento","summary":["Un arrendamiento."],"clauses":["Cláusula A"],"issues":[],"suggestions":["Añadir una cláusula de rescisión"]}"#;
        let translated = apply_translation(&original, raw).expect("translated");
        assert_eq!(translated.title, "Contrato de arrendamiento");
        assert_eq!(translated.scores, original.scores);
        assert_eq!(translated.clauses, vec!["Cláusula A".to_string()]);
    }

    #[test]
    fn translation_that_drops_items_is_an_upstream_error() {
        let raw = r#"{"title":"X","summary":["a"],"clauses":[],"issues":[],"suggestions":["b"]}"#;
        let err = apply_translation(&report(), raw).expect_err("clauses dropped");
        assert!(matches!(err, SignSenseError::UpstreamService { status: 502, .. }));
        assert!(TranslationRequest::new(&report(), "en", " ").is_err());
    }
}
