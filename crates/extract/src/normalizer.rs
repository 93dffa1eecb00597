use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::schema::{DocumentSummary, RiskFinding, RiskStatus};

static SEPARATORS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z]+").expect("separator pattern is valid"));

/// Map free-form model text onto the four risk levels.
pub fn parse_risk_status(raw: &str) -> RiskStatus {
    let lowered = raw.to_lowercase();
    let normalized = SEPARATORS.replace_all(&lowered, " ");
    let normalized = normalized.trim();
    let normalized = normalized.strip_suffix(" risk").unwrap_or(normalized);

    match normalized {
        "low" => RiskStatus::Low,
        "medium" | "moderate" | "med" => RiskStatus::Medium,
        "high" => RiskStatus::High,
        _ => RiskStatus::InsufficientInformation,
    }
}

/// Coerce one JSON value into a finding. Non-objects and objects carrying
/// neither a title nor an explanation are dropped.
pub fn finding_from_value(value: &Value) -> Option<RiskFinding> {
    let object = value.as_object()?;

    let title = text_field(object.get("title"));
    let explanation = text_field(object.get("explanation"));
    if title.is_empty() && explanation.is_empty() {
        return None;
    }

    let risk_status = match object.get("risk_status") {
        Some(Value::String(s)) => parse_risk_status(s),
        _ => RiskStatus::InsufficientInformation,
    };

    Some(RiskFinding {
        title: if title.is_empty() { "Untitled finding".to_string() } else { title },
        risk_status,
        explanation,
    })
}

/// Findings from a JSON array; anything else yields none.
pub fn findings_from_value(value: &Value) -> Vec<RiskFinding> {
    value
        .as_array()
        .map(|items| items.iter().filter_map(finding_from_value).collect())
        .unwrap_or_default()
}

/// Interpret a parsed model reply as a document summary.
///
/// A reply without an `analysis` key keeps the raw reply in `notes` so
/// nothing the model said is lost.
pub fn summary_from_value(value: &Value, raw: &str) -> DocumentSummary {
    let Some(analysis) = value.as_object().and_then(|o| o.get("analysis")) else {
        return DocumentSummary {
            analysis: Vec::new(),
            notes: Some(raw.to_string()),
        };
    };

    let notes = match value.get("notes") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) if s.trim().is_empty() => None,
        other => Some(text_field(other)),
    };

    DocumentSummary {
        analysis: findings_from_value(analysis),
        notes,
    }
}

fn text_field(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_variants() {
        assert_eq!(parse_risk_status("Low"), RiskStatus::Low);
        assert_eq!(parse_risk_status(" HIGH risk "), RiskStatus::High);
        assert_eq!(parse_risk_status("moderate"), RiskStatus::Medium);
        assert_eq!(parse_risk_status("insufficient_information"), RiskStatus::InsufficientInformation);
        assert_eq!(parse_risk_status("looks ok to me"), RiskStatus::InsufficientInformation);
        assert_eq!(parse_risk_status(""), RiskStatus::InsufficientInformation);
    }

    #[test]
    fn test_findings_drop_junk_entries() {
        let value = json!([
            {"title": "Deposit source", "risk_status": "Medium", "explanation": "Gifted deposit"},
            "stray string",
            {"unrelated": true},
            {"title": "Overdraft", "risk_status": 3, "explanation": "Used monthly"}
        ]);

        let findings = findings_from_value(&value);

        assert_eq!(findings.len(), 2);
        assert_eq!(findings[0].risk_status, RiskStatus::Medium);
        assert_eq!(findings[1].risk_status, RiskStatus::InsufficientInformation);
    }

    #[test]
    fn test_summary_missing_analysis_keeps_raw() {
        let value = json!({"summary": "payslip looks fine"});
        let summary = summary_from_value(&value, "{\"summary\": \"payslip looks fine\"}");

        assert!(summary.analysis.is_empty());
        assert_eq!(summary.notes.as_deref(), Some("{\"summary\": \"payslip looks fine\"}"));
    }

    #[test]
    fn test_summary_with_analysis_and_notes() {
        let value = json!({
            "analysis": [{"title": "Income", "risk_status": "Low", "explanation": "PAYE salary"}],
            "notes": "Two payslips provided"
        });

        let summary = summary_from_value(&value, "");

        assert_eq!(summary.analysis.len(), 1);
        assert_eq!(summary.notes.as_deref(), Some("Two payslips provided"));
    }

    #[test]
    fn test_array_reply_is_not_a_summary() {
        let value = json!([{"title": "Income", "risk_status": "Low", "explanation": "ok"}]);
        let summary = summary_from_value(&value, "raw");
        assert!(summary.analysis.is_empty());
        assert_eq!(summary.notes.as_deref(), Some("raw"));
    }
}
