use serde::{Deserialize, Serialize};

/// Risk level of a finding. Deserialization never fails: anything that is not
/// one of the three levels becomes `InsufficientInformation`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String")]
pub enum RiskStatus {
    Low,
    Medium,
    High,
    #[serde(rename = "Insufficient Information")]
    InsufficientInformation,
}

impl RiskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskStatus::Low => "Low",
            RiskStatus::Medium => "Medium",
            RiskStatus::High => "High",
            RiskStatus::InsufficientInformation => "Insufficient Information",
        }
    }
}

impl From<String> for RiskStatus {
    fn from(value: String) -> Self {
        crate::normalizer::parse_risk_status(&value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskFinding {
    pub title: String,
    pub risk_status: RiskStatus,
    pub explanation: String,
}

impl RiskFinding {
    pub fn new(title: impl Into<String>, risk_status: RiskStatus, explanation: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            risk_status,
            explanation: explanation.into(),
        }
    }
}

/// Findings for one document (or one chunk of it).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub analysis: Vec<RiskFinding>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serializes_with_spaces() {
        let json = serde_json::to_string(&RiskStatus::InsufficientInformation).unwrap();
        assert_eq!(json, "\"Insufficient Information\"");
    }

    #[test]
    fn test_unknown_status_is_coerced() {
        let finding: RiskFinding = serde_json::from_str(
            r#"{"title": "Credit file", "risk_status": "Probably fine", "explanation": "n/a"}"#,
        )
        .unwrap();
        assert_eq!(finding.risk_status, RiskStatus::InsufficientInformation);
    }

    #[test]
    fn test_summary_without_notes_omits_field() {
        let summary = DocumentSummary {
            analysis: vec![RiskFinding::new("Income", RiskStatus::Low, "Stable salary")],
            notes: None,
        };
        let value = serde_json::to_value(&summary).unwrap();
        assert!(value.get("notes").is_none());
        assert_eq!(value["analysis"][0]["risk_status"], "Low");
    }
}
