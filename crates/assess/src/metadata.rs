use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub const NOT_SPECIFIED: &str = "Not specified";

/// Form defaults that mean "nothing entered yet".
const PLACEHOLDERS: &[&str] = &[
    "select employment status",
    "select property type",
    "type information here",
];

/// Client details shown to the model next to the document summaries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientMetadata {
    pub loan_amount: Option<u64>,
    pub deposit_amount: Option<u64>,
    pub employment_status: Option<String>,
    pub current_role: Option<String>,
    pub company: Option<String>,
    pub property_type: Option<String>,
}

impl ClientMetadata {
    /// JSON object with every unset or placeholder value replaced by
    /// `"Not specified"`.
    pub fn normalized(&self) -> Value {
        json!({
            "loanAmount": amount(self.loan_amount),
            "depositAmount": amount(self.deposit_amount),
            "employmentStatus": text(self.employment_status.as_deref()),
            "currentRole": text(self.current_role.as_deref()),
            "company": text(self.company.as_deref()),
            "propertyType": text(self.property_type.as_deref()),
        })
    }
}

pub fn is_placeholder(value: &str) -> bool {
    let trimmed = value.trim();
    trimmed.is_empty()
        || PLACEHOLDERS
            .iter()
            .any(|placeholder| trimmed.eq_ignore_ascii_case(placeholder))
}

fn text(value: Option<&str>) -> Value {
    match value {
        Some(v) if !is_placeholder(v) => Value::String(v.trim().to_string()),
        _ => Value::String(NOT_SPECIFIED.to_string()),
    }
}

fn amount(value: Option<u64>) -> Value {
    match value {
        Some(v) => json!(v),
        None => Value::String(NOT_SPECIFIED.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_employment_placeholder() {
        let metadata = ClientMetadata {
            employment_status: Some("Select employment status".into()),
            ..Default::default()
        };
        assert_eq!(metadata.normalized()["employmentStatus"], NOT_SPECIFIED);
    }

    #[test]
    fn test_real_values_pass_through() {
        let metadata = ClientMetadata {
            loan_amount: Some(350000),
            deposit_amount: Some(50000),
            employment_status: Some("Employed (PAYE)".into()),
            current_role: Some(" Nurse ".into()),
            company: Some("NHS Trust".into()),
            property_type: Some("First-time buyer".into()),
        };

        let value = metadata.normalized();

        assert_eq!(value["loanAmount"], 350000);
        assert_eq!(value["currentRole"], "Nurse");
        assert_eq!(value["propertyType"], "First-time buyer");
    }

    #[test]
    fn test_unset_and_blank_values() {
        let metadata = ClientMetadata {
            company: Some("   ".into()),
            current_role: Some("TYPE INFORMATION HERE".into()),
            property_type: Some("Select property type".into()),
            ..Default::default()
        };

        let value = metadata.normalized();

        for key in ["loanAmount", "depositAmount", "employmentStatus", "currentRole", "company", "propertyType"] {
            assert_eq!(value[key], NOT_SPECIFIED, "{key}");
        }
    }
}
