use std::sync::Arc;

use anyhow::{Context, Result};
use extract::{prompt, ChatMessage, ChatModel, DocumentSummary, RiskFinding, RiskStatus};

use crate::metadata::ClientMetadata;

pub struct CrossDocumentAggregator {
    model: Arc<dyn ChatModel>,
}

impl CrossDocumentAggregator {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }

    /// Final risk assessment over every document summary plus client details.
    ///
    /// Only a failed model call is an `Err`. A reply that yields no findings
    /// becomes a single advisory finding, so the result is never empty.
    pub async fn aggregate(
        &self,
        summaries: &[DocumentSummary],
        metadata: &ClientMetadata,
    ) -> Result<Vec<RiskFinding>> {
        let document_analysis =
            serde_json::to_string(summaries).context("Failed to serialize document summaries")?;
        let client_data = metadata.normalized().to_string();
        let prompt = prompt::build_overall_analysis_prompt(&document_analysis, &client_data);

        let messages = [
            ChatMessage::system(prompt::OVERALL_ANALYSIS_SYSTEM_PROMPT),
            ChatMessage::user(prompt),
        ];

        let raw = self
            .model
            .chat(&messages)
            .await
            .context("Failed to run cross-document analysis")?;

        let extraction = extract::extract_json(&raw);
        tracing::debug!(step = extraction.step(), "Parsed cross-document reply");

        let findings = extract::findings_from_value(&extraction.into_value());
        if findings.is_empty() {
            tracing::warn!(
                documents = summaries.len(),
                "Cross-document reply had no usable findings, substituting advisory"
            );
            return Ok(vec![unstructured_reply_finding()]);
        }

        tracing::info!(
            documents = summaries.len(),
            findings = findings.len(),
            "Cross-document analysis complete"
        );
        Ok(findings)
    }
}

fn unstructured_reply_finding() -> RiskFinding {
    RiskFinding::new(
        "Analysis Completed",
        RiskStatus::Medium,
        "The analysis ran, but the model's response could not be structured into risk \
         findings. Review the documents manually or run the analysis again.",
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use extract::testing::ScriptedModel;
    use crate::metadata::NOT_SPECIFIED;

    #[tokio::test]
    async fn test_findings_from_array_reply() {
        let model = Arc::new(ScriptedModel::queued([
            r#"Here you go:
            [{"title": "Affordability", "risk_status": "High", "explanation": "Loan is 6x income"},
             {"title": "Deposit", "risk_status": "Low", "explanation": "15% deposit"}]"#,
        ]));
        let aggregator = CrossDocumentAggregator::new(model.clone());

        let findings = aggregator
            .aggregate(&[DocumentSummary::default()], &ClientMetadata::default())
            .await
            .unwrap();

        assert_eq!(findings.len(), 2);
        assert_eq!(findings[0].risk_status, RiskStatus::High);
        let request = &model.requests()[0];
        assert_eq!(request[0].content, prompt::OVERALL_ANALYSIS_SYSTEM_PROMPT);
    }

    #[tokio::test]
    async fn test_empty_input_still_yields_finding() {
        let model = Arc::new(ScriptedModel::queued(["[]"]));
        let aggregator = CrossDocumentAggregator::new(model);
        let metadata = ClientMetadata {
            employment_status: Some("Select employment status".into()),
            property_type: Some("Select property type".into()),
            ..Default::default()
        };

        let findings = aggregator.aggregate(&[], &metadata).await.unwrap();

        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].title, "Analysis Completed");
        assert_eq!(findings[0].risk_status, RiskStatus::Medium);
    }

    #[tokio::test]
    async fn test_object_reply_is_not_accepted() {
        let model = Arc::new(ScriptedModel::queued([r#"{"verdict": "fine"}"#]));
        let aggregator = CrossDocumentAggregator::new(model);

        let findings = aggregator.aggregate(&[], &ClientMetadata::default()).await.unwrap();

        assert_eq!(findings, vec![unstructured_reply_finding()]);
    }

    #[tokio::test]
    async fn test_placeholder_never_reaches_prompt() {
        let model = Arc::new(ScriptedModel::queued(["[]"]));
        let aggregator = CrossDocumentAggregator::new(model.clone());
        let metadata = ClientMetadata {
            employment_status: Some("Select employment status".into()),
            ..Default::default()
        };

        aggregator.aggregate(&[], &metadata).await.unwrap();

        let prompt = &model.prompts()[0];
        assert!(!prompt.contains("Select employment status"));
        assert!(prompt.contains(&format!("\"employmentStatus\":\"{NOT_SPECIFIED}\"")));
    }

    #[tokio::test]
    async fn test_model_failure_is_error() {
        let model = Arc::new(ScriptedModel::queued(Vec::<String>::new()));
        model.push_error("timeout");
        let aggregator = CrossDocumentAggregator::new(model);

        assert!(aggregator.aggregate(&[], &ClientMetadata::default()).await.is_err());
    }
}
