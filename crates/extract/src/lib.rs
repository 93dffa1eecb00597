pub mod json;
pub mod llm;
pub mod normalizer;
pub mod prompt;
pub mod schema;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use json::{extract_json, extract_json_as, Extraction, Shape};
pub use llm::{ChatMessage, ChatModel, ChatRole, OllamaClient};
pub use normalizer::{findings_from_value, parse_risk_status, summary_from_value};
pub use schema::{DocumentSummary, RiskFinding, RiskStatus};
