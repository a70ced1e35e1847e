pub mod gemini;

use async_trait::async_trait;

use crate::error::ExtractionError;
use crate::model::IssueMetadata;

pub use gemini::GeminiExtractor;

/// External service that turns a document into bibliographic metadata.
#[async_trait]
pub trait MetadataExtractor: Send + Sync {
    async fn analyze(
        &self,
        document: &[u8],
        file_name: &str,
    ) -> Result<IssueMetadata, ExtractionError>;
}

/// Parse the service's text answer, tolerating markdown code fences around
/// the JSON body. Every metadata field is required.
pub fn parse_metadata(text: &str) -> Result<IssueMetadata, ExtractionError> {
    let cleaned = strip_fences(text);
    if cleaned.is_empty() {
        return Err(ExtractionError::EmptyResponse);
    }
    serde_json::from_str(&cleaned).map_err(|e| ExtractionError::Malformed(e.to_string()))
}

fn strip_fences(text: &str) -> String {
    text.replace("```json", "")
        .replace("```", "")
        .trim()
        .to_string()
}
