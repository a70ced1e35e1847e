use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::{parse_metadata, MetadataExtractor};
use crate::config::ExtractorConfig;
use crate::error::ExtractionError;
use crate::model::IssueMetadata;

const REQUIRED_FIELDS: [&str; 7] = [
    "official_title",
    "magazine_edition",
    "magazine_section",
    "rpg_system",
    "content_type",
    "summary",
    "filename_slug",
];

/// Extraction client for the Gemini `generateContent` REST endpoint.
#[derive(Debug, Clone)]
pub struct GeminiExtractor {
    http_client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

impl GeminiExtractor {
    pub fn new(config: &ExtractorConfig, api_key: impl Into<String>) -> Result<Self, ExtractionError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http_client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: api_key.into(),
        })
    }

    fn request_body(document: &[u8], file_name: &str) -> Value {
        let properties: serde_json::Map<String, Value> = REQUIRED_FIELDS
            .iter()
            .map(|field| (field.to_string(), json!({ "type": "STRING" })))
            .collect();

        json!({
            "contents": [{
                "parts": [
                    { "inline_data": { "mime_type": "application/pdf", "data": BASE64.encode(document) } },
                    { "text": prompt(file_name) }
                ]
            }],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": {
                    "type": "OBJECT",
                    "properties": properties,
                    "required": REQUIRED_FIELDS,
                }
            }
        })
    }
}

fn prompt(file_name: &str) -> String {
    format!(
        "You are the archivist of the Dragao Brasil (DB) magazine. Analyze the attached PDF \
         (original file: \"{}\") and return ONLY a JSON object with: magazine_edition (issue \
         number digits only), magazine_section (the recurring column), rpg_system, content_type \
         (Adventure, Rules, Setting, Story, Stat Block, Item, Bestiary, Tips, News, Review or \
         Comic), official_title, filename_slug (title and system joined with underscores, e.g. \
         T20_Novos_Talentos) and summary (at most 150 characters).",
        file_name
    )
}

/// Map a non-success HTTP status onto the extraction error taxonomy.
fn classify_status(status: StatusCode, body: String) -> ExtractionError {
    match status {
        StatusCode::TOO_MANY_REQUESTS => ExtractionError::RateLimited,
        StatusCode::NOT_FOUND => ExtractionError::ModelUnavailable,
        _ if body.contains("SAFETY") => ExtractionError::Blocked,
        _ => ExtractionError::Status {
            code: status.as_u16(),
            body,
        },
    }
}

fn response_text(response: GenerateResponse) -> Result<String, ExtractionError> {
    if let Some(reason) = response.prompt_feedback.and_then(|f| f.block_reason) {
        warn!("Prompt blocked by the service: {}", reason);
        return Err(ExtractionError::Blocked);
    }

    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or(ExtractionError::EmptyResponse)?;

    if candidate.finish_reason.as_deref() == Some("SAFETY") {
        return Err(ExtractionError::Blocked);
    }

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(ExtractionError::EmptyResponse);
    }
    Ok(text)
}

#[async_trait]
impl MetadataExtractor for GeminiExtractor {
    async fn analyze(
        &self,
        document: &[u8],
        file_name: &str,
    ) -> Result<IssueMetadata, ExtractionError> {
        let url = format!("{}/models/{}:generateContent", self.endpoint, self.model);
        debug!("Requesting metadata for {} ({} bytes)", file_name, document.len());

        let response = self
            .http_client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&Self::request_body(document, file_name))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, body));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| ExtractionError::Malformed(e.to_string()))?;
        let text = response_text(parsed)?;

        parse_metadata(&text).inspect_err(|e| {
            warn!("Could not parse metadata for {}: {}. Raw text: {}", file_name, e, text);
        })
    }
}
