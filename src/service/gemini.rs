//! Gemini `generateContent` transport.

use super::{Candidate, ExpandRequest, FinishReason, GenerateContent, ServiceError};
use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose};
use serde::Deserialize;
use serde_json::{Value, json};
use std::time::Duration;

pub const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-image";

#[derive(Clone, Debug)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    pub endpoint: String,
    /// No timeout when `None`; a stalled request blocks its job.
    pub timeout: Option<Duration>,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: DEFAULT_MODEL.to_string(),
            endpoint: GEMINI_API_BASE.to_string(),
            timeout: None,
        }
    }
}

pub struct GeminiClient {
    config: GeminiConfig,
    client: reqwest::Client,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Result<Self, ServiceError> {
        if config.api_key.trim().is_empty() {
            return Err(ServiceError::Configuration(
                "Gemini API key is required.".to_string(),
            ));
        }
        if config.model.trim().is_empty() {
            return Err(ServiceError::Configuration(
                "Gemini model name is required.".to_string(),
            ));
        }
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| ServiceError::Configuration(format!("HTTP client: {e}")))?;
        Ok(Self { config, client })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    fn url(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.endpoint.trim_end_matches('/'),
            self.config.model.trim()
        )
    }
}

/// Request body: the image part first, then the instruction.
pub fn build_payload(request: &ExpandRequest<'_>) -> Value {
    json!({
        "contents": {
            "parts": [
                {
                    "inlineData": {
                        "mimeType": request.mime_type,
                        "data": general_purpose::STANDARD.encode(request.image),
                    }
                },
                { "text": request.prompt }
            ]
        },
        "generationConfig": {
            "responseModalities": ["IMAGE", "TEXT"]
        }
    })
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    content: Option<GeminiContent>,
    finish_reason: Option<FinishReason>,
}

#[derive(Debug, Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPart {
    text: Option<String>,
    inline_data: Option<InlineData>,
}

#[derive(Debug, Deserialize)]
struct InlineData {
    data: String,
}

/// Parse a response body into the first candidate.
///
/// When several parts carry an image or text, the last one wins.
pub fn parse_response(body: &str) -> Result<Option<Candidate>, ServiceError> {
    let parsed: GeminiResponse = serde_json::from_str(body)
        .map_err(|e| ServiceError::Transport(format!("invalid response JSON: {e}")))?;

    let Some(first) = parsed.candidates.into_iter().next() else {
        return Ok(None);
    };

    let mut candidate = Candidate {
        finish_reason: first.finish_reason,
        ..Candidate::default()
    };
    for part in first.content.map(|c| c.parts).unwrap_or_default() {
        if let Some(inline) = part.inline_data {
            let bytes = general_purpose::STANDARD
                .decode(inline.data.as_bytes())
                .map_err(|e| ServiceError::Transport(format!("invalid image data: {e}")))?;
            candidate.image = Some(bytes);
        }
        if let Some(text) = part.text {
            candidate.text = Some(text);
        }
    }
    Ok(Some(candidate))
}

#[async_trait]
impl GenerateContent for GeminiClient {
    async fn generate(&self, request: &ExpandRequest<'_>) -> Result<Option<Candidate>, ServiceError> {
        let payload = build_payload(request);
        let response = self
            .client
            .post(self.url())
            .header("x-goog-api-key", self.config.api_key.trim())
            .json(&payload)
            .send()
            .await
            .map_err(|e| ServiceError::Transport(format!("request failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ServiceError::Transport(format!("reading response failed: {e}")))?;
        log::trace!("Gemini response ({status}): {body}");

        if !status.is_success() {
            return Err(ServiceError::Transport(format!("HTTP {status}: {body}")));
        }
        parse_response(&body)
    }
}
