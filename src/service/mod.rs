//! Generative image service: the single point of contact with the model.
//!
//! Two seams, both async traits:
//!
//! - [`ImageExpander`] — what the pipeline depends on. Submit image + prompt,
//!   get the expanded image bytes or a classified [`ServiceError`]. Tests swap
//!   in a mock here.
//! - [`GenerateContent`] — the raw transport returning the first response
//!   [`Candidate`] as-is. [`GeminiClient`] implements it over HTTP.
//!
//! [`ExpansionAdapter`] glues the two together and owns response
//! classification, so every transport gets the same failure semantics.

pub mod gemini;

pub use gemini::{GeminiClient, GeminiConfig};

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

/// Instruction sent alongside every masked canvas.
pub const EXPANSION_PROMPT: &str = "You are an expert photo editor. Your task is to seamlessly expand this image by replacing the solid magenta-colored areas (#FF00FF).
Instructions:
1. Analyze the existing image content, including the subject, background, lighting, and shadows.
2. Extend the background naturally and realistically into the magenta areas. The new areas must blend perfectly with the original image, showing no visible seams or artifacts.
3. Precisely match the color palette, textures, and grain of the original photo.
4. Continue any existing gradients, patterns, or environmental elements into the new areas.
5. Ensure the lighting and shadows in the expanded areas are consistent with the original lighting source.
6. Crucially, avoid filling the new areas with a flat, solid color. Even if the original background appears plain, introduce subtle texture, grain, and lighting variations consistent with a real photograph to ensure a photorealistic result.
7. The final output must be a single, cohesive, photorealistic image containing no magenta.";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ServiceError {
    #[error("No valid response was returned from the AI.")]
    NoResponse,
    #[error("{}", .0.stopped_message())]
    GenerationStopped(FinishReason),
    #[error("The AI finished successfully but did not return an image.")]
    EmptyResult,
    #[error("The AI returned the original image without making changes.")]
    NoOpResult,
    #[error("Failed to expand image: {0}")]
    Transport(String),
    #[error("Image service is not configured: {0}")]
    Configuration(String),
}

/// Why the model stopped producing output.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum FinishReason {
    /// Normal completion.
    Stop,
    Safety,
    Recitation,
    Other(String),
}

impl From<String> for FinishReason {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "STOP" => Self::Stop,
            "SAFETY" => Self::Safety,
            "RECITATION" => Self::Recitation,
            _ => Self::Other(raw),
        }
    }
}

impl FinishReason {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Stop => "STOP",
            Self::Safety => "SAFETY",
            Self::Recitation => "RECITATION",
            Self::Other(raw) => raw,
        }
    }

    /// User-facing explanation for a generation that did not complete.
    pub fn stopped_message(&self) -> String {
        match self {
            Self::Safety => "The image could not be processed due to the AI's safety policies. Please try a different image.".to_string(),
            Self::Recitation => {
                "The image could not be processed due to the AI's recitation policy.".to_string()
            }
            other => format!("Image generation stopped. Reason: {}.", other.as_str()),
        }
    }
}

/// One expansion request.
#[derive(Debug, Clone, Copy)]
pub struct ExpandRequest<'a> {
    /// Encoded masked canvas.
    pub image: &'a [u8],
    /// Media type of `image`, e.g. `image/png`.
    pub mime_type: &'a str,
    pub prompt: &'a str,
}

/// First response candidate, transport-neutral.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Candidate {
    pub finish_reason: Option<FinishReason>,
    /// Decoded bytes of the last image part, if any.
    pub image: Option<Vec<u8>>,
    /// Last text part, if any. Diagnostic only.
    pub text: Option<String>,
}

/// Raw model call. `Ok(None)` means the service answered without a candidate.
#[async_trait]
pub trait GenerateContent: Send + Sync {
    async fn generate(&self, request: &ExpandRequest<'_>) -> Result<Option<Candidate>, ServiceError>;
}

/// Submit a masked canvas, get back the model's full-frame image.
#[async_trait]
pub trait ImageExpander: Send + Sync {
    async fn expand(&self, request: &ExpandRequest<'_>) -> Result<Vec<u8>, ServiceError>;
}

/// [`ImageExpander`] over any [`GenerateContent`] transport.
pub struct ExpansionAdapter<C> {
    client: C,
}

impl<C: GenerateContent> ExpansionAdapter<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }
}

#[async_trait]
impl<C: GenerateContent> ImageExpander for ExpansionAdapter<C> {
    async fn expand(&self, request: &ExpandRequest<'_>) -> Result<Vec<u8>, ServiceError> {
        let candidate = self.client.generate(request).await?;
        classify(candidate, request.image)
    }
}

/// Turn a raw candidate into image bytes or a classified failure.
pub fn classify(candidate: Option<Candidate>, input: &[u8]) -> Result<Vec<u8>, ServiceError> {
    let candidate = candidate.ok_or(ServiceError::NoResponse)?;

    if let Some(reason) = candidate.finish_reason {
        if reason != FinishReason::Stop {
            return Err(ServiceError::GenerationStopped(reason));
        }
    }

    if let Some(text) = &candidate.text {
        log::info!("model text response: {text}");
    }

    let image = candidate.image.ok_or(ServiceError::EmptyResult)?;
    if image == input {
        return Err(ServiceError::NoOpResult);
    }
    Ok(image)
}
