use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use bytes::Bytes;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::{debug, error, info};

use crate::models::TokenUsage;

#[derive(Debug, Error)]
pub enum GeminiError {
    #[error("HTTP error: {0}")] Http(String),
    #[error("API error: status={status} body={body}")] Api { status: u16, body: String },
    #[error("request timed out after {0:?}")] Timeout(Duration),
    #[error("Other: {0}")] Other(String),
}

/// Image bytes tagged with their MIME type.
#[derive(Debug, Clone, PartialEq)]
pub struct InlineImage {
    pub mime_type: String,
    pub data: Bytes,
}

impl InlineImage {
    pub fn new(mime_type: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self { mime_type: mime_type.into(), data: data.into() }
    }

    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.data)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReplyPart {
    Text(String),
    Image(InlineImage),
    Other,
}

/// A model answer flattened to its parts plus usage counters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelReply {
    pub parts: Vec<ReplyPart>,
    pub usage: TokenUsage,
}

impl ModelReply {
    pub fn first_text(&self) -> Option<&str> {
        self.parts.iter().find_map(|p| match p {
            ReplyPart::Text(t) => Some(t.as_str()),
            _ => None,
        })
    }

    pub fn first_image(&self) -> Option<&InlineImage> {
        self.parts.iter().find_map(|p| match p {
            ReplyPart::Image(img) => Some(img),
            _ => None,
        })
    }
}

/// The two remote calls the decorate pipeline depends on.
#[async_trait]
pub trait GenerativeModel: Send + Sync {
    async fn generate_image(&self, prompt: &str, image: &InlineImage) -> Result<ModelReply, GeminiError>;

    async fn analyze_images(
        &self,
        prompt: &str,
        original: &InlineImage,
        edited: &InlineImage,
    ) -> Result<ModelReply, GeminiError>;
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct GeminiConfig {
    #[serde(rename = "gemini_api_key", default)]
    pub api_key: String,
    #[serde(rename = "gemini_image_model", default = "default_image_model")]
    pub image_model: String,
    #[serde(rename = "gemini_text_model", default = "default_text_model")]
    pub text_model: String,
    #[serde(rename = "gemini_api_base", default = "default_api_base")]
    pub api_base: String,
    /// Deadline for each remote call.
    #[serde(rename = "request_timeout_secs", default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_image_model() -> String { "gemini-2.5-flash-image-preview".to_string() }
fn default_text_model() -> String { "gemini-1.5-flash".to_string() }
fn default_api_base() -> String { "https://generativelanguage.googleapis.com/v1beta".to_string() }
fn default_timeout_secs() -> u64 { 120 }

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            image_model: default_image_model(),
            text_model: default_text_model(),
            api_base: default_api_base(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

// Helper function to truncate base64 data in JSON for cleaner logging
fn truncate_base64_in_json(value: &mut serde_json::Value) {
    match value {
        serde_json::Value::Object(map) => {
            for (key, val) in map.iter_mut() {
                if key == "data" {
                    if let serde_json::Value::String(s) = val {
                        if s.len() > 100 && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '/' || c == '=') {
                            *val = serde_json::Value::String(format!("{}...[truncated {} chars]", &s[..50], s.len() - 50));
                        }
                    }
                } else {
                    truncate_base64_in_json(val);
                }
            }
        }
        serde_json::Value::Array(arr) => {
            for val in arr.iter_mut() {
                truncate_base64_in_json(val);
            }
        }
        _ => {}
    }
}

pub struct GeminiClient {
    client: Client,
    config: GeminiConfig,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Self {
        Self { client: Client::new(), config }
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.config.timeout_secs)
    }

    fn redact(&self, text: &str) -> String {
        if self.config.api_key.is_empty() {
            return text.to_string();
        }
        text.replace(&self.config.api_key, "***")
    }

    async fn generate_content(&self, model: &str, request_body: serde_json::Value) -> Result<ModelReply, GeminiError> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.config.api_base, model, self.config.api_key
        );

        info!("🔗 Making request to: {}", self.redact(&url));

        if tracing::enabled!(tracing::Level::DEBUG) {
            let mut logged = request_body.clone();
            truncate_base64_in_json(&mut logged);
            debug!("📤 Request body: {}", logged);
        }

        let timeout = self.timeout();
        let response = self.client
            .post(&url)
            .timeout(timeout)
            .json(&request_body)
            .send()
            .await
            .map_err(|e| if e.is_timeout() { GeminiError::Timeout(timeout) } else { GeminiError::Http(self.redact(&e.to_string())) })?;

        let status = response.status();
        info!("📥 Response status: {}", status);

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            error!("❌ API Error response: {}", error_body);
            return Err(GeminiError::Api { status: status.as_u16(), body: error_body });
        }

        let response_text = response.text().await
            .map_err(|e| if e.is_timeout() { GeminiError::Timeout(timeout) } else { GeminiError::Other(self.redact(&e.to_string())) })?;

        if tracing::enabled!(tracing::Level::DEBUG) {
            if let Ok(mut json_value) = serde_json::from_str::<serde_json::Value>(&response_text) {
                truncate_base64_in_json(&mut json_value);
                debug!("📥 Raw Gemini API response: {}", json_value);
            }
        }

        let parsed: GeminiResponse = serde_json::from_str(&response_text)
            .map_err(|e| GeminiError::Other(format!("parse error: {}", e)))?;

        parsed.into_reply()
    }
}

fn inline_part(image: &InlineImage) -> serde_json::Value {
    json!({ "inlineData": { "mimeType": image.mime_type, "data": image.to_base64() } })
}

pub fn image_request_body(prompt: &str, image: &InlineImage) -> serde_json::Value {
    json!({
        "contents": [{
            "parts": [{"text": prompt}, inline_part(image)]
        }],
        "generationConfig": {
            "responseModalities": ["TEXT", "IMAGE"],
            "candidateCount": 1
        }
    })
}

pub fn analysis_request_body(prompt: &str, original: &InlineImage, edited: &InlineImage) -> serde_json::Value {
    json!({
        "contents": [{
            "parts": [{"text": prompt}, inline_part(original), inline_part(edited)]
        }],
        "generationConfig": {
            "candidateCount": 1
        }
    })
}

#[async_trait]
impl GenerativeModel for GeminiClient {
    async fn generate_image(&self, prompt: &str, image: &InlineImage) -> Result<ModelReply, GeminiError> {
        info!("Generating decorated image with {}", self.config.image_model);
        let reply = self.generate_content(&self.config.image_model, image_request_body(prompt, image)).await?;
        match reply.first_image() {
            Some(img) => info!("🖼️ Image model returned {} ({} bytes)", img.mime_type, img.data.len()),
            None => info!("⚠️ No inline image data found in response"),
        }
        Ok(reply)
    }

    async fn analyze_images(
        &self,
        prompt: &str,
        original: &InlineImage,
        edited: &InlineImage,
    ) -> Result<ModelReply, GeminiError> {
        info!("Analyzing edit with {}", self.config.text_model);
        self.generate_content(&self.config.text_model, analysis_request_body(prompt, original, edited)).await
    }
}

// --- Response Parsing Helpers ---

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: UsageMetadata,
}

#[derive(Debug, Deserialize)]
struct Candidate { #[serde(default)] content: Content }

#[derive(Debug, Deserialize, Default)]
struct Content { #[serde(default)] parts: Vec<Part> }

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Part {
    Inline {
        #[serde(rename = "inlineData")]
        inline_data: InlineData
    },
    Text { text: String },
    Other(serde_json::Value)
}

#[derive(Debug, Deserialize)]
struct InlineData {
    data: String,
    #[serde(rename = "mimeType")]
    mime_type: String,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u64,
    #[serde(default)]
    candidates_token_count: u64,
    #[serde(default)]
    total_token_count: u64,
}

impl GeminiResponse {
    /// Only the first candidate is consulted.
    fn into_reply(self) -> Result<ModelReply, GeminiError> {
        let usage = TokenUsage {
            input_tokens: self.usage_metadata.prompt_token_count,
            output_tokens: self.usage_metadata.candidates_token_count,
            total_tokens: self.usage_metadata.total_token_count,
        };
        let parts = match self.candidates.into_iter().next() {
            Some(candidate) => candidate
                .content
                .parts
                .into_iter()
                .map(Part::into_reply_part)
                .collect::<Result<Vec<_>, _>>()?,
            None => Vec::new(),
        };
        Ok(ModelReply { parts, usage })
    }
}

impl Part {
    fn into_reply_part(self) -> Result<ReplyPart, GeminiError> {
        Ok(match self {
            Part::Inline { inline_data } => {
                let data = base64::engine::general_purpose::STANDARD
                    .decode(inline_data.data.as_bytes())
                    .map_err(|e| GeminiError::Other(format!("invalid inline image data: {}", e)))?;
                ReplyPart::Image(InlineImage::new(inline_data.mime_type, data))
            }
            Part::Text { text } => ReplyPart::Text(text),
            Part::Other(_) => ReplyPart::Other,
        })
    }
}
