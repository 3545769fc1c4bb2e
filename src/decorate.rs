//! The decorate pipeline: edit the photo, diff it, turn the diff into links.

use std::fmt;
use std::sync::Arc;

use base64::Engine;
use thiserror::Error;
use tracing::{info, warn};

use crate::gemini::{GeminiError, GenerativeModel, InlineImage};
use crate::marketplace::MarketplaceConfig;
use crate::models::{DecorateRequest, DecorateResponse, TokenMetrics};
use crate::products::{decode_analysis, enrich_links, extract_json_payload, ProductDecodeError};
use crate::prompts::{analysis_prompt, decorate_prompt};

pub const DEFAULT_DESCRIPTION: &str = "decorate this space";
pub const DEFAULT_MIME_TYPE: &str = "image/jpeg";
const DATA_URL_MARKER: &str = ";base64,";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    ImageGeneration,
    TextAnalysis,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::ImageGeneration => f.write_str("generate decorated image"),
            Stage::TextAnalysis => f.write_str("analyze images"),
        }
    }
}

#[derive(Debug, Error)]
pub enum DecorateError {
    #[error("{0}")]
    InvalidInput(&'static str),
    #[error("failed to {stage}")]
    UpstreamUnavailable {
        stage: Stage,
        #[source]
        source: GeminiError,
    },
    #[error("no image returned from image model")]
    UpstreamEmptyResult,
    #[error("failed to parse AI response")]
    UpstreamMalformedResult(Option<ProductDecodeError>),
}

/// A request after defaults and payload decoding have been applied.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRequest {
    pub description: String,
    pub image: InlineImage,
}

/// Accepts `image/png`, bare subtypes like `png`, or nothing.
fn normalize_mime_type(mime_type: &str) -> String {
    let mime_type = mime_type.trim();
    if mime_type.is_empty() {
        DEFAULT_MIME_TYPE.to_string()
    } else if mime_type.contains('/') {
        mime_type.to_string()
    } else {
        format!("image/{mime_type}")
    }
}

/// Drops a `data:<mime>;base64,` prefix when present.
fn strip_data_url(payload: &str) -> &str {
    payload.split(DATA_URL_MARKER).nth(1).unwrap_or(payload)
}

pub fn normalize(request: DecorateRequest) -> Result<NormalizedRequest, DecorateError> {
    if request.image_base64.is_empty() {
        return Err(DecorateError::InvalidInput("imageBase64 is required"));
    }
    // tolerate base64 wrapped across lines
    let payload: String = strip_data_url(&request.image_base64)
        .trim()
        .chars()
        .filter(|c| !matches!(c, '\r' | '\n'))
        .collect();
    let data = base64::engine::general_purpose::STANDARD
        .decode(payload)
        .map_err(|_| DecorateError::InvalidInput("invalid base64 image"))?;
    if data.is_empty() {
        return Err(DecorateError::InvalidInput("imageBase64 is required"));
    }
    let description = if request.description.trim().is_empty() {
        DEFAULT_DESCRIPTION.to_string()
    } else {
        request.description
    };
    Ok(NormalizedRequest {
        description,
        image: InlineImage::new(normalize_mime_type(&request.mime_type), data),
    })
}

pub struct Decorator {
    model: Arc<dyn GenerativeModel>,
    marketplace: MarketplaceConfig,
}

impl Decorator {
    pub fn new(model: Arc<dyn GenerativeModel>, marketplace: MarketplaceConfig) -> Self {
        Self { model, marketplace }
    }

    pub async fn decorate(&self, request: DecorateRequest) -> Result<DecorateResponse, DecorateError> {
        let request = normalize(request)?;
        info!(description = %request.description, mime_type = %request.image.mime_type, bytes = request.image.data.len(), "decorate request accepted");

        let image_reply = self
            .model
            .generate_image(&decorate_prompt(&request.description), &request.image)
            .await
            .map_err(|source| DecorateError::UpstreamUnavailable { stage: Stage::ImageGeneration, source })?;
        let edited = image_reply.first_image().ok_or_else(|| {
            warn!("image model reply had no image part");
            DecorateError::UpstreamEmptyResult
        })?;
        info!(tokens = image_reply.usage.total_tokens, "edited image received");

        let analysis_reply = self
            .model
            .analyze_images(&analysis_prompt(&request.description), &request.image, edited)
            .await
            .map_err(|source| DecorateError::UpstreamUnavailable { stage: Stage::TextAnalysis, source })?;
        let text = analysis_reply.first_text().ok_or_else(|| {
            warn!("analysis reply had no text part");
            DecorateError::UpstreamMalformedResult(None)
        })?;

        let mut products = decode_analysis(extract_json_payload(text)).map_err(|e| {
            warn!(error = %e, "analysis reply could not be decoded");
            DecorateError::UpstreamMalformedResult(Some(e))
        })?;
        enrich_links(&mut products, &self.marketplace);
        info!(items = products.items.len(), tokens = analysis_reply.usage.total_tokens, "products linked");

        Ok(DecorateResponse {
            edited_image_base64: edited.to_base64(),
            products,
            token_usage: TokenMetrics::from_steps(image_reply.usage, analysis_reply.usage),
        })
    }
}
