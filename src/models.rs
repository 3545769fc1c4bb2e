use serde::{Serialize, Deserialize};
use serde_with::{serde_as, DefaultOnNull};

/// Inbound body of `POST /decorate`.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct DecorateRequest {
    #[serde(default)]
    pub image_base64: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub mime_type: String,
}

#[serde_as]
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProductItem {
    #[serde(default)]
    #[serde_as(deserialize_as = "DefaultOnNull")]
    pub name: String,
    #[serde(default, rename = "type")]
    #[serde_as(deserialize_as = "DefaultOnNull")]
    pub kind: String,
    #[serde(default)]
    #[serde_as(deserialize_as = "DefaultOnNull")]
    pub qty: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    /// Short marketplace search phrase for this same product.
    #[serde(default)]
    #[serde_as(deserialize_as = "DefaultOnNull")]
    pub description: String,
    #[serde(default)]
    #[serde_as(deserialize_as = "DefaultOnNull")]
    pub keywords: Vec<String>,
    #[serde(default)]
    #[serde_as(deserialize_as = "DefaultOnNull")]
    pub placement: Placement,
    #[serde(default, rename = "estPriceUSD", skip_serializing_if = "Option::is_none")]
    pub est_price_usd: Option<f64>,
    #[serde(default)]
    #[serde_as(deserialize_as = "DefaultOnNull")]
    pub amazon_link: String,
}

#[serde_as]
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Placement {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    /// `[x, y, w, h]` relative to the image, each in `0..=1`.
    #[serde(default)]
    #[serde_as(deserialize_as = "DefaultOnNull")]
    pub bbox_norm: Vec<f64>,
}

#[serde_as]
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProductAnalysis {
    #[serde(default)]
    #[serde_as(deserialize_as = "DefaultOnNull")]
    pub description: String,
    #[serde(default)]
    #[serde_as(deserialize_as = "DefaultOnNull")]
    pub items: Vec<ProductItem>,
    #[serde(default)]
    #[serde_as(deserialize_as = "DefaultOnNull")]
    pub safety_notes: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TokenMetrics {
    pub image_generation: TokenUsage,
    pub text_analysis: TokenUsage,
    pub grand_total: u64,
    pub input_tokens_total: u64,
    pub output_tokens_total: u64,
}

impl TokenMetrics {
    /// Totals are always derived from the two steps, never read from upstream.
    pub fn from_steps(image_generation: TokenUsage, text_analysis: TokenUsage) -> Self {
        Self {
            image_generation,
            text_analysis,
            grand_total: image_generation.total_tokens + text_analysis.total_tokens,
            input_tokens_total: image_generation.input_tokens + text_analysis.input_tokens,
            output_tokens_total: image_generation.output_tokens + text_analysis.output_tokens,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct DecorateResponse {
    pub edited_image_base64: String,
    pub products: ProductAnalysis,
    pub token_usage: TokenMetrics,
}

/// Inbound body of `POST /search`.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct SearchRequest {
    #[serde(default)]
    pub keywords: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SearchProduct {
    pub id: String,
    pub title: String,
    pub thumbnail: String,
    pub price: Option<f64>,
    pub url: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SearchResponse {
    pub products: Vec<SearchProduct>,
    pub provider: String,
}
