use serde::Deserialize;
use url::form_urlencoded;

use crate::models::{SearchProduct, SearchResponse};

const STUB_PROVIDER: &str = "amazon-stub";
const STUB_THUMBNAIL: &str = "https://via.placeholder.com/128";
const STUB_RESULTS: usize = 3;

/// Where product links point and which affiliate tag they carry.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct MarketplaceConfig {
    #[serde(rename = "amazon_host", default = "default_host")]
    pub host: String,
    #[serde(rename = "amazon_partner_tag", default)]
    pub partner_tag: String,
}

fn default_host() -> String {
    "www.amazon.com".to_string()
}

impl Default for MarketplaceConfig {
    fn default() -> Self {
        Self { host: default_host(), partner_tag: String::new() }
    }
}

/// Form-style escaping: spaces become `+`, everything outside the unreserved set is percent-encoded.
pub fn query_escape(s: &str) -> String {
    form_urlencoded::byte_serialize(s.as_bytes()).collect()
}

impl MarketplaceConfig {
    /// `https://{host}/s?k={query}&tag={partner_tag}` for the space-joined terms.
    pub fn search_url<S: AsRef<str>>(&self, terms: &[S]) -> String {
        let joined = terms.iter().map(AsRef::as_ref).collect::<Vec<_>>().join(" ");
        format!(
            "https://{}/s?k={}&tag={}",
            self.host,
            query_escape(&joined),
            query_escape(&self.partner_tag)
        )
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("keywords array is required")]
pub struct EmptyKeywords;

/// Keyword passthrough; real catalogue lookups are not wired up, so results are placeholders.
pub fn stub_search(config: &MarketplaceConfig, keywords: &[String]) -> Result<SearchResponse, EmptyKeywords> {
    if keywords.is_empty() {
        return Err(EmptyKeywords);
    }
    let url = config.search_url(keywords);
    let products = keywords
        .iter()
        .take(STUB_RESULTS)
        .enumerate()
        .map(|(i, kw)| SearchProduct {
            id: format!("stub-{i}"),
            title: format!("{kw} - sample item"),
            thumbnail: STUB_THUMBNAIL.to_string(),
            price: None,
            url: url.clone(),
        })
        .collect();
    Ok(SearchResponse { products, provider: STUB_PROVIDER.to_string() })
}
