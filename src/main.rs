mod auth;
mod config;
mod decorate;
mod errors;
mod gemini;
mod marketplace;
mod models;
mod products;
mod prompts;
mod routes;
mod server;

use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{fmt, EnvFilter};

use crate::auth::JwtVerifier;
use crate::config::AppConfig;
use crate::decorate::Decorator;
use crate::gemini::GeminiClient;
use crate::routes::{build_router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    // Init tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    let config = AppConfig::load().context("failed to load configuration")?;
    if config.gemini.api_key.is_empty() {
        tracing::warn!("GEMINI_API_KEY is not set; decorate requests will fail upstream");
    }
    tracing::info!(
        image_model = %config.gemini.image_model,
        text_model = %config.gemini.text_model,
        marketplace = %config.marketplace.host,
        "Using Gemini models"
    );

    let model = Arc::new(GeminiClient::new(config.gemini.clone()));
    let state = AppState {
        decorator: Arc::new(Decorator::new(model, config.marketplace.clone())),
        marketplace: Arc::new(config.marketplace.clone()),
        verifier: Arc::new(JwtVerifier::new(&config.security)),
    };

    server::run(build_router(state), &config.server).await
}
