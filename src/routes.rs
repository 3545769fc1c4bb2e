use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, State},
    middleware,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, Instrument};
use uuid::Uuid;

use crate::{
    auth::{require_bearer, JwtVerifier},
    decorate::Decorator,
    errors::AppError,
    marketplace::{stub_search, MarketplaceConfig},
    models::{DecorateRequest, DecorateResponse, SearchRequest, SearchResponse},
};

/// Base64 photos are large; allow well above axum's 2 MB default.
const DECORATE_BODY_LIMIT: usize = 25 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub decorator: Arc<Decorator>,
    pub marketplace: Arc<MarketplaceConfig>,
    pub verifier: Arc<JwtVerifier>,
}

pub fn build_router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/search", post(search))
        .route("/decorate", post(decorate).layer(DefaultBodyLimit::max(DECORATE_BODY_LIMIT)))
        .route_layer(middleware::from_fn_with_state(state.verifier.clone(), require_bearer));

    Router::new()
        .route("/health", get(health))
        .merge(protected)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        )
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn search(
    State(state): State<AppState>,
    body: Result<Json<SearchRequest>, JsonRejection>,
) -> Result<Json<SearchResponse>, AppError> {
    let keywords = body.map(|Json(req)| req.keywords).unwrap_or_default();
    let response = stub_search(&state.marketplace, &keywords).map_err(|e| AppError::BadRequest(e.to_string()))?;
    info!("🔎 Stub search for {} keywords", keywords.len());
    Ok(Json(response))
}

pub async fn decorate(
    State(state): State<AppState>,
    body: Result<Json<DecorateRequest>, JsonRejection>,
) -> Result<Json<DecorateResponse>, AppError> {
    let Json(request) = body.map_err(|e| {
        tracing::debug!("decorate body rejected: {}", e);
        AppError::BadRequest("invalid request body".to_string())
    })?;

    let request_id = Uuid::new_v4();
    let span = tracing::info_span!("decorate", %request_id);
    let response = state.decorator.decorate(request).instrument(span.clone()).await?;

    span.in_scope(|| {
        info!(
            "✅ Decorated with {} products, {} tokens",
            response.products.items.len(),
            response.token_usage.grand_total
        )
    });
    Ok(Json(response))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::tests::{config as security_config, valid_token};
    use crate::decorate::tests::{image_reply, text_reply, FakeModel};
    use crate::gemini::ModelReply;
    use crate::models::TokenUsage;
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
    };
    use pretty_assertions::assert_eq;
    use std::sync::atomic::Ordering;
    use tower::ServiceExt; // for `oneshot`

    fn marketplace() -> MarketplaceConfig {
        MarketplaceConfig { host: "www.amazon.com".into(), partner_tag: "snapdesign-20".into() }
    }

    fn app_with(model: Arc<FakeModel>) -> Router {
        build_router(AppState {
            decorator: Arc::new(Decorator::new(model, marketplace())),
            marketplace: Arc::new(marketplace()),
            verifier: Arc::new(JwtVerifier::new(&security_config())),
        })
    }

    fn post_json(uri: &str, body: Value, token: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    #[tokio::test]
    async fn health_needs_no_token() {
        let app = app_with(Arc::new(FakeModel::happy()));
        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let (status, body) = send(app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "status": "ok" }));
    }

    #[tokio::test]
    async fn protected_routes_require_bearer() {
        let model = Arc::new(FakeModel::happy());
        let (status, body) = send(app_with(model.clone()), post_json("/decorate", json!({"imageBase64": "AQID"}), None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "missing bearer token");
        assert_eq!(model.image_calls.load(Ordering::SeqCst), 0);

        let (status, body) = send(app_with(model), post_json("/search", json!({"keywords": ["rug"]}), Some("garbage"))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "invalid token");
    }

    #[tokio::test]
    async fn search_returns_stub_products() {
        let token = valid_token();
        let app = app_with(Arc::new(FakeModel::happy()));
        let (status, body) = send(app, post_json("/search", json!({"keywords": ["boho rug", "jute"]}), Some(&token))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["provider"], "amazon-stub");
        assert_eq!(body["products"].as_array().unwrap().len(), 2);
        assert_eq!(body["products"][0]["price"], Value::Null);
        assert_eq!(body["products"][1]["url"], "https://www.amazon.com/s?k=boho+rug+jute&tag=snapdesign-20");
    }

    #[tokio::test]
    async fn search_without_keywords_is_400() {
        let token = valid_token();
        for body in [json!({"keywords": []}), json!({"keywords": "rug"}), json!({})] {
            let app = app_with(Arc::new(FakeModel::happy()));
            let (status, resp) = send(app, post_json("/search", body, Some(&token))).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(resp["error"], "keywords array is required");
        }
    }

    #[tokio::test]
    async fn decorate_end_to_end() {
        let token = valid_token();
        let app = app_with(Arc::new(FakeModel::happy()));
        let request = post_json(
            "/decorate",
            json!({"imageBase64": "data:image/jpeg;base64,AQID", "description": "cozy", "mimeType": "image/jpeg"}),
            Some(&token),
        );
        let (status, body) = send(app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["editedImageBase64"], "iVBORw==");
        assert_eq!(
            body["products"]["items"][0]["amazonLink"],
            "https://www.amazon.com/s?k=hanging+painting+abstract+canvas+print&tag=snapdesign-20"
        );
        assert_eq!(body["products"]["safetyNotes"], "anchor to studs");
        let usage = &body["tokenUsage"];
        assert_eq!(usage["imageGeneration"]["totalTokens"], 2590);
        assert_eq!(usage["textAnalysis"]["inputTokens"], 2600);
        assert_eq!(usage["grandTotal"], 5490);
        assert_eq!(usage["inputTokensTotal"], 3900);
        assert_eq!(usage["outputTokensTotal"], 1590);
    }

    #[tokio::test]
    async fn decorate_rejects_bad_bodies() {
        let token = valid_token();
        let request = Request::builder()
            .method("POST")
            .uri("/decorate")
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::from("{not json"))
            .unwrap();
        let (status, body) = send(app_with(Arc::new(FakeModel::happy())), request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "invalid request body");

        let (status, body) = send(
            app_with(Arc::new(FakeModel::happy())),
            post_json("/decorate", json!({"description": "x"}), Some(&token)),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "imageBase64 is required");
    }

    #[tokio::test]
    async fn decorate_without_image_part_is_500_and_skips_analysis() {
        let token = valid_token();
        let model = Arc::new(FakeModel::new(
            Ok(ModelReply { parts: vec![], usage: TokenUsage::default() }),
            Ok(text_reply("{}")),
        ));
        let (status, body) = send(app_with(model.clone()), post_json("/decorate", json!({"imageBase64": "AQID"}), Some(&token))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({ "error": "no image returned from image model" }));
        assert_eq!(model.analysis_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn decorate_with_unparsable_analysis_is_500() {
        let token = valid_token();
        let model = Arc::new(FakeModel::new(Ok(image_reply()), Ok(text_reply("I could not find any products."))));
        let (status, body) = send(app_with(model), post_json("/decorate", json!({"imageBase64": "AQID"}), Some(&token))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "failed to parse AI response");
    }
}
