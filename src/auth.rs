//! JWT bearer-token authorization.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use jsonwebtoken::{decode, errors::ErrorKind, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::{debug, warn};

const BEARER_PREFIX: &str = "Bearer ";

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct SecurityConfig {
    #[serde(rename = "api_jwt_secret", default)]
    pub jwt_secret: String,
    #[serde(rename = "api_jwt_issuer", default = "default_issuer")]
    pub jwt_issuer: String,
    #[serde(rename = "api_jwt_audience", default = "default_audience")]
    pub jwt_audience: String,
}

fn default_issuer() -> String {
    "snapdesign-app".to_string()
}

fn default_audience() -> String {
    "snapdesign-api".to_string()
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self { jwt_secret: String::new(), jwt_issuer: default_issuer(), jwt_audience: default_audience() }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("missing bearer token")]
    MissingBearer,
    #[error("unauthorized")]
    Unauthorized,
    #[error("invalid token")]
    InvalidToken,
    #[error("invalid issuer")]
    InvalidIssuer,
    #[error("invalid audience")]
    InvalidAudience,
    #[error("token expired")]
    Expired,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        (StatusCode::UNAUTHORIZED, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// Claims we look at; everything else in the token is ignored.
#[derive(Debug, Deserialize)]
pub struct Claims {
    #[serde(default)]
    pub sub: Option<String>,
}

pub struct JwtVerifier {
    key: Option<DecodingKey>,
    validation: Validation,
}

impl JwtVerifier {
    pub fn new(config: &SecurityConfig) -> Self {
        if config.jwt_secret.is_empty() {
            warn!("api_jwt_secret not set; all protected requests will be unauthorized");
        }
        let mut validation = Validation::new(Algorithm::HS256);
        validation.algorithms = vec![Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];
        validation.leeway = 0;
        validation.set_required_spec_claims(&["iss", "aud"]);
        validation.set_issuer(&[config.jwt_issuer.as_str()]);
        validation.set_audience(&[config.jwt_audience.as_str()]);
        Self {
            key: (!config.jwt_secret.is_empty()).then(|| DecodingKey::from_secret(config.jwt_secret.as_bytes())),
            validation,
        }
    }

    /// Checks an `Authorization` header value.
    pub fn verify_header(&self, header: Option<&str>) -> Result<Claims, AuthError> {
        let token = header
            .and_then(|h| h.strip_prefix(BEARER_PREFIX))
            .ok_or(AuthError::MissingBearer)?
            .trim();
        let key = match &self.key {
            Some(key) if !token.is_empty() => key,
            _ => return Err(AuthError::Unauthorized),
        };
        decode::<Claims>(token, key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::Expired,
                ErrorKind::InvalidIssuer => AuthError::InvalidIssuer,
                ErrorKind::InvalidAudience => AuthError::InvalidAudience,
                ErrorKind::MissingRequiredClaim(claim) if claim == "iss" => AuthError::InvalidIssuer,
                ErrorKind::MissingRequiredClaim(claim) if claim == "aud" => AuthError::InvalidAudience,
                _ => AuthError::InvalidToken,
            })
    }
}

/// Middleware rejecting requests without a valid bearer token.
pub async fn require_bearer(State(verifier): State<Arc<JwtVerifier>>, request: Request, next: Next) -> Response {
    let header = request.headers().get(AUTHORIZATION).and_then(|v| v.to_str().ok());
    match verifier.verify_header(header) {
        Ok(claims) => {
            debug!(sub = claims.sub.as_deref().unwrap_or("-"), "bearer token accepted");
            next.run(request).await
        }
        Err(e) => {
            warn!("rejected request to {}: {}", request.uri().path(), e);
            e.into_response()
        }
    }
}
