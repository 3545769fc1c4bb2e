//! YAML configuration with environment overrides.

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use crate::auth::SecurityConfig;
use crate::gemini::GeminiConfig;
use crate::marketplace::MarketplaceConfig;

pub const DEFAULT_CONFIG_PATH: &str = "config/config.yaml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid value for {key}: {value}")]
    InvalidEnv { key: &'static str, value: String },
}

/// Listener settings; see `server::run` for how `tls_mode` is interpreted.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ServerConfig {
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    #[serde(default = "default_tls_port")]
    pub tls_port: u16,
    #[serde(default)]
    pub tls_mode: String,
    #[serde(default)]
    pub tls_cert_file: String,
    #[serde(default)]
    pub tls_key_file: String,
    #[serde(default)]
    pub tls_domains: Vec<String>,
    #[serde(default)]
    pub tls_email: String,
}

fn default_http_port() -> u16 {
    8080
}

fn default_tls_port() -> u16 {
    8443
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_port: default_http_port(),
            tls_port: default_tls_port(),
            tls_mode: String::new(),
            tls_cert_file: String::new(),
            tls_key_file: String::new(),
            tls_domains: Vec::new(),
            tls_email: String::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct AppConfig {
    #[serde(rename = "server_config", default)]
    pub server: ServerConfig,
    #[serde(rename = "server_security_config", default)]
    pub security: SecurityConfig,
    #[serde(rename = "gcp_config", default)]
    pub gemini: GeminiConfig,
    #[serde(rename = "amazon_config", default)]
    pub marketplace: MarketplaceConfig,
}

impl AppConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Reads the file if it exists, otherwise starts from defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            info!("config file {} not found, using defaults", path.display());
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml_str(&raw)
    }

    /// Applies environment overrides through `lookup`; empty values are ignored.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let strings: [(&str, &mut String); 9] = [
            ("GEMINI_API_KEY", &mut self.gemini.api_key),
            ("GEMINI_IMAGE_MODEL", &mut self.gemini.image_model),
            ("GEMINI_TEXT_MODEL", &mut self.gemini.text_model),
            ("GEMINI_API_BASE", &mut self.gemini.api_base),
            ("API_JWT_SECRET", &mut self.security.jwt_secret),
            ("API_JWT_ISSUER", &mut self.security.jwt_issuer),
            ("API_JWT_AUDIENCE", &mut self.security.jwt_audience),
            ("AMAZON_HOST", &mut self.marketplace.host),
            ("AMAZON_PARTNER_TAG", &mut self.marketplace.partner_tag),
        ];
        for (key, slot) in strings {
            if let Some(value) = get(key) {
                *slot = value;
            }
        }

        if let Some(value) = get("PORT") {
            self.server.http_port = value
                .trim()
                .parse::<u16>()
                .map_err(|_| ConfigError::InvalidEnv { key: "PORT", value })?;
        }
        if let Some(value) = get("TLS_MODE") {
            self.server.tls_mode = value;
        }
        Ok(())
    }

    /// File first, then process environment.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let mut config = Self::from_file(&path)?;
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }
}
