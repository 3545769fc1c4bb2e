use std::net::SocketAddr;

use anyhow::Context;
use axum::{
    extract::Host,
    http::{header::LOCATION, StatusCode, Uri},
    Router,
};
use axum_server::{tls_rustls::RustlsConfig, Handle};
use tracing::{error, info, warn};

use crate::config::ServerConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
enum TlsMode {
    Plain,
    LocalCert { cert: String, key: String },
}

fn tls_mode(config: &ServerConfig) -> TlsMode {
    match config.tls_mode.trim().to_lowercase().as_str() {
        "local" => {
            if config.tls_cert_file.is_empty() || config.tls_key_file.is_empty() {
                warn!("tls_mode=local requires tls_cert_file and tls_key_file. Falling back to HTTP only.");
                return TlsMode::Plain;
            }
            TlsMode::LocalCert { cert: config.tls_cert_file.clone(), key: config.tls_key_file.clone() }
        }
        "autocert" | "letsencrypt" => {
            warn!(
                domains = ?config.tls_domains,
                "tls_mode={} needs an external ACME client; terminate TLS in front of this service. Falling back to HTTP only.",
                config.tls_mode
            );
            TlsMode::Plain
        }
        _ => TlsMode::Plain,
    }
}

fn bind_addr(port: u16) -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], port))
}

/// `https://{host}[:tls_port]{path_and_query}`; the port is omitted for 443.
pub fn redirect_target(host: &str, tls_port: u16, uri: &Uri) -> String {
    let host = match host.rsplit_once(':') {
        // keep bracketed IPv6 literals intact
        Some((name, port)) if !port.contains(']') => name,
        _ => host,
    };
    let port = if tls_port == 443 { String::new() } else { format!(":{tls_port}") };
    let path = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
    format!("https://{host}{port}{path}")
}

fn redirect_router(tls_port: u16) -> Router {
    Router::new().fallback(move |Host(host): Host, uri: Uri| async move {
        (StatusCode::MOVED_PERMANENTLY, [(LOCATION, redirect_target(&host, tls_port, &uri))])
    })
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

pub async fn run(app: Router, config: &ServerConfig) -> anyhow::Result<()> {
    match tls_mode(config) {
        TlsMode::Plain => run_http(app, config.http_port).await,
        TlsMode::LocalCert { cert, key } => run_tls(app, config.http_port, config.tls_port, &cert, &key).await,
    }
}

async fn run_http(app: Router, port: u16) -> anyhow::Result<()> {
    let addr = bind_addr(port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "Starting HTTP server");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")
}

async fn run_tls(app: Router, http_port: u16, tls_port: u16, cert: &str, key: &str) -> anyhow::Result<()> {
    let tls = RustlsConfig::from_pem_file(cert, key)
        .await
        .with_context(|| format!("failed to load TLS cert {cert} / key {key}"))?;

    let redirect_addr = bind_addr(http_port);
    tokio::spawn(async move {
        info!("Redirecting HTTP {} -> HTTPS :{}", redirect_addr, tls_port);
        match tokio::net::TcpListener::bind(redirect_addr).await {
            Ok(listener) => {
                if let Err(e) = axum::serve(listener, redirect_router(tls_port)).await {
                    error!("HTTP redirect server error: {}", e);
                }
            }
            Err(e) => error!("HTTP redirect server could not bind {}: {}", redirect_addr, e),
        }
    });

    let handle = Handle::new();
    let shutdown = handle.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        shutdown.graceful_shutdown(None);
    });

    let addr = bind_addr(tls_port);
    info!(%addr, "Starting HTTPS server (local cert)");
    axum_server::bind_rustls(addr, tls)
        .handle(handle)
        .serve(app.into_make_service())
        .await
        .context("HTTPS server error")
}
