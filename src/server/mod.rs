//! Public delivery endpoint.
//!
//! `GET /{slug}` streams the file registered under `domain/slug`,
//! `GET /health` answers `ok`. Downloads are recorded in the background once
//! the response is on its way.

pub mod geo;
pub mod useragent;

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use anyhow::Context;
use axum::{
    body::Body,
    extract::{ConnectInfo, Path, Request, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_util::io::ReaderStream;

use crate::core::config::Config;
use crate::storage::download_log::{self, DownloadEntry};
use crate::storage::files::{self, FileRecord};
use crate::storage::{get_connection, DbPool};
use geo::{GeoLocator, Location};
use useragent::UserAgentInfo;

/// A download of a file whose owner asked to be notified.
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadEvent {
    /// Internal id of the owner
    pub owner_id: i64,
    pub file_name: String,
    pub slug: String,
    pub ip: String,
    pub location: Location,
    pub agent: UserAgentInfo,
}

pub type EventSender = mpsc::UnboundedSender<DownloadEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<DownloadEvent>;

/// Shared state for the delivery server.
#[derive(Clone)]
pub struct ServerState {
    config: Arc<Config>,
    db: Arc<DbPool>,
    logs: Arc<DbPool>,
    geo: GeoLocator,
    events: Option<EventSender>,
}

impl ServerState {
    pub fn new(
        config: Arc<Config>,
        db: Arc<DbPool>,
        logs: Arc<DbPool>,
        events: Option<EventSender>,
    ) -> Result<Self, reqwest::Error> {
        let geo = GeoLocator::new(&config.geoip_url)?;
        Ok(Self {
            config,
            db,
            logs,
            geo,
            events,
        })
    }
}

pub fn router(state: ServerState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/{slug}", get(download_handler))
        .with_state(state)
}

/// Runs the delivery server until it fails. TLS is used when both the
/// certificate and the key are configured.
pub async fn serve(state: ServerState) -> anyhow::Result<()> {
    let config = state.config.clone();
    let bind = config.bind_address();
    let app = router(state).into_make_service_with_connect_info::<SocketAddr>();

    if config.tls_enabled() {
        let addr = tokio::net::lookup_host(&bind)
            .await?
            .next()
            .with_context(|| format!("cannot resolve {bind}"))?;
        let tls = axum_server::tls_rustls::RustlsConfig::from_pem_file(&config.tls_cert, &config.tls_key)
            .await
            .context("failed to load TLS certificate or key")?;
        log::info!("🌐 Serving HTTPS on {}", addr);
        axum_server::bind_rustls(addr, tls).serve(app).await?;
    } else {
        let listener = TcpListener::bind(&bind).await?;
        log::info!("🌐 Serving HTTP on {}", listener.local_addr()?);
        axum::serve(listener, app).await?;
    }
    Ok(())
}

/// GET /health
async fn health_handler() -> &'static str {
    "ok"
}

fn not_found() -> Response {
    (StatusCode::NOT_FOUND, "not found").into_response()
}

/// First `X-Forwarded-For` hop, else the peer address. A hop that is not an
/// IP address is ignored.
pub fn client_ip(headers: &HeaderMap, peer: Option<IpAddr>) -> Option<IpAddr> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .and_then(|v| v.trim().parse::<IpAddr>().ok())
        .or(peer)
}

/// `attachment` with an ASCII fallback and the RFC 5987 UTF-8 name.
pub fn content_disposition(name: &str) -> String {
    let fallback: String = name
        .chars()
        .map(|c| if (c.is_ascii_graphic() && c != '"' && c != '\\') || c == ' ' { c } else { '_' })
        .collect();
    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        fallback,
        urlencoding::encode(name)
    )
}

/// GET /{slug}
async fn download_handler(State(state): State<ServerState>, Path(slug): Path<String>, request: Request) -> Response {
    let link = state.config.public_link(&slug);
    let file = {
        let conn = match get_connection(&state.db) {
            Ok(conn) => conn,
            Err(e) => {
                log::error!("❌ Database pool unavailable: {}", e);
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
        };
        match files::get_file_by_link(&conn, &link) {
            Ok(Some(file)) => file,
            Ok(None) => return not_found(),
            Err(e) => {
                log::error!("❌ Failed to resolve {}: {}", link, e);
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
        }
    };

    let path = std::path::Path::new(&state.config.file_storage_path).join(&file.storage_name);
    let handle = match tokio::fs::File::open(&path).await {
        Ok(handle) => handle,
        Err(e) => {
            log::warn!("⚠️ File {} is registered but unreadable at {:?}: {}", file.id, path, e);
            return not_found();
        }
    };
    let length = match handle.metadata().await {
        Ok(meta) => meta.len(),
        Err(e) => {
            log::warn!("⚠️ Cannot stat {:?}: {}", path, e);
            return not_found();
        }
    };

    let response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/octet-stream")
        .header(header::CONTENT_LENGTH, length)
        .header(header::CONTENT_DISPOSITION, content_disposition(&file.local_name))
        .body(Body::from_stream(ReaderStream::new(handle)));
    let response = match response {
        Ok(response) => response,
        Err(e) => {
            log::error!("❌ Failed to build response for {}: {}", link, e);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    if state.config.download_logging {
        let peer = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());
        let ip = client_ip(request.headers(), peer);
        let agent = request
            .headers()
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        tokio::spawn(record_download(state, file, slug, ip, agent));
    }

    response
}

async fn record_download(state: ServerState, file: FileRecord, slug: String, ip: Option<IpAddr>, user_agent: String) {
    let location = match ip {
        Some(ip) => state.geo.locate(ip).await,
        None => Location::default(),
    };
    let ip = ip.map(|ip| ip.to_string()).unwrap_or_default();
    let agent = useragent::parse(&user_agent);

    let entry = DownloadEntry {
        ip: ip.clone(),
        city: location.city.clone(),
        country: location.country.clone(),
        platform: agent.platform.clone(),
        model: agent.model.clone(),
        os_name: agent.os_name.clone(),
        os_version: agent.os_version.clone(),
        browser_name: agent.browser_name.clone(),
        browser_version: agent.browser_version.clone(),
        ..Default::default()
    };
    let written = get_connection(&state.logs)
        .map_err(|e| e.to_string())
        .and_then(|conn| download_log::add_entry(&conn, file.id, &entry).map_err(|e| e.to_string()));
    match written {
        Ok(()) => log::info!("📥 File {} ({}) downloaded from {}", file.id, slug, ip),
        Err(e) => log::warn!("⚠️ Failed to log download of file {}: {}", file.id, e),
    }

    if !file.notify {
        return;
    }
    if let Some(events) = &state.events {
        let event = DownloadEvent {
            owner_id: file.user_id,
            file_name: file.local_name,
            slug,
            ip,
            location,
            agent,
        };
        if events.send(event).is_err() {
            log::warn!("⚠️ Notification channel is closed, download of file {} not reported", file.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn forwarded_for_wins_over_peer() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.7, 10.0.0.1"));
        let peer: Option<IpAddr> = "127.0.0.1".parse().ok();
        assert_eq!(client_ip(&headers, peer), "203.0.113.7".parse().ok());
        assert_eq!(client_ip(&HeaderMap::new(), peer), peer);
        assert_eq!(client_ip(&HeaderMap::new(), None), None);
    }

    #[test]
    fn forwarded_hop_must_be_an_address() {
        let peer: Option<IpAddr> = "127.0.0.1".parse().ok();
        for forged in ["../../admin?x=", "1.2.3.4/../x", "unknown", ""] {
            let mut headers = HeaderMap::new();
            headers.insert("x-forwarded-for", HeaderValue::from_str(forged).unwrap());
            assert_eq!(client_ip(&headers, peer), peer, "{forged:?}");
            assert_eq!(client_ip(&headers, None), None, "{forged:?}");
        }

        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static(" 2001:db8::1 , 10.0.0.1"));
        assert_eq!(client_ip(&headers, peer), "2001:db8::1".parse().ok());
    }

    #[test]
    fn disposition_keeps_utf8_name() {
        let value = content_disposition("отчёт 2024.pdf");
        assert!(value.starts_with("attachment; filename=\"_____ 2024.pdf\""));
        assert!(value.ends_with("filename*=UTF-8''%D0%BE%D1%82%D1%87%D1%91%D1%82%202024.pdf"));
    }
}
