use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use futures_util::TryStreamExt;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::source::{AuthenticatedSource, MediaSource};
use crate::errors::{PlayerError, PlayerResult};
use crate::services::webdav::WebDAVConnection;

/// Response headers copied from the WebDAV server to the media engine
const FORWARDED_HEADERS: [header::HeaderName; 4] = [
    header::CONTENT_TYPE,
    header::CONTENT_LENGTH,
    header::CONTENT_RANGE,
    header::ACCEPT_RANGES,
];

#[derive(Default)]
struct ProxyState {
    sources: Mutex<HashMap<Uuid, AuthenticatedSource>>,
}

impl ProxyState {
    fn sources(&self) -> MutexGuard<'_, HashMap<Uuid, AuthenticatedSource>> {
        self.sources.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Loopback HTTP server that lets the media engine stream remote files
/// without ever seeing the credentials.
///
/// Each opened file is registered under a random token; the engine gets
/// `http://127.0.0.1:<port>/media/<token>/<name>` and the proxy forwards
/// its (range) requests to WebDAV with Basic auth attached.
pub struct MediaProxy {
    addr: SocketAddr,
    state: Arc<ProxyState>,
    connection: WebDAVConnection,
    shutdown: CancellationToken,
}

fn router() -> Router<Arc<ProxyState>> {
    Router::new().route("/media/{token}/{name}", get(stream_media))
}

impl MediaProxy {
    /// Binds a loopback port (0 for an ephemeral one) and serves on the
    /// current runtime
    pub async fn start(connection: WebDAVConnection, port: u16) -> PlayerResult<Self> {
        let listener = TcpListener::bind(("127.0.0.1", port)).await?;
        let addr = listener.local_addr()?;

        let state = Arc::new(ProxyState::default());
        let app = router().with_state(state.clone());

        let shutdown = CancellationToken::new();
        let stop = shutdown.clone();
        tokio::spawn(async move {
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async move { stop.cancelled().await })
                .await;
            if let Err(e) = result {
                error!("❌ Media proxy stopped with error: {}", e);
            }
        });

        info!("🎬 Media proxy listening on {}", addr);
        Ok(Self {
            addr,
            state,
            connection,
            shutdown,
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Makes a remote file streamable and returns the source to hand to the engine
    pub fn register(&self, relative_path: &str, display_name: &str) -> MediaSource {
        let token = Uuid::new_v4();
        let url = format!(
            "http://{}/media/{}/{}",
            self.addr,
            token,
            urlencoding::encode(display_name.trim_end_matches('/'))
        );

        self.state.sources().insert(
            token,
            AuthenticatedSource::new(self.connection.clone(), relative_path),
        );
        debug!("Registered media source {} for '{}'", token, relative_path);

        MediaSource::new(token, url, relative_path, display_name)
    }

    /// Stops serving a token; later requests for it get 404
    pub fn revoke(&self, token: Uuid) -> bool {
        self.state.sources().remove(&token).is_some()
    }

    /// Number of registered sources
    pub fn active(&self) -> usize {
        self.state.sources().len()
    }

    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}

impl Drop for MediaProxy {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn stream_media(
    State(state): State<Arc<ProxyState>>,
    Path((token, _name)): Path<(Uuid, String)>,
    headers: HeaderMap,
) -> Response {
    let source = state.sources().get(&token).cloned();
    let Some(source) = source else {
        warn!("Request for unknown media token {}", token);
        return (StatusCode::NOT_FOUND, "Unknown media").into_response();
    };

    let range = headers.get(header::RANGE).and_then(|v| v.to_str().ok());

    match source.open_range(range).await {
        Ok(upstream) => {
            let mut builder = Response::builder().status(upstream.status());
            for name in FORWARDED_HEADERS {
                if let Some(value) = upstream.headers().get(&name) {
                    builder = builder.header(name, value.clone());
                }
            }

            let relative_path = source.relative_path().to_string();
            let stream = upstream
                .bytes_stream()
                .inspect_err(move |e| {
                    warn!("Media stream for '{}' broke off: {}", relative_path, e)
                });

            builder
                .body(Body::from_stream(stream))
                .unwrap_or_else(|e| {
                    error!("Failed to build media response: {}", e);
                    StatusCode::INTERNAL_SERVER_ERROR.into_response()
                })
        }
        Err(e) => {
            error!("❌ Failed to stream '{}': {}", source.relative_path(), e);
            let status = match e {
                PlayerError::AuthRejected { status, .. } => {
                    StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY)
                }
                _ => StatusCode::BAD_GATEWAY,
            };
            status.into_response()
        }
    }
}
