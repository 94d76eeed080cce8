//! HTTP signal server
//!
//! Every channel request goes through one fallback handler that parses the
//! addressing triple from the path. Paths that do not name a channel
//! operation fall through to static files when a directory is configured.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use bytes::{Bytes, BytesMut};
use futures_util::StreamExt;
use serde_json::json;
use tokio::net::TcpListener;
use tower::ServiceExt;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tracing::{debug, info, warn};

use rendezvous_core::{Address, Config, Event, SdpCodec, SdpTransform};

use crate::error::SignalError;
use crate::presence::ChannelStream;
use crate::registry::SessionRegistry;
use crate::router::MessageRouter;

/// Static file fallback
#[derive(Clone, Debug)]
pub struct StaticFiles {
    pub dir: PathBuf,
    pub index: String,
}

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub registry: SessionRegistry,
    pub router: MessageRouter,
    pub static_files: Option<StaticFiles>,
    pub max_body_bytes: usize,
}

/// Build the HTTP router
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/stats", get(stats))
        .fallback(dispatch)
        .layer(cors)
        .with_state(state)
}

/// Signal server
pub struct SignalServer {
    state: AppState,
}

impl SignalServer {
    /// Create a server, enabling the built-in SDP codec if configured
    pub fn new(config: Config) -> Self {
        let transform: Option<Arc<dyn SdpTransform>> = if config.relay.transform {
            Some(Arc::new(SdpCodec))
        } else {
            None
        };
        Self::with_transform(config, transform)
    }

    /// Create a server with an explicit transform adapter
    pub fn with_transform(config: Config, transform: Option<Arc<dyn SdpTransform>>) -> Self {
        let registry = SessionRegistry::new(&config.relay);
        let router = MessageRouter::new(registry.clone(), transform);
        let static_files = config.static_files.dir.map(|dir| StaticFiles {
            dir,
            index: config.static_files.index,
        });

        Self {
            state: AppState {
                registry,
                router,
                static_files,
                max_body_bytes: config.relay.max_body_bytes,
            },
        }
    }

    pub fn router(&self) -> Router {
        build_router(self.state.clone())
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.state.registry
    }

    /// Start the signal server
    pub async fn serve(&self, addr: SocketAddr) -> Result<(), std::io::Error> {
        let listener = TcpListener::bind(addr).await?;
        info!("Signal server listening on {}", addr);

        if !self.state.router.has_transform() {
            warn!("SDP transform disabled, payloads are relayed verbatim");
        }
        if let Some(files) = &self.state.static_files {
            info!("Serving static files from {:?}", files.dir);
        }

        let registry = self.state.registry.clone();
        axum::serve(listener, self.router())
            .with_graceful_shutdown(async move {
                let _ = tokio::signal::ctrl_c().await;
                info!("Shutting down, closing {} channels", registry.participant_count());
                registry.shutdown();
            })
            .await
    }
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "sessions": state.registry.session_count(),
        "participants": state.registry.participant_count(),
    }))
}

async fn stats(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "sessions": state.registry.session_count(),
        "participants": state.registry.participant_count(),
    }))
}

async fn dispatch(State(state): State<AppState>, request: Request) -> Response {
    let address = match Address::parse(request.uri().path()) {
        Ok(Some(address)) => address,
        Ok(None) => return serve_static(&state, request).await,
        Err(e) => {
            debug!("Rejected {}: {}", request.uri().path(), e);
            return SignalError::from(e).into_response();
        }
    };

    match address {
        Address::Subscribe {
            session,
            participant,
        } => {
            if request.method() != Method::GET {
                return SignalError::MethodNotAllowed(request.method().to_string()).into_response();
            }
            subscribe(&state, &session, &participant)
        }
        Address::Post {
            session,
            sender,
            recipient,
        } => {
            if request.method() != Method::POST && request.method() != Method::PUT {
                return SignalError::MethodNotAllowed(request.method().to_string()).into_response();
            }
            match post(&state, request, &session, &sender, &recipient).await {
                Ok(()) => (StatusCode::NO_CONTENT, [(header::CONTENT_TYPE, "text/plain")])
                    .into_response(),
                Err(e) => {
                    debug!("Post {} -> {} in {} failed: {}", sender, recipient, session, e);
                    e.into_response()
                }
            }
        }
    }
}

fn subscribe(state: &AppState, session: &str, participant: &str) -> Response {
    match state.registry.subscribe(session, participant) {
        Ok(subscription) => event_stream(subscription.stream),
        Err(SignalError::SessionFull { session }) => {
            info!("Session {} is full, {} turned away", session, participant);
            event_stream(ChannelStream::once(&Event::Busy { session }))
        }
        Err(e) => e.into_response(),
    }
}

async fn post(
    state: &AppState,
    request: Request,
    session_id: &str,
    sender: &str,
    recipient: &str,
) -> Result<(), SignalError> {
    let body = read_body(request.into_body(), state.max_body_bytes);
    state.router.relay(session_id, sender, recipient, body).await
}

/// Collect a request body, failing once it exceeds `limit` bytes
async fn read_body(body: Body, limit: usize) -> Result<Bytes, SignalError> {
    let mut stream = body.into_data_stream();
    let mut buf = BytesMut::new();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| SignalError::Body(e.to_string()))?;
        if buf.len() + chunk.len() > limit {
            return Err(SignalError::PayloadTooLarge { limit });
        }
        buf.extend_from_slice(&chunk);
    }
    Ok(buf.freeze())
}

fn event_stream(stream: ChannelStream) -> Response {
    let mut response = Response::new(Body::from_stream(stream));
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/event-stream"));
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache, no-store"));
    headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
    headers.insert(header::EXPIRES, HeaderValue::from_static("0"));
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    response
}

async fn serve_static(state: &AppState, request: Request) -> Response {
    let Some(files) = &state.static_files else {
        return StatusCode::NOT_FOUND.into_response();
    };
    if request.method() != Method::GET && request.method() != Method::HEAD {
        return SignalError::MethodNotAllowed(request.method().to_string()).into_response();
    }

    let index = files.dir.join(&files.index);
    if request.uri().path() == "/" {
        return ServeFile::new(index).oneshot(request).await.into_response();
    }
    ServeDir::new(&files.dir)
        .fallback(ServeFile::new(index))
        .oneshot(request)
        .await
        .into_response()
}
