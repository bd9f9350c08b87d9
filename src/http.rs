//! HTTP Front Door.
//!
//! `/health`, the `/sse` stream, and `/message` for client-to-server RPC.
//! Results of a POSTed request are pushed on the session's stream; the POST
//! itself only acknowledges the hand-off.

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{rejection::QueryRejection, Query, Request, State},
    http::{header, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::{sse::Sse, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use futures::StreamExt;
use serde::Deserialize;
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing::{debug, warn};

use crate::dispatcher::Dispatcher;
use crate::protocol::parse_request;
use crate::session::{SessionManager, MESSAGE_PATH};

#[derive(Clone)]
pub struct AppState {
    pub sessions: SessionManager,
    pub dispatcher: Arc<Dispatcher>,
}

impl AppState {
    pub fn new(sessions: SessionManager, dispatcher: Dispatcher) -> Self {
        Self {
            sessions,
            dispatcher: Arc::new(dispatcher),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/sse", get(sse))
        .route(MESSAGE_PATH, post(message))
        .layer(middleware::from_fn(cors))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Permissive CORS: preflights short-circuit with 204, everything else gets
/// the allow-origin header.
async fn cors(request: Request, next: Next) -> Response {
    if request.method() == Method::OPTIONS {
        let mut response = StatusCode::NO_CONTENT.into_response();
        let headers = response.headers_mut();
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("*"),
        );
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static("GET, POST, OPTIONS"),
        );
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static("Content-Type"),
        );
        return response;
    }

    let mut response = next.run(request).await;
    response.headers_mut().insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    response
}

async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

/// GET /sse - open a session. The first event names the URL to POST to.
async fn sse(State(state): State<AppState>) -> Response {
    let (_session, stream) = state.sessions.create();
    // Heartbeats come from the transport channel, so no axum keep-alive here.
    Sse::new(stream.map(|frame| Ok::<_, Infallible>(frame.into_event()))).into_response()
}

#[derive(Debug, Deserialize)]
struct MessageQuery {
    #[serde(rename = "sessionId")]
    session_id: Option<String>,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

/// POST /message?sessionId=<id> - hand one JSON-RPC message to the dispatcher.
async fn message(
    State(state): State<AppState>,
    query: Result<Query<MessageQuery>, QueryRejection>,
    body: Bytes,
) -> Response {
    let Query(query) = match query {
        Ok(query) => query,
        Err(rejection) => return error_response(StatusCode::BAD_REQUEST, rejection.body_text()),
    };
    let Some(session_id) = query.session_id.filter(|id| !id.is_empty()) else {
        return error_response(StatusCode::BAD_REQUEST, "Missing sessionId parameter");
    };

    let session = match state.sessions.lookup(&session_id) {
        Ok(session) => session,
        Err(_) => {
            debug!(session_id = %session_id, "Message for unknown session");
            return error_response(StatusCode::NOT_FOUND, "Session not found");
        }
    };

    let request = match parse_request(&body) {
        Ok(request) => request,
        Err(e) => {
            warn!(session_id = %session_id, error = %e, "Unparseable message");
            return error_response(
                StatusCode::BAD_REQUEST,
                format!("Invalid JSON-RPC message: {}", e),
            );
        }
    };

    let dispatcher = state.dispatcher.clone();
    tokio::spawn(async move {
        let Some(response) = dispatcher.handle_request(request).await else {
            return;
        };
        let payload = match serde_json::to_string(&response) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(session_id = %session.id(), error = %e, "Failed to serialize response");
                return;
            }
        };
        if let Err(e) = session.send(payload).await {
            debug!(error = %e, "Dropping response for closed session");
        }
    });

    (StatusCode::ACCEPTED, "Accepted").into_response()
}
