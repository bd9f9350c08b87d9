//! Integration tests for the HTTP front door.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::{Body, BodyDataStream},
    http::{header, Method, Request, StatusCode},
    Router,
};
use futures::StreamExt;
use mcp_github_sse::dispatcher::Dispatcher;
use mcp_github_sse::error::UpstreamError;
use mcp_github_sse::github::{GitHubApi, Query};
use mcp_github_sse::http::{router, AppState};
use mcp_github_sse::session::SessionManager;
use mcp_github_sse::tools::{github_tools, ToolContext};
use serde_json::{json, Value};
use tower::ServiceExt; // for `oneshot`

/// GET of this route never completes.
const HANGING_ROUTE: &str = "/repos/acme/slow";

/// Serves canned GET responses; everything else is a 404.
struct FixtureGitHub {
    fixtures: HashMap<String, Value>,
}

#[async_trait]
impl GitHubApi for FixtureGitHub {
    async fn get(&self, route: &str, _query: &Query) -> Result<Value, UpstreamError> {
        if route == HANGING_ROUTE {
            futures::future::pending::<()>().await;
        }
        self.fixtures
            .get(route)
            .cloned()
            .ok_or_else(|| UpstreamError::NotFound(route.to_string()))
    }

    async fn post(&self, route: &str, _body: &Value) -> Result<Value, UpstreamError> {
        Err(UpstreamError::NotFound(route.to_string()))
    }

    async fn put(&self, route: &str, _body: &Value) -> Result<Value, UpstreamError> {
        Err(UpstreamError::NotFound(route.to_string()))
    }

    async fn patch(&self, route: &str, _body: &Value) -> Result<Value, UpstreamError> {
        Err(UpstreamError::NotFound(route.to_string()))
    }

    async fn delete(&self, route: &str, _body: &Value) -> Result<Value, UpstreamError> {
        Err(UpstreamError::NotFound(route.to_string()))
    }

    async fn dispatch_workflow(
        &self,
        owner: &str,
        repo: &str,
        workflow_id: &str,
        _git_ref: &str,
        _inputs: Value,
    ) -> Result<(), UpstreamError> {
        Err(UpstreamError::NotFound(format!(
            "{}/{}/{}",
            owner, repo, workflow_id
        )))
    }
}

fn widgets_fixture() -> Value {
    json!({
        "full_name": "acme/widgets",
        "name": "widgets",
        "owner": { "login": "acme" },
        "default_branch": "main",
        "stargazers_count": 42
    })
}

fn create_test_app() -> Router {
    let github = FixtureGitHub {
        fixtures: HashMap::from([("/repos/acme/widgets".to_string(), widgets_fixture())]),
    };
    let ctx = ToolContext::new(Arc::new(github), None, 30);
    let registry = github_tools(ctx).unwrap();
    let state = AppState::new(
        SessionManager::new(Duration::from_secs(10)),
        Dispatcher::new(Arc::new(registry)),
    );
    router(state)
}

/// An open `/sse` stream, read one event at a time.
struct EventReader {
    body: BodyDataStream,
    buffer: String,
}

impl EventReader {
    async fn open(app: &Router) -> Self {
        let response = app
            .clone()
            .oneshot(Request::builder().uri("/sse").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/event-stream"
        );
        Self {
            body: response.into_body().into_data_stream(),
            buffer: String::new(),
        }
    }

    /// Next `(event, data)` pair, skipping comment-only frames.
    async fn next_event(&mut self) -> (String, String) {
        loop {
            if let Some(end) = self.buffer.find("\n\n") {
                let frame: String = self.buffer.drain(..end + 2).collect();
                let mut event = String::new();
                let mut data = String::new();
                for line in frame.lines() {
                    if let Some(value) = line.strip_prefix("event: ") {
                        event = value.to_string();
                    } else if let Some(value) = line.strip_prefix("data: ") {
                        data = value.to_string();
                    }
                }
                if event.is_empty() && data.is_empty() {
                    continue;
                }
                return (event, data);
            }
            let chunk = self.body.next().await.unwrap().unwrap();
            self.buffer.push_str(std::str::from_utf8(&chunk).unwrap());
        }
    }

    /// Read the endpoint event and return the session id it names.
    async fn session_id(&mut self) -> String {
        let (event, data) = self.next_event().await;
        assert_eq!(event, "endpoint");
        data.strip_prefix("/message?sessionId=").unwrap().to_string()
    }
}

async fn post_message(app: &Router, uri: &str, body: Value) -> (StatusCode, Vec<u8>) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, body.to_vec())
}

fn get_repository_call(id: i64) -> Value {
    get_repository_call_for(id, "widgets")
}

fn get_repository_call_for(id: i64, repo: &str) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": "tools/call",
        "params": {
            "name": "get_repository",
            "arguments": { "owner": "acme", "repo": repo }
        }
    })
}

#[tokio::test]
async fn test_health_check() {
    let app = create_test_app();

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "*"
    );
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let health: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(health["status"], "ok");
    assert_eq!(health["service"], "mcp-github-sse");
    assert!(health["version"].is_string());
    assert!(health["timestamp"].is_string());
}

#[tokio::test]
async fn test_preflight() {
    let app = create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .method(Method::OPTIONS)
                .uri("/message")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let headers = response.headers();
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    assert_eq!(
        headers[header::ACCESS_CONTROL_ALLOW_METHODS],
        "GET, POST, OPTIONS"
    );
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_HEADERS], "Content-Type");
}

#[tokio::test]
async fn test_message_for_unknown_session() {
    let app = create_test_app();

    let (status, body) = post_message(&app, "/message?sessionId=nope", get_repository_call(1)).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_message_without_session_id() {
    let app = create_test_app();

    let (status, body) = post_message(&app, "/message", get_repository_call(1)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_malformed_query_is_json_error() {
    let app = create_test_app();

    let (status, body) = post_message(
        &app,
        "/message?sessionId=a&sessionId=b",
        get_repository_call(1),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert!(body["error"].as_str().unwrap().contains("sessionId"));
}

#[tokio::test]
async fn test_null_id_gets_invalid_request() {
    let app = create_test_app();
    let mut stream = EventReader::open(&app).await;
    let session_id = stream.session_id().await;

    let (status, _) = post_message(
        &app,
        &format!("/message?sessionId={}", session_id),
        json!({ "jsonrpc": "2.0", "id": null, "method": "ping" }),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let (_, data) = stream.next_event().await;
    let response: Value = serde_json::from_str(&data).unwrap();
    assert_eq!(response["id"], Value::Null);
    assert_eq!(response["error"]["code"], -32600);
}

#[tokio::test]
async fn test_hung_call_does_not_block_later_call() {
    let app = create_test_app();
    let mut stream = EventReader::open(&app).await;
    let session_id = stream.session_id().await;
    let uri = format!("/message?sessionId={}", session_id);

    let (status, _) = post_message(&app, &uri, get_repository_call_for(1, "slow")).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let (status, _) = post_message(&app, &uri, get_repository_call_for(2, "widgets")).await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let (event, data) = tokio::time::timeout(Duration::from_secs(5), stream.next_event())
        .await
        .expect("later call was blocked by the hung one");
    assert_eq!(event, "message");
    let response: Value = serde_json::from_str(&data).unwrap();
    assert_eq!(response["id"], 2);
    assert_ne!(response["result"]["isError"], true);
}

#[tokio::test]
async fn test_unparseable_message() {
    let app = create_test_app();
    let mut stream = EventReader::open(&app).await;
    let session_id = stream.session_id().await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri(format!("/message?sessionId={}", session_id))
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_tool_result_is_pushed_on_stream() {
    let app = create_test_app();
    let mut stream = EventReader::open(&app).await;
    let session_id = stream.session_id().await;
    let uri = format!("/message?sessionId={}", session_id);

    let (status, _) = post_message(
        &app,
        &uri,
        json!({ "jsonrpc": "2.0", "id": 1, "method": "tools/list" }),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let (event, data) = stream.next_event().await;
    assert_eq!(event, "message");
    let listed: Value = serde_json::from_str(&data).unwrap();
    let tools = listed["result"]["tools"].as_array().unwrap();
    assert!(tools.iter().any(|t| t["name"] == "get_repository"));

    let (status, body) = post_message(&app, &uri, get_repository_call(2)).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body, b"Accepted");

    let (event, data) = stream.next_event().await;
    assert_eq!(event, "message");
    let response: Value = serde_json::from_str(&data).unwrap();
    assert_eq!(response["id"], 2);
    assert_eq!(
        response["result"]["content"][0]["text"],
        serde_json::to_string_pretty(&widgets_fixture()).unwrap()
    );
}

#[tokio::test]
async fn test_sessions_are_isolated() {
    let app = create_test_app();
    let mut first = EventReader::open(&app).await;
    let mut second = EventReader::open(&app).await;
    let first_id = first.session_id().await;
    let second_id = second.session_id().await;
    assert_ne!(first_id, second_id);

    let (status, _) = post_message(
        &app,
        &format!("/message?sessionId={}", first_id),
        get_repository_call(7),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let (_, data) = first.next_event().await;
    let response: Value = serde_json::from_str(&data).unwrap();
    assert_eq!(response["id"], 7);

    let leaked = tokio::time::timeout(Duration::from_millis(200), second.next_event()).await;
    assert!(leaked.is_err(), "second session received another session's result");
}

#[tokio::test]
async fn test_closed_stream_ends_session() {
    let app = create_test_app();
    let mut stream = EventReader::open(&app).await;
    let session_id = stream.session_id().await;
    drop(stream);

    let (status, _) = post_message(
        &app,
        &format!("/message?sessionId={}", session_id),
        get_repository_call(1),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}
