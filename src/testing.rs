//! Recording stub for [`GitHubApi`] used by unit tests.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};

use crate::error::UpstreamError;
use crate::github::{GitHubApi, Query};
use crate::tools::ToolContext;

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub method: &'static str,
    pub route: String,
    pub body: Option<Value>,
}

/// GET routes answer from `fixtures` (404 when absent); writes echo back
/// `{"ok": true}` unless a failure was queued for that route.
#[derive(Default)]
pub struct StubGitHub {
    fixtures: Mutex<HashMap<String, Value>>,
    failures: Mutex<HashMap<String, u16>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl StubGitHub {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_fixture(self: Arc<Self>, route: &str, value: Value) -> Arc<Self> {
        self.fixtures.lock().insert(route.to_string(), value);
        self
    }

    pub fn with_failure(self: Arc<Self>, route: &str, status: u16) -> Arc<Self> {
        self.failures.lock().insert(route.to_string(), status);
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    pub fn context(self: &Arc<Self>) -> ToolContext {
        ToolContext::new(self.clone(), None, 30)
    }

    fn record(&self, method: &'static str, route: &str, body: Option<&Value>) {
        self.calls.lock().push(RecordedCall {
            method,
            route: route.to_string(),
            body: body.cloned(),
        });
    }

    fn failure(&self, route: &str) -> Option<UpstreamError> {
        self.failures.lock().get(route).copied().map(|status| match status {
            404 => UpstreamError::NotFound(route.to_string()),
            status => UpstreamError::Status {
                status,
                message: "stubbed failure".to_string(),
            },
        })
    }

    fn write(&self, method: &'static str, route: &str, body: &Value) -> Result<Value, UpstreamError> {
        self.record(method, route, Some(body));
        match self.failure(route) {
            Some(err) => Err(err),
            None => Ok(json!({ "ok": true })),
        }
    }
}

#[async_trait]
impl GitHubApi for StubGitHub {
    async fn get(&self, route: &str, _query: &Query) -> Result<Value, UpstreamError> {
        self.record("GET", route, None);
        if let Some(err) = self.failure(route) {
            return Err(err);
        }
        self.fixtures
            .lock()
            .get(route)
            .cloned()
            .ok_or_else(|| UpstreamError::NotFound(route.to_string()))
    }

    async fn post(&self, route: &str, body: &Value) -> Result<Value, UpstreamError> {
        self.write("POST", route, body)
    }

    async fn put(&self, route: &str, body: &Value) -> Result<Value, UpstreamError> {
        self.write("PUT", route, body)
    }

    async fn patch(&self, route: &str, body: &Value) -> Result<Value, UpstreamError> {
        self.write("PATCH", route, body)
    }

    async fn delete(&self, route: &str, body: &Value) -> Result<Value, UpstreamError> {
        self.write("DELETE", route, body)
    }

    async fn dispatch_workflow(
        &self,
        owner: &str,
        repo: &str,
        workflow_id: &str,
        git_ref: &str,
        inputs: Value,
    ) -> Result<(), UpstreamError> {
        let route = format!("/repos/{owner}/{repo}/actions/workflows/{workflow_id}/dispatches");
        self.write("POST", &route, &json!({ "ref": git_ref, "inputs": inputs }))
            .map(|_| ())
    }
}
