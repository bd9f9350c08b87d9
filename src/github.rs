//! Upstream GitHub REST client.
//!
//! Tools talk to GitHub only through [`GitHubApi`], which keeps them testable
//! against a stub and keeps `octocrab` details in one place.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::UpstreamError;

/// Query-string pairs appended to a route.
pub type Query = [(&'static str, String)];

#[async_trait]
pub trait GitHubApi: Send + Sync {
    async fn get(&self, route: &str, query: &Query) -> Result<Value, UpstreamError>;

    async fn post(&self, route: &str, body: &Value) -> Result<Value, UpstreamError>;

    async fn put(&self, route: &str, body: &Value) -> Result<Value, UpstreamError>;

    async fn patch(&self, route: &str, body: &Value) -> Result<Value, UpstreamError>;

    async fn delete(&self, route: &str, body: &Value) -> Result<Value, UpstreamError>;

    /// Fire a `workflow_dispatch` event. GitHub answers with an empty body.
    async fn dispatch_workflow(
        &self,
        owner: &str,
        repo: &str,
        workflow_id: &str,
        git_ref: &str,
        inputs: Value,
    ) -> Result<(), UpstreamError>;
}

/// [`GitHubApi`] backed by an authenticated `octocrab` instance.
pub struct OctocrabClient {
    github: octocrab::Octocrab,
}

impl OctocrabClient {
    pub fn new(github: octocrab::Octocrab) -> Self {
        Self { github }
    }

    pub fn with_token(token: &str) -> Result<Self, UpstreamError> {
        let github = octocrab::OctocrabBuilder::new()
            .personal_token(token.to_string())
            .build()?;
        Ok(Self::new(github))
    }
}

#[async_trait]
impl GitHubApi for OctocrabClient {
    async fn get(&self, route: &str, query: &Query) -> Result<Value, UpstreamError> {
        let response = if query.is_empty() {
            self.github.get(route, None::<&()>).await?
        } else {
            self.github.get(route, Some(&query)).await?
        };
        Ok(response)
    }

    async fn post(&self, route: &str, body: &Value) -> Result<Value, UpstreamError> {
        Ok(self.github.post(route, Some(body)).await?)
    }

    async fn put(&self, route: &str, body: &Value) -> Result<Value, UpstreamError> {
        Ok(self.github.put(route, Some(body)).await?)
    }

    async fn patch(&self, route: &str, body: &Value) -> Result<Value, UpstreamError> {
        Ok(self.github.patch(route, Some(body)).await?)
    }

    async fn delete(&self, route: &str, body: &Value) -> Result<Value, UpstreamError> {
        Ok(self.github.delete(route, Some(body)).await?)
    }

    async fn dispatch_workflow(
        &self,
        owner: &str,
        repo: &str,
        workflow_id: &str,
        git_ref: &str,
        inputs: Value,
    ) -> Result<(), UpstreamError> {
        self.github
            .actions()
            .create_workflow_dispatch(owner, repo, workflow_id, git_ref)
            .inputs(inputs)
            .send()
            .await?;
        Ok(())
    }
}
