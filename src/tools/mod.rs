//! Tool Handler abstraction and the immutable Tool Registry.
//!
//! Every tool is a value implementing [`GithubTool`]: a typed parameter
//! struct (its JSON schema is the tool's input schema) plus an async `call`
//! that talks to GitHub through the [`ToolContext`] it was constructed with.
//! The blanket [`ToolHandler`] impl binds the untyped argument bag and renders
//! the output, so the registry stores all tools behind one object-safe trait.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use rmcp::model::{CallToolResult, Content, JsonObject, Tool};
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{McpGithubError, RegistryError};
use crate::github::GitHubApi;

/// Declares tool structs that carry a [`ToolContext`].
macro_rules! context_tools {
    ($($name:ident),* $(,)?) => {
        $(
            pub struct $name {
                ctx: $crate::tools::ToolContext,
            }

            impl $name {
                pub fn new(ctx: $crate::tools::ToolContext) -> Self {
                    Self { ctx }
                }
            }
        )*
    };
}

pub mod commits;
pub mod files;
pub mod issues;
pub mod pulls;
pub mod repos;
pub mod workflows;

/// Dependencies handed to every tool at construction time.
#[derive(Clone)]
pub struct ToolContext {
    github: Arc<dyn GitHubApi>,
    default_owner: Option<String>,
    max_results: u32,
}

impl ToolContext {
    pub fn new(github: Arc<dyn GitHubApi>, default_owner: Option<String>, max_results: u32) -> Self {
        Self {
            github,
            default_owner,
            max_results,
        }
    }

    pub fn github(&self) -> &dyn GitHubApi {
        self.github.as_ref()
    }

    pub fn resolve_owner(&self, param: Option<&str>) -> Result<String, McpGithubError> {
        let owner = param
            .map(String::from)
            .or_else(|| self.default_owner.clone())
            .ok_or_else(|| {
                McpGithubError::MissingParam(
                    "owner is required (or set --owner default)".to_string(),
                )
            })?;
        sanitize_github_name(&owner, "owner")?;
        Ok(owner)
    }

    /// Resolve and validate an `owner/repo` pair, returning the route prefix
    /// `/repos/{owner}/{repo}`.
    pub fn repo_route(&self, owner: Option<&str>, repo: &str) -> Result<String, McpGithubError> {
        let owner = self.resolve_owner(owner)?;
        sanitize_github_name(repo, "repo")?;
        Ok(format!("/repos/{}/{}", owner, repo))
    }

    /// Cap per_page to 100 (GitHub API maximum).
    pub fn capped_per_page(&self, per_page: Option<u32>) -> u32 {
        std::cmp::min(per_page.unwrap_or(self.max_results), 100)
    }
}

/// Validate that a GitHub owner/repo name doesn't contain characters that
/// could be used for URL injection in raw API routes.
pub fn sanitize_github_name(name: &str, field: &str) -> Result<(), McpGithubError> {
    if name.is_empty() {
        return Err(McpGithubError::MissingParam(format!(
            "{} must not be empty",
            field
        )));
    }
    for ch in ['/', '?', '#', '%', '\0', ' ', '\n', '\t'] {
        if name.contains(ch) {
            return Err(McpGithubError::InvalidParams(format!(
                "{} contains invalid character '{}'",
                field,
                ch.escape_default()
            )));
        }
    }
    if name == "." || name == ".." {
        return Err(McpGithubError::InvalidParams(format!(
            "{} must not be a relative path segment",
            field
        )));
    }
    Ok(())
}

/// Validate a value for use in URL paths. Unlike `sanitize_github_name`,
/// this allows slashes (branch names like `feature/foo`, file paths like
/// `src/main.rs`).
pub fn sanitize_url_value(value: &str, field: &str) -> Result<(), McpGithubError> {
    if value.is_empty() {
        return Err(McpGithubError::MissingParam(format!(
            "{} must not be empty",
            field
        )));
    }
    for ch in ['?', '#', '&', '\0', '\n', '\r', '\t'] {
        if value.contains(ch) {
            return Err(McpGithubError::InvalidParams(format!(
                "{} contains invalid character",
                field
            )));
        }
    }
    if value.split('/').any(|segment| segment == "..") {
        return Err(McpGithubError::InvalidParams(format!(
            "{} must not contain '..' segments",
            field
        )));
    }
    Ok(())
}

/// A GitHub operation with a typed argument struct.
#[async_trait]
pub trait GithubTool: Send + Sync + 'static {
    type Params: DeserializeOwned + JsonSchema + Send;

    const NAME: &'static str;
    const DESCRIPTION: &'static str;

    async fn call(&self, params: Self::Params) -> Result<Value, McpGithubError>;
}

/// Object-safe capability stored in the registry.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    fn descriptor(&self) -> Tool;

    async fn invoke(&self, arguments: JsonObject) -> Result<CallToolResult, McpGithubError>;
}

#[async_trait]
impl<T: GithubTool> ToolHandler for T {
    fn descriptor(&self) -> Tool {
        Tool::new(T::NAME, T::DESCRIPTION, input_schema::<T::Params>())
    }

    async fn invoke(&self, arguments: JsonObject) -> Result<CallToolResult, McpGithubError> {
        let params: T::Params = serde_json::from_value(Value::Object(arguments))
            .map_err(|e| McpGithubError::InvalidParams(e.to_string()))?;
        let output = self.call(params).await?;
        Ok(CallToolResult::success(vec![Content::text(render(&output))]))
    }
}

/// JSON schema object for a parameter type.
pub fn input_schema<P: JsonSchema>() -> Arc<JsonObject> {
    match serde_json::to_value(schemars::schema_for!(P)) {
        Ok(Value::Object(map)) => Arc::new(map),
        _ => {
            let mut map = JsonObject::new();
            map.insert("type".to_string(), Value::String("object".to_string()));
            Arc::new(map)
        }
    }
}

/// Text rendering of a tool's output value.
pub fn render(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
}

struct Registered {
    descriptor: Tool,
    handler: Box<dyn ToolHandler>,
}

/// Ordered, immutable mapping from tool name to descriptor and handler.
pub struct ToolRegistry {
    tools: Vec<Registered>,
    by_name: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn builder() -> ToolRegistryBuilder {
        ToolRegistryBuilder {
            registry: ToolRegistry {
                tools: Vec::new(),
                by_name: HashMap::new(),
            },
        }
    }

    /// Descriptors in registration order.
    pub fn descriptors(&self) -> Vec<Tool> {
        self.tools.iter().map(|t| t.descriptor.clone()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&dyn ToolHandler> {
        self.by_name
            .get(name)
            .map(|&idx| self.tools[idx].handler.as_ref())
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

pub struct ToolRegistryBuilder {
    registry: ToolRegistry,
}

impl ToolRegistryBuilder {
    pub fn register<H: ToolHandler + 'static>(mut self, handler: H) -> Result<Self, RegistryError> {
        let descriptor = handler.descriptor();
        let name = descriptor.name.to_string();
        if self.registry.by_name.contains_key(&name) {
            return Err(RegistryError::DuplicateTool(name));
        }
        self.registry
            .by_name
            .insert(name, self.registry.tools.len());
        self.registry.tools.push(Registered {
            descriptor,
            handler: Box::new(handler),
        });
        Ok(self)
    }

    pub fn build(self) -> ToolRegistry {
        self.registry
    }
}

/// Registry holding the full GitHub tool catalog.
pub fn github_tools(ctx: ToolContext) -> Result<ToolRegistry, RegistryError> {
    let registry = ToolRegistry::builder()
        .register(repos::SearchRepositories::new(ctx.clone()))?
        .register(repos::GetRepository::new(ctx.clone()))?
        .register(repos::CreateRepository::new(ctx.clone()))?
        .register(repos::ForkRepository::new(ctx.clone()))?
        .register(repos::ListBranches::new(ctx.clone()))?
        .register(repos::CreateBranch::new(ctx.clone()))?
        .register(files::GetFileContents::new(ctx.clone()))?
        .register(files::CreateOrUpdateFile::new(ctx.clone()))?
        .register(files::DeleteFile::new(ctx.clone()))?
        .register(issues::ListIssues::new(ctx.clone()))?
        .register(issues::GetIssue::new(ctx.clone()))?
        .register(issues::CreateIssue::new(ctx.clone()))?
        .register(issues::UpdateIssue::new(ctx.clone()))?
        .register(issues::AddIssueComment::new(ctx.clone()))?
        .register(issues::SearchIssues::new(ctx.clone()))?
        .register(pulls::ListPullRequests::new(ctx.clone()))?
        .register(pulls::GetPullRequest::new(ctx.clone()))?
        .register(pulls::CreatePullRequest::new(ctx.clone()))?
        .register(pulls::MergePullRequest::new(ctx.clone()))?
        .register(pulls::ListPullRequestFiles::new(ctx.clone()))?
        .register(commits::ListCommits::new(ctx.clone()))?
        .register(commits::GetCommit::new(ctx.clone()))?
        .register(workflows::ListWorkflows::new(ctx.clone()))?
        .register(workflows::ListWorkflowRuns::new(ctx.clone()))?
        .register(workflows::TriggerWorkflow::new(ctx))?
        .build();
    Ok(registry)
}
