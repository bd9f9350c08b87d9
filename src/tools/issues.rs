use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use super::repos::{as_array, items, repo_label};
use super::GithubTool;
use crate::error::McpGithubError;

context_tools!(
    ListIssues,
    GetIssue,
    CreateIssue,
    UpdateIssue,
    AddIssueComment,
    SearchIssues,
);

/// Issue/PR state filter.
#[derive(Debug, Clone, Copy, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum StateFilter {
    Open,
    Closed,
    All,
}

impl StateFilter {
    pub fn as_str(self) -> &'static str {
        match self {
            StateFilter::Open => "open",
            StateFilter::Closed => "closed",
            StateFilter::All => "all",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum IssueState {
    Open,
    Closed,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ListIssuesParams {
    #[schemars(description = "Repository owner (user or org)")]
    #[serde(default)]
    pub owner: Option<String>,

    #[schemars(description = "Repository name")]
    pub repo: String,

    #[schemars(description = "Filter by state (default: open)")]
    #[serde(default)]
    pub state: Option<StateFilter>,

    #[schemars(description = "Filter by label names")]
    #[serde(default)]
    pub labels: Option<Vec<String>>,

    #[schemars(description = "Maximum number of results")]
    #[serde(default)]
    pub per_page: Option<u32>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct IssueParams {
    #[schemars(description = "Repository owner (user or org)")]
    #[serde(default)]
    pub owner: Option<String>,

    #[schemars(description = "Repository name")]
    pub repo: String,

    #[schemars(description = "Issue number")]
    pub issue_number: u64,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CreateIssueParams {
    #[schemars(description = "Repository owner (user or org)")]
    #[serde(default)]
    pub owner: Option<String>,

    #[schemars(description = "Repository name")]
    pub repo: String,

    #[schemars(description = "Issue title")]
    pub title: String,

    #[schemars(description = "Issue body (markdown)")]
    #[serde(default)]
    pub body: Option<String>,

    #[schemars(description = "Usernames to assign")]
    #[serde(default)]
    pub assignees: Option<Vec<String>>,

    #[schemars(description = "Labels to apply")]
    #[serde(default)]
    pub labels: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct UpdateIssueParams {
    #[schemars(description = "Repository owner (user or org)")]
    #[serde(default)]
    pub owner: Option<String>,

    #[schemars(description = "Repository name")]
    pub repo: String,

    #[schemars(description = "Issue number")]
    pub issue_number: u64,

    #[schemars(description = "New title")]
    #[serde(default)]
    pub title: Option<String>,

    #[schemars(description = "New body (markdown)")]
    #[serde(default)]
    pub body: Option<String>,

    #[schemars(description = "New state")]
    #[serde(default)]
    pub state: Option<IssueState>,

    #[schemars(description = "Replacement label set")]
    #[serde(default)]
    pub labels: Option<Vec<String>>,

    #[schemars(description = "Replacement assignee set")]
    #[serde(default)]
    pub assignees: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct IssueCommentParams {
    #[schemars(description = "Repository owner (user or org)")]
    #[serde(default)]
    pub owner: Option<String>,

    #[schemars(description = "Repository name")]
    pub repo: String,

    #[schemars(description = "Issue or pull request number")]
    pub issue_number: u64,

    #[schemars(description = "Comment text (markdown)")]
    pub body: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SearchIssuesParams {
    #[schemars(description = "Search query (GitHub issue search syntax)")]
    pub query: String,

    #[schemars(description = "Sort field: comments, reactions, created, updated")]
    #[serde(default)]
    pub sort: Option<String>,

    #[schemars(description = "Maximum number of results")]
    #[serde(default)]
    pub per_page: Option<u32>,
}

fn issue_summary(i: &Value) -> Value {
    let labels: Vec<&Value> = as_array(i.get("labels").unwrap_or(&Value::Null))
        .iter()
        .filter_map(|l| l.get("name"))
        .collect();
    json!({
        "number": i.get("number"),
        "title": i.get("title"),
        "state": i.get("state"),
        "author": i.pointer("/user/login"),
        "labels": labels,
        "comments": i.get("comments"),
        "created_at": i.get("created_at"),
    })
}

#[async_trait]
impl GithubTool for ListIssues {
    type Params = ListIssuesParams;
    const NAME: &'static str = "list_issues";
    const DESCRIPTION: &'static str =
        "List issues in a repository, optionally filtered by state and labels";

    async fn call(&self, params: ListIssuesParams) -> Result<Value, McpGithubError> {
        let route = self.ctx.repo_route(params.owner.as_deref(), &params.repo)?;

        let mut query = vec![
            ("state", params.state.unwrap_or(StateFilter::Open).as_str().to_string()),
            ("per_page", self.ctx.capped_per_page(params.per_page).to_string()),
        ];
        if let Some(labels) = params.labels.filter(|l| !l.is_empty()) {
            query.push(("labels", labels.join(",")));
        }

        let response = self
            .ctx
            .github()
            .get(&format!("{}/issues", route), &query)
            .await?;

        // The issues endpoint also returns pull requests.
        let issues: Vec<Value> = as_array(&response)
            .iter()
            .filter(|i| i.get("pull_request").is_none())
            .map(issue_summary)
            .collect();

        Ok(json!({
            "repo": repo_label(&route),
            "count": issues.len(),
            "issues": issues,
        }))
    }
}

#[async_trait]
impl GithubTool for GetIssue {
    type Params = IssueParams;
    const NAME: &'static str = "get_issue";
    const DESCRIPTION: &'static str = "Get issue details";

    async fn call(&self, params: IssueParams) -> Result<Value, McpGithubError> {
        let route = self.ctx.repo_route(params.owner.as_deref(), &params.repo)?;
        Ok(self
            .ctx
            .github()
            .get(&format!("{}/issues/{}", route, params.issue_number), &[])
            .await?)
    }
}

#[async_trait]
impl GithubTool for CreateIssue {
    type Params = CreateIssueParams;
    const NAME: &'static str = "create_issue";
    const DESCRIPTION: &'static str = "Create a new issue in a repository";

    async fn call(&self, params: CreateIssueParams) -> Result<Value, McpGithubError> {
        let route = self.ctx.repo_route(params.owner.as_deref(), &params.repo)?;

        let mut body = Map::new();
        body.insert("title".into(), json!(params.title));
        if let Some(text) = params.body {
            body.insert("body".into(), json!(text));
        }
        if let Some(assignees) = params.assignees {
            body.insert("assignees".into(), json!(assignees));
        }
        if let Some(labels) = params.labels {
            body.insert("labels".into(), json!(labels));
        }

        Ok(self
            .ctx
            .github()
            .post(&format!("{}/issues", route), &Value::Object(body))
            .await?)
    }
}

#[async_trait]
impl GithubTool for UpdateIssue {
    type Params = UpdateIssueParams;
    const NAME: &'static str = "update_issue";
    const DESCRIPTION: &'static str = "Update an existing issue's title, body, state, labels or assignees";

    async fn call(&self, params: UpdateIssueParams) -> Result<Value, McpGithubError> {
        let route = self.ctx.repo_route(params.owner.as_deref(), &params.repo)?;

        let mut body = Map::new();
        if let Some(title) = params.title {
            body.insert("title".into(), json!(title));
        }
        if let Some(text) = params.body {
            body.insert("body".into(), json!(text));
        }
        if let Some(state) = params.state {
            body.insert("state".into(), json!(state));
        }
        if let Some(labels) = params.labels {
            body.insert("labels".into(), json!(labels));
        }
        if let Some(assignees) = params.assignees {
            body.insert("assignees".into(), json!(assignees));
        }
        if body.is_empty() {
            return Err(McpGithubError::MissingParam(
                "at least one field to update is required".to_string(),
            ));
        }

        Ok(self
            .ctx
            .github()
            .patch(
                &format!("{}/issues/{}", route, params.issue_number),
                &Value::Object(body),
            )
            .await?)
    }
}

#[async_trait]
impl GithubTool for AddIssueComment {
    type Params = IssueCommentParams;
    const NAME: &'static str = "add_issue_comment";
    const DESCRIPTION: &'static str = "Add a comment to an issue or pull request";

    async fn call(&self, params: IssueCommentParams) -> Result<Value, McpGithubError> {
        let route = self.ctx.repo_route(params.owner.as_deref(), &params.repo)?;
        Ok(self
            .ctx
            .github()
            .post(
                &format!("{}/issues/{}/comments", route, params.issue_number),
                &json!({ "body": params.body }),
            )
            .await?)
    }
}

#[async_trait]
impl GithubTool for SearchIssues {
    type Params = SearchIssuesParams;
    const NAME: &'static str = "search_issues";
    const DESCRIPTION: &'static str = "Search issues and pull requests across GitHub";

    async fn call(&self, params: SearchIssuesParams) -> Result<Value, McpGithubError> {
        let mut query = vec![
            ("q", params.query.clone()),
            ("per_page", self.ctx.capped_per_page(params.per_page).to_string()),
        ];
        if let Some(sort) = params.sort {
            query.push(("sort", sort));
        }

        let response = self.ctx.github().get("/search/issues", &query).await?;
        let results: Vec<Value> = items(&response, "items")
            .iter()
            .map(|i| {
                let mut summary = issue_summary(i);
                summary["url"] = i.get("html_url").cloned().unwrap_or(Value::Null);
                summary["is_pull_request"] = json!(i.get("pull_request").is_some());
                summary
            })
            .collect();

        Ok(json!({
            "query": params.query,
            "total_count": response.get("total_count"),
            "count": results.len(),
            "results": results,
        }))
    }
}
