use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use super::issues::StateFilter;
use super::repos::{as_array, repo_label};
use super::{sanitize_url_value, GithubTool};
use crate::error::McpGithubError;

context_tools!(
    ListPullRequests,
    GetPullRequest,
    CreatePullRequest,
    MergePullRequest,
    ListPullRequestFiles,
);

#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum MergeMethod {
    Merge,
    Squash,
    Rebase,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ListPullsParams {
    #[schemars(description = "Repository owner (user or org)")]
    #[serde(default)]
    pub owner: Option<String>,

    #[schemars(description = "Repository name")]
    pub repo: String,

    #[schemars(description = "Filter by state (default: open)")]
    #[serde(default)]
    pub state: Option<StateFilter>,

    #[schemars(description = "Filter by base branch name")]
    #[serde(default)]
    pub base: Option<String>,

    #[schemars(description = "Maximum number of results")]
    #[serde(default)]
    pub per_page: Option<u32>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct PullParams {
    #[schemars(description = "Repository owner (user or org)")]
    #[serde(default)]
    pub owner: Option<String>,

    #[schemars(description = "Repository name")]
    pub repo: String,

    #[schemars(description = "Pull request number")]
    pub pull_number: u64,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CreatePullParams {
    #[schemars(description = "Repository owner (user or org)")]
    #[serde(default)]
    pub owner: Option<String>,

    #[schemars(description = "Repository name")]
    pub repo: String,

    #[schemars(description = "Pull request title")]
    pub title: String,

    #[schemars(description = "Branch containing the changes")]
    pub head: String,

    #[schemars(description = "Branch to merge into")]
    pub base: String,

    #[schemars(description = "Pull request description (markdown)")]
    #[serde(default)]
    pub body: Option<String>,

    #[schemars(description = "Open as a draft pull request")]
    #[serde(default)]
    pub draft: Option<bool>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct MergePullParams {
    #[schemars(description = "Repository owner (user or org)")]
    #[serde(default)]
    pub owner: Option<String>,

    #[schemars(description = "Repository name")]
    pub repo: String,

    #[schemars(description = "Pull request number")]
    pub pull_number: u64,

    #[schemars(description = "Title for the merge commit")]
    #[serde(default)]
    pub commit_title: Option<String>,

    #[schemars(description = "Extra detail for the merge commit")]
    #[serde(default)]
    pub commit_message: Option<String>,

    #[schemars(description = "Merge method (default: merge)")]
    #[serde(default)]
    pub merge_method: Option<MergeMethod>,
}

#[async_trait]
impl GithubTool for ListPullRequests {
    type Params = ListPullsParams;
    const NAME: &'static str = "list_pull_requests";
    const DESCRIPTION: &'static str = "List pull requests in a repository";

    async fn call(&self, params: ListPullsParams) -> Result<Value, McpGithubError> {
        let route = self.ctx.repo_route(params.owner.as_deref(), &params.repo)?;

        let mut query = vec![
            ("state", params.state.unwrap_or(StateFilter::Open).as_str().to_string()),
            ("per_page", self.ctx.capped_per_page(params.per_page).to_string()),
        ];
        if let Some(base) = params.base {
            query.push(("base", base));
        }

        let response = self
            .ctx
            .github()
            .get(&format!("{}/pulls", route), &query)
            .await?;

        let pulls: Vec<Value> = as_array(&response)
            .iter()
            .map(|p| {
                json!({
                    "number": p.get("number"),
                    "title": p.get("title"),
                    "state": p.get("state"),
                    "author": p.pointer("/user/login"),
                    "head": p.pointer("/head/ref"),
                    "base": p.pointer("/base/ref"),
                    "draft": p.get("draft"),
                    "created_at": p.get("created_at"),
                })
            })
            .collect();

        Ok(json!({
            "repo": repo_label(&route),
            "count": pulls.len(),
            "pulls": pulls,
        }))
    }
}

#[async_trait]
impl GithubTool for GetPullRequest {
    type Params = PullParams;
    const NAME: &'static str = "get_pull_request";
    const DESCRIPTION: &'static str =
        "Get pull request details including mergeability and change counts";

    async fn call(&self, params: PullParams) -> Result<Value, McpGithubError> {
        let route = self.ctx.repo_route(params.owner.as_deref(), &params.repo)?;
        Ok(self
            .ctx
            .github()
            .get(&format!("{}/pulls/{}", route, params.pull_number), &[])
            .await?)
    }
}

#[async_trait]
impl GithubTool for CreatePullRequest {
    type Params = CreatePullParams;
    const NAME: &'static str = "create_pull_request";
    const DESCRIPTION: &'static str = "Open a new pull request";

    async fn call(&self, params: CreatePullParams) -> Result<Value, McpGithubError> {
        let route = self.ctx.repo_route(params.owner.as_deref(), &params.repo)?;
        sanitize_url_value(&params.head, "head")?;
        sanitize_url_value(&params.base, "base")?;

        let mut body = Map::new();
        body.insert("title".into(), json!(params.title));
        body.insert("head".into(), json!(params.head));
        body.insert("base".into(), json!(params.base));
        if let Some(text) = params.body {
            body.insert("body".into(), json!(text));
        }
        if let Some(draft) = params.draft {
            body.insert("draft".into(), json!(draft));
        }

        Ok(self
            .ctx
            .github()
            .post(&format!("{}/pulls", route), &Value::Object(body))
            .await?)
    }
}

#[async_trait]
impl GithubTool for MergePullRequest {
    type Params = MergePullParams;
    const NAME: &'static str = "merge_pull_request";
    const DESCRIPTION: &'static str = "Merge a pull request";

    async fn call(&self, params: MergePullParams) -> Result<Value, McpGithubError> {
        let route = self.ctx.repo_route(params.owner.as_deref(), &params.repo)?;

        let mut body = Map::new();
        body.insert(
            "merge_method".into(),
            json!(params.merge_method.unwrap_or(MergeMethod::Merge)),
        );
        if let Some(title) = params.commit_title {
            body.insert("commit_title".into(), json!(title));
        }
        if let Some(message) = params.commit_message {
            body.insert("commit_message".into(), json!(message));
        }

        Ok(self
            .ctx
            .github()
            .put(
                &format!("{}/pulls/{}/merge", route, params.pull_number),
                &Value::Object(body),
            )
            .await?)
    }
}

#[async_trait]
impl GithubTool for ListPullRequestFiles {
    type Params = PullParams;
    const NAME: &'static str = "list_pull_request_files";
    const DESCRIPTION: &'static str = "List files changed in a pull request";

    async fn call(&self, params: PullParams) -> Result<Value, McpGithubError> {
        let route = self.ctx.repo_route(params.owner.as_deref(), &params.repo)?;
        let query = [("per_page", self.ctx.capped_per_page(None).to_string())];
        let response = self
            .ctx
            .github()
            .get(&format!("{}/pulls/{}/files", route, params.pull_number), &query)
            .await?;

        let files: Vec<Value> = as_array(&response)
            .iter()
            .map(|f| {
                json!({
                    "filename": f.get("filename"),
                    "status": f.get("status"),
                    "additions": f.get("additions"),
                    "deletions": f.get("deletions"),
                    "changes": f.get("changes"),
                })
            })
            .collect();

        Ok(json!({
            "repo": repo_label(&route),
            "pull_number": params.pull_number,
            "count": files.len(),
            "files": files,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StubGitHub;

    #[tokio::test]
    async fn test_merge_defaults_to_merge_method() {
        let stub = StubGitHub::new();
        MergePullRequest::new(stub.context())
            .call(MergePullParams {
                owner: Some("acme".into()),
                repo: "widgets".into(),
                pull_number: 12,
                commit_title: None,
                commit_message: None,
                merge_method: None,
            })
            .await
            .unwrap();
        let calls = stub.calls();
        assert_eq!(calls[0].method, "PUT");
        assert_eq!(calls[0].route, "/repos/acme/widgets/pulls/12/merge");
        assert_eq!(calls[0].body, Some(json!({ "merge_method": "merge" })));
    }

    #[tokio::test]
    async fn test_create_pull_rejects_bad_head() {
        let stub = StubGitHub::new();
        let result = CreatePullRequest::new(stub.context())
            .call(CreatePullParams {
                owner: Some("acme".into()),
                repo: "widgets".into(),
                title: "t".into(),
                head: "feature?x=1".into(),
                base: "main".into(),
                body: None,
                draft: None,
            })
            .await;
        assert!(result.is_err());
        assert!(stub.calls().is_empty());
    }
}
