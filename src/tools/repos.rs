use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{sanitize_github_name, sanitize_url_value, GithubTool};
use crate::error::McpGithubError;

context_tools!(
    SearchRepositories,
    GetRepository,
    CreateRepository,
    ForkRepository,
    ListBranches,
    CreateBranch,
);

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SearchRepositoriesParams {
    #[schemars(description = "Search query (GitHub repository search syntax)")]
    pub query: String,

    #[schemars(description = "Page number for pagination (default: 1)")]
    #[serde(default)]
    pub page: Option<u32>,

    #[schemars(description = "Maximum number of results")]
    #[serde(default)]
    pub per_page: Option<u32>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct RepoParams {
    #[schemars(description = "Repository owner (user or org)")]
    #[serde(default)]
    pub owner: Option<String>,

    #[schemars(description = "Repository name")]
    pub repo: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CreateRepositoryParams {
    #[schemars(description = "Repository name")]
    pub name: String,

    #[schemars(description = "Repository description")]
    #[serde(default)]
    pub description: Option<String>,

    #[schemars(description = "Whether the repository should be private")]
    #[serde(default)]
    pub private: Option<bool>,

    #[schemars(description = "Initialize the repository with a README")]
    #[serde(default)]
    pub auto_init: Option<bool>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ForkRepositoryParams {
    #[schemars(description = "Repository owner (user or org)")]
    #[serde(default)]
    pub owner: Option<String>,

    #[schemars(description = "Repository name")]
    pub repo: String,

    #[schemars(description = "Organization to fork into (default: your account)")]
    #[serde(default)]
    pub organization: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct RepoPageParams {
    #[schemars(description = "Repository owner (user or org)")]
    #[serde(default)]
    pub owner: Option<String>,

    #[schemars(description = "Repository name")]
    pub repo: String,

    #[schemars(description = "Maximum number of results")]
    #[serde(default)]
    pub per_page: Option<u32>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CreateBranchParams {
    #[schemars(description = "Repository owner (user or org)")]
    #[serde(default)]
    pub owner: Option<String>,

    #[schemars(description = "Repository name")]
    pub repo: String,

    #[schemars(description = "Name of the branch to create")]
    pub branch: String,

    #[schemars(description = "Source branch (default: the repository's default branch)")]
    #[serde(default)]
    pub from_branch: Option<String>,
}

#[async_trait]
impl GithubTool for SearchRepositories {
    type Params = SearchRepositoriesParams;
    const NAME: &'static str = "search_repositories";
    const DESCRIPTION: &'static str = "Search for GitHub repositories";

    async fn call(&self, params: SearchRepositoriesParams) -> Result<Value, McpGithubError> {
        let query = [
            ("q", params.query.clone()),
            ("page", params.page.unwrap_or(1).to_string()),
            ("per_page", self.ctx.capped_per_page(params.per_page).to_string()),
        ];
        let response = self.ctx.github().get("/search/repositories", &query).await?;

        let repos: Vec<Value> = items(&response, "items")
            .iter()
            .map(|r| {
                json!({
                    "full_name": r.get("full_name"),
                    "description": r.get("description"),
                    "language": r.get("language"),
                    "stars": r.get("stargazers_count"),
                    "url": r.get("html_url"),
                })
            })
            .collect();

        Ok(json!({
            "query": params.query,
            "total_count": response.get("total_count"),
            "count": repos.len(),
            "repos": repos,
        }))
    }
}

#[async_trait]
impl GithubTool for GetRepository {
    type Params = RepoParams;
    const NAME: &'static str = "get_repository";
    const DESCRIPTION: &'static str =
        "Get repository info including description, stars, forks, language, and default branch";

    async fn call(&self, params: RepoParams) -> Result<Value, McpGithubError> {
        let route = self.ctx.repo_route(params.owner.as_deref(), &params.repo)?;
        Ok(self.ctx.github().get(&route, &[]).await?)
    }
}

#[async_trait]
impl GithubTool for CreateRepository {
    type Params = CreateRepositoryParams;
    const NAME: &'static str = "create_repository";
    const DESCRIPTION: &'static str = "Create a new repository in your account";

    async fn call(&self, params: CreateRepositoryParams) -> Result<Value, McpGithubError> {
        sanitize_github_name(&params.name, "name")?;
        let body = json!({
            "name": params.name,
            "description": params.description,
            "private": params.private.unwrap_or(false),
            "auto_init": params.auto_init.unwrap_or(false),
        });
        Ok(self.ctx.github().post("/user/repos", &body).await?)
    }
}

#[async_trait]
impl GithubTool for ForkRepository {
    type Params = ForkRepositoryParams;
    const NAME: &'static str = "fork_repository";
    const DESCRIPTION: &'static str = "Fork a repository to your account or an organization";

    async fn call(&self, params: ForkRepositoryParams) -> Result<Value, McpGithubError> {
        let route = self.ctx.repo_route(params.owner.as_deref(), &params.repo)?;
        let body = match params.organization {
            Some(org) => {
                sanitize_github_name(&org, "organization")?;
                json!({ "organization": org })
            }
            None => json!({}),
        };
        Ok(self.ctx.github().post(&format!("{}/forks", route), &body).await?)
    }
}

#[async_trait]
impl GithubTool for ListBranches {
    type Params = RepoPageParams;
    const NAME: &'static str = "list_branches";
    const DESCRIPTION: &'static str = "List branches in a repository";

    async fn call(&self, params: RepoPageParams) -> Result<Value, McpGithubError> {
        let route = self.ctx.repo_route(params.owner.as_deref(), &params.repo)?;
        let query = [("per_page", self.ctx.capped_per_page(params.per_page).to_string())];
        let response = self
            .ctx
            .github()
            .get(&format!("{}/branches", route), &query)
            .await?;

        let branches: Vec<Value> = as_array(&response)
            .iter()
            .map(|b| {
                json!({
                    "name": b.get("name"),
                    "sha": b.pointer("/commit/sha"),
                    "protected": b.get("protected"),
                })
            })
            .collect();

        Ok(json!({
            "repo": repo_label(&route),
            "count": branches.len(),
            "branches": branches,
        }))
    }
}

#[async_trait]
impl GithubTool for CreateBranch {
    type Params = CreateBranchParams;
    const NAME: &'static str = "create_branch";
    const DESCRIPTION: &'static str = "Create a new branch from an existing branch";

    async fn call(&self, params: CreateBranchParams) -> Result<Value, McpGithubError> {
        let route = self.ctx.repo_route(params.owner.as_deref(), &params.repo)?;
        sanitize_url_value(&params.branch, "branch")?;

        let from_branch = match params.from_branch {
            Some(branch) => branch,
            None => {
                let repo = self.ctx.github().get(&route, &[]).await?;
                repo.get("default_branch")
                    .and_then(Value::as_str)
                    .map(String::from)
                    .ok_or_else(|| {
                        McpGithubError::Other("repository has no default branch".to_string())
                    })?
            }
        };
        sanitize_url_value(&from_branch, "from_branch")?;

        let base = self
            .ctx
            .github()
            .get(&format!("{}/git/ref/heads/{}", route, from_branch), &[])
            .await?;
        let sha = base
            .pointer("/object/sha")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                McpGithubError::Other(format!("could not resolve sha of branch {}", from_branch))
            })?;

        let body = json!({
            "ref": format!("refs/heads/{}", params.branch),
            "sha": sha,
        });
        Ok(self
            .ctx
            .github()
            .post(&format!("{}/git/refs", route), &body)
            .await?)
    }
}

/// Array found under `key`, or empty.
pub(crate) fn items<'a>(value: &'a Value, key: &str) -> &'a [Value] {
    value
        .get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// The value itself as an array, or empty.
pub(crate) fn as_array(value: &Value) -> &[Value] {
    value.as_array().map(Vec::as_slice).unwrap_or(&[])
}

/// `owner/repo` from a `/repos/{owner}/{repo}` route prefix.
pub(crate) fn repo_label(route: &str) -> &str {
    route.trim_start_matches("/repos/")
}
