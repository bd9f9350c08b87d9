use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{json, Value};

use super::repos::{as_array, items, repo_label};
use super::{sanitize_url_value, GithubTool};
use crate::error::McpGithubError;

context_tools!(ListCommits, GetCommit);

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ListCommitsParams {
    #[schemars(description = "Repository owner (user or org)")]
    #[serde(default)]
    pub owner: Option<String>,

    #[schemars(description = "Repository name")]
    pub repo: String,

    #[schemars(description = "Branch, tag or SHA to start from (default: repo's default branch)")]
    #[serde(default)]
    pub sha: Option<String>,

    #[schemars(description = "Filter commits by author (GitHub username or email)")]
    #[serde(default)]
    pub author: Option<String>,

    #[schemars(description = "Only commits touching this path")]
    #[serde(default)]
    pub path: Option<String>,

    #[schemars(description = "Maximum number of results")]
    #[serde(default)]
    pub per_page: Option<u32>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CommitRefParams {
    #[schemars(description = "Repository owner (user or org)")]
    #[serde(default)]
    pub owner: Option<String>,

    #[schemars(description = "Repository name")]
    pub repo: String,

    #[schemars(description = "Commit SHA, branch name, or tag")]
    #[serde(rename = "ref")]
    pub sha: String,
}

#[async_trait]
impl GithubTool for ListCommits {
    type Params = ListCommitsParams;
    const NAME: &'static str = "list_commits";
    const DESCRIPTION: &'static str = "List commits on a branch or tag";

    async fn call(&self, params: ListCommitsParams) -> Result<Value, McpGithubError> {
        let route = self.ctx.repo_route(params.owner.as_deref(), &params.repo)?;

        let mut query = vec![("per_page", self.ctx.capped_per_page(params.per_page).to_string())];
        if let Some(sha) = params.sha {
            query.push(("sha", sha));
        }
        if let Some(author) = params.author {
            query.push(("author", author));
        }
        if let Some(path) = params.path {
            query.push(("path", path));
        }

        let response = self
            .ctx
            .github()
            .get(&format!("{}/commits", route), &query)
            .await?;

        let commits: Vec<Value> = as_array(&response)
            .iter()
            .map(|c| {
                json!({
                    "sha": c.get("sha"),
                    "message": c.pointer("/commit/message"),
                    "author": c.pointer("/commit/author/name"),
                    "author_login": c.pointer("/author/login"),
                    "date": c.pointer("/commit/author/date"),
                })
            })
            .collect();

        Ok(json!({
            "repo": repo_label(&route),
            "count": commits.len(),
            "commits": commits,
        }))
    }
}

#[async_trait]
impl GithubTool for GetCommit {
    type Params = CommitRefParams;
    const NAME: &'static str = "get_commit";
    const DESCRIPTION: &'static str = "Get full commit details including changed files";

    async fn call(&self, params: CommitRefParams) -> Result<Value, McpGithubError> {
        let route = self.ctx.repo_route(params.owner.as_deref(), &params.repo)?;
        sanitize_url_value(&params.sha, "ref")?;

        let c = self
            .ctx
            .github()
            .get(&format!("{}/commits/{}", route, params.sha), &[])
            .await?;

        let files: Vec<Value> = items(&c, "files")
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
        let parents: Vec<&Value> = items(&c, "parents")
            .iter()
            .filter_map(|p| p.get("sha"))
            .collect();

        Ok(json!({
            "sha": c.get("sha"),
            "message": c.pointer("/commit/message"),
            "author": c.pointer("/commit/author/name"),
            "author_login": c.pointer("/author/login"),
            "date": c.pointer("/commit/author/date"),
            "parents": parents,
            "stats": c.get("stats"),
            "file_count": files.len(),
            "files": files,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StubGitHub;

    #[tokio::test]
    async fn test_get_commit_reshapes_files() {
        let stub = StubGitHub::new().with_fixture(
            "/repos/acme/widgets/commits/abc",
            json!({
                "sha": "abc",
                "commit": { "message": "fix", "author": { "name": "Ana", "date": "2024-01-01" } },
                "parents": [{ "sha": "p1" }],
                "files": [{ "filename": "a.rs", "status": "modified", "additions": 1 }]
            }),
        );
        let value = GetCommit::new(stub.context())
            .call(CommitRefParams {
                owner: Some("acme".into()),
                repo: "widgets".into(),
                sha: "abc".into(),
            })
            .await
            .unwrap();
        assert_eq!(value["message"], "fix");
        assert_eq!(value["parents"], json!(["p1"]));
        assert_eq!(value["file_count"], 1);
    }
}
