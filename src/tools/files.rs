//! File tools. Writes and deletes need the blob sha of the current file;
//! when the caller does not supply one it is fetched first.

use async_trait::async_trait;
use base64::Engine;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::{sanitize_url_value, GithubTool, ToolContext};
use crate::error::{McpGithubError, UpstreamError};

context_tools!(GetFileContents, CreateOrUpdateFile, DeleteFile);

#[derive(Debug, Deserialize, JsonSchema)]
pub struct FileContentsParams {
    #[schemars(description = "Repository owner (user or org)")]
    #[serde(default)]
    pub owner: Option<String>,

    #[schemars(description = "Repository name")]
    pub repo: String,

    #[schemars(description = "File or directory path within the repository")]
    pub path: String,

    #[schemars(description = "Git ref (branch, tag, or SHA). Defaults to the repo's default branch")]
    #[serde(default, rename = "ref")]
    pub git_ref: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct WriteFileParams {
    #[schemars(description = "Repository owner (user or org)")]
    #[serde(default)]
    pub owner: Option<String>,

    #[schemars(description = "Repository name")]
    pub repo: String,

    #[schemars(description = "File path within the repository")]
    pub path: String,

    #[schemars(description = "New file content (plain text)")]
    pub content: String,

    #[schemars(description = "Commit message")]
    pub message: String,

    #[schemars(description = "Branch to commit to (default: the repository's default branch)")]
    #[serde(default)]
    pub branch: Option<String>,

    #[schemars(description = "Blob SHA of the file being replaced. Fetched automatically when omitted")]
    #[serde(default)]
    pub sha: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct DeleteFileParams {
    #[schemars(description = "Repository owner (user or org)")]
    #[serde(default)]
    pub owner: Option<String>,

    #[schemars(description = "Repository name")]
    pub repo: String,

    #[schemars(description = "File path within the repository")]
    pub path: String,

    #[schemars(description = "Commit message")]
    pub message: String,

    #[schemars(description = "Branch to delete from (default: the repository's default branch)")]
    #[serde(default)]
    pub branch: Option<String>,

    #[schemars(description = "Blob SHA of the file being deleted. Fetched automatically when omitted")]
    #[serde(default)]
    pub sha: Option<String>,
}

/// Route of the contents endpoint for `path`.
fn contents_route(
    ctx: &ToolContext,
    owner: Option<&str>,
    repo: &str,
    path: &str,
) -> Result<String, McpGithubError> {
    let route = ctx.repo_route(owner, repo)?;
    sanitize_url_value(path, "path")?;
    Ok(format!("{}/contents/{}", route, path.trim_start_matches('/')))
}

fn ref_query(git_ref: Option<&str>) -> Result<Vec<(&'static str, String)>, McpGithubError> {
    match git_ref {
        Some(r) => {
            sanitize_url_value(r, "ref")?;
            Ok(vec![("ref", r.to_string())])
        }
        None => Ok(Vec::new()),
    }
}

/// Read the current blob sha of a file. `Ok(None)` means the file does not
/// exist; any other read failure is returned as is.
async fn current_sha(
    ctx: &ToolContext,
    route: &str,
    branch: Option<&str>,
) -> Result<Option<String>, McpGithubError> {
    let query = ref_query(branch)?;
    match ctx.github().get(route, &query).await {
        Ok(existing) => {
            if existing.is_array() {
                return Err(McpGithubError::InvalidParams(format!(
                    "{} is a directory",
                    route
                )));
            }
            Ok(existing.get("sha").and_then(Value::as_str).map(String::from))
        }
        Err(UpstreamError::NotFound(_)) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// GitHub returns base64 with embedded newlines.
fn decode_content(encoded: &str) -> String {
    let cleaned: String = encoded.chars().filter(|ch| !ch.is_whitespace()).collect();
    base64::engine::general_purpose::STANDARD
        .decode(&cleaned)
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .unwrap_or_else(|| "[binary content]".to_string())
}

#[async_trait]
impl GithubTool for GetFileContents {
    type Params = FileContentsParams;
    const NAME: &'static str = "get_file_contents";
    const DESCRIPTION: &'static str =
        "Get the contents of a file, or list a directory, at a specific ref";

    async fn call(&self, params: FileContentsParams) -> Result<Value, McpGithubError> {
        let route = contents_route(&self.ctx, params.owner.as_deref(), &params.repo, &params.path)?;
        let query = ref_query(params.git_ref.as_deref())?;
        let response = self.ctx.github().get(&route, &query).await?;

        if let Some(entries) = response.as_array() {
            let entries: Vec<Value> = entries
                .iter()
                .map(|e| {
                    json!({
                        "name": e.get("name"),
                        "path": e.get("path"),
                        "type": e.get("type"),
                        "size": e.get("size"),
                    })
                })
                .collect();
            return Ok(json!({
                "path": params.path,
                "count": entries.len(),
                "entries": entries,
            }));
        }

        let content = response
            .get("content")
            .and_then(Value::as_str)
            .map(decode_content)
            .unwrap_or_default();

        Ok(json!({
            "path": response.get("path"),
            "name": response.get("name"),
            "size": response.get("size"),
            "encoding": response.get("encoding"),
            "content": content,
            "sha": response.get("sha"),
        }))
    }
}

#[async_trait]
impl GithubTool for CreateOrUpdateFile {
    type Params = WriteFileParams;
    const NAME: &'static str = "create_or_update_file";
    const DESCRIPTION: &'static str =
        "Create or update a single file in a repository (the current sha is fetched when omitted)";

    async fn call(&self, params: WriteFileParams) -> Result<Value, McpGithubError> {
        let route = contents_route(&self.ctx, params.owner.as_deref(), &params.repo, &params.path)?;

        let sha = match params.sha {
            Some(sha) => Some(sha),
            None => current_sha(&self.ctx, &route, params.branch.as_deref()).await?,
        };
        tracing::debug!(path = %params.path, update = sha.is_some(), "Writing file");

        let mut body = Map::new();
        body.insert("message".into(), json!(params.message));
        body.insert(
            "content".into(),
            json!(base64::engine::general_purpose::STANDARD.encode(params.content.as_bytes())),
        );
        if let Some(branch) = params.branch {
            body.insert("branch".into(), json!(branch));
        }
        if let Some(sha) = sha {
            body.insert("sha".into(), json!(sha));
        }

        Ok(self.ctx.github().put(&route, &Value::Object(body)).await?)
    }
}

#[async_trait]
impl GithubTool for DeleteFile {
    type Params = DeleteFileParams;
    const NAME: &'static str = "delete_file";
    const DESCRIPTION: &'static str =
        "Delete a file from a repository (the current sha is fetched when omitted)";

    async fn call(&self, params: DeleteFileParams) -> Result<Value, McpGithubError> {
        let route = contents_route(&self.ctx, params.owner.as_deref(), &params.repo, &params.path)?;

        let sha = match params.sha {
            Some(sha) => sha,
            None => current_sha(&self.ctx, &route, params.branch.as_deref())
                .await?
                .ok_or_else(|| {
                    McpGithubError::Other(format!(
                        "Cannot delete {}: file not found or sha unavailable",
                        params.path
                    ))
                })?,
        };

        let mut body = Map::new();
        body.insert("message".into(), json!(params.message));
        body.insert("sha".into(), json!(sha));
        if let Some(branch) = params.branch {
            body.insert("branch".into(), json!(branch));
        }

        Ok(self.ctx.github().delete(&route, &Value::Object(body)).await?)
    }
}
