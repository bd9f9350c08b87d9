use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{json, Value};

use super::repos::{items, repo_label, RepoPageParams};
use super::{sanitize_github_name, sanitize_url_value, GithubTool};
use crate::error::McpGithubError;

context_tools!(ListWorkflows, ListWorkflowRuns, TriggerWorkflow);

#[derive(Debug, Deserialize, JsonSchema)]
pub struct WorkflowRunsParams {
    #[schemars(description = "Repository owner (user or org)")]
    #[serde(default)]
    pub owner: Option<String>,

    #[schemars(description = "Repository name")]
    pub repo: String,

    #[schemars(description = "Only runs of this workflow (ID or file name, e.g. ci.yml)")]
    #[serde(default)]
    pub workflow_id: Option<String>,

    #[schemars(description = "Filter by status: completed, in_progress, queued")]
    #[serde(default)]
    pub status: Option<String>,

    #[schemars(description = "Filter by branch")]
    #[serde(default)]
    pub branch: Option<String>,

    #[schemars(description = "Maximum number of results")]
    #[serde(default)]
    pub per_page: Option<u32>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct TriggerWorkflowParams {
    #[schemars(description = "Repository owner (user or org)")]
    #[serde(default)]
    pub owner: Option<String>,

    #[schemars(description = "Repository name")]
    pub repo: String,

    #[schemars(description = "Workflow ID or file name (e.g. deploy.yml)")]
    pub workflow_id: String,

    #[schemars(description = "Branch or tag to run the workflow on")]
    #[serde(rename = "ref")]
    pub git_ref: String,

    #[schemars(description = "Workflow inputs as key/value pairs")]
    #[serde(default)]
    pub inputs: Option<serde_json::Map<String, Value>>,
}

#[async_trait]
impl GithubTool for ListWorkflows {
    type Params = RepoPageParams;
    const NAME: &'static str = "list_workflows";
    const DESCRIPTION: &'static str = "List GitHub Actions workflows defined in a repository";

    async fn call(&self, params: RepoPageParams) -> Result<Value, McpGithubError> {
        let route = self.ctx.repo_route(params.owner.as_deref(), &params.repo)?;
        let query = [("per_page", self.ctx.capped_per_page(params.per_page).to_string())];
        let response = self
            .ctx
            .github()
            .get(&format!("{}/actions/workflows", route), &query)
            .await?;

        let workflows: Vec<Value> = items(&response, "workflows")
            .iter()
            .map(|w| {
                json!({
                    "id": w.get("id"),
                    "name": w.get("name"),
                    "path": w.get("path"),
                    "state": w.get("state"),
                })
            })
            .collect();

        Ok(json!({
            "repo": repo_label(&route),
            "count": workflows.len(),
            "workflows": workflows,
        }))
    }
}

#[async_trait]
impl GithubTool for ListWorkflowRuns {
    type Params = WorkflowRunsParams;
    const NAME: &'static str = "list_workflow_runs";
    const DESCRIPTION: &'static str = "List recent GitHub Actions workflow runs for a repository";

    async fn call(&self, params: WorkflowRunsParams) -> Result<Value, McpGithubError> {
        let route = self.ctx.repo_route(params.owner.as_deref(), &params.repo)?;
        let runs_route = match params.workflow_id {
            Some(ref id) => {
                sanitize_github_name(id, "workflow_id")?;
                format!("{}/actions/workflows/{}/runs", route, id)
            }
            None => format!("{}/actions/runs", route),
        };

        let mut query = vec![("per_page", self.ctx.capped_per_page(params.per_page).to_string())];
        if let Some(status) = params.status {
            query.push(("status", status));
        }
        if let Some(branch) = params.branch {
            query.push(("branch", branch));
        }

        let response = self.ctx.github().get(&runs_route, &query).await?;
        let runs: Vec<Value> = items(&response, "workflow_runs")
            .iter()
            .map(|run| {
                json!({
                    "id": run.get("id"),
                    "name": run.get("name"),
                    "status": run.get("status"),
                    "conclusion": run.get("conclusion"),
                    "branch": run.get("head_branch"),
                    "event": run.get("event"),
                    "created_at": run.get("created_at"),
                })
            })
            .collect();

        Ok(json!({
            "repo": repo_label(&route),
            "count": runs.len(),
            "runs": runs,
        }))
    }
}

#[async_trait]
impl GithubTool for TriggerWorkflow {
    type Params = TriggerWorkflowParams;
    const NAME: &'static str = "trigger_workflow";
    const DESCRIPTION: &'static str = "Trigger a workflow_dispatch event for a workflow";

    async fn call(&self, params: TriggerWorkflowParams) -> Result<Value, McpGithubError> {
        let owner = self.ctx.resolve_owner(params.owner.as_deref())?;
        sanitize_github_name(&params.repo, "repo")?;
        sanitize_github_name(&params.workflow_id, "workflow_id")?;
        sanitize_url_value(&params.git_ref, "ref")?;

        let inputs = Value::Object(params.inputs.unwrap_or_default());
        self.ctx
            .github()
            .dispatch_workflow(&owner, &params.repo, &params.workflow_id, &params.git_ref, inputs)
            .await?;

        Ok(json!({
            "repo": format!("{}/{}", owner, params.repo),
            "workflow_id": params.workflow_id,
            "ref": params.git_ref,
            "dispatched": true,
        }))
    }
}
