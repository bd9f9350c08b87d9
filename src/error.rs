use rmcp::model::ErrorData;

/// Failures reported by the GitHub REST API client.
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("GitHub resource not found: {0}")]
    NotFound(String),

    #[error("GitHub API error ({status}): {message}")]
    Status { status: u16, message: String },

    #[error("GitHub request failed: {0}")]
    Request(String),
}

impl UpstreamError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, UpstreamError::NotFound(_))
    }
}

impl From<octocrab::Error> for UpstreamError {
    fn from(err: octocrab::Error) -> Self {
        match err {
            octocrab::Error::GitHub { source, .. } => {
                let status = source.status_code.as_u16();
                if status == 404 {
                    UpstreamError::NotFound(source.message)
                } else {
                    UpstreamError::Status {
                        status,
                        message: source.message,
                    }
                }
            }
            other => UpstreamError::Request(other.to_string()),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum McpGithubError {
    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    #[error("Missing required parameter: {0}")]
    MissingParam(String),

    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("{0}")]
    Other(String),
}

impl McpGithubError {
    pub fn to_mcp_error(&self) -> ErrorData {
        match self {
            McpGithubError::MissingParam(_)
            | McpGithubError::InvalidParams(_)
            | McpGithubError::UnknownTool(_) => ErrorData::invalid_params(self.to_string(), None),
            McpGithubError::Upstream(_) | McpGithubError::Other(_) => {
                ErrorData::internal_error(self.to_string(), None)
            }
        }
    }
}

/// Startup-fatal configuration problems.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("GitHub token not found: set {0} or pass --token")]
    MissingToken(String),

    #[error("keep-alive interval must be greater than zero")]
    ZeroKeepAlive,
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("tool '{0}' is already registered")]
    DuplicateTool(String),
}

/// Delivery failures on a session's outbound stream. Callers are expected to
/// log and drop these.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Session {0} is closed")]
    SessionClosed(String),
}
