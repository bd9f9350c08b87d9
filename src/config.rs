//! Command-line and environment configuration.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use clap::Parser;

use crate::error::ConfigError;

/// MCP gateway for GitHub over Server-Sent Events
#[derive(Debug, Parser)]
#[command(name = "mcp-github-sse", version, about)]
pub struct Cli {
    /// GitHub personal access token.
    /// Can also be set via the GITHUB_TOKEN environment variable.
    #[arg(long)]
    pub token: Option<String>,

    /// Read the GitHub token from this environment variable.
    #[arg(long = "token-env", default_value = "GITHUB_TOKEN")]
    pub token_env: String,

    /// Address to bind the HTTP server to
    #[arg(long, default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    pub host: IpAddr,

    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = 3000)]
    pub port: u16,

    /// Seconds between keep-alive comments on idle SSE streams
    #[arg(long = "keep-alive-secs", env = "KEEP_ALIVE_SECS", default_value_t = 10)]
    pub keep_alive_secs: u64,

    /// Default repository owner/org for operations
    #[arg(long, env = "GITHUB_OWNER")]
    pub owner: Option<String>,

    /// Maximum results per API call (capped at 100)
    #[arg(long, default_value_t = 30)]
    pub max_results: u32,
}

#[derive(Clone)]
pub struct Config {
    pub token: String,
    pub addr: SocketAddr,
    pub keep_alive: Duration,
    pub default_owner: Option<String>,
    pub max_results: u32,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("token", &"<redacted>")
            .field("addr", &self.addr)
            .field("keep_alive", &self.keep_alive)
            .field("default_owner", &self.default_owner)
            .field("max_results", &self.max_results)
            .finish()
    }
}

impl Config {
    /// Resolve the token (`--token` > the variable named by `--token-env`)
    /// and validate the rest. `env` looks up environment variables.
    pub fn resolve<F>(cli: Cli, env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let token = cli
            .token
            .filter(|t| !t.is_empty())
            .or_else(|| env(&cli.token_env).filter(|t| !t.is_empty()))
            .ok_or_else(|| ConfigError::MissingToken(cli.token_env.clone()))?;

        if cli.keep_alive_secs == 0 {
            return Err(ConfigError::ZeroKeepAlive);
        }

        Ok(Self {
            token,
            addr: SocketAddr::new(cli.host, cli.port),
            keep_alive: Duration::from_secs(cli.keep_alive_secs),
            default_owner: cli.owner.filter(|o| !o.is_empty()),
            max_results: cli.max_results,
        })
    }

    pub fn from_env(cli: Cli) -> Result<Self, ConfigError> {
        Self::resolve(cli, |name| std::env::var(name).ok())
    }
}
