//! MCP gateway that exposes GitHub to LLM clients over Server-Sent Events.
//!
//! Clients open `/sse`, discover tools, and POST JSON-RPC requests to
//! `/message?sessionId=...`; results come back on the stream. Tools cover
//! repositories, files, issues, pull requests, commits, and GitHub Actions
//! workflows.

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod github;
pub mod http;
pub mod protocol;
pub mod session;
pub mod tools;
pub mod transport;

#[cfg(test)]
mod testing;
