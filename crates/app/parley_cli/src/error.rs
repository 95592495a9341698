use thiserror::Error;

use parley_core::adapter::invoke::InvocationError;
use parley_core::adapter::schema::BuildError;
use parley_core::config::ConfigError;
use parley_core::mcp::McpError;
use parley_core::session::SessionError;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("{}", .0)]
    Custom(String),

    #[error("IO::{:?}: {}", .0.kind(), .0)]
    Io(#[from] std::io::Error),

    #[error("Json: {}", .0)]
    Json(#[from] serde_json::Error),

    #[error("{}", .0)]
    Config(#[from] ConfigError),

    #[error("MCP: {}", .0)]
    Mcp(#[from] McpError),

    #[error("Tool build: {}", .0)]
    Build(#[from] BuildError),

    #[error("Tool call: {}", .0)]
    Invocation(#[from] InvocationError),

    #[error("Session: {}", .0)]
    Session(#[from] SessionError),

    #[error("Logging: {}", .0)]
    Logging(String),
}
