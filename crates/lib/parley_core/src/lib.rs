//! # parley_core
//!
//! Core logic for Parley.
//!
//! Turns tools discovered on an MCP server into typed callables for a voice
//! agent, and provides the Firecrawl web-search tool that sits beside them.

pub mod adapter;
pub mod agent;
pub mod config;
pub mod failure;
pub mod mcp;
pub mod search;
pub mod session;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
