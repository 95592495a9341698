use std::path::PathBuf;

use clap::builder::BoolishValueParser;
use clap::{Parser, Subcommand};
use parley_core::session::Variant;

/// Voice assistant bridge to web search and MCP database tools.
#[derive(Parser, Debug)]
#[command(name = "parley", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run an assistant session, driven over stdin/stdout by the agent runtime.
    Run {
        /// Assistant variant: assistant, legacy or realtime.
        #[arg(long, default_value_t = Variant::Assistant)]
        variant: Variant,

        /// Fail instead of warning when realtime transport credentials are missing.
        ///
        /// The environment variable accepts boolish values such as `1`, `yes` or `on`.
        #[arg(long, env = "PARLEY_STRICT_TRANSPORT", value_parser = BoolishValueParser::new())]
        strict_transport: bool,
    },

    /// Inspect or call database tools.
    Tools {
        #[command(subcommand)]
        command: ToolsCommand,
    },

    /// Search the web via Firecrawl.
    Search {
        /// Search query string.
        query: String,

        /// Maximum pages to return.
        #[arg(long, default_value_t = 3)]
        limit: u32,

        /// Expect the legacy response shape, with crawl fallback.
        #[arg(long)]
        legacy: bool,
    },

    /// Print the version.
    Version,
}

#[derive(Subcommand, Debug)]
pub enum ToolsCommand {
    /// Connect to the MCP server and print the synthesized tool signatures.
    List {
        /// Print function declarations as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Connect to the MCP server and invoke one tool.
    Call {
        /// Tool name.
        name: String,

        /// Arguments as a JSON object.
        #[arg(long, default_value = "{}")]
        args: String,
    },

    /// Adapt tool descriptors from a JSON file without connecting.
    ///
    /// Accepts a list of descriptors or a `tools/list` result (`{"tools": [...]}`).
    Inspect {
        path: PathBuf,

        /// Print function declarations as JSON.
        #[arg(long)]
        json: bool,
    },
}
