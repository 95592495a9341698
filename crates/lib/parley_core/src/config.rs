//! Runtime configuration.
//!
//! Credentials and endpoints are read once at startup from environment
//! variables and passed by reference to everything that needs them.

use std::env;
use std::fmt;

use thiserror::Error;
use tracing::warn;

use crate::session::Variant;

pub const FIRECRAWL_API_KEY: &str = "FIRECRAWL_API_KEY";
pub const FIRECRAWL_API_URL: &str = "FIRECRAWL_API_URL";
pub const SUPABASE_ACCESS_TOKEN: &str = "SUPABASE_ACCESS_TOKEN";
pub const SUPABASE_MCP_COMMAND: &str = "SUPABASE_MCP_COMMAND";
pub const SUPABASE_MCP_PACKAGE: &str = "SUPABASE_MCP_PACKAGE";
pub const LIVEKIT_URL: &str = "LIVEKIT_URL";
pub const LIVEKIT_API_KEY: &str = "LIVEKIT_API_KEY";
pub const LIVEKIT_API_SECRET: &str = "LIVEKIT_API_SECRET";

const DEFAULT_FIRECRAWL_API_URL: &str = "https://api.firecrawl.dev";
const DEFAULT_MCP_COMMAND: &str = "npx";
const DEFAULT_MCP_PACKAGE: &str = "@supabase/mcp-server-supabase@latest";

/// Configuration errors. All of them are fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} is not set in environment. Please set {0} env var.")]
    MissingCredential(&'static str),

    #[error("Realtime transport credentials not fully configured, missing: {}", .0.join(", "))]
    MissingTransport(Vec<&'static str>),
}

/// Connection credentials for the realtime audio transport.
#[derive(Clone, Default)]
pub struct TransportCredentials {
    pub url: Option<String>,
    pub api_key: Option<String>,
    pub api_secret: Option<String>,
}

impl TransportCredentials {
    /// Names of the variables that are unset or empty.
    pub fn missing(&self) -> Vec<&'static str> {
        [
            (LIVEKIT_URL, &self.url),
            (LIVEKIT_API_KEY, &self.api_key),
            (LIVEKIT_API_SECRET, &self.api_secret),
        ]
        .into_iter()
        .filter(|(_, value)| value.is_none())
        .map(|(name, _)| name)
        .collect()
    }
}

/// Resolved configuration for one process.
#[derive(Clone)]
pub struct Config {
    pub firecrawl_api_key: Option<String>,
    /// Firecrawl API base URL, without trailing slash.
    pub firecrawl_api_url: String,
    pub supabase_access_token: Option<String>,
    /// Program used to launch the Supabase MCP server.
    pub mcp_command: String,
    /// Package passed to the launcher.
    pub mcp_package: String,
    pub transport: TransportCredentials,
}

impl Config {
    /// Reads configuration from environment variables.
    ///
    /// | Variable               | Default                                 |
    /// |------------------------|-----------------------------------------|
    /// | `FIRECRAWL_API_KEY`    | none                                    |
    /// | `FIRECRAWL_API_URL`    | `https://api.firecrawl.dev`             |
    /// | `SUPABASE_ACCESS_TOKEN`| none                                    |
    /// | `SUPABASE_MCP_COMMAND` | `npx`                                   |
    /// | `SUPABASE_MCP_PACKAGE` | `@supabase/mcp-server-supabase@latest`  |
    /// | `LIVEKIT_URL`, `LIVEKIT_API_KEY`, `LIVEKIT_API_SECRET` | none    |
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Reads configuration through `lookup`. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Self {
            firecrawl_api_key: get(FIRECRAWL_API_KEY),
            firecrawl_api_url: get(FIRECRAWL_API_URL)
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_FIRECRAWL_API_URL.into()),
            supabase_access_token: get(SUPABASE_ACCESS_TOKEN),
            mcp_command: get(SUPABASE_MCP_COMMAND).unwrap_or_else(|| DEFAULT_MCP_COMMAND.into()),
            mcp_package: get(SUPABASE_MCP_PACKAGE).unwrap_or_else(|| DEFAULT_MCP_PACKAGE.into()),
            transport: TransportCredentials {
                url: get(LIVEKIT_URL),
                api_key: get(LIVEKIT_API_KEY),
                api_secret: get(LIVEKIT_API_SECRET),
            },
        }
    }

    pub fn firecrawl_api_key(&self) -> Result<&str, ConfigError> {
        self.firecrawl_api_key
            .as_deref()
            .ok_or(ConfigError::MissingCredential(FIRECRAWL_API_KEY))
    }

    pub fn supabase_access_token(&self) -> Result<&str, ConfigError> {
        self.supabase_access_token
            .as_deref()
            .ok_or(ConfigError::MissingCredential(SUPABASE_ACCESS_TOKEN))
    }

    /// Checks the credentials `variant` needs before a session starts.
    ///
    /// Tool-using variants fail on missing search or database credentials
    /// and only warn about the transport unless `strict_transport` is set.
    /// The realtime variant always requires the transport.
    pub fn validate(&self, variant: Variant, strict_transport: bool) -> Result<(), ConfigError> {
        if variant.uses_tools() {
            self.firecrawl_api_key()?;
            self.supabase_access_token()?;
        }

        let missing = self.transport.missing();
        if missing.is_empty() {
            return Ok(());
        }

        if strict_transport || variant.requires_transport() {
            return Err(ConfigError::MissingTransport(missing));
        }

        warn!(missing = ?missing, "LiveKit credentials not fully configured");
        warn!("Please set LIVEKIT_URL, LIVEKIT_API_KEY, and LIVEKIT_API_SECRET");
        Ok(())
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |v: &Option<String>| v.as_ref().map(|_| "<redacted>");
        f.debug_struct("Config")
            .field("firecrawl_api_key", &redact(&self.firecrawl_api_key))
            .field("firecrawl_api_url", &self.firecrawl_api_url)
            .field("supabase_access_token", &redact(&self.supabase_access_token))
            .field("mcp_command", &self.mcp_command)
            .field("mcp_package", &self.mcp_package)
            .field("transport_missing", &self.transport.missing())
            .finish()
    }
}
