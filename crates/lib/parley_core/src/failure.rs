//! User-facing failure sentences.
//!
//! Tool failures never abort a dialogue turn. They come back as a sentence
//! the assistant can speak, worded so the failure class can still be read
//! back out of it.

use std::fmt;

/// Broad class of a tool failure, recovered from the underlying error text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    Unauthorized,
    RateLimited,
    Unavailable,
}

impl FailureClass {
    pub fn classify(text: &str) -> Self {
        let lower = text.to_lowercase();
        if lower.contains("401") || lower.contains("unauthorized") {
            Self::Unauthorized
        } else if lower.contains("429") || lower.contains("rate limit") {
            Self::RateLimited
        } else {
            Self::Unavailable
        }
    }
}

/// Which data source a failing tool belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolSource {
    WebSearch,
    Database,
}

impl ToolSource {
    /// Renders the spoken failure sentence for `error`.
    pub fn describe(self, error: &str) -> String {
        match (self, FailureClass::classify(error)) {
            (Self::WebSearch, FailureClass::Unauthorized) => {
                "Web search failed: Invalid API key (unauthorized). Please check your FIRECRAWL_API_KEY.".into()
            }
            (Self::WebSearch, FailureClass::RateLimited) => {
                "Web search failed: Rate limit exceeded. Please try again later.".into()
            }
            (Self::WebSearch, FailureClass::Unavailable) => {
                format!("Web search temporarily unavailable. Error: {error}")
            }
            (Self::Database, FailureClass::Unauthorized) => format!(
                "Database query failed: unauthorized ({error}). Please check your SUPABASE_ACCESS_TOKEN."
            ),
            (Self::Database, FailureClass::RateLimited) => format!(
                "Database query failed: rate limit exceeded ({error}). Please try again later."
            ),
            (Self::Database, FailureClass::Unavailable) => {
                format!("Database query failed: {error}")
            }
        }
    }
}

impl fmt::Display for ToolSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WebSearch => f.write_str("web search"),
            Self::Database => f.write_str("database"),
        }
    }
}
