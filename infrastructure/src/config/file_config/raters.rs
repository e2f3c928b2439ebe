//! Per-rater configuration from TOML (`[raters.<name>]` sections)

use serde::{Deserialize, Serialize};

/// Settings for one rater. Every field is optional; unset fields fall back
/// to the provider defaults for that rater.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileRaterConfig {
    /// Rating scale the rater answers in ("letter_grade", "signed_integer", "signed_small")
    pub scale: Option<String>,
    /// Concurrent calls allowed to this rater
    pub concurrency: Option<usize>,
    /// Provider serving the rater ("anthropic" or "openai")
    pub provider: Option<String>,
    /// Model id sent to the provider
    pub model: Option<String>,
    /// Endpoint override (OpenAI-compatible providers)
    pub base_url: Option<String>,
    /// Environment variable holding the API key
    pub api_key_env: Option<String>,
}
