//! LLM provider adapters
//!
//! Each adapter serves one rater over HTTP. The [`RoutingGateway`] maps
//! raters to adapters and implements the `LlmGateway` port.

pub mod anthropic;
pub mod openai;
pub mod routing;

pub use anthropic::AnthropicAdapter;
pub use openai::OpenAiCompatibleAdapter;
pub use routing::RoutingGateway;

use assay_application::ports::llm_gateway::{GatewayError, LlmSession};
use assay_domain::Rater;
use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProviderKind {
    Anthropic,
    #[default]
    OpenAi,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::OpenAi => "openai",
        }
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "anthropic" | "claude" => Ok(ProviderKind::Anthropic),
            "openai" | "openai_compatible" | "openai-compatible" => Ok(ProviderKind::OpenAi),
            other => Err(format!("unknown provider '{}'", other)),
        }
    }
}

#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// The rater this adapter answers for.
    fn rater(&self) -> &Rater;

    async fn create_session_with_system_prompt(
        &self,
        system_prompt: &str,
    ) -> Result<Box<dyn LlmSession>, GatewayError>;
}

/// Connection details for one rater's endpoint.
#[derive(Debug, Clone)]
pub struct HttpEndpoint {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub max_tokens: u32,
}

/// Map a non-success HTTP status to a gateway error.
///
/// 429 carries the server's `Retry-After` (seconds) when present; 5xx and
/// Anthropic's 529 "overloaded" are server errors and therefore retried.
pub(crate) fn status_error(status: StatusCode, headers: &HeaderMap, body: &str) -> GatewayError {
    let message = truncate_body(body);
    match status.as_u16() {
        429 => GatewayError::RateLimited {
            retry_after: headers
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs),
        },
        408 => GatewayError::Timeout,
        code @ (500..=599) => GatewayError::ServerError {
            status: code,
            message,
        },
        401 | 403 => GatewayError::RaterNotAvailable(format!("{}: {}", status, message)),
        _ => GatewayError::RequestFailed(format!("{}: {}", status, message)),
    }
}

pub(crate) fn transport_error(e: reqwest::Error) -> GatewayError {
    if e.is_timeout() {
        GatewayError::Timeout
    } else if e.is_connect() {
        GatewayError::ConnectionError(e.to_string())
    } else if e.is_decode() {
        GatewayError::Other(format!("Malformed provider response: {}", e))
    } else {
        GatewayError::RequestFailed(e.to_string())
    }
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 300;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn test_rate_limit_reads_retry_after() {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_static("12"));
        let e = status_error(StatusCode::TOO_MANY_REQUESTS, &headers, "slow down");
        assert_eq!(e.retry_after(), Some(Duration::from_secs(12)));
        assert!(e.is_transient());
    }

    #[test]
    fn test_server_errors_are_transient() {
        let headers = HeaderMap::new();
        let overloaded = StatusCode::from_u16(529).unwrap();
        assert!(status_error(overloaded, &headers, "overloaded").is_transient());
        assert!(status_error(StatusCode::BAD_GATEWAY, &headers, "").is_transient());
    }

    #[test]
    fn test_client_errors_are_permanent() {
        let headers = HeaderMap::new();
        let e = status_error(StatusCode::BAD_REQUEST, &headers, "bad model");
        assert!(!e.is_transient());
        assert!(e.to_string().contains("bad model"));
        let e = status_error(StatusCode::UNAUTHORIZED, &headers, "");
        assert!(matches!(e, GatewayError::RaterNotAvailable(_)));
    }

    #[test]
    fn test_provider_kind_parse() {
        assert_eq!("Anthropic".parse::<ProviderKind>(), Ok(ProviderKind::Anthropic));
        assert_eq!("openai".parse::<ProviderKind>(), Ok(ProviderKind::OpenAi));
        assert!("bedrock".parse::<ProviderKind>().is_err());
    }
}
