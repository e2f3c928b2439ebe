//! Anthropic Messages API adapter

use super::{HttpEndpoint, ProviderAdapter, ProviderKind, status_error, transport_error};
use assay_application::ports::llm_gateway::{GatewayError, LlmSession};
use assay_domain::Rater;
use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::debug;

pub struct AnthropicAdapter {
    client: reqwest::Client,
    rater: Rater,
    endpoint: HttpEndpoint,
    api_version: String,
}

impl AnthropicAdapter {
    pub fn new(
        client: reqwest::Client,
        rater: Rater,
        endpoint: HttpEndpoint,
        api_version: impl Into<String>,
    ) -> Self {
        Self {
            client,
            rater,
            endpoint,
            api_version: api_version.into(),
        }
    }
}

#[async_trait]
impl ProviderAdapter for AnthropicAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Anthropic
    }

    fn rater(&self) -> &Rater {
        &self.rater
    }

    async fn create_session_with_system_prompt(
        &self,
        system_prompt: &str,
    ) -> Result<Box<dyn LlmSession>, GatewayError> {
        Ok(Box::new(AnthropicSession {
            client: self.client.clone(),
            rater: self.rater.clone(),
            endpoint: self.endpoint.clone(),
            api_version: self.api_version.clone(),
            system_prompt: system_prompt.to_string(),
        }))
    }
}

pub struct AnthropicSession {
    client: reqwest::Client,
    rater: Rater,
    endpoint: HttpEndpoint,
    api_version: String,
    system_prompt: String,
}

impl AnthropicSession {
    fn request_body(&self, content: &str) -> Value {
        let mut body = json!({
            "model": self.endpoint.model,
            "max_tokens": self.endpoint.max_tokens,
            "messages": [{ "role": "user", "content": content }],
        });
        if !self.system_prompt.is_empty() {
            body["system"] = Value::String(self.system_prompt.clone());
        }
        body
    }
}

#[async_trait]
impl LlmSession for AnthropicSession {
    fn rater(&self) -> &Rater {
        &self.rater
    }

    async fn send(&self, content: &str) -> Result<String, GatewayError> {
        let url = format!("{}/v1/messages", self.endpoint.base_url.trim_end_matches('/'));
        debug!(rater = %self.rater, model = %self.endpoint.model, "POST {}", url);

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.endpoint.api_key)
            .header("anthropic-version", &self.api_version)
            .json(&self.request_body(content))
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let headers = response.headers().clone();
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, &headers, &body));
        }

        let body: Value = response.json().await.map_err(transport_error)?;
        extract_text(&body)
    }
}

/// Concatenate the `text` content blocks of a Messages response.
fn extract_text(body: &Value) -> Result<String, GatewayError> {
    let blocks = body
        .get("content")
        .and_then(|c| c.as_array())
        .ok_or_else(|| GatewayError::Other("response has no content blocks".into()))?;

    let text: Vec<&str> = blocks
        .iter()
        .filter(|b| b.get("type").and_then(|t| t.as_str()) == Some("text"))
        .filter_map(|b| b.get("text").and_then(|t| t.as_str()))
        .collect();

    if text.is_empty() {
        return Err(GatewayError::Other("response has no text blocks".into()));
    }
    Ok(text.join(""))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(system_prompt: &str) -> AnthropicSession {
        AnthropicSession {
            client: reqwest::Client::new(),
            rater: Rater::Claude,
            endpoint: HttpEndpoint {
                base_url: "https://api.anthropic.com".into(),
                api_key: "k".into(),
                model: "claude-sonnet-4-5".into(),
                max_tokens: 4096,
            },
            api_version: "2023-06-01".into(),
            system_prompt: system_prompt.into(),
        }
    }

    #[test]
    fn test_extract_text_joins_text_blocks() {
        let body = json!({
            "content": [
                { "type": "text", "text": "[{\"title\":" },
                { "type": "thinking", "thinking": "ignored" },
                { "type": "text", "text": "\"x\"}]" }
            ]
        });
        assert_eq!(extract_text(&body).unwrap(), "[{\"title\":\"x\"}]");
    }

    #[test]
    fn test_extract_text_without_text_blocks_fails() {
        assert!(extract_text(&json!({ "content": [] })).is_err());
        assert!(extract_text(&json!({ "id": "msg" })).is_err());
    }

    #[test]
    fn test_system_prompt_is_top_level() {
        let body = session("be strict").request_body("rate this");
        assert_eq!(body["system"], "be strict");
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["max_tokens"], 4096);

        let body = session("").request_body("rate this");
        assert!(body.get("system").is_none());
    }
}
