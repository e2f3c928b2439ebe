//! OpenAI-compatible chat completions adapter
//!
//! Serves GPT directly and Gemini, Grok and Perplexity through their
//! OpenAI-compatible endpoints. Each request is a fresh two-message
//! conversation (system + user); the pipeline never continues a dialogue.

use super::{HttpEndpoint, ProviderAdapter, ProviderKind, status_error, transport_error};
use assay_application::ports::llm_gateway::{GatewayError, LlmSession};
use assay_domain::Rater;
use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::debug;

pub struct OpenAiCompatibleAdapter {
    client: reqwest::Client,
    rater: Rater,
    endpoint: HttpEndpoint,
    temperature: f32,
}

impl OpenAiCompatibleAdapter {
    pub fn new(client: reqwest::Client, rater: Rater, endpoint: HttpEndpoint) -> Self {
        Self {
            client,
            rater,
            endpoint,
            temperature: 0.2,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

#[async_trait]
impl ProviderAdapter for OpenAiCompatibleAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenAi
    }

    fn rater(&self) -> &Rater {
        &self.rater
    }

    async fn create_session_with_system_prompt(
        &self,
        system_prompt: &str,
    ) -> Result<Box<dyn LlmSession>, GatewayError> {
        Ok(Box::new(OpenAiSession {
            client: self.client.clone(),
            rater: self.rater.clone(),
            endpoint: self.endpoint.clone(),
            temperature: self.temperature,
            system_prompt: system_prompt.to_string(),
        }))
    }
}

pub struct OpenAiSession {
    client: reqwest::Client,
    rater: Rater,
    endpoint: HttpEndpoint,
    temperature: f32,
    system_prompt: String,
}

impl OpenAiSession {
    fn request_body(&self, content: &str) -> Value {
        json!({
            "model": self.endpoint.model,
            "messages": [
                { "role": "system", "content": self.system_prompt },
                { "role": "user", "content": content },
            ],
            "temperature": self.temperature,
            "max_tokens": self.endpoint.max_tokens,
        })
    }
}

#[async_trait]
impl LlmSession for OpenAiSession {
    fn rater(&self) -> &Rater {
        &self.rater
    }

    async fn send(&self, content: &str) -> Result<String, GatewayError> {
        let url = format!(
            "{}/chat/completions",
            self.endpoint.base_url.trim_end_matches('/')
        );
        debug!(rater = %self.rater, model = %self.endpoint.model, "POST {}", url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.endpoint.api_key)
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
        extract_content(&body)
    }
}

/// Text of the first choice.
fn extract_content(body: &Value) -> Result<String, GatewayError> {
    body.get("choices")
        .and_then(|c| c.as_array())
        .and_then(|arr| arr.first())
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .ok_or_else(|| GatewayError::Other("response has no choices[0].message.content".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_content() {
        let body = json!({
            "choices": [{ "message": { "role": "assistant", "content": "[]" } }]
        });
        assert_eq!(extract_content(&body).unwrap(), "[]");
        assert!(extract_content(&json!({ "choices": [] })).is_err());
    }

    #[tokio::test]
    async fn test_request_body_carries_system_prompt() {
        let adapter = OpenAiCompatibleAdapter::new(
            reqwest::Client::new(),
            Rater::Grok,
            HttpEndpoint {
                base_url: "https://api.x.ai/v1".into(),
                api_key: "k".into(),
                model: "grok-2-latest".into(),
                max_tokens: 1024,
            },
        );
        let session = OpenAiSession {
            client: adapter.client.clone(),
            rater: adapter.rater.clone(),
            endpoint: adapter.endpoint.clone(),
            temperature: adapter.temperature,
            system_prompt: "sys".into(),
        };
        let body = session.request_body("hello");
        assert_eq!(body["model"], "grok-2-latest");
        assert_eq!(body["messages"][0]["content"], "sys");
        assert_eq!(body["messages"][1]["content"], "hello");
        assert_eq!(body["max_tokens"], 1024);
    }
}
