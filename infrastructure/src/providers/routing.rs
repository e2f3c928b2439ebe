use super::{
    AnthropicAdapter, HttpEndpoint, OpenAiCompatibleAdapter, ProviderAdapter, ProviderKind,
};
use crate::config::FileConfig;
use assay_application::ports::llm_gateway::{GatewayError, LlmGateway, LlmSession};
use assay_domain::Rater;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Built-in endpoint for a rater reached through an OpenAI-compatible API.
struct KnownEndpoint {
    base_url: &'static str,
    api_key_env: &'static str,
    model: &'static str,
}

fn known_endpoint(rater: &Rater) -> Option<KnownEndpoint> {
    match rater {
        Rater::Gemini => Some(KnownEndpoint {
            base_url: "https://generativelanguage.googleapis.com/v1beta/openai",
            api_key_env: "GEMINI_API_KEY",
            model: "gemini-2.0-flash",
        }),
        Rater::Grok => Some(KnownEndpoint {
            base_url: "https://api.x.ai/v1",
            api_key_env: "XAI_API_KEY",
            model: "grok-2-latest",
        }),
        Rater::Perplexity => Some(KnownEndpoint {
            base_url: "https://api.perplexity.ai",
            api_key_env: "PERPLEXITY_API_KEY",
            model: "sonar",
        }),
        _ => None,
    }
}

/// Resolved connection for one rater.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteSpec {
    pub kind: ProviderKind,
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub max_tokens: u32,
}

/// Work out how `rater` is reached, or `None` when no API key is available.
///
/// Routing priority:
///  1. `[providers.routing]` entry for the rater
///  2. `provider` in the rater's own `[raters.<name>]` section
///  3. Claude goes to Anthropic, everything else to an OpenAI-compatible API
pub fn resolve_route(
    config: &FileConfig,
    rater: &Rater,
    env: impl Fn(&str) -> Option<String>,
) -> Option<RouteSpec> {
    let rater_config = config.rater(rater);

    let explicit = config
        .providers
        .routing
        .iter()
        .find(|(name, _)| Rater::from(name.as_str()) == *rater)
        .map(|(_, provider)| provider.clone())
        .or_else(|| rater_config.provider.clone());
    let kind = match explicit {
        Some(name) => match name.parse::<ProviderKind>() {
            Ok(kind) => kind,
            Err(e) => {
                warn!(rater = %rater, "Ignoring routing entry: {}", e);
                default_kind(rater)
            }
        },
        None => default_kind(rater),
    };

    let read_key = |var: &str| env(var).filter(|v| !v.trim().is_empty());

    match kind {
        ProviderKind::Anthropic => {
            let anthropic = &config.providers.anthropic;
            let api_key = match &rater_config.api_key_env {
                Some(var) => read_key(var),
                None => anthropic
                    .api_key
                    .clone()
                    .or_else(|| read_key(&anthropic.api_key_env)),
            }?;
            Some(RouteSpec {
                kind,
                base_url: rater_config
                    .base_url
                    .clone()
                    .unwrap_or_else(|| anthropic.base_url.clone()),
                api_key,
                model: rater_config
                    .model
                    .clone()
                    .unwrap_or_else(|| anthropic.model.clone()),
                max_tokens: anthropic.max_tokens,
            })
        }
        ProviderKind::OpenAi => {
            let openai = &config.providers.openai;
            let known = known_endpoint(rater);
            let api_key = match (&rater_config.api_key_env, &known) {
                (Some(var), _) => read_key(var),
                (None, Some(known)) => read_key(known.api_key_env),
                (None, None) => openai
                    .api_key
                    .clone()
                    .or_else(|| read_key(&openai.api_key_env)),
            }?;
            let base_url = rater_config
                .base_url
                .clone()
                .or_else(|| known.as_ref().map(|k| k.base_url.to_string()))
                .unwrap_or_else(|| openai.base_url.clone());
            let model = rater_config
                .model
                .clone()
                .or_else(|| known.as_ref().map(|k| k.model.to_string()))
                .unwrap_or_else(|| match rater {
                    Rater::Gpt => "gpt-4o".to_string(),
                    other => other.as_str().to_string(),
                });
            Some(RouteSpec {
                kind,
                base_url,
                api_key,
                model,
                max_tokens: openai.max_tokens,
            })
        }
    }
}

fn default_kind(rater: &Rater) -> ProviderKind {
    if rater.is_claude() {
        ProviderKind::Anthropic
    } else {
        ProviderKind::OpenAi
    }
}

/// Gateway that dispatches each rater to its own provider adapter.
pub struct RoutingGateway {
    routes: HashMap<Rater, Arc<dyn ProviderAdapter>>,
}

impl RoutingGateway {
    pub fn new(adapters: Vec<Arc<dyn ProviderAdapter>>) -> Self {
        let routes = adapters
            .into_iter()
            .map(|adapter| (adapter.rater().clone(), adapter))
            .collect();
        Self { routes }
    }

    /// Build adapters for `raters` from the file configuration, reading API
    /// keys from the process environment. Raters without a key get no route.
    pub fn from_config(config: &FileConfig, raters: &[Rater]) -> Result<Self, GatewayError> {
        let timeout = Duration::from_secs(config.execution.provider_timeout_secs.max(1));
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Other(format!("HTTP client: {}", e)))?;

        let mut adapters: Vec<Arc<dyn ProviderAdapter>> = Vec::new();
        for rater in raters {
            let Some(route) = resolve_route(config, rater, |var| std::env::var(var).ok()) else {
                debug!(rater = %rater, "No API key configured; rater unavailable");
                continue;
            };
            debug!(rater = %rater, provider = route.kind.as_str(), model = %route.model, "Routing rater");
            let endpoint = HttpEndpoint {
                base_url: route.base_url,
                api_key: route.api_key,
                model: route.model,
                max_tokens: route.max_tokens,
            };
            let adapter: Arc<dyn ProviderAdapter> = match route.kind {
                ProviderKind::Anthropic => Arc::new(AnthropicAdapter::new(
                    client.clone(),
                    rater.clone(),
                    endpoint,
                    config.providers.anthropic.api_version.clone(),
                )),
                ProviderKind::OpenAi => Arc::new(
                    OpenAiCompatibleAdapter::new(client.clone(), rater.clone(), endpoint)
                        .with_temperature(config.providers.openai.temperature),
                ),
            };
            adapters.push(adapter);
        }
        Ok(Self::new(adapters))
    }

    fn resolve(&self, rater: &Rater) -> Result<&dyn ProviderAdapter, GatewayError> {
        self.routes
            .get(rater)
            .map(|a| a.as_ref())
            .ok_or_else(|| {
                GatewayError::RaterNotAvailable(format!("no provider configured for '{}'", rater))
            })
    }
}

#[async_trait]
impl LlmGateway for RoutingGateway {
    async fn create_session_with_system_prompt(
        &self,
        rater: &Rater,
        system_prompt: &str,
    ) -> Result<Box<dyn LlmSession>, GatewayError> {
        self.resolve(rater)?
            .create_session_with_system_prompt(system_prompt)
            .await
    }

    async fn available_raters(&self) -> Result<Vec<Rater>, GatewayError> {
        let mut raters: Vec<Rater> = self.routes.keys().cloned().collect();
        raters.sort();
        Ok(raters)
    }
}
