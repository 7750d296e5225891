use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::cli::Engine;
use crate::config::Settings;

/// Completion failure taxonomy. The generator recovers from every variant
/// by substituting the fallback template.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("authentication rejected: {0}")]
    Auth(String),
    #[error("quota exhausted: {0}")]
    Quota(String),
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("network failure: {0}")]
    Network(String),
}

#[async_trait]
pub trait CompletionProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String, ProviderError>;
}

impl std::fmt::Debug for dyn CompletionProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionProvider")
            .field("name", &self.name())
            .finish()
    }
}

/// Resolves the engine choice to a concrete provider. `Auto` walks the
/// availability chain (Gemini, then OpenAI) and lands on `None` (template
/// only) when no key is configured; naming an engine without its key is an
/// error.
pub fn provider_for(
    engine: Engine,
    settings: &Settings,
) -> anyhow::Result<Option<Arc<dyn CompletionProvider>>> {
    match engine {
        Engine::Template => Ok(None),
        Engine::Gemini => {
            let api_key = settings
                .gemini_api_key
                .clone()
                .ok_or_else(|| anyhow::anyhow!("GEMINI_API_KEY is not set"))?;
            Ok(Some(Arc::new(crate::gemini::GeminiClient::new(
                api_key,
                settings.gemini_base_url.clone(),
                settings.gemini_model.clone(),
            )?)))
        }
        Engine::Openai => {
            let api_key = settings
                .openai_api_key
                .clone()
                .ok_or_else(|| anyhow::anyhow!("OPENAI_API_KEY is not set"))?;
            Ok(Some(Arc::new(crate::openai::OpenAiClient::new(
                api_key,
                settings.openai_base_url.clone(),
                settings.openai_model.clone(),
            )?)))
        }
        Engine::Auto => {
            if settings.gemini_api_key.is_some() {
                return provider_for(Engine::Gemini, settings);
            }
            if settings.openai_api_key.is_some() {
                return provider_for(Engine::Openai, settings);
            }
            tracing::info!("no provider keys configured; using fallback template only");
            Ok(None)
        }
    }
}

pub(crate) fn classify_status(
    provider: &'static str,
    status: reqwest::StatusCode,
    raw: &str,
) -> ProviderError {
    let message = api_error_message(raw).unwrap_or_else(|| raw.trim().to_owned());
    match status.as_u16() {
        401 | 403 => ProviderError::Auth(format!("{provider} API error ({status}): {message}")),
        429 => ProviderError::Quota(format!("{provider} API error ({status}): {message}")),
        _ => ProviderError::Network(format!("{provider} API error ({status}): {message}")),
    }
}

pub(crate) fn classify_send_error(endpoint: &str, err: reqwest::Error) -> ProviderError {
    if err.is_timeout() {
        ProviderError::Timeout(format!("POST {endpoint}: {err}"))
    } else {
        ProviderError::Network(format!("POST {endpoint}: {err}"))
    }
}

/// Both providers wrap failures as `{"error": {"message": ...}}`.
pub(crate) fn api_error_message(raw_json: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(raw_json).ok()?;
    let message = value.get("error")?.get("message")?.as_str()?.to_owned();
    Some(message)
}
