use std::time::Duration;

use anyhow::Context as _;
use async_trait::async_trait;

use crate::llm::{CompletionProvider, ProviderError, classify_send_error, classify_status};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

const SYSTEM_PROMPT: &str = "You are a professional career advisor and email writer.";

#[derive(Debug, Clone)]
pub struct OpenAiClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiClient {
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .context("build openai http client")?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
        })
    }
}

pub fn chat_endpoint(base_url: &str) -> String {
    let base_url = base_url.trim_end_matches('/');
    format!("{base_url}/chat/completions")
}

#[async_trait]
impl CompletionProvider for OpenAiClient {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String, ProviderError> {
        let endpoint = chat_endpoint(&self.base_url);
        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": prompt },
            ],
            "max_tokens": max_tokens,
            "temperature": 0.7,
        });

        let response = self
            .client
            .post(&endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|err| classify_send_error(&endpoint, err))?;

        let status = response.status();
        let raw = response
            .text()
            .await
            .map_err(|err| ProviderError::Network(format!("read openai response body: {err}")))?;
        if !status.is_success() {
            return Err(classify_status("openai", status, &raw));
        }

        let value: serde_json::Value = serde_json::from_str(&raw)
            .map_err(|err| ProviderError::Network(format!("parse openai response: {err}")))?;
        extract_choice_text(&value)
            .ok_or_else(|| ProviderError::Network("openai response has no choice text".to_owned()))
    }
}

fn extract_choice_text(value: &serde_json::Value) -> Option<String> {
    let text = value
        .get("choices")?
        .as_array()?
        .first()?
        .get("message")?
        .get("content")?
        .as_str()?;

    if text.trim().is_empty() {
        None
    } else {
        Some(text.to_owned())
    }
}
