use std::time::Duration;

use anyhow::Context as _;
use async_trait::async_trait;

use crate::llm::{CompletionProvider, ProviderError, classify_send_error, classify_status};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";

#[derive(Debug, Clone)]
pub struct GeminiClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl GeminiClient {
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .context("build gemini http client")?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
        })
    }
}

pub fn generate_endpoint(base_url: &str, model: &str) -> String {
    let base_url = base_url.trim_end_matches('/');
    format!("{base_url}/models/{model}:generateContent")
}

#[async_trait]
impl CompletionProvider for GeminiClient {
    fn name(&self) -> &'static str {
        "gemini"
    }

    async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String, ProviderError> {
        let endpoint = generate_endpoint(&self.base_url, &self.model);
        let body = serde_json::json!({
            "contents": [{ "parts": [{ "text": prompt }] }],
            "generationConfig": {
                "maxOutputTokens": max_tokens,
                "temperature": 0.7,
            },
        });

        let response = self
            .client
            .post(&endpoint)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|err| classify_send_error(&endpoint, err))?;

        let status = response.status();
        let raw = response
            .text()
            .await
            .map_err(|err| ProviderError::Network(format!("read gemini response body: {err}")))?;
        if !status.is_success() {
            return Err(classify_status("gemini", status, &raw));
        }

        let value: serde_json::Value = serde_json::from_str(&raw)
            .map_err(|err| ProviderError::Network(format!("parse gemini response: {err}")))?;
        extract_candidate_text(&value)
            .ok_or_else(|| ProviderError::Network("gemini response has no candidate text".to_owned()))
    }
}

fn extract_candidate_text(value: &serde_json::Value) -> Option<String> {
    let parts = value
        .get("candidates")?
        .as_array()?
        .first()?
        .get("content")?
        .get("parts")?
        .as_array()?;

    let mut text = String::new();
    for part in parts {
        if let Some(part_text) = part.get("text").and_then(|v| v.as_str()) {
            text.push_str(part_text);
        }
    }

    if text.trim().is_empty() { None } else { Some(text) }
}
