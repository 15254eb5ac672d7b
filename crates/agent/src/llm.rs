//! Pluggable completion client.
//!
//! One trait, one HTTP implementation speaking the OpenAI-compatible chat
//! completions shape (OpenAI, Ollama, and most gateways). Model output is
//! advisory everywhere it is consumed; callers must survive any string.

use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::warn;

use staffer_core::config::LlmConfig;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("llm transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("llm returned status {0}")]
    Status(u16),
    #[error("llm response had no content")]
    EmptyResponse,
}

#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, system: &str, user: &str) -> Result<String, LlmError>;
}

pub struct HttpCompletionClient {
    http: reqwest::Client,
    config: LlmConfig,
    endpoint: String,
}

impl HttpCompletionClient {
    pub fn new(config: LlmConfig) -> Result<Self, LlmError> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;

        let base = config
            .base_url
            .as_deref()
            .unwrap_or("https://api.openai.com")
            .trim_end_matches('/')
            .to_string();

        Ok(Self { http, endpoint: format!("{base}/v1/chat/completions"), config })
    }

    async fn request_once(&self, system: &str, user: &str) -> Result<String, LlmError> {
        let body = json!({
            "model": self.config.model,
            "temperature": 0.2,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user},
            ],
        });

        let mut request = self.http.post(&self.endpoint).json(&body);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key.expose_secret());
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(LlmError::Status(status.as_u16()));
        }

        let completion: ChatCompletion = response.json().await?;
        completion
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(LlmError::EmptyResponse)
    }
}

#[async_trait]
impl CompletionClient for HttpCompletionClient {
    async fn complete(&self, system: &str, user: &str) -> Result<String, LlmError> {
        let mut last_error = LlmError::EmptyResponse;
        for attempt in 0..=self.config.max_retries {
            match self.request_once(system, user).await {
                Ok(content) => return Ok(content),
                Err(err) => {
                    warn!(event_name = "llm.request_failed", attempt, error = %err);
                    last_error = err;
                }
            }
        }
        Err(last_error)
    }
}

#[derive(Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessageBody,
}

#[derive(Deserialize)]
struct ChatMessageBody {
    #[serde(default)]
    content: String,
}

/// The widest `{...}` slice of a completion. Models wrap JSON in prose and
/// code fences; the braces are the only reliable delimiters.
pub fn extract_json_slice(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end >= start).then(|| &text[start..=end])
}

#[cfg(test)]
mod tests {
    use super::extract_json_slice;

    #[test]
    fn json_slice_survives_prose_and_fences() {
        let reply = "Sure! Here you go:\n```json\n{\"a\": {\"b\": 1}}\n```\nLet me know.";
        assert_eq!(extract_json_slice(reply), Some("{\"a\": {\"b\": 1}}"));
    }

    #[test]
    fn no_braces_means_no_slice() {
        assert_eq!(extract_json_slice("plain prose"), None);
        assert_eq!(extract_json_slice("} backwards {"), None);
    }
}
