//! Answer composer backends.
//!
//! Both backends send the grounded prompt from
//! [`docqa_core::compose::build_prompt`] to a text-generation model and
//! return its reply. Failures are reported as [`QaError::Composer`]; the
//! selector logs them and answers with the best raw passage instead.
//!
//! | `[composer].provider` | Endpoint |
//! |-----------------------|----------|
//! | `"disabled"` (default) | none |
//! | `"openai"` | `POST https://api.openai.com/v1/chat/completions` (`OPENAI_API_KEY`) |
//! | `"ollama"` | `POST {url}/api/generate` with `stream: false` |

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::sync::Arc;

use docqa_core::compose::{build_prompt, Composer};
use docqa_core::QaError;

use crate::config::ComposerConfig;
use crate::http;

const OPENAI_CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";
const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

pub struct OpenAIComposer {
    name: String,
    model: String,
    temperature: f32,
    max_retries: u32,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAIComposer {
    pub fn new(config: &ComposerConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("composer.model required for OpenAI composer"))?;
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY environment variable not set"))?;
        Ok(Self {
            name: format!("openai:{}", model),
            model,
            temperature: config.temperature,
            max_retries: config.max_retries,
            api_key,
            client: http::client(config.timeout_secs)?,
        })
    }
}

#[async_trait]
impl Composer for OpenAIComposer {
    fn name(&self) -> &str {
        &self.name
    }

    async fn compose(&self, query: &str, context: &str) -> docqa_core::Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "temperature": self.temperature,
            "messages": [
                {"role": "user", "content": build_prompt(query, context)}
            ],
        });
        let json = http::post_json_with_retry(
            || {
                self.client
                    .post(OPENAI_CHAT_URL)
                    .bearer_auth(&self.api_key)
                    .json(&body)
            },
            self.max_retries,
            "OpenAI",
        )
        .await
        .map_err(|e| QaError::Composer(format!("{:#}", e)))?;
        parse_chat_completion(&json).map_err(|e| QaError::Composer(e.to_string()))
    }
}

fn parse_chat_completion(json: &serde_json::Value) -> Result<String> {
    json.pointer("/choices/0/message/content")
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .ok_or_else(|| anyhow::anyhow!("Invalid OpenAI response: missing choices[0].message.content"))
}

pub struct OllamaComposer {
    name: String,
    model: String,
    url: String,
    temperature: f32,
    max_retries: u32,
    client: reqwest::Client,
}

impl OllamaComposer {
    pub fn new(config: &ComposerConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("composer.model required for Ollama composer"))?;
        let url = config
            .url
            .clone()
            .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string());
        Ok(Self {
            name: format!("ollama:{}", model),
            model,
            url: url.trim_end_matches('/').to_string(),
            temperature: config.temperature,
            max_retries: config.max_retries,
            client: http::client(config.timeout_secs)?,
        })
    }
}

#[async_trait]
impl Composer for OllamaComposer {
    fn name(&self) -> &str {
        &self.name
    }

    async fn compose(&self, query: &str, context: &str) -> docqa_core::Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "prompt": build_prompt(query, context),
            "stream": false,
            "options": {"temperature": self.temperature},
        });
        let endpoint = format!("{}/api/generate", self.url);
        let json = http::post_json_with_retry(
            || self.client.post(&endpoint).json(&body),
            self.max_retries,
            "Ollama",
        )
        .await
        .map_err(|e| QaError::Composer(format!("{:#}", e)))?;
        parse_generate(&json).map_err(|e| QaError::Composer(e.to_string()))
    }
}

fn parse_generate(json: &serde_json::Value) -> Result<String> {
    json.get("response")
        .and_then(|r| r.as_str())
        .map(str::to_string)
        .ok_or_else(|| anyhow::anyhow!("Invalid Ollama response: missing response field"))
}

/// Create the composer named by `config.provider`, or `None` when disabled.
pub fn create_composer(config: &ComposerConfig) -> Result<Option<Arc<dyn Composer>>> {
    match config.provider.as_str() {
        "disabled" => Ok(None),
        "openai" => Ok(Some(Arc::new(OpenAIComposer::new(config)?))),
        "ollama" => Ok(Some(Arc::new(OllamaComposer::new(config)?))),
        other => bail!("Unknown composer provider: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_chat_completion() {
        let json = serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": "Second floor."}}]
        });
        assert_eq!(parse_chat_completion(&json).unwrap(), "Second floor.");
        assert!(parse_chat_completion(&serde_json::json!({"choices": []})).is_err());
    }

    #[test]
    fn test_parse_generate() {
        let json = serde_json::json!({"model": "llama3", "response": "On the second floor.", "done": true});
        assert_eq!(parse_generate(&json).unwrap(), "On the second floor.");
        assert!(parse_generate(&serde_json::json!({"done": true})).is_err());
    }

    #[test]
    fn test_disabled_composer_is_none() {
        assert!(create_composer(&ComposerConfig::default()).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unreachable_ollama_is_composer_error() {
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let config = ComposerConfig {
            provider: "ollama".to_string(),
            model: Some("llama3".to_string()),
            url: Some(format!("http://127.0.0.1:{}", port)),
            max_retries: 0,
            ..Default::default()
        };
        let composer = create_composer(&config).unwrap().unwrap();
        assert_eq!(composer.name(), "ollama:llama3");
        let err = composer.compose("q", "ctx").await.unwrap_err();
        assert!(matches!(err, QaError::Composer(_)));
    }
}
