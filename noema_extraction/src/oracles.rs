//! HTTP oracle clients speaking the OpenAI-compatible wire format.
//!
//! Both clients work against any server exposing `/chat/completions` and
//! `/embeddings` (Ollama, vLLM, hosted providers). API keys are resolved from
//! the environment variable named in the config; an unset or empty variable
//! means no Authorization header is sent, which local servers accept.

use std::time::Duration;

use anyhow::{Context, Result};
use serde_json::{json, Value};
use tracing::debug;

use noema_config::ModelsConfig;

use crate::{ChatMessage, EmbeddingPipeline, TextGenerator};

fn resolve_api_key(env_var: &str) -> Option<String> {
    if env_var.is_empty() {
        return None;
    }
    std::env::var(env_var).ok().filter(|key| !key.is_empty())
}

fn build_client(timeout_secs: u64) -> Result<reqwest::blocking::Client> {
    reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .context("failed to build HTTP client")
}

fn chat_request_body(
    model: &str,
    system: &str,
    messages: &[ChatMessage],
    max_tokens: u32,
    temperature: f32,
) -> Value {
    let mut wire_messages = vec![json!({"role": "system", "content": system})];
    for message in messages {
        wire_messages.push(json!({"role": message.role, "content": message.content}));
    }
    json!({
        "model": model,
        "messages": wire_messages,
        "max_tokens": max_tokens,
        "temperature": temperature,
    })
}

fn extract_chat_content(response: &Value) -> Result<String> {
    response["choices"][0]["message"]["content"]
        .as_str()
        .map(|s| s.to_string())
        .ok_or_else(|| anyhow::anyhow!("chat response carried no message content"))
}

fn embedding_request_body(model: &str, texts: &[String]) -> Value {
    json!({"model": model, "input": texts})
}

fn extract_embeddings(response: &Value, expected: usize) -> Result<Vec<Vec<f32>>> {
    let rows = response["data"]
        .as_array()
        .ok_or_else(|| anyhow::anyhow!("embedding response carried no data array"))?;
    if rows.len() != expected {
        anyhow::bail!(
            "embedding response carried {} rows, expected {}",
            rows.len(),
            expected
        );
    }
    rows.iter()
        .map(|row| {
            row["embedding"]
                .as_array()
                .ok_or_else(|| anyhow::anyhow!("embedding row carried no vector"))?
                .iter()
                .map(|v| {
                    v.as_f64()
                        .map(|f| f as f32)
                        .ok_or_else(|| anyhow::anyhow!("non-numeric embedding component"))
                })
                .collect()
        })
        .collect()
}

/// Chat-completion client for an OpenAI-compatible endpoint.
pub struct OpenAiChatGenerator {
    client: reqwest::blocking::Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
    max_tokens: u32,
    temperature: f32,
}

impl OpenAiChatGenerator {
    /// Build a generator from the generation side of [`ModelsConfig`].
    pub fn from_config(models: &ModelsConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(models.request_timeout_secs)?,
            endpoint: models.generation_endpoint.trim_end_matches('/').to_string(),
            model: models.generation_model.clone(),
            api_key: resolve_api_key(&models.generation_api_key_env),
            max_tokens: models.generation_max_tokens,
            temperature: models.generation_temperature,
        })
    }
}

impl TextGenerator for OpenAiChatGenerator {
    fn generate(&self, system: &str, messages: &[ChatMessage]) -> Result<String> {
        let url = format!("{}/chat/completions", self.endpoint);
        let body = chat_request_body(
            &self.model,
            system,
            messages,
            self.max_tokens,
            self.temperature,
        );
        debug!(model = %self.model, messages = messages.len(), "requesting chat completion");

        let mut request = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let response = request
            .send()
            .with_context(|| format!("chat request to {} failed", url))?;
        let status = response.status();
        if !status.is_success() {
            let detail = response.text().unwrap_or_default();
            anyhow::bail!("chat endpoint returned {}: {}", status, detail);
        }
        let parsed: Value = response.json().context("chat response was not JSON")?;
        extract_chat_content(&parsed)
    }
}

/// Embedding client for an OpenAI-compatible endpoint.
pub struct HttpEmbeddingPipeline {
    client: reqwest::blocking::Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
}

impl HttpEmbeddingPipeline {
    /// Build an embedder from the embedding side of [`ModelsConfig`].
    pub fn from_config(models: &ModelsConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(models.request_timeout_secs)?,
            endpoint: models.embedding_endpoint.trim_end_matches('/').to_string(),
            model: models.embedding_model.clone(),
            api_key: resolve_api_key(&models.embedding_api_key_env),
        })
    }
}

impl EmbeddingPipeline for HttpEmbeddingPipeline {
    fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_batch(&[text.to_string()])?;
        vectors
            .pop()
            .ok_or_else(|| anyhow::anyhow!("embedding response was empty"))
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let url = format!("{}/embeddings", self.endpoint);
        let body = embedding_request_body(&self.model, texts);
        debug!(model = %self.model, batch = texts.len(), "requesting embeddings");

        let mut request = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let response = request
            .send()
            .with_context(|| format!("embedding request to {} failed", url))?;
        let status = response.status();
        if !status.is_success() {
            let detail = response.text().unwrap_or_default();
            anyhow::bail!("embedding endpoint returned {}: {}", status, detail);
        }
        let parsed: Value = response.json().context("embedding response was not JSON")?;
        extract_embeddings(&parsed, texts.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_request_body_shape() {
        let body = chat_request_body(
            "llama3.1:8b",
            "You extract knowledge.",
            &[ChatMessage::user("Extract from: water boils.")],
            512,
            0.1,
        );
        assert_eq!(body["model"], "llama3.1:8b");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["role"], "user");
        assert_eq!(body["messages"][1]["content"], "Extract from: water boils.");
        assert_eq!(body["max_tokens"], 512);
    }

    #[test]
    fn test_extract_chat_content() {
        let response = json!({
            "choices": [{"message": {"role": "assistant", "content": "{\"events\": []}"}}]
        });
        assert_eq!(extract_chat_content(&response).unwrap(), "{\"events\": []}");

        let empty = json!({"choices": []});
        assert!(extract_chat_content(&empty).is_err());
    }

    #[test]
    fn test_extract_embeddings() {
        let response = json!({
            "data": [
                {"embedding": [0.1, 0.2]},
                {"embedding": [0.3, 0.4]}
            ]
        });
        let vectors = extract_embeddings(&response, 2).unwrap();
        assert_eq!(vectors.len(), 2);
        assert!((vectors[1][0] - 0.3).abs() < 1e-6);

        assert!(extract_embeddings(&response, 3).is_err());
        assert!(extract_embeddings(&json!({}), 1).is_err());
    }

    #[test]
    fn test_embedding_request_body_shape() {
        let body = embedding_request_body("nomic-embed-text", &["glucose".to_string()]);
        assert_eq!(body["model"], "nomic-embed-text");
        assert_eq!(body["input"][0], "glucose");
    }

    #[test]
    fn test_resolve_api_key_empty_var_name() {
        assert!(resolve_api_key("").is_none());
    }
}
