//! OpenAI-compatible oracle client
//!
//! Speaks the `/chat/completions` protocol over reqwest; streaming uses
//! server-sent events. Any endpoint implementing the same protocol
//! works through `with_base_url`.

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::StreamExt;
use reqwest::Client;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use crate::oracle::{ChunkSink, Completion, Oracle, OracleError, Result, TokenUsage};

pub struct OpenAiOracle {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAiOracle {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    fn build_request_body(&self, prompt: &str, stream: bool) -> serde_json::Value {
        serde_json::json!({
            "model": self.model,
            "messages": [{"role": "user", "content": prompt}],
            "stream": stream,
        })
    }

    async fn send(&self, body: serde_json::Value) -> Result<reqwest::Response> {
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let detail = response.text().await.unwrap_or_default();
            return Err(OracleError::Api { status, detail });
        }
        Ok(response)
    }
}

#[async_trait]
impl Oracle for OpenAiOracle {
    async fn generate(&self, prompt: &str) -> Result<Completion> {
        let response = self.send(self.build_request_body(prompt, false)).await?;
        let parsed: ChatResponse = response.json().await?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default();

        log::debug!("oracle returned {} chars", content.len());
        Ok(Completion {
            content,
            usage: parsed.usage,
        })
    }

    async fn generate_stream(
        &self,
        prompt: &str,
        cancel: CancellationToken,
        on_chunk: ChunkSink<'_>,
    ) -> Result<Completion> {
        let response = self.send(self.build_request_body(prompt, true)).await?;
        let mut stream = Box::pin(response.bytes_stream().eventsource());

        let mut content = String::new();
        let mut usage = None;

        loop {
            if cancel.is_cancelled() {
                return Err(OracleError::Cancelled);
            }

            let event = tokio::select! {
                _ = cancel.cancelled() => return Err(OracleError::Cancelled),
                event = stream.next() => match event {
                    Some(event) => event.map_err(|e| OracleError::Stream(e.to_string()))?,
                    None => break,
                },
            };

            if event.data == "[DONE]" {
                break;
            }

            let chunk: StreamChunk = serde_json::from_str(&event.data)?;
            if chunk.usage.is_some() {
                usage = chunk.usage;
            }
            if let Some(delta) = chunk
                .choices
                .first()
                .and_then(|choice| choice.delta.content.as_deref())
            {
                content.push_str(delta);
                on_chunk(delta);
            }
        }

        Ok(Completion { content, usage })
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    usage: Option<TokenUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    usage: Option<TokenUsage>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(Debug, Deserialize, Default)]
struct StreamDelta {
    content: Option<String>,
}
