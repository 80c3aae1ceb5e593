//! Oracle contract - the external model service boundary

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

#[derive(Error, Debug)]
pub enum OracleError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("API error (status {status}): {detail}")]
    Api { status: u16, detail: String },

    #[error("stream error: {0}")]
    Stream(String),

    #[error("cancelled")]
    Cancelled,
}

impl OracleError {
    /// HTTP status attached to this failure, when one exists.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::Http(error) => error.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, OracleError>;

/// Token accounting reported by the provider, when available.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// A finished oracle response.
#[derive(Debug, Clone)]
pub struct Completion {
    pub content: String,
    pub usage: Option<TokenUsage>,
}

/// Callback receiving streamed text fragments as they arrive.
pub type ChunkSink<'a> = &'a mut (dyn FnMut(&str) + Send);

/// The external language-model service, treated as a textual
/// input/output black box.
#[async_trait]
pub trait Oracle: Send + Sync {
    /// One-shot generation.
    async fn generate(&self, prompt: &str) -> Result<Completion>;

    /// Streaming generation. `on_chunk` is called zero or more times
    /// before the call returns; after `cancel` fires the call must stop
    /// promptly with [`OracleError::Cancelled`].
    async fn generate_stream(
        &self,
        prompt: &str,
        cancel: CancellationToken,
        on_chunk: ChunkSink<'_>,
    ) -> Result<Completion>;
}
