use anyhow::{anyhow, Result};
use async_openai::types::CreateEmbeddingRequestArgs;
use async_openai::{config::OpenAIConfig, Client as OpenAIClient};
use ollama_rs::generation::embeddings::request::{EmbeddingsInput, GenerateEmbeddingsRequest};
use ollama_rs::Ollama;
use tracing::debug;

use crate::TARGET_LLM_REQUEST;

/// Embedding collaborator. Vectors are used only for cosine comparison and
/// never persisted.
#[derive(Clone, Debug)]
pub enum EmbeddingClient {
    Ollama { client: Ollama, model: String },
    OpenAI {
        client: OpenAIClient<OpenAIConfig>,
        model: String,
    },
}

impl EmbeddingClient {
    /// Computes a dense embedding for the given text.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        debug!(target: TARGET_LLM_REQUEST, "Requesting embedding for {} chars of text", text.len());
        match self {
            EmbeddingClient::Ollama { client, model } => {
                let request = GenerateEmbeddingsRequest::new(
                    model.clone(),
                    EmbeddingsInput::Single(text.to_string()),
                );
                let response = client
                    .generate_embeddings(request)
                    .await
                    .map_err(|e| anyhow!("Ollama embedding failed: {}", e))?;
                response
                    .embeddings
                    .into_iter()
                    .next()
                    .ok_or_else(|| anyhow!("Ollama returned no embeddings"))
            }
            EmbeddingClient::OpenAI { client, model } => {
                let request = CreateEmbeddingRequestArgs::default()
                    .model(model.clone())
                    .input(text)
                    .build()?;
                let response = client.embeddings().create(request).await?;
                response
                    .data
                    .into_iter()
                    .next()
                    .map(|d| d.embedding)
                    .ok_or_else(|| anyhow!("OpenAI returned no embeddings"))
            }
        }
    }
}
