pub mod cannibalization;
pub mod cluster_store;
pub mod config;
pub mod diversity;
pub mod embeddings;
pub mod history;
pub mod llm;
pub mod logging;
pub mod outcome;
pub mod prompts;
pub mod providers;
pub mod research;
pub mod selector;
pub mod similarity;
pub mod types;

use async_openai::{config::OpenAIConfig, Client as OpenAIClient};
use ollama_rs::Ollama;

pub const TARGET_WEB_REQUEST: &str = "web_request";
pub const TARGET_LLM_REQUEST: &str = "llm_request";
pub const TARGET_STORE: &str = "store";

#[derive(Clone, Debug)]
pub enum LLMClient {
    Ollama(Ollama),
    OpenAI(OpenAIClient<OpenAIConfig>),
}

#[derive(Clone)]
pub struct LLMParams {
    pub llm_client: LLMClient,
    pub model: String,
    pub temperature: f32,
}
