//! Semantic chunking service client.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use readapt_core::model::{Chunk, Sentence};
use readapt_core::traits::ChunkSource;

use crate::error::ServiceError;
use crate::http::{build_client, check_status, read_json, send_error, DEFAULT_TIMEOUT_SECS};

const DEFAULT_URL: &str = "https://api.chonkie.ai/v1/chunk/semantic";
const DEFAULT_EMBEDDING_MODEL: &str = "minishlab/potion-base-8M";

/// Similarity threshold: let the service pick, or a fixed value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Threshold {
    Fixed(f64),
    Named(String),
}

impl Default for Threshold {
    fn default() -> Self {
        Threshold::Named("auto".to_string())
    }
}

/// Chunking service settings.
///
/// Custom Debug impl masks the API key.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkerConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_url")]
    pub url: String,
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
    #[serde(default)]
    pub threshold: Threshold,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_min_sentences")]
    pub min_sentences: usize,
}

fn default_url() -> String {
    DEFAULT_URL.to_string()
}
fn default_embedding_model() -> String {
    DEFAULT_EMBEDDING_MODEL.to_string()
}
fn default_chunk_size() -> usize {
    512
}
fn default_min_sentences() -> usize {
    1
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            url: default_url(),
            embedding_model: default_embedding_model(),
            threshold: Threshold::default(),
            chunk_size: default_chunk_size(),
            min_sentences: default_min_sentences(),
        }
    }
}

impl std::fmt::Debug for ChunkerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkerConfig")
            .field("api_key", &"***")
            .field("url", &self.url)
            .field("embedding_model", &self.embedding_model)
            .field("threshold", &self.threshold)
            .field("chunk_size", &self.chunk_size)
            .field("min_sentences", &self.min_sentences)
            .finish()
    }
}

#[derive(Serialize)]
struct ChunkRequest<'a> {
    text: &'a str,
    params: ChunkParams<'a>,
}

#[derive(Serialize)]
struct ChunkParams<'a> {
    embedding_model: &'a str,
    threshold: &'a Threshold,
    chunk_size: usize,
    min_sentences: usize,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ChunkResponse {
    Bare(Vec<RawChunk>),
    Wrapped {
        #[serde(default)]
        chunks: Vec<RawChunk>,
    },
}

#[derive(Deserialize)]
struct RawChunk {
    text: String,
    start_index: usize,
    end_index: usize,
    token_count: usize,
    #[serde(default)]
    sentences: Vec<Sentence>,
}

/// Splits text into semantic chunks via a remote embedding service.
pub struct SemanticChunker {
    config: ChunkerConfig,
    timeout_secs: u64,
    client: reqwest::Client,
}

impl SemanticChunker {
    pub fn new(config: ChunkerConfig) -> Result<Self, ServiceError> {
        Self::with_timeout(config, DEFAULT_TIMEOUT_SECS)
    }

    pub fn with_timeout(config: ChunkerConfig, timeout_secs: u64) -> Result<Self, ServiceError> {
        Ok(Self {
            config,
            timeout_secs,
            client: build_client(timeout_secs)?,
        })
    }
}

#[async_trait]
impl ChunkSource for SemanticChunker {
    #[instrument(skip(self, text), fields(len = text.len()))]
    async fn chunk_text(&self, text: &str) -> anyhow::Result<Vec<Chunk>> {
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }

        let body = ChunkRequest {
            text,
            params: ChunkParams {
                embedding_model: &self.config.embedding_model,
                threshold: &self.config.threshold,
                chunk_size: self.config.chunk_size,
                min_sentences: self.config.min_sentences,
            },
        };

        let response = self
            .client
            .post(&self.config.url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| send_error(e, self.timeout_secs))?;
        let response = check_status(response, &self.config.url).await?;
        let raw = match read_json::<ChunkResponse>(response).await? {
            ChunkResponse::Bare(chunks) | ChunkResponse::Wrapped { chunks } => chunks,
        };

        let chunks: Vec<Chunk> = raw
            .into_iter()
            .enumerate()
            .map(|(index, rc)| Chunk {
                index,
                text: rc.text,
                start_index: rc.start_index,
                end_index: rc.end_index,
                token_count: rc.token_count,
                sentences: rc.sentences,
            })
            .collect();
        debug!(chunks = chunks.len(), "text chunked");
        Ok(chunks)
    }
}
