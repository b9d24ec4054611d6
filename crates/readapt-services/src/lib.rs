//! readapt-services: HTTP collaborators for the adaptive reading loop.
//!
//! Implements the `readapt-core` collaborator traits on top of LLM backends
//! (Gemini, OpenAI-compatible) and a semantic chunking service, plus
//! configuration loading and tracing setup.

pub mod backend;
pub mod chunker;
pub mod config;
pub mod error;
pub mod gemini;
pub mod grader;
mod http;
pub mod logging;
pub mod mock;
pub mod openai;
pub mod questions;
pub mod rater;
pub mod rewriter;

pub use backend::{GenerateRequest, GenerateResponse, LlmBackend, TokenUsage};
pub use chunker::{ChunkerConfig, SemanticChunker, Threshold};
pub use config::{
    build_collaborators, collaborators_with_backend, create_backend, load_config,
    load_config_from, BackendConfig, ReadaptConfig,
};
pub use error::ServiceError;
pub use http::DEFAULT_TIMEOUT_SECS;
pub use logging::init_tracing;
