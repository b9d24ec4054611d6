//! Configuration loading and collaborator factory.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use readapt_core::policy::PolicyConfig;
use readapt_core::session::Collaborators;

use crate::backend::LlmBackend;
use crate::chunker::{ChunkerConfig, SemanticChunker};
use crate::gemini::GeminiBackend;
use crate::grader::{GraderConfig, LlmResponseGrader};
use crate::http::DEFAULT_TIMEOUT_SECS;
use crate::openai::OpenAiBackend;
use crate::questions::{LlmQuestionGenerator, QuestionsConfig};
use crate::rater::{LlmDifficultyRater, RaterConfig};
use crate::rewriter::{LlmTextRewriter, RewriterConfig};

/// Configuration for a single LLM backend.
///
/// Note: Custom Debug impl masks API keys to prevent accidental exposure in logs.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BackendConfig {
    Gemini {
        api_key: String,
        #[serde(default)]
        base_url: Option<String>,
    },
    OpenAI {
        api_key: String,
        #[serde(default)]
        base_url: Option<String>,
        #[serde(default)]
        org_id: Option<String>,
    },
}

impl std::fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendConfig::Gemini {
                api_key: _,
                base_url,
            } => f
                .debug_struct("Gemini")
                .field("api_key", &"***")
                .field("base_url", base_url)
                .finish(),
            BackendConfig::OpenAI {
                api_key: _,
                base_url,
                org_id,
            } => f
                .debug_struct("OpenAI")
                .field("api_key", &"***")
                .field("base_url", base_url)
                .field("org_id", org_id)
                .finish(),
        }
    }
}

/// Top-level readapt configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadaptConfig {
    /// Backend configurations keyed by name.
    #[serde(default)]
    pub backends: HashMap<String, BackendConfig>,
    /// Backend used by every LLM-backed collaborator.
    #[serde(default = "default_backend")]
    pub default_backend: String,
    /// Model passed to the backend.
    #[serde(default = "default_model")]
    pub model: String,
    /// Per-request timeout for every remote service.
    #[serde(default = "default_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub chunker: ChunkerConfig,
    #[serde(default)]
    pub rater: RaterConfig,
    #[serde(default)]
    pub grader: GraderConfig,
    #[serde(default)]
    pub questions: QuestionsConfig,
    #[serde(default)]
    pub rewriter: RewriterConfig,
    #[serde(default)]
    pub policy: PolicyConfig,
}

fn default_backend() -> String {
    "gemini".to_string()
}
fn default_model() -> String {
    "gemini-2.0-flash".to_string()
}
fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl Default for ReadaptConfig {
    fn default() -> Self {
        Self {
            backends: HashMap::new(),
            default_backend: default_backend(),
            model: default_model(),
            request_timeout_secs: default_timeout(),
            chunker: ChunkerConfig::default(),
            rater: RaterConfig::default(),
            grader: GraderConfig::default(),
            questions: QuestionsConfig::default(),
            rewriter: RewriterConfig::default(),
            policy: PolicyConfig::default(),
        }
    }
}

/// Resolve environment variable references like `${VAR_NAME}` in a string.
fn resolve_env_vars(s: &str) -> String {
    let mut result = s.to_string();
    while let Some(start) = result.find("${") {
        if let Some(end) = result[start..].find('}') {
            let var_name = &result[start + 2..start + end];
            let value = std::env::var(var_name).unwrap_or_default();
            result = format!(
                "{}{}{}",
                &result[..start],
                value,
                &result[start + end + 1..]
            );
        } else {
            break;
        }
    }
    result
}

fn resolve_backend_config(config: &BackendConfig) -> BackendConfig {
    match config {
        BackendConfig::Gemini { api_key, base_url } => BackendConfig::Gemini {
            api_key: resolve_env_vars(api_key),
            base_url: base_url.as_deref().map(resolve_env_vars),
        },
        BackendConfig::OpenAI {
            api_key,
            base_url,
            org_id,
        } => BackendConfig::OpenAI {
            api_key: resolve_env_vars(api_key),
            base_url: base_url.as_deref().map(resolve_env_vars),
            org_id: org_id.as_deref().map(resolve_env_vars),
        },
    }
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `readapt.toml` in the current directory
/// 2. `~/.config/readapt/config.toml`
///
/// Environment variable overrides: `READAPT_GEMINI_KEY`, `READAPT_OPENAI_KEY`,
/// `READAPT_CHUNKER_KEY`.
pub fn load_config() -> Result<ReadaptConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<ReadaptConfig> {
    let config_path = if let Some(p) = path {
        if p.exists() {
            Some(p.to_path_buf())
        } else {
            anyhow::bail!("config file not found: {}", p.display());
        }
    } else {
        let local = PathBuf::from("readapt.toml");
        if local.exists() {
            Some(local)
        } else {
            dirs_path()
                .map(|dir| dir.join("config.toml"))
                .filter(|global| global.exists())
        }
    };

    let mut config = match config_path {
        Some(path) => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            toml::from_str::<ReadaptConfig>(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?
        }
        None => ReadaptConfig::default(),
    };

    apply_env_overrides(&mut config, |name| std::env::var(name).ok());

    config.backends = config
        .backends
        .iter()
        .map(|(k, v)| (k.clone(), resolve_backend_config(v)))
        .collect();
    config.chunker.api_key = resolve_env_vars(&config.chunker.api_key);
    config.chunker.url = resolve_env_vars(&config.chunker.url);

    config
        .policy
        .scale
        .validate()
        .context("invalid [policy] level scale")?;

    Ok(config)
}

/// Apply `READAPT_*_KEY` overrides using `lookup` to read variables.
fn apply_env_overrides(config: &mut ReadaptConfig, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(key) = lookup("READAPT_GEMINI_KEY") {
        let entry = config
            .backends
            .entry("gemini".into())
            .or_insert(BackendConfig::Gemini {
                api_key: String::new(),
                base_url: None,
            });
        if let BackendConfig::Gemini { api_key, .. } = entry {
            *api_key = key;
        }
    }

    if let Some(key) = lookup("READAPT_OPENAI_KEY") {
        let entry = config
            .backends
            .entry("openai".into())
            .or_insert(BackendConfig::OpenAI {
                api_key: String::new(),
                base_url: None,
                org_id: None,
            });
        if let BackendConfig::OpenAI { api_key, .. } = entry {
            *api_key = key;
        }
    }

    if let Some(key) = lookup("READAPT_CHUNKER_KEY") {
        config.chunker.api_key = key;
    }
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("readapt"))
}

/// Create a backend instance from its configuration.
pub fn create_backend(config: &BackendConfig, timeout_secs: u64) -> Result<Arc<dyn LlmBackend>> {
    Ok(match config {
        BackendConfig::Gemini { api_key, base_url } => Arc::new(GeminiBackend::with_timeout(
            api_key,
            base_url.clone(),
            timeout_secs,
        )?),
        BackendConfig::OpenAI {
            api_key,
            base_url,
            org_id,
        } => Arc::new(OpenAiBackend::with_timeout(
            api_key,
            base_url.clone(),
            org_id.clone(),
            timeout_secs,
        )?),
    })
}

/// Build every session collaborator from configuration.
pub fn build_collaborators(config: &ReadaptConfig) -> Result<Collaborators> {
    let backend_config = config
        .backends
        .get(&config.default_backend)
        .with_context(|| format!("backend '{}' is not configured", config.default_backend))?;
    let backend = create_backend(backend_config, config.request_timeout_secs)?;
    collaborators_with_backend(config, backend)
}

/// Build collaborators around an existing backend (e.g. a mock).
pub fn collaborators_with_backend(
    config: &ReadaptConfig,
    backend: Arc<dyn LlmBackend>,
) -> Result<Collaborators> {
    let chunker =
        SemanticChunker::with_timeout(config.chunker.clone(), config.request_timeout_secs)?;
    let model = config.model.as_str();

    Ok(Collaborators {
        chunker: Arc::new(chunker),
        rater: Arc::new(LlmDifficultyRater::new(
            Arc::clone(&backend),
            model,
            config.rater.clone(),
        )),
        grader: Arc::new(LlmResponseGrader::new(
            Arc::clone(&backend),
            model,
            config.grader.clone(),
        )),
        rewriter: Arc::new(LlmTextRewriter::new(
            Arc::clone(&backend),
            model,
            config.rewriter.clone(),
        )),
        questions: Arc::new(LlmQuestionGenerator::new(
            backend,
            model,
            config.questions.clone(),
        )),
    })
}
