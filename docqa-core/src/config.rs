use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Prompt used when asking the language model, with `{context}` and
/// `{question}` placeholders.
pub const DEFAULT_PROMPT_TEMPLATE: &str =
    "Answer the question as based only on the following context: {context}\nQuestion: {question}\n";

/// Configuration for the whole question-answering pipeline.
///
/// Every section falls back to its defaults when missing from the YAML file,
/// so a config that only overrides `llm.model` is valid.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub rag: RagConfig,
}

/// Which backend answers questions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmBackend {
    Ollama,
    Gemini,
}

/// Configuration for the answering model
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: LlmBackend,
    pub model: String,
    pub base_url: String,
    pub temperature: f64,
    /// Gemini API key. Falls back to the `GOOGLE_API_KEY` environment variable.
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmBackend::Ollama,
            model: "llama3.2".to_string(),
            base_url: "http://localhost:11434".to_string(),
            temperature: 0.0,
            api_key: None,
            timeout_secs: 120,
        }
    }
}

/// Which backend turns text into vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    Ollama,
    /// Local character n-gram hashing, no network required.
    Hashing,
}

/// Configuration for the embedding model
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: EmbeddingBackend,
    pub model: String,
    pub base_url: String,
    /// Whether the backend returns unit-length vectors.
    pub normalized: bool,
    /// Output dimension of the hashing backend.
    pub dimension: usize,
    /// Texts sent per embedding request.
    pub batch_size: usize,
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingBackend::Ollama,
            model: "nomic-embed-text".to_string(),
            base_url: "http://localhost:11434".to_string(),
            normalized: true,
            dimension: 384,
            batch_size: 32,
            timeout_secs: 120,
        }
    }
}

/// Configuration for chunking, retrieval and prompting.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    /// Window size in characters
    pub chunk_size: usize,
    /// Characters shared by adjacent chunks
    pub chunk_overlap: usize,
    pub prompt_template: String,
    pub retrieval: RetrievalConfig,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            chunk_overlap: 50,
            prompt_template: DEFAULT_PROMPT_TEMPLATE.to_string(),
            retrieval: RetrievalConfig::default(),
        }
    }
}

/// How the retriever picks segments from the candidate pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchType {
    /// Maximal marginal relevance
    Mmr,
    /// Plain top-k by relevance
    Similarity,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub search_type: SearchType,
    /// Segments handed to the language model
    pub k: usize,
    /// Candidates considered before MMR selection
    pub fetch_k: usize,
    /// 1.0 = pure relevance, 0.0 = pure diversity
    pub lambda: f32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            search_type: SearchType::Mmr,
            k: 3,
            fetch_k: 10,
            lambda: 0.5,
        }
    }
}

impl RetrievalConfig {
    pub fn validate(&self) -> Result<()> {
        if self.k == 0 {
            return Err(ConfigError::Invalid("k must be at least 1".to_string()));
        }
        if self.k > self.fetch_k {
            return Err(ConfigError::Invalid(format!(
                "k ({}) must not exceed fetch_k ({})",
                self.k, self.fetch_k
            )));
        }
        if !(0.0..=1.0).contains(&self.lambda) {
            return Err(ConfigError::Invalid(format!(
                "lambda must be within [0, 1], got {}",
                self.lambda
            )));
        }
        Ok(())
    }
}

impl RagConfig {
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(ConfigError::Invalid("chunk_size must be positive".to_string()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(ConfigError::Invalid(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if !self.prompt_template.contains("{context}") || !self.prompt_template.contains("{question}") {
            return Err(ConfigError::Invalid(
                "prompt_template must contain {context} and {question}".to_string(),
            ));
        }
        self.retrieval.validate()
    }
}

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from `path`, or defaults if the file does not exist.
    ///
    /// A file that exists but cannot be read, parsed or validated is an error.
    pub fn load_if_exists<P: AsRef<Path>>(path: P) -> Result<Self> {
        match Self::load(path) {
            Err(ConfigError::FileRead(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                Ok(Self::default())
            }
            other => other,
        }
    }

    /// Load configuration from `config.yaml` if it exists, otherwise use defaults.
    pub fn load_or_default() -> Result<Self> {
        Self::load_if_exists("config.yaml")
    }

    pub fn validate(&self) -> Result<()> {
        if self.embedding.batch_size == 0 {
            return Err(ConfigError::Invalid("embedding.batch_size must be positive".to_string()));
        }
        if self.embedding.provider == EmbeddingBackend::Hashing && self.embedding.dimension == 0 {
            return Err(ConfigError::Invalid("embedding.dimension must be positive".to_string()));
        }
        self.rag.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rag_config_defaults() {
        let config = RagConfig::default();
        assert_eq!(config.chunk_size, 500);
        assert_eq!(config.chunk_overlap, 50);
        assert_eq!(config.retrieval.search_type, SearchType::Mmr);
        assert_eq!(config.retrieval.k, 3);
        assert_eq!(config.retrieval.fetch_k, 10);
        assert!((config.retrieval.lambda - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_falls_back_to_defaults() {
        let yaml = "llm:\n  provider: gemini\n  model: gemini-pro\nrag:\n  retrieval:\n    k: 4\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.llm.provider, LlmBackend::Gemini);
        assert_eq!(config.llm.model, "gemini-pro");
        assert_eq!(config.llm.base_url, "http://localhost:11434");
        assert_eq!(config.rag.chunk_size, 500);
        assert_eq!(config.rag.retrieval.k, 4);
        assert_eq!(config.rag.retrieval.fetch_k, 10);
        assert_eq!(config.embedding.provider, EmbeddingBackend::Ollama);
    }

    #[test]
    fn test_overlap_must_be_smaller_than_size() {
        let config = RagConfig {
            chunk_size: 100,
            chunk_overlap: 100,
            ..RagConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_retrieval_validation() {
        let too_many = RetrievalConfig { k: 11, ..RetrievalConfig::default() };
        assert!(too_many.validate().is_err());

        let zero = RetrievalConfig { k: 0, ..RetrievalConfig::default() };
        assert!(zero.validate().is_err());

        let bad_lambda = RetrievalConfig { lambda: 1.5, ..RetrievalConfig::default() };
        assert!(bad_lambda.validate().is_err());

        let degenerate = RetrievalConfig { k: 3, fetch_k: 3, ..RetrievalConfig::default() };
        assert!(degenerate.validate().is_ok());
    }

    #[test]
    fn test_template_needs_placeholders() {
        let config = RagConfig {
            prompt_template: "Answer: {question}".to_string(),
            ..RagConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "embedding:\n  provider: hashing\n  dimension: 64\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.embedding.provider, EmbeddingBackend::Hashing);
        assert_eq!(config.embedding.dimension, 64);
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "rag:\n  chunk_size: 10\n  chunk_overlap: 20\n").unwrap();

        assert!(matches!(Config::load(&path), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_missing_file_means_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_if_exists(dir.path().join("absent.yaml")).unwrap();
        assert_eq!(config.rag.chunk_size, 500);
    }

    #[test]
    fn test_broken_file_is_not_replaced_by_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");

        std::fs::write(&path, "rag: [not, a, mapping").unwrap();
        assert!(matches!(Config::load_if_exists(&path), Err(ConfigError::Parse(_))));

        std::fs::write(&path, "rag:\n  retrieval:\n    k: 0\n").unwrap();
        assert!(matches!(Config::load_if_exists(&path), Err(ConfigError::Invalid(_))));
    }
}
