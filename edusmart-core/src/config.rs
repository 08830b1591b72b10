use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct EduSmartConfig {
    #[serde(default)]
    pub service: ServiceConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub speech: SpeechConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub http: HttpConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServiceConfig {
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub backend: String,
    pub gemini_model: String,
    pub gemini_dimensions: u32,
    pub onnx_model_path: String,
    pub onnx_dimensions: u32,
    /// Retries for query embeddings on the request path (0 = single attempt).
    pub query_max_retries: usize,
    /// Retries for document embeddings while seeding the catalog.
    pub ingest_max_retries: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            backend: "gemini".to_string(),
            gemini_model: "gemini-embedding-001".to_string(),
            gemini_dimensions: 768,
            onnx_model_path: String::new(),
            onnx_dimensions: 384,
            query_max_retries: 0,
            ingest_max_retries: 3,
        }
    }
}

/// Accepted values of `[embedding] backend`.
pub const EMBEDDING_BACKENDS: [&str; 3] = ["gemini", "onnx", "gemini-fallback-onnx"];

impl EmbeddingConfig {
    /// Vector width of the configured backend; sizes the `embedding` column.
    pub fn dimensions(&self) -> u32 {
        match self.backend.as_str() {
            "onnx" => self.onnx_dimensions,
            _ => self.gemini_dimensions,
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if EMBEDDING_BACKENDS.contains(&self.backend.as_str()) {
            return Ok(());
        }
        Err(ConfigError::Message(format!(
            "unknown embedding backend '{}' (expected one of: {})",
            self.backend,
            EMBEDDING_BACKENDS.join(", ")
        )))
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct GenerationConfig {
    /// `chat` or `direct`
    pub client: String,
    pub chat_model: String,
    pub direct_model: String,
    pub temperature: f32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            client: "chat".to_string(),
            chat_model: "gemini-2.5-flash".to_string(),
            direct_model: "gemini-pro".to_string(),
            temperature: 0.7,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SpeechConfig {
    pub enabled: bool,
    pub base_url: String,
    pub max_chunk_chars: usize,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "https://translate.google.com".to_string(),
            max_chunk_chars: 200,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RetrievalConfig {
    pub top_k: u32,
    pub history_limit: u32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            history_limit: 5,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
    pub cors_permissive: bool,
    pub cors_origins: Vec<String>,
    pub frontend_dir: Option<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            cors_permissive: true,
            cors_origins: Vec::new(),
            frontend_dir: Some("../frontend".to_string()),
        }
    }
}

impl EduSmartConfig {
    /// Load the TOML file at `path`, then apply `EDUSMART__SECTION__KEY` overrides.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::with_name(path))
            .add_source(Environment::with_prefix("EDUSMART").separator("__"))
            .build()?;
        let config: Self = s.try_deserialize()?;
        config.embedding.validate()?;
        Ok(config)
    }

    /// Parse a TOML document directly; used by tests and tooling.
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        let config: Self = Config::builder()
            .add_source(File::from_str(toml, config::FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        config.embedding.validate()?;
        Ok(config)
    }
}
