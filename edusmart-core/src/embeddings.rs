//! Embeddings for product documents and shopper queries
//!
//! Provides an `EmbeddingBackend` trait with implementations for:
//! - **Gemini**: cloud embeddings via the Gemini API (768-dim)
//! - **ONNX**: local embeddings via `all-MiniLM-L6-v2` (384-dim)
//! - **Gemini-fallback-ONNX**: Gemini with graceful degradation to `Ok(None)`
//!
//! Catalog seeding embeds documents with retries; the chat path embeds queries
//! with `query_max_retries` (zero by default, i.e. one attempt).

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::Retry;

/// Default Gemini embedding dimensions
pub const GEMINI_DIMENSIONS: usize = 768;

/// Default ONNX (all-MiniLM-L6-v2) embedding dimensions
pub const ONNX_DIMENSIONS: usize = 384;

pub(crate) const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Gemini reads the key from this header; it never goes in the URL.
pub(crate) const API_KEY_HEADER: &str = "x-goog-api-key";

// ============================================================================
// EmbeddingBackend trait
// ============================================================================

/// Abstraction over embedding providers.
#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    /// Embed a single text. Returns `None` if embedding is unavailable
    /// (used in fallback mode to signal graceful degradation).
    async fn embed(&self, text: &str) -> Result<Option<Vec<f32>>, EmbeddingError>;

    /// Embed a search query. Backends that support task-type hints (e.g. Gemini)
    /// can override this to use `RETRIEVAL_QUERY` instead of `RETRIEVAL_DOCUMENT`.
    /// Defaults to calling `embed()`.
    async fn embed_query(&self, text: &str) -> Result<Option<Vec<f32>>, EmbeddingError> {
        self.embed(text).await
    }

    /// Returns the embedding dimension (e.g., 768 or 384).
    fn dimensions(&self) -> usize;

    /// Backend name for logging.
    fn name(&self) -> &str;
}

// ============================================================================
// Error types
// ============================================================================

/// Task type for embedding API
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskType {
    #[default]
    RetrievalDocument,
    RetrievalQuery,
}

/// Embedding generation errors
#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("Invalid response: expected {expected} dimensions, got {actual}")]
    InvalidDimensions { expected: usize, actual: usize },

    #[error("Missing embedding in response")]
    MissingEmbedding,

    #[error("Missing API key")]
    MissingApiKey,

    #[error("All {attempts} embedding attempts failed")]
    RetryExhausted { attempts: usize },

    #[error("ONNX model not found at {path}; download all-MiniLM-L6-v2 into the edusmart model directory")]
    ModelNotFound { path: String },

    #[error("ONNX inference error: {0}")]
    OnnxInference(String),

    #[error("Tokenizer error: {0}")]
    Tokenizer(String),

    #[error("Unknown embedding backend '{0}' (expected 'gemini', 'onnx' or 'gemini-fallback-onnx')")]
    UnknownBackend(String),
}

// ============================================================================
// Config types
// ============================================================================

/// Gemini embedding client configuration
#[derive(Debug, Clone)]
pub struct GeminiEmbeddingConfig {
    pub api_key: String,
    pub model: String,
    pub dimensions: usize,
    pub max_retries: usize,
    pub retry_delay_ms: u64,
}

impl GeminiEmbeddingConfig {
    pub fn new(api_key: Option<String>, model: String, dimensions: usize, max_retries: usize) -> Self {
        let api_key = api_key.or_else(gemini_api_key).unwrap_or_default();

        Self {
            api_key,
            model,
            dimensions,
            max_retries,
            retry_delay_ms: 1000,
        }
    }
}

/// Read the Gemini key from the environment (`GEMINI_API_KEY`, then `GOOGLE_API_KEY`).
pub fn gemini_api_key() -> Option<String> {
    ["GEMINI_API_KEY", "GOOGLE_API_KEY"]
        .iter()
        .filter_map(|name| std::env::var(name).ok())
        .find(|key| !key.trim().is_empty())
}

/// ONNX backend configuration
#[derive(Debug, Clone)]
pub struct OnnxConfig {
    pub model_path: PathBuf,
    pub tokenizer_path: PathBuf,
    pub dimensions: usize,
}

/// Configuration union for the backend factory.
pub enum BackendConfig {
    Gemini(GeminiEmbeddingConfig),
    Onnx(OnnxConfig),
    GeminiFallbackOnnx(GeminiEmbeddingConfig),
}

/// Create the appropriate backend from configuration.
pub fn create_backend(config: BackendConfig) -> Result<Box<dyn EmbeddingBackend>, EmbeddingError> {
    match config {
        BackendConfig::Gemini(c) => Ok(Box::new(GeminiEmbeddingClient::new(c)?)),
        BackendConfig::Onnx(c) => {
            Ok(Box::new(crate::onnx_embedder::OnnxEmbeddingClient::new(c)?))
        }
        BackendConfig::GeminiFallbackOnnx(c) => Ok(Box::new(FallbackEmbeddingClient::new(c)?)),
    }
}

/// Create a backend from the `[embedding]` section.
///
/// `max_retries` is chosen by the caller: the chat path passes
/// `query_max_retries`, catalog seeding passes `ingest_max_retries`.
pub fn create_backend_from_config(
    settings: &crate::config::EmbeddingConfig,
    max_retries: usize,
) -> Result<Box<dyn EmbeddingBackend>, EmbeddingError> {
    let gemini = || {
        GeminiEmbeddingConfig::new(
            None,
            settings.gemini_model.clone(),
            settings.gemini_dimensions as usize,
            max_retries,
        )
    };

    let backend_cfg = match settings.backend.as_str() {
        "onnx" => {
            let (model_path, tokenizer_path) =
                crate::onnx_embedder::resolve_onnx_paths(&settings.onnx_model_path);
            BackendConfig::Onnx(OnnxConfig {
                model_path,
                tokenizer_path,
                dimensions: settings.onnx_dimensions as usize,
            })
        }
        "gemini-fallback-onnx" => BackendConfig::GeminiFallbackOnnx(gemini()),
        "gemini" => BackendConfig::Gemini(gemini()),
        other => return Err(EmbeddingError::UnknownBackend(other.to_string())),
    };

    create_backend(backend_cfg)
}

// ============================================================================
// Gemini API structs (private)
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    model: String,
    content: GeminiContent,
    #[serde(skip_serializing_if = "Option::is_none")]
    task_type: Option<TaskType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    output_dimensionality: Option<usize>,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
struct GeminiPart {
    text: String,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    embedding: Option<GeminiEmbedding>,
}

#[derive(Debug, Deserialize)]
struct GeminiEmbedding {
    values: Vec<f32>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GeminiErrorResponse {
    pub(crate) error: Option<GeminiErrorDetail>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GeminiErrorDetail {
    pub(crate) code: u16,
    pub(crate) message: String,
}

// ============================================================================
// GeminiEmbeddingClient
// ============================================================================

/// Gemini embedding client for the Gemini Embeddings API.
#[derive(Debug, Clone)]
pub struct GeminiEmbeddingClient {
    client: Client,
    config: GeminiEmbeddingConfig,
    base_url: String,
}

impl GeminiEmbeddingClient {
    pub fn new(config: GeminiEmbeddingConfig) -> Result<Self, EmbeddingError> {
        Self::with_base_url(config, GEMINI_BASE_URL.to_string())
    }

    /// Create a client with a custom base URL (for testing / integration)
    pub fn with_base_url(
        config: GeminiEmbeddingConfig,
        base_url: String,
    ) -> Result<Self, EmbeddingError> {
        if config.api_key.is_empty() {
            return Err(EmbeddingError::MissingApiKey);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            config,
            base_url,
        })
    }

    /// Generate an embedding for the given text (direct call, returns raw Vec)
    pub async fn embed_raw(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.embed_with_task(text, TaskType::RetrievalDocument).await
    }

    /// Generate an embedding with a specific task type
    pub async fn embed_with_task(
        &self,
        text: &str,
        task_type: TaskType,
    ) -> Result<Vec<f32>, EmbeddingError> {
        let retry_strategy = ExponentialBackoff::from_millis(self.config.retry_delay_ms)
            .max_delay(Duration::from_secs(10))
            .map(jitter)
            .take(self.config.max_retries);

        let result = Retry::spawn(retry_strategy, || self.embed_once(text, task_type)).await;

        let attempts = self.config.max_retries + 1;
        match result {
            Ok(vec) => Ok(vec),
            Err(e) if attempts == 1 => Err(e),
            Err(e) => {
                tracing::error!(
                    attempts,
                    error = %e,
                    "All embedding attempts failed"
                );
                Err(EmbeddingError::RetryExhausted { attempts })
            }
        }
    }

    async fn embed_once(
        &self,
        text: &str,
        task_type: TaskType,
    ) -> Result<Vec<f32>, EmbeddingError> {
        let url = format!("{}/models/{}:embedContent", self.base_url, self.config.model);

        let request = GeminiRequest {
            model: format!("models/{}", self.config.model),
            content: GeminiContent {
                parts: vec![GeminiPart {
                    text: text.to_string(),
                }],
            },
            task_type: Some(task_type),
            output_dimensionality: Some(self.config.dimensions),
        };

        let response = self
            .client
            .post(&url)
            .header(API_KEY_HEADER, &self.config.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            let (code, message) = parse_gemini_error(status.as_u16(), error_body);

            tracing::error!(code = code, message = %message, "Gemini embedding API error");

            return Err(EmbeddingError::Api { code, message });
        }

        let gemini_response: GeminiResponse = response.json().await?;

        let values = gemini_response
            .embedding
            .ok_or(EmbeddingError::MissingEmbedding)?
            .values;

        if values.len() != self.config.dimensions {
            return Err(EmbeddingError::InvalidDimensions {
                expected: self.config.dimensions,
                actual: values.len(),
            });
        }

        Ok(values)
    }
}

/// Pull `(code, message)` out of a Gemini error body, falling back to the HTTP status.
pub(crate) fn parse_gemini_error(status: u16, body: String) -> (u16, String) {
    serde_json::from_str::<GeminiErrorResponse>(&body)
        .ok()
        .and_then(|e| e.error)
        .map(|e| (e.code, e.message))
        .unwrap_or((status, body))
}

#[async_trait]
impl EmbeddingBackend for GeminiEmbeddingClient {
    async fn embed(&self, text: &str) -> Result<Option<Vec<f32>>, EmbeddingError> {
        self.embed_raw(text).await.map(Some)
    }

    async fn embed_query(&self, text: &str) -> Result<Option<Vec<f32>>, EmbeddingError> {
        self.embed_with_task(text, TaskType::RetrievalQuery)
            .await
            .map(Some)
    }

    fn dimensions(&self) -> usize {
        self.config.dimensions
    }

    fn name(&self) -> &str {
        "gemini"
    }
}

// ============================================================================
// FallbackEmbeddingClient
// ============================================================================

/// Wraps `GeminiEmbeddingClient`. On any error, logs a warning and returns
/// `Ok(None)`: seeded products are stored without a vector, and queries are
/// answered from the fallback catalog.
pub struct FallbackEmbeddingClient {
    inner: GeminiEmbeddingClient,
}

impl FallbackEmbeddingClient {
    pub fn new(config: GeminiEmbeddingConfig) -> Result<Self, EmbeddingError> {
        Ok(Self {
            inner: GeminiEmbeddingClient::new(config)?,
        })
    }

    pub fn with_base_url(
        config: GeminiEmbeddingConfig,
        base_url: String,
    ) -> Result<Self, EmbeddingError> {
        Ok(Self {
            inner: GeminiEmbeddingClient::with_base_url(config, base_url)?,
        })
    }
}

#[async_trait]
impl EmbeddingBackend for FallbackEmbeddingClient {
    async fn embed(&self, text: &str) -> Result<Option<Vec<f32>>, EmbeddingError> {
        match self.inner.embed_raw(text).await {
            Ok(v) => Ok(Some(v)),
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    "Gemini embedding failed, product stored without embedding"
                );
                Ok(None)
            }
        }
    }

    async fn embed_query(&self, text: &str) -> Result<Option<Vec<f32>>, EmbeddingError> {
        match self.inner.embed_with_task(text, TaskType::RetrievalQuery).await {
            Ok(v) => Ok(Some(v)),
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    "Gemini query embedding failed, vector search skipped"
                );
                Ok(None)
            }
        }
    }

    fn dimensions(&self) -> usize {
        self.inner.config.dimensions
    }

    fn name(&self) -> &str {
        "gemini-fallback-onnx"
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(api_key: &str) -> GeminiEmbeddingConfig {
        GeminiEmbeddingConfig {
            api_key: api_key.to_string(),
            model: "gemini-embedding-001".to_string(),
            dimensions: GEMINI_DIMENSIONS,
            max_retries: 2,
            retry_delay_ms: 10,
        }
    }

    fn mock_embedding_response() -> serde_json::Value {
        let values: Vec<f32> = (0..768).map(|i| (i as f32) / 768.0).collect();
        serde_json::json!({
            "embedding": {
                "values": values
            }
        })
    }

    #[tokio::test]
    async fn test_query_embedding_uses_retrieval_query_task() {
        let mock_server = MockServer::start().await;
        let client = GeminiEmbeddingClient::with_base_url(test_config("test-api-key"), mock_server.uri())
            .expect("Failed to create client");

        Mock::given(method("POST"))
            .and(path("/models/gemini-embedding-001:embedContent"))
            .and(header("content-type", "application/json"))
            .and(header("x-goog-api-key", "test-api-key"))
            .and(body_json(serde_json::json!({
                "model": "models/gemini-embedding-001",
                "content": { "parts": [{ "text": "robotics kit for teens" }] },
                "taskType": "RETRIEVAL_QUERY",
                "outputDimensionality": 768
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(mock_embedding_response()))
            .mount(&mock_server)
            .await;

        let embedding = client
            .embed_query("robotics kit for teens")
            .await
            .expect("query embedding should succeed")
            .expect("gemini always returns Some");
        assert_eq!(embedding.len(), 768);
    }

    #[tokio::test]
    async fn test_document_embedding_uses_retrieval_document_task() {
        let mock_server = MockServer::start().await;
        let client = GeminiEmbeddingClient::with_base_url(test_config("test-api-key"), mock_server.uri())
            .unwrap();

        Mock::given(method("POST"))
            .and(body_json(serde_json::json!({
                "model": "models/gemini-embedding-001",
                "content": { "parts": [{ "text": "Product: Abacus" }] },
                "taskType": "RETRIEVAL_DOCUMENT",
                "outputDimensionality": 768
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(mock_embedding_response()))
            .mount(&mock_server)
            .await;

        let result = client.embed_raw("Product: Abacus").await;
        assert!(result.is_ok(), "Expected Ok, got Err: {:?}", result.err());
    }

    #[tokio::test]
    async fn test_embed_returns_retry_exhausted_on_api_500() {
        let mock_server = MockServer::start().await;
        let client = GeminiEmbeddingClient::with_base_url(test_config("test-api-key"), mock_server.uri())
            .unwrap();

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_json(serde_json::json!({
                "error": { "code": 500, "message": "Internal server error" }
            })))
            .expect(3)
            .mount(&mock_server)
            .await;

        match client.embed_raw("hello world").await {
            Err(EmbeddingError::RetryExhausted { attempts }) => assert_eq!(attempts, 3),
            other => panic!("Expected RetryExhausted, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_zero_retries_makes_a_single_attempt() {
        let mock_server = MockServer::start().await;
        let mut config = test_config("test-api-key");
        config.max_retries = 0;
        let client = GeminiEmbeddingClient::with_base_url(config, mock_server.uri()).unwrap();

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_json(serde_json::json!({
                "error": { "code": 503, "message": "unavailable" }
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        match client.embed_query("anything").await {
            Err(EmbeddingError::Api { code, message }) => {
                assert_eq!(code, 503);
                assert_eq!(message, "unavailable");
            }
            other => panic!("Expected Api error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_embed_retries_on_429_then_succeeds() {
        let mock_server = MockServer::start().await;
        let client = GeminiEmbeddingClient::with_base_url(test_config("test-api-key"), mock_server.uri())
            .unwrap();

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_json(serde_json::json!({
                "error": { "code": 429, "message": "Rate limit exceeded" }
            })))
            .up_to_n_times(1)
            .mount(&mock_server)
            .await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(mock_embedding_response()))
            .mount(&mock_server)
            .await;

        let embedding = client.embed_raw("hello world").await.expect("success after retry");
        assert_eq!(embedding.len(), 768);
    }

    #[test]
    fn test_missing_api_key_is_rejected() {
        match GeminiEmbeddingClient::new(test_config("")) {
            Err(EmbeddingError::MissingApiKey) => {}
            other => panic!("Expected MissingApiKey error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_wrong_dimensions_are_rejected() {
        let mock_server = MockServer::start().await;
        let mut config = test_config("test-api-key");
        config.max_retries = 0;
        let client = GeminiEmbeddingClient::with_base_url(config, mock_server.uri()).unwrap();

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "embedding": { "values": [0.1, 0.2, 0.3] }
            })))
            .mount(&mock_server)
            .await;

        match client.embed_raw("hello world").await {
            Err(EmbeddingError::InvalidDimensions { expected, actual }) => {
                assert_eq!(expected, 768);
                assert_eq!(actual, 3);
            }
            other => panic!("Expected InvalidDimensions, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_fallback_returns_none_on_gemini_error() {
        let mock_server = MockServer::start().await;
        let mut config = test_config("test-key");
        config.max_retries = 0;
        let fallback = FallbackEmbeddingClient::with_base_url(config, mock_server.uri()).unwrap();

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_json(serde_json::json!({
                "error": { "code": 500, "message": "boom" }
            })))
            .mount(&mock_server)
            .await;

        let result = fallback.embed_query("hello").await;
        assert!(result.is_ok(), "Fallback should not propagate errors");
        assert!(result.unwrap().is_none(), "Fallback should return None on error");
        assert_eq!(fallback.name(), "gemini-fallback-onnx");
        assert_eq!(fallback.dimensions(), GEMINI_DIMENSIONS);
    }

    #[test]
    fn test_factory_onnx_without_model_reports_missing_file() {
        let settings = crate::config::EmbeddingConfig {
            backend: "onnx".to_string(),
            onnx_model_path: "/nonexistent/edusmart/minilm.onnx".to_string(),
            ..Default::default()
        };

        match create_backend_from_config(&settings, 0) {
            Err(EmbeddingError::ModelNotFound { path }) => assert!(path.contains("nonexistent")),
            Err(other) => panic!("Expected ModelNotFound, got {other:?}"),
            Ok(_) => panic!("Expected ModelNotFound, got a backend"),
        }
    }

    #[tokio::test]
    async fn test_transport_error_does_not_carry_the_key() {
        let mut config = test_config("SECRET-KEY-123");
        config.max_retries = 0;
        let client = GeminiEmbeddingClient::with_base_url(config, "http://127.0.0.1:9".to_string())
            .unwrap();

        let err = client.embed_query("hello").await.unwrap_err();
        assert!(matches!(err, EmbeddingError::Http(_)));
        assert!(!err.to_string().contains("SECRET-KEY-123"), "key leaked: {err}");
    }

    #[test]
    fn test_factory_rejects_unknown_backend() {
        let settings = crate::config::EmbeddingConfig {
            backend: "onxx".to_string(),
            ..Default::default()
        };

        match create_backend_from_config(&settings, 0) {
            Err(EmbeddingError::UnknownBackend(name)) => assert_eq!(name, "onxx"),
            Err(other) => panic!("Expected UnknownBackend, got {other:?}"),
            Ok(_) => panic!("Expected UnknownBackend, got a backend"),
        }
    }
}
