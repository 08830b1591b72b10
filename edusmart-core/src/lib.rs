pub mod config;
pub mod db;
pub mod embeddings;
pub mod error;
pub mod generation;
pub mod locale;
pub mod models;
pub mod onnx_embedder;
pub mod outcome;
pub mod speech;

pub use config::EduSmartConfig;
pub use embeddings::{
    create_backend, create_backend_from_config, BackendConfig, EmbeddingBackend, EmbeddingError,
    FallbackEmbeddingClient, GeminiEmbeddingClient, GeminiEmbeddingConfig, OnnxConfig,
    GEMINI_DIMENSIONS, ONNX_DIMENSIONS,
};
pub use error::EduSmartError;
pub use generation::{create_model, GenerationError, LanguageModel, ModelClient};
pub use models::{ChatReply, ChatRequest, ConversationTurn, Language, NewTurn, ProductRecord, ResponseType};
pub use onnx_embedder::OnnxEmbeddingClient;
pub use outcome::{DegradedReason, Outcome};
pub use speech::{SpeechError, SpeechSynthesizer, TranslateTtsClient};
