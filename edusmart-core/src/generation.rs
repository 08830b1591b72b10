//! Generative model clients
//!
//! `LanguageModel` is the capability the assistant talks to. Two Gemini-backed
//! implementations differ in how they frame the prompt:
//! - **chat**: one user turn: `User question: …` followed by the context block
//! - **direct**: the context block first, then `Current user question: …` and a
//!   `Response:` cue
//!
//! Which one runs is a configuration choice (`[generation] client`). Calls are
//! made once; there is no retry on this path.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::config::GenerationConfig;
use crate::embeddings::{parse_gemini_error, API_KEY_HEADER, GEMINI_BASE_URL};

#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Answer `user_message` given the rendered system `prompt`.
    async fn generate(&self, prompt: &str, user_message: &str) -> Result<String, GenerationError>;

    /// Client name for logs and diagnostics.
    fn name(&self) -> &str;
}

#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("Prompt blocked: {0}")]
    Blocked(String),

    #[error("Model returned no text")]
    EmptyResponse,

    #[error("Unknown generation client '{0}' (expected 'chat' or 'direct')")]
    UnknownClient(String),
}

/// Which prompt framing to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelClient {
    Chat,
    Direct,
}

impl std::str::FromStr for ModelClient {
    type Err = GenerationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "chat" => Ok(ModelClient::Chat),
            "direct" => Ok(ModelClient::Direct),
            other => Err(GenerationError::UnknownClient(other.to_string())),
        }
    }
}

/// Build the configured model. `Ok(None)` means no API key, i.e. demo mode.
pub fn create_model(
    config: &GenerationConfig,
    api_key: Option<String>,
) -> Result<Option<Box<dyn LanguageModel>>, GenerationError> {
    create_model_with_base_url(config, api_key, GEMINI_BASE_URL.to_string())
}

pub fn create_model_with_base_url(
    config: &GenerationConfig,
    api_key: Option<String>,
    base_url: String,
) -> Result<Option<Box<dyn LanguageModel>>, GenerationError> {
    let client: ModelClient = config.client.parse()?;

    let Some(api_key) = api_key.filter(|k| !k.trim().is_empty()) else {
        return Ok(None);
    };

    let model: Box<dyn LanguageModel> = match client {
        ModelClient::Chat => Box::new(GeminiChatModel {
            transport: GeminiTransport::new(
                api_key,
                config.chat_model.clone(),
                Some(config.temperature),
                base_url,
            )?,
        }),
        ModelClient::Direct => Box::new(GeminiDirectModel {
            transport: GeminiTransport::new(api_key, config.direct_model.clone(), None, base_url)?,
        }),
    };

    tracing::info!(client = model.name(), "Generative model configured");
    Ok(Some(model))
}

// ============================================================================
// Gemini generateContent wire types (private)
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationParams>,
}

#[derive(Debug, Serialize)]
struct GenerationParams {
    temperature: f32,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

// ============================================================================
// Shared transport
// ============================================================================

#[derive(Debug, Clone)]
struct GeminiTransport {
    client: Client,
    api_key: String,
    model: String,
    temperature: Option<f32>,
    base_url: String,
}

impl GeminiTransport {
    fn new(
        api_key: String,
        model: String,
        temperature: Option<f32>,
        base_url: String,
    ) -> Result<Self, GenerationError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            api_key,
            model,
            temperature,
            base_url,
        })
    }

    /// Send one user turn and return the concatenated candidate text.
    async fn send_user_turn(&self, text: String) -> Result<String, GenerationError> {
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);

        let request = GenerateRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part { text: Some(text) }],
            }],
            generation_config: self
                .temperature
                .map(|temperature| GenerationParams { temperature }),
        };

        let response = self
            .client
            .post(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .json(&request)
            .send()
            .await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let (code, message) = parse_gemini_error(status.as_u16(), body);
            tracing::error!(code, message = %message, model = %self.model, "Gemini generation API error");
            return Err(GenerationError::Api { code, message });
        }

        let body: GenerateResponse = response.json().await?;

        if let Some(reason) = body.prompt_feedback.and_then(|f| f.block_reason) {
            return Err(GenerationError::Blocked(reason));
        }

        let text: String = body
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(GenerationError::EmptyResponse);
        }
        Ok(text)
    }
}

// ============================================================================
// Implementations
// ============================================================================

/// Conversational framing: the question leads, the context follows.
pub struct GeminiChatModel {
    transport: GeminiTransport,
}

impl GeminiChatModel {
    pub fn chat_message(prompt: &str, user_message: &str) -> String {
        format!("User question: {user_message}\n\nContext: {prompt}")
    }
}

#[async_trait]
impl LanguageModel for GeminiChatModel {
    async fn generate(&self, prompt: &str, user_message: &str) -> Result<String, GenerationError> {
        self.transport
            .send_user_turn(Self::chat_message(prompt, user_message))
            .await
    }

    fn name(&self) -> &str {
        "gemini-chat"
    }
}

/// Completion framing: context first, then the question and a response cue.
pub struct GeminiDirectModel {
    transport: GeminiTransport,
}

impl GeminiDirectModel {
    pub fn completion_prompt(prompt: &str, user_message: &str) -> String {
        format!("{prompt}\n\nCurrent user question: {user_message}\n\nResponse:")
    }
}

#[async_trait]
impl LanguageModel for GeminiDirectModel {
    async fn generate(&self, prompt: &str, user_message: &str) -> Result<String, GenerationError> {
        self.transport
            .send_user_turn(Self::completion_prompt(prompt, user_message))
            .await
    }

    fn name(&self) -> &str {
        "gemini-direct"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn reply(text: &str) -> serde_json::Value {
        serde_json::json!({
            "candidates": [{
                "content": { "role": "model", "parts": [{ "text": text }] }
            }]
        })
    }

    fn config(client: &str) -> GenerationConfig {
        GenerationConfig {
            client: client.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn no_api_key_means_no_model() {
        let model = create_model(&config("chat"), None).unwrap();
        assert!(model.is_none());
        let model = create_model(&config("direct"), Some("  ".to_string())).unwrap();
        assert!(model.is_none());
    }

    #[test]
    fn unknown_client_is_a_config_error() {
        match create_model(&config("langchain"), Some("k".to_string())) {
            Err(GenerationError::UnknownClient(name)) => assert_eq!(name, "langchain"),
            Err(other) => panic!("Expected UnknownClient, got {other:?}"),
            Ok(_) => panic!("Expected UnknownClient, got a model"),
        }
    }

    #[tokio::test]
    async fn chat_client_sends_question_then_context() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/gemini-2.5-flash:generateContent"))
            .and(header("x-goog-api-key", "test-key"))
            .and(body_json(serde_json::json!({
                "contents": [{
                    "role": "user",
                    "parts": [{ "text": "User question: Any microscopes?\n\nContext: PROMPT" }]
                }],
                "generationConfig": { "temperature": 0.7 }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(reply("Yes, the Digital Microscope Pro.")))
            .expect(1)
            .mount(&server)
            .await;

        let model = create_model_with_base_url(&config("chat"), Some("test-key".to_string()), server.uri())
            .unwrap()
            .expect("key present");

        assert_eq!(model.name(), "gemini-chat");
        let text = model.generate("PROMPT", "Any microscopes?").await.unwrap();
        assert_eq!(text, "Yes, the Digital Microscope Pro.");
    }

    #[tokio::test]
    async fn direct_client_sends_context_then_question() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/gemini-pro:generateContent"))
            .and(body_json(serde_json::json!({
                "contents": [{
                    "role": "user",
                    "parts": [{ "text": "PROMPT\n\nCurrent user question: hi\n\nResponse:" }]
                }]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(reply("Hello!")))
            .expect(1)
            .mount(&server)
            .await;

        let model = create_model_with_base_url(&config("direct"), Some("k".to_string()), server.uri())
            .unwrap()
            .unwrap();

        assert_eq!(model.name(), "gemini-direct");
        assert_eq!(model.generate("PROMPT", "hi").await.unwrap(), "Hello!");
    }

    #[tokio::test]
    async fn api_error_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_json(serde_json::json!({
                "error": { "code": 500, "message": "backend exploded" }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let model = create_model_with_base_url(&config("chat"), Some("k".to_string()), server.uri())
            .unwrap()
            .unwrap();

        match model.generate("p", "q").await {
            Err(GenerationError::Api { code, message }) => {
                assert_eq!(code, 500);
                assert_eq!(message, "backend exploded");
            }
            other => panic!("Expected Api error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn blocked_prompt_and_empty_candidates_are_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "promptFeedback": { "blockReason": "SAFETY" }
            })))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "candidates": []
            })))
            .mount(&server)
            .await;

        let model = create_model_with_base_url(&config("chat"), Some("k".to_string()), server.uri())
            .unwrap()
            .unwrap();

        assert!(matches!(
            model.generate("p", "q").await,
            Err(GenerationError::Blocked(reason)) if reason == "SAFETY"
        ));
        assert!(matches!(
            model.generate("p", "q").await,
            Err(GenerationError::EmptyResponse)
        ));
    }

    #[tokio::test]
    async fn transport_error_does_not_carry_the_key() {
        // nothing listens on the discard port
        let model = create_model_with_base_url(
            &config("chat"),
            Some("SECRET-KEY-123".to_string()),
            "http://127.0.0.1:9".to_string(),
        )
        .unwrap()
        .unwrap();

        let err = model.generate("p", "q").await.unwrap_err();
        assert!(matches!(err, GenerationError::Http(_)));
        assert!(!err.to_string().contains("SECRET-KEY-123"), "key leaked: {err}");
    }
}
