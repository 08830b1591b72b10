//! Reply generation
//!
//! Three branches, picked per request:
//! - **demo** when no model is configured: fixed text, nothing read or stored
//! - **model**: history + product search → prompt → model → store the turn
//! - **apology** when the model call fails: fixed text, nothing stored
//!
//! Audio is attached on every branch when the caller asked for it.

use std::sync::Arc;

use chrono::Utc;
use edusmart_core::config::RetrievalConfig;
use edusmart_core::locale::{apology_message, demo_message};
use edusmart_core::{DegradedReason, Language, LanguageModel, Outcome, ResponseType};

use crate::subsystems::catalog::ProductSearch;
use crate::subsystems::context::{conversation_context, product_context, system_prompt};
use crate::subsystems::transcript::Transcript;
use crate::subsystems::voice::Voice;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssistantSettings {
    pub top_k: u32,
    pub history_limit: u32,
}

impl Default for AssistantSettings {
    fn default() -> Self {
        Self {
            top_k: 5,
            history_limit: 5,
        }
    }
}

impl From<&RetrievalConfig> for AssistantSettings {
    fn from(config: &RetrievalConfig) -> Self {
        Self {
            top_k: config.top_k,
            history_limit: config.history_limit,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedReply {
    pub text: String,
    /// Base64 MP3, when requested and synthesis worked.
    pub audio_data: Option<String>,
    pub response_type: ResponseType,
    /// Why audio is missing, if it was requested and is.
    pub speech: Option<DegradedReason>,
}

pub struct Assistant {
    transcript: Transcript,
    products: ProductSearch,
    voice: Voice,
    model: Option<Arc<dyn LanguageModel>>,
    settings: AssistantSettings,
}

impl Assistant {
    pub fn new(
        transcript: Transcript,
        products: ProductSearch,
        voice: Voice,
        model: Option<Arc<dyn LanguageModel>>,
        settings: AssistantSettings,
    ) -> Self {
        Self {
            transcript,
            products,
            voice,
            model,
            settings,
        }
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn products(&self) -> &ProductSearch {
        &self.products
    }

    pub fn model_name(&self) -> Option<&str> {
        self.model.as_deref().map(|m| m.name())
    }

    pub async fn generate_response(
        &self,
        user_message: &str,
        user_id: &str,
        session_id: &str,
        response_type: ResponseType,
        language: Language,
    ) -> Outcome<GeneratedReply> {
        let Some(model) = &self.model else {
            let reply = self
                .fixed_reply(demo_message(language), response_type, language)
                .await;
            return Outcome::degraded(reply, DegradedReason::ModelNotConfigured);
        };

        let history = self
            .transcript
            .recent(user_id, session_id, self.settings.history_limit)
            .await;
        let products = self.products.search(user_message, self.settings.top_k).await;
        if let Some(reason) = products.reason() {
            tracing::debug!(%reason, "Using fallback products for context");
        }

        let prompt = system_prompt(
            language,
            &product_context(products.value(), language),
            &conversation_context(history.value()),
        );

        let text = match model.generate(&prompt, user_message).await {
            Ok(text) => text,
            Err(e) => {
                tracing::error!(error = %e, model = model.name(), user_id, session_id, "Error generating response");
                let reply = self
                    .fixed_reply(apology_message(language), response_type, language)
                    .await;
                return Outcome::degraded(reply, DegradedReason::ModelFailed(e.to_string()));
            }
        };

        self.transcript
            .append(user_id, session_id, user_message, &text, Utc::now())
            .await;

        let (audio_data, speech) = self.audio_for(&text, response_type, language).await;
        Outcome::ok(GeneratedReply {
            text,
            audio_data,
            response_type,
            speech,
        })
    }

    async fn fixed_reply(
        &self,
        text: &str,
        response_type: ResponseType,
        language: Language,
    ) -> GeneratedReply {
        let (audio_data, speech) = self.audio_for(text, response_type, language).await;
        GeneratedReply {
            text: text.to_string(),
            audio_data,
            response_type,
            speech,
        }
    }

    async fn audio_for(
        &self,
        text: &str,
        response_type: ResponseType,
        language: Language,
    ) -> (Option<String>, Option<DegradedReason>) {
        if !response_type.wants_audio() {
            return (None, None);
        }
        self.voice.synthesize(text, language).await.into_parts()
    }
}
