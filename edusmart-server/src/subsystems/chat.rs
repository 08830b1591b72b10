//! `/chat` request handling: session assignment, reply assembly, and the
//! last-resort apology when reply generation panics.

use std::panic::AssertUnwindSafe;

use chrono::{SecondsFormat, Utc};
use edusmart_core::locale::apology_message;
use edusmart_core::{ChatReply, ChatRequest, DegradedReason, Language, ResponseType};
use futures::FutureExt;
use uuid::Uuid;

use crate::subsystems::assistant::Assistant;

pub async fn handle_chat(assistant: &Assistant, request: ChatRequest) -> ChatReply {
    let session_id = match request.session_id {
        Some(s) if !s.trim().is_empty() => s,
        _ => Uuid::new_v4().to_string(),
    };

    let generation = assistant.generate_response(
        &request.message,
        &request.user_id,
        &session_id,
        request.response_type,
        request.language,
    );

    match AssertUnwindSafe(generation).catch_unwind().await {
        Ok(outcome) => {
            let (reply, degraded) = outcome.into_parts();
            if let Some(reason) = degraded {
                tracing::warn!(%reason, session_id = %session_id, "Served fallback reply");
            }
            ChatReply {
                text: reply.text,
                audio_data: reply.audio_data.unwrap_or_default(),
                session_id,
                response_type: reply.response_type,
                timestamp: now_rfc3339(),
            }
        }
        Err(_) => {
            tracing::error!(reason = %DegradedReason::Panicked, session_id = %session_id, "Chat request failed");
            apology_reply(session_id, request.response_type, request.language)
        }
    }
}

/// Generic apology used when a request cannot be processed at all.
pub fn apology_reply(session_id: String, response_type: ResponseType, language: Language) -> ChatReply {
    ChatReply {
        text: apology_message(language).to_string(),
        audio_data: String::new(),
        session_id,
        response_type,
        timestamp: now_rfc3339(),
    }
}

pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subsystems::assistant::AssistantSettings;
    use crate::subsystems::catalog::ProductSearch;
    use crate::subsystems::transcript::{MemoryTranscriptStore, Transcript};
    use crate::subsystems::voice::Voice;
    use async_trait::async_trait;
    use edusmart_core::locale::demo_message;
    use edusmart_core::{GenerationError, LanguageModel};
    use std::sync::Arc;

    struct PanickingModel;

    #[async_trait]
    impl LanguageModel for PanickingModel {
        async fn generate(&self, _prompt: &str, _user_message: &str) -> Result<String, GenerationError> {
            panic!("model client bug");
        }

        fn name(&self) -> &str {
            "panicking"
        }
    }

    fn assistant(model: Option<Arc<dyn LanguageModel>>) -> Assistant {
        Assistant::new(
            Transcript::new(Arc::new(MemoryTranscriptStore::new())),
            ProductSearch::fallback_only(),
            Voice::disabled(),
            model,
            AssistantSettings::default(),
        )
    }

    fn request(session_id: Option<&str>) -> ChatRequest {
        ChatRequest {
            message: "hello".to_string(),
            user_id: "u1".to_string(),
            session_id: session_id.map(str::to_string),
            response_type: ResponseType::Text,
            language: Language::En,
        }
    }

    #[tokio::test]
    async fn missing_or_blank_session_gets_a_uuid() {
        let assistant = assistant(None);
        for session in [None, Some(""), Some("  ")] {
            let reply = handle_chat(&assistant, request(session)).await;
            assert!(Uuid::parse_str(&reply.session_id).is_ok());
        }
    }

    #[tokio::test]
    async fn given_session_is_kept() {
        let reply = handle_chat(&assistant(None), request(Some("abc"))).await;
        assert_eq!(reply.session_id, "abc");
        assert_eq!(reply.text, demo_message(Language::En));
        assert_eq!(reply.audio_data, "");
        assert_eq!(reply.response_type, ResponseType::Text);
        assert!(chrono::DateTime::parse_from_rfc3339(&reply.timestamp).is_ok());
    }

    #[tokio::test]
    async fn panic_becomes_apology() {
        let mut req = request(Some("s1"));
        req.language = Language::Km;
        req.response_type = ResponseType::Voice;

        let reply = handle_chat(&assistant(Some(Arc::new(PanickingModel))), req).await;
        assert_eq!(reply.text, apology_message(Language::Km));
        assert_eq!(reply.audio_data, "");
        assert_eq!(reply.session_id, "s1");
        assert_eq!(reply.response_type, ResponseType::Voice);
    }
}
