use serde::{Deserialize, Serialize};

/// Reply language. Anything other than `km` is treated as English.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "&'static str")]
pub enum Language {
    #[default]
    En,
    Km,
}

impl Language {
    pub fn code(self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Km => "km",
        }
    }
}

impl From<String> for Language {
    fn from(value: String) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "km" => Language::Km,
            _ => Language::En,
        }
    }
}

impl From<Language> for &'static str {
    fn from(value: Language) -> Self {
        value.code()
    }
}

/// Which parts of the reply the client wants. Unknown values mean text only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "&'static str")]
pub enum ResponseType {
    Text,
    Voice,
    #[default]
    Both,
}

impl ResponseType {
    pub fn as_str(self) -> &'static str {
        match self {
            ResponseType::Text => "text",
            ResponseType::Voice => "voice",
            ResponseType::Both => "both",
        }
    }

    pub fn wants_audio(self) -> bool {
        matches!(self, ResponseType::Voice | ResponseType::Both)
    }
}

impl From<String> for ResponseType {
    fn from(value: String) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "voice" => ResponseType::Voice,
            "both" => ResponseType::Both,
            _ => ResponseType::Text,
        }
    }
}

impl From<ResponseType> for &'static str {
    fn from(value: ResponseType) -> Self {
        value.as_str()
    }
}

/// Body of `POST /chat`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    pub user_id: String,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub response_type: ResponseType,
    #[serde(default)]
    pub language: Language,
}

/// Reply to `POST /chat`. `audio_data` is base64 MP3, or `""` when absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatReply {
    pub text: String,
    pub audio_data: String,
    pub session_id: String,
    pub response_type: ResponseType,
    pub timestamp: String,
}
