//! Text-to-speech backend
//!
//! `TranslateTtsClient` talks to a Google-Translate-compatible `translate_tts`
//! endpoint, which only accepts short inputs: text is split into short
//! chunks and the MP3 bodies are concatenated.

use async_trait::async_trait;
use reqwest::{Client, Url};
use std::time::Duration;
use thiserror::Error;
use unicode_segmentation::UnicodeSegmentation;

use crate::config::SpeechConfig;
use crate::models::Language;

#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesize `text` (already cleaned of markup) into MP3 bytes.
    async fn synthesize(&self, text: &str, language: Language) -> Result<Vec<u8>, SpeechError>;

    fn name(&self) -> &str;
}

#[derive(Error, Debug)]
pub enum SpeechError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid TTS endpoint: {0}")]
    Url(String),

    #[error("TTS endpoint returned {status}")]
    Status { status: u16 },

    #[error("Nothing to synthesize")]
    EmptyText,

    #[error("TTS endpoint returned no audio")]
    EmptyAudio,
}

#[derive(Debug, Clone)]
pub struct TranslateTtsClient {
    client: Client,
    base_url: String,
    max_chunk_chars: usize,
}

impl TranslateTtsClient {
    pub fn new(config: &SpeechConfig) -> Result<Self, SpeechError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            max_chunk_chars: config.max_chunk_chars.max(1),
        })
    }

    async fn fetch_chunk(&self, chunk: &str, language: Language) -> Result<Vec<u8>, SpeechError> {
        let url = Url::parse_with_params(
            &format!("{}/translate_tts", self.base_url),
            &[
                ("ie", "UTF-8"),
                ("client", "tw-ob"),
                ("tl", language.code()),
                ("q", chunk),
            ],
        )
        .map_err(|e| SpeechError::Url(e.to_string()))?;

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SpeechError::Status {
                status: status.as_u16(),
            });
        }
        Ok(response.bytes().await?.to_vec())
    }
}

#[async_trait]
impl SpeechSynthesizer for TranslateTtsClient {
    async fn synthesize(&self, text: &str, language: Language) -> Result<Vec<u8>, SpeechError> {
        let chunks = split_into_chunks(text, self.max_chunk_chars);
        if chunks.is_empty() {
            return Err(SpeechError::EmptyText);
        }

        let mut audio = Vec::new();
        for chunk in &chunks {
            audio.extend(self.fetch_chunk(chunk, language).await?);
        }

        if audio.is_empty() {
            return Err(SpeechError::EmptyAudio);
        }

        tracing::debug!(chunks = chunks.len(), bytes = audio.len(), "Synthesized speech");
        Ok(audio)
    }

    fn name(&self) -> &str {
        "translate-tts"
    }
}

/// Khmer sentence terminator (khan). Khmer text rarely has spaces between words.
const KHMER_KHAN: char = '\u{17D4}';

/// Split into chunks of at most `max_chars` characters.
///
/// Breaks fall on whitespace or after a Khmer khan. A piece still longer than
/// the limit is cut between grapheme clusters, so a consonant keeps its vowel
/// signs.
pub fn split_into_chunks(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    let pieces = text
        .split_whitespace()
        .flat_map(|word| word.split_inclusive(KHMER_KHAN));

    for piece in pieces {
        let piece_len = piece.chars().count();

        if piece_len > max_chars {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
                current_len = 0;
            }
            chunks.extend(cut_graphemes(piece, max_chars));
            continue;
        }

        let needed = if current.is_empty() { piece_len } else { current_len + 1 + piece_len };
        if needed > max_chars {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }

        if !current.is_empty() {
            current.push(' ');
            current_len += 1;
        }
        current.push_str(piece);
        current_len += piece_len;
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Cut `piece` at grapheme boundaries. A lone cluster wider than the limit
/// becomes its own chunk.
fn cut_graphemes(piece: &str, max_chars: usize) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for grapheme in piece.graphemes(true) {
        let len = grapheme.chars().count();
        if current_len + len > max_chars && !current.is_empty() {
            out.push(std::mem::take(&mut current));
            current_len = 0;
        }
        current.push_str(grapheme);
        current_len += len;
    }

    if !current.is_empty() {
        out.push(current);
    }
    out
}
