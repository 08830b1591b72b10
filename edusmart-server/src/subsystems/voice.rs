use std::sync::{Arc, OnceLock};

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use edusmart_core::{DegradedReason, Language, Outcome, SpeechSynthesizer};
use regex::Regex;

/// Reply audio: cleans markdown out of the text, synthesizes it, and returns
/// base64 MP3. Failure leaves the reply without audio.
#[derive(Clone)]
pub struct Voice {
    synthesizer: Option<Arc<dyn SpeechSynthesizer>>,
}

impl Voice {
    pub fn new(synthesizer: Arc<dyn SpeechSynthesizer>) -> Self {
        Self {
            synthesizer: Some(synthesizer),
        }
    }

    pub fn disabled() -> Self {
        Self { synthesizer: None }
    }

    pub async fn synthesize(&self, text: &str, language: Language) -> Outcome<Option<String>> {
        let Some(synthesizer) = &self.synthesizer else {
            return Outcome::degraded(None, DegradedReason::SynthesisDisabled);
        };

        let cleaned = clean_for_speech(text);
        match synthesizer.synthesize(&cleaned, language).await {
            Ok(audio) => Outcome::ok(Some(BASE64.encode(audio))),
            Err(e) => {
                tracing::error!(error = %e, tts = synthesizer.name(), "Speech synthesis failed");
                Outcome::degraded(None, DegradedReason::SynthesisFailed(e.to_string()))
            }
        }
    }
}

struct SpeechPatterns {
    heading: Regex,
    link: Regex,
    newlines: Regex,
    spaces: Regex,
}

fn patterns() -> &'static SpeechPatterns {
    static PATTERNS: OnceLock<SpeechPatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| SpeechPatterns {
        heading: Regex::new(r"#+").expect("static regex"),
        link: Regex::new(r"\[[^\]]*\]\([^)]*\)").expect("static regex"),
        newlines: Regex::new(r"\n+").expect("static regex"),
        spaces: Regex::new(r"\s+").expect("static regex"),
    })
}

/// Strip markdown so the TTS engine does not read symbols aloud.
/// Links are dropped entirely, link text included.
pub fn clean_for_speech(text: &str) -> String {
    let p = patterns();
    let text = text.replace('*', "");
    let text = p.heading.replace_all(&text, "");
    let text = p.link.replace_all(&text, "");
    let text = p.newlines.replace_all(&text, ". ");
    let text = p.spaces.replace_all(&text, " ");
    text.trim().to_string()
}
