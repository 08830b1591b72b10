//! Fallback provenance.
//!
//! Components on the chat path never fail outward; they hand back a usable value
//! and, when that value is a stand-in, the reason it is one.

use thiserror::Error;

/// Why a component served a fallback instead of a real result.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DegradedReason {
    #[error("transcript store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("product index unavailable: {0}")]
    IndexUnavailable(String),

    #[error("query embedding unavailable")]
    EmbeddingUnavailable,

    #[error("no products matched")]
    NoMatches,

    #[error("no generative model configured")]
    ModelNotConfigured,

    #[error("generative model failed: {0}")]
    ModelFailed(String),

    #[error("speech synthesis disabled")]
    SynthesisDisabled,

    #[error("speech synthesis failed: {0}")]
    SynthesisFailed(String),

    #[error("reply generation panicked")]
    Panicked,
}

/// A value plus, if it is a fallback, the reason.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome<T> {
    value: T,
    degraded: Option<DegradedReason>,
}

impl<T> Outcome<T> {
    pub fn ok(value: T) -> Self {
        Self {
            value,
            degraded: None,
        }
    }

    pub fn degraded(value: T, reason: DegradedReason) -> Self {
        Self {
            value,
            degraded: Some(reason),
        }
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn into_value(self) -> T {
        self.value
    }

    pub fn reason(&self) -> Option<&DegradedReason> {
        self.degraded.as_ref()
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded.is_some()
    }

    pub fn into_parts(self) -> (T, Option<DegradedReason>) {
        (self.value, self.degraded)
    }
}
