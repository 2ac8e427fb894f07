//! Text-generation collaborator abstraction.
//!
//! The session controller only ever talks to [`TextGenerator`]; backend
//! implementations live behind it. The Gemini implementation is gated
//! behind the `gemini` feature so the controller and its tests build
//! without an HTTP stack.
//!
//! ## Security
//!
//! Providers hold their API keys in [`secrets::ApiCredential`], which
//! cannot leak through `Debug` output and must be exposed explicitly at
//! the point of use.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

pub mod secrets;

#[cfg(feature = "gemini")]
mod gemini;

pub use secrets::{ApiCredential, CredentialSource};

#[cfg(feature = "gemini")]
pub use gemini::{GeminiProvider, GEMINI_API_KEY_ENV};

/// Errors from text-generation backends.
///
/// `Auth` is kept distinct from the transport kinds because the session
/// surface shows a dedicated credential message for it; everything else is
/// presented as a generic, retryable collaborator failure.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("no valid API credential is configured")]
    Auth,

    #[error("the generation backend returned an empty response")]
    EmptyResponse,

    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("response parse error: {0}")]
    Parse(String),

    #[error("timeout after {0:?}")]
    Timeout(Duration),

    #[error("provider not configured: {0}")]
    NotConfigured(String),
}

impl ProviderError {
    /// Whether this failure warrants the dedicated credential message.
    pub fn is_auth(&self) -> bool {
        matches!(self, ProviderError::Auth)
    }
}

/// Sampling parameters for one generation call.
///
/// Each prompt builder carries its own constants; the wide temperature
/// range reflects that role-play calls want variety while summaries and
/// rulings want stability.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplingConfig {
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub max_output_tokens: u32,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            top_p: 0.9,
            top_k: 40,
            max_output_tokens: 2048,
        }
    }
}

/// The text-generation collaborator: prompt in, text out.
///
/// Implementations never mutate caller state and never return an empty
/// string; a success with no text is [`ProviderError::EmptyResponse`].
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Execute one generation call.
    async fn generate(
        &self,
        system_instruction: &str,
        content: &str,
        sampling: &SamplingConfig,
    ) -> Result<String, ProviderError>;

    /// Backend name for logging.
    fn name(&self) -> &str;
}
