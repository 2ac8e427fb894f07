//! Gemini text-generation backend.
//!
//! Talks to the `generateContent` endpoint of the Generative Language API.
//! Compiled only with the `gemini` feature, which pulls in `reqwest`.

use super::{
    secrets::{ApiCredential, CredentialSource},
    ProviderError, SamplingConfig, TextGenerator,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Environment variable name for the Gemini API key.
pub const GEMINI_API_KEY_ENV: &str = "GEMINI_API_KEY";

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_MODEL: &str = "gemini-2.5-flash-preview-04-17";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Gemini provider.
///
/// The API key is held in an [`ApiCredential`] and exposed only when the
/// request is issued.
pub struct GeminiProvider {
    credential: ApiCredential,
    base_url: String,
    model: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for GeminiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiProvider")
            .field("credential", &self.credential)
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish()
    }
}

impl GeminiProvider {
    /// Create a provider with a key supplied programmatically.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_credential(ApiCredential::new(
            api_key,
            CredentialSource::Programmatic,
            "Gemini API key",
        ))
    }

    /// Create a provider from the `GEMINI_API_KEY` environment variable.
    pub fn from_env() -> Result<Self, ProviderError> {
        let credential = ApiCredential::from_env(GEMINI_API_KEY_ENV, "Gemini API key")?;
        Ok(Self::with_credential(credential))
    }

    fn with_credential(credential: ApiCredential) -> Self {
        Self {
            credential,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            client: reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .expect("failed to build HTTP client"),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest {
    #[serde(rename = "system_instruction")]
    system_instruction: InstructionPart,
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct InstructionPart {
    parts: Vec<TextPart>,
}

#[derive(Debug, Serialize)]
struct Content {
    role: String,
    parts: Vec<TextPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct TextPart {
    text: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
    #[serde(rename = "topP")]
    top_p: f32,
    #[serde(rename = "topK")]
    top_k: u32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<TextPart>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    #[serde(default)]
    #[allow(dead_code)] // Required for deserialization, not read directly
    code: u16,
    message: String,
}

#[async_trait]
impl TextGenerator for GeminiProvider {
    async fn generate(
        &self,
        system_instruction: &str,
        content: &str,
        sampling: &SamplingConfig,
    ) -> Result<String, ProviderError> {
        if self.credential.is_empty() {
            return Err(ProviderError::Auth);
        }

        let request = GenerateRequest {
            system_instruction: InstructionPart {
                parts: vec![TextPart {
                    text: system_instruction.to_string(),
                }],
            },
            contents: vec![Content {
                role: "user".to_string(),
                parts: vec![TextPart {
                    text: content.to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: sampling.temperature,
                top_p: sampling.top_p,
                top_k: sampling.top_k,
                max_output_tokens: sampling.max_output_tokens,
            },
        };

        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);

        // Only expose the credential here, at the point of use.
        let response = self
            .client
            .post(&url)
            .query(&[("key", self.credential.expose())])
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(REQUEST_TIMEOUT)
                } else {
                    ProviderError::Http(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response
                .json::<ApiErrorBody>()
                .await
                .map(|b| b.error)
                .unwrap_or(ApiErrorDetail {
                    code: status.as_u16(),
                    message: status.to_string(),
                });

            if status.as_u16() == 401
                || status.as_u16() == 403
                || detail.message.contains("API key not valid")
            {
                return Err(ProviderError::Auth);
            }
            return Err(ProviderError::Api {
                status: status.as_u16(),
                message: detail.message,
            });
        }

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;

        let text = body
            .candidates
            .into_iter()
            .filter_map(|c| c.content)
            .flat_map(|c| c.parts)
            .map(|p| p.text)
            .collect::<Vec<_>>()
            .join("");

        if text.trim().is_empty() {
            return Err(ProviderError::EmptyResponse);
        }
        Ok(text)
    }

    fn name(&self) -> &str {
        "gemini"
    }
}
