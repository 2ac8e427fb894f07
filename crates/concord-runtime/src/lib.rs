//! Concord runtime: the session controller and its collaborators.
//!
//! This crate drives one mediation session end to end. The controller in
//! [`session`] owns all session state and talks to three replaceable
//! collaborators: a [`providers::TextGenerator`] for generation calls, a
//! [`storage::ProfileStore`] for profile persistence, and a
//! [`locale::Localizer`] for user-facing text. Prompt assembly lives in
//! [`prompts`]; response parsing lives in `concord-core` and never fails.
//!
//! ## Security
//!
//! Generation backends keep their API keys in
//! [`providers::ApiCredential`], which redacts `Debug` output and exposes
//! the value only at the point of use.

pub mod locale;
pub mod prompts;
pub mod providers;
pub mod session;
pub mod storage;

pub use locale::Localizer;
pub use prompts::PromptSpec;
pub use providers::{ProviderError, SamplingConfig, TextGenerator};
pub use session::{SessionController, SessionError};
pub use storage::{JsonFileStore, MemoryStore, ProfileStore, StorageError};

#[cfg(feature = "gemini")]
pub use providers::{GeminiProvider, GEMINI_API_KEY_ENV};
