//! User-facing text lookup.
//!
//! A `Localizer` resolves message keys against an optional JSON override
//! bundle, then the built-in English bundle, then falls back to echoing
//! the key itself. Lookup never fails: a missing key renders as the key,
//! which is visible enough to get fixed without taking the session down.
//!
//! Parameters use `{name}` placeholders and are substituted textually.

use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

/// Built-in English message bundle.
const ENGLISH: &[(&str, &str)] = &[
    ("app.title", "Concord"),
    ("app.tagline", "AI-mediated dispute resolution"),
    ("profile.loaded", "Welcome back. Loaded the saved profile for {nameA} and {nameB}."),
    ("profile.none", "No saved profile found. Let's set one up."),
    ("profile.saved", "Profile saved."),
    ("profile.cleared", "Saved profile cleared."),
    ("profile.incomplete", "Both names are required before the session can start."),
    ("problem.prompt_a", "{nameA}, describe the problem from your point of view."),
    ("problem.prompt_b", "{nameB}, describe the problem from your point of view."),
    ("problem.empty", "Please describe the problem before continuing."),
    ("perspective.heading_a", "{nameA}'s Articulated Perspective"),
    ("perspective.heading_b", "{nameB}'s Articulated Perspective"),
    ("perspective.working", "Articulating the perspective..."),
    ("summary.pending", "The summary of {nameA}'s account isn't ready yet. Retrying it now."),
    ("clarify.working", "The judge is preparing clarification questions..."),
    ("clarify.intro_heading", "Clarification Phase"),
    ("clarify.for_party", "Questions for {name}"),
    ("clarify.answer_prompt", "Choose A, B, C, enter D to answer in your own words, or S to skip."),
    ("clarify.own_words", "Your answer:"),
    ("clarify.handoff", "Thank you, {name}. Please hand the session to {other}."),
    ("ruling.initial_heading", "The AI Judge's Initial Ruling"),
    ("ruling.summary_heading", "Judge's Definitive Re-summary of the Core Issue"),
    ("ruling.analysis_heading", "In-depth Analysis & Contributing Factors"),
    ("ruling.recommendations_heading", "The AI Judge's Final Recommendations"),
    ("ruling.parse_fallback_heading", "The Judge's Response (formatting differed from expected)"),
    ("ruling.working", "The judge is deliberating..."),
    ("ruling.feedback_prompt", "{name}, do you agree with this ruling? (agree/disagree)"),
    ("rebuttal.prompt", "{name}, state your rebuttal to the ruling."),
    ("rebuttal.present", "{name} disagreed with the ruling. Their rebuttal, summarized:"),
    ("rebuttal.respond_prompt", "{name}, do you accept these points? (agree/disagree)"),
    ("rebuttal.counter_prompt", "{name}, state your counter-rebuttal."),
    ("ultimate.heading", "The AI Judge's Ultimate Final Ruling"),
    ("ultimate.verdict_heading", "Ultimate Verdict"),
    ("ultimate.primary_heading", "Primary Suggestions"),
    ("ultimate.secondary_heading", "Secondary Suggestions"),
    ("ultimate.reasoning_heading", "Detailed Reasoning"),
    ("ultimate.accepted", "Both parties accepted the initial ruling. It stands as the final ruling."),
    ("session.new_analysis", "Starting a new analysis with the same profile."),
    ("error.auth", "No valid API credential is configured. Set GEMINI_API_KEY and try again."),
    ("error.collaborator", "The AI service did not return a usable response. Please try again."),
    ("error.busy", "A request is already in flight. Please wait for it to finish."),
    ("error.generic", "Something went wrong: {detail}"),
];

/// Resolves message keys to localized text.
#[derive(Debug, Default)]
pub struct Localizer {
    overrides: HashMap<String, String>,
    language: String,
}

#[derive(Deserialize)]
struct Bundle {
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    messages: HashMap<String, String>,
}

impl Localizer {
    /// English-only localizer.
    pub fn new() -> Self {
        Self {
            overrides: HashMap::new(),
            language: "English".to_string(),
        }
    }

    /// Load an override bundle from a JSON file.
    ///
    /// The file holds `{"language": "...", "messages": {key: text}}`; keys
    /// not present fall through to the built-in English bundle. An
    /// unreadable bundle is logged and ignored.
    pub fn with_bundle(path: &Path) -> Self {
        let mut localizer = Self::new();
        match std::fs::read_to_string(path).and_then(|raw| {
            serde_json::from_str::<Bundle>(&raw)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
        }) {
            Ok(bundle) => {
                if let Some(language) = bundle.language {
                    localizer.language = language;
                }
                localizer.overrides = bundle.messages;
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to load locale bundle, using built-in English");
            }
        }
        localizer
    }

    /// The language name passed to prompt builders ("English", "Spanish"...).
    pub fn language(&self) -> &str {
        &self.language
    }

    /// Resolve a key, substituting `{name}` placeholders from `params`.
    pub fn lookup(&self, key: &str, params: &[(&str, &str)]) -> String {
        let template = self
            .overrides
            .get(key)
            .map(String::as_str)
            .or_else(|| {
                ENGLISH
                    .iter()
                    .find(|(k, _)| *k == key)
                    .map(|(_, v)| *v)
            })
            .unwrap_or(key);

        let mut out = template.to_string();
        for (name, value) in params {
            out = out.replace(&format!("{{{name}}}"), value);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_substitutes_parameters() {
        let localizer = Localizer::new();
        let text = localizer.lookup("profile.loaded", &[("nameA", "Mira"), ("nameB", "Sam")]);
        assert_eq!(text, "Welcome back. Loaded the saved profile for Mira and Sam.");
    }

    #[test]
    fn missing_key_echoes_the_key() {
        let localizer = Localizer::new();
        assert_eq!(localizer.lookup("no.such.key", &[]), "no.such.key");
    }

    #[test]
    fn unknown_params_are_left_in_place() {
        let localizer = Localizer::new();
        let text = localizer.lookup("clarify.for_party", &[]);
        assert_eq!(text, "Questions for {name}");
    }

    #[test]
    fn bundle_overrides_win_and_missing_keys_fall_through() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("es.json");
        std::fs::write(
            &path,
            r#"{"language": "Spanish", "messages": {"app.title": "Concordia"}}"#,
        )
        .unwrap();

        let localizer = Localizer::with_bundle(&path);
        assert_eq!(localizer.language(), "Spanish");
        assert_eq!(localizer.lookup("app.title", &[]), "Concordia");
        assert_eq!(localizer.lookup("profile.saved", &[]), "Profile saved.");
    }

    #[test]
    fn unreadable_bundle_falls_back_to_english() {
        let localizer = Localizer::with_bundle(Path::new("/nonexistent/bundle.json"));
        assert_eq!(localizer.language(), "English");
        assert_eq!(localizer.lookup("profile.saved", &[]), "Profile saved.");
    }
}
