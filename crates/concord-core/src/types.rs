//! Core data model for a Concord mediation session.
//!
//! Everything in this module is plain owned data. The session controller in
//! `concord-runtime` is the sole owner of a [`SessionData`] aggregate for the
//! lifetime of one problem-resolution cycle; parsers and collaborators only
//! ever receive borrows and return values.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors from profile intake validation.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ProfileError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),
}

/// One of the two participants whose accounts are being reconciled.
///
/// All mirrored per-party logic (question sets, rebuttal slots, prompt
/// labels) is parameterized by this enum rather than duplicated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Party {
    A,
    B,
}

impl Party {
    /// The opposite participant.
    pub fn other(self) -> Party {
        match self {
            Party::A => Party::B,
            Party::B => Party::A,
        }
    }

    /// Generic display label used when the profile has no name on record.
    pub fn generic_name(self) -> &'static str {
        match self {
            Party::A => "Party A",
            Party::B => "Party B",
        }
    }
}

impl fmt::Display for Party {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Party::A => write!(f, "A"),
            Party::B => write!(f, "B"),
        }
    }
}

/// Identity and circumstance fields for one participant.
///
/// Field values are category keys or free text captured at intake; the core
/// does not validate them beyond presence (empty means "not specified").
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PartyRecord {
    pub name: String,
    pub gender: String,
    pub age: String,
    pub country: String,
    pub city: String,
    pub beliefs: String,
    pub occupation: String,
    pub work_load: String,
    pub stress_level: String,
    pub financial_situation: String,
}

/// Shared relationship context captured once at intake.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RelationshipContext {
    pub duration: String,
    pub recurring_issues: String,
    pub has_children: bool,
    pub children_details: String,
}

/// A fully-populated participant profile pair.
///
/// Invariant: a persisted profile is either complete or absent. A profile
/// with `complete == false` is never written by the store and never accepted
/// by the session controller as a precondition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub party_a: PartyRecord,
    pub party_b: PartyRecord,
    pub relationship: RelationshipContext,
    pub complete: bool,
    /// Stamped by the profile store on save.
    #[serde(default)]
    pub saved_at: Option<DateTime<Utc>>,
}

impl Profile {
    /// Check the fields intake must populate before a profile can be
    /// marked complete. Category fields may stay empty ("not specified").
    pub fn validate(&self) -> Result<(), ProfileError> {
        if self.party_a.name.trim().is_empty() {
            return Err(ProfileError::MissingField("party_a.name"));
        }
        if self.party_b.name.trim().is_empty() {
            return Err(ProfileError::MissingField("party_b.name"));
        }
        Ok(())
    }

    pub fn record(&self, party: Party) -> &PartyRecord {
        match party {
            Party::A => &self.party_a,
            Party::B => &self.party_b,
        }
    }

    /// Display name for a participant, falling back to the generic label
    /// when the record has no name.
    pub fn display_name(&self, party: Party) -> &str {
        let name = &self.record(party).name;
        if name.trim().is_empty() {
            party.generic_name()
        } else {
            name
        }
    }
}

/// A first-person narrative generated on behalf of one party.
///
/// Produced once per party per problem submission; replaced wholesale when
/// the problem cycle restarts, never mutated in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Perspective {
    pub title: String,
    pub text: String,
}

/// The three labeled suggested answers attached to a clarification question.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Suggestions {
    pub a: String,
    pub b: String,
    pub c: String,
}

/// One clarification question, already personalized with the party's name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClarificationQuestion {
    pub question_text: String,
    pub suggestions: Suggestions,
}

/// Parsed clarification phase content: intro, per-party question sets, outro.
///
/// After parsing (see `clarify`), each party's list holds at least three
/// questions and the intro/outro are non-empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClarificationPrompts {
    pub intro: String,
    pub questions_for_a: Vec<ClarificationQuestion>,
    pub questions_for_b: Vec<ClarificationQuestion>,
    pub outro: String,
}

impl ClarificationPrompts {
    pub fn questions_for(&self, party: Party) -> &[ClarificationQuestion] {
        match party {
            Party::A => &self.questions_for_a,
            Party::B => &self.questions_for_b,
        }
    }
}

/// Which option a participant chose for a clarification question.
///
/// `D` is the free-text option; `Skipped` is a valid terminal answer, not an
/// error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnswerChoice {
    A,
    B,
    C,
    D,
    Skipped,
}

impl fmt::Display for AnswerChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnswerChoice::A => write!(f, "A"),
            AnswerChoice::B => write!(f, "B"),
            AnswerChoice::C => write!(f, "C"),
            AnswerChoice::D => write!(f, "D"),
            AnswerChoice::Skipped => write!(f, "skipped"),
        }
    }
}

/// A participant's answer to one clarification question.
///
/// `custom_text` is meaningful only for choice `D`; `chosen_text` carries the
/// resolved suggestion text for `A`/`B`/`C` and is empty otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClarificationAnswer {
    pub question_text: String,
    pub choice: AnswerChoice,
    pub custom_text: String,
    pub chosen_text: String,
}

impl ClarificationAnswer {
    /// Answer a question with one of its lettered suggestions.
    pub fn chosen(question: &ClarificationQuestion, choice: AnswerChoice) -> Self {
        let chosen_text = match choice {
            AnswerChoice::A => question.suggestions.a.clone(),
            AnswerChoice::B => question.suggestions.b.clone(),
            AnswerChoice::C => question.suggestions.c.clone(),
            AnswerChoice::D | AnswerChoice::Skipped => String::new(),
        };
        Self {
            question_text: question.question_text.clone(),
            choice,
            custom_text: String::new(),
            chosen_text,
        }
    }

    /// Answer a question with free text (choice `D`).
    pub fn custom(question: &ClarificationQuestion, text: impl Into<String>) -> Self {
        Self {
            question_text: question.question_text.clone(),
            choice: AnswerChoice::D,
            custom_text: text.into(),
            chosen_text: String::new(),
        }
    }

    /// Skip a question.
    pub fn skipped(question: &ClarificationQuestion) -> Self {
        Self {
            question_text: question.question_text.clone(),
            choice: AnswerChoice::Skipped,
            custom_text: String::new(),
            chosen_text: String::new(),
        }
    }
}

/// Parsed sections of the initial (pre-rebuttal) ruling.
///
/// When `fallback` is set, the upstream text honored none of the expected
/// headings and the entire raw text was preserved in `analysis` so no
/// content is dropped; the presentation layer substitutes a parse-error
/// heading for the summary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InitialRulingSections {
    pub summary: String,
    pub analysis: String,
    pub recommendations: String,
    pub fallback: bool,
}

/// Parsed sections of the ultimate (post-rebuttal) ruling.
///
/// The fallback section for this grammar is `reasoning`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UltimateRulingSections {
    pub verdict: String,
    pub primary_suggestions: String,
    pub secondary_suggestions: String,
    pub reasoning: String,
    pub fallback: bool,
}

/// How the non-active party responded to the active party's rebuttal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RebuttalResponse {
    Agree,
    Disagree,
}

/// Rebuttal sub-protocol state for the current problem cycle only.
///
/// Fully cleared whenever a new cycle begins; never survives a
/// start-new-analysis or profile reset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RebuttalState {
    /// Whether party A agreed with the initial ruling.
    pub agreed_by_a: Option<bool>,
    /// Whether party B agreed; only ever set after A agreed.
    pub agreed_by_b: Option<bool>,
    /// The party who first disagreed and whose rebuttal is processed first.
    pub active_party: Option<Party>,
    pub active_raw: String,
    pub active_summary: Option<String>,
    pub other_response: Option<RebuttalResponse>,
    pub counter_raw: String,
    pub counter_summary: Option<String>,
}

/// The single owned aggregate of everything accumulated during one
/// problem-resolution cycle.
///
/// The session controller mutates this exclusively; "start new analysis"
/// is one call to [`SessionData::reset_problem_cycle`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionData {
    pub profile: Option<Profile>,
    pub problem_a: String,
    pub problem_b: String,
    pub perspective_a: Option<Perspective>,
    /// Neutral summary of party A's account; mandatory context for
    /// generating party B's perspective.
    pub summary_a: Option<String>,
    pub perspective_b: Option<Perspective>,
    pub clarifications: Option<ClarificationPrompts>,
    pub answers_a: Vec<ClarificationAnswer>,
    pub answers_b: Vec<ClarificationAnswer>,
    pub initial_ruling_raw: String,
    pub initial_ruling: Option<InitialRulingSections>,
    pub rebuttal: RebuttalState,
    pub ultimate_ruling_raw: String,
    pub ultimate_ruling: Option<UltimateRulingSections>,
}

impl SessionData {
    /// Clear all problem, ruling and rebuttal data while retaining the
    /// profile.
    pub fn reset_problem_cycle(&mut self) {
        let profile = self.profile.take();
        *self = SessionData {
            profile,
            ..SessionData::default()
        };
    }

    /// Profile display name for a party, falling back to the generic label
    /// when no profile is loaded.
    pub fn display_name(&self, party: Party) -> &str {
        self.profile
            .as_ref()
            .map(|p| p.display_name(party))
            .unwrap_or_else(|| party.generic_name())
    }
}
