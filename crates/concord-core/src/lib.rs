//! # concord-core
//!
//! Deterministic data model and parsing layer for Concord, an AI-mediated
//! dispute resolution engine.
//!
//! This crate holds everything that can be evaluated without I/O:
//! - The session [`Stage`] enumeration and its transition topology
//! - The owned [`SessionData`] aggregate for one problem cycle
//! - The case-insensitive section extractor for ruling text (`extract`)
//! - The clarification marker-grammar parser with its built-in recovery
//!   question sets (`clarify`)
//!
//! ## Key Guarantees
//!
//! 1. **Pure**: parsers are functions of their input only; no stored state
//! 2. **Total**: the clarification parser and the ruling parsers never
//!    fail; malformed generator output degrades to built-in fallbacks
//! 3. **Lossless**: a ruling whose headings were all ignored is preserved
//!    verbatim in its grammar's fallback section
//!
//! The asynchronous session controller that drives collaborator calls
//! lives in `concord-runtime`.

pub mod clarify;
pub mod extract;
pub mod stage;
pub mod types;

pub use clarify::{parse_clarification_prompts, parse_question_block, MIN_QUESTIONS_PER_PARTY};
pub use extract::{extract_section, parse_initial_ruling, parse_ultimate_ruling};
pub use stage::Stage;
pub use types::{
    AnswerChoice, ClarificationAnswer, ClarificationPrompts, ClarificationQuestion,
    InitialRulingSections, Party, PartyRecord, Perspective, Profile, ProfileError,
    RebuttalResponse, RebuttalState, RelationshipContext, SessionData, Suggestions,
    UltimateRulingSections,
};
