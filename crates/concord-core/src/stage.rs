//! Session stages and their transition topology.
//!
//! The stage is a plain tag; all payload lives in the session data
//! aggregate. Errors are an overlay on top of the current stage, never a
//! stage of their own, so every failure leaves the participant on an
//! actionable screen.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The exhaustive set of stages a mediation session moves through.
///
/// Initial stage is [`Stage::LoadingProfile`]. The terminal stage per
/// problem cycle is [`Stage::UltimateRulingDisplay`], from which a new
/// analysis re-enters [`Stage::ProblemInputA`] with the profile retained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    /// Reading the persisted profile at session start.
    LoadingProfile,
    /// No complete profile on record; intake must run.
    ProfileIntake,
    /// Awaiting party A's account of the problem.
    ProblemInputA,
    /// Party A's generated perspective is on display.
    PerspectiveA,
    /// Awaiting party B's account.
    ProblemInputB,
    /// Party B's generated perspective is on display.
    PerspectiveB,
    /// Party A is answering the clarification question set.
    ClarificationIntakeA,
    /// Party B is answering the clarification question set.
    ClarificationIntakeB,
    /// The initial ruling is on display; party A is asked to agree or
    /// disagree while this stage is active.
    InitialRulingDisplay,
    /// Party A agreed; party B is asked to agree or disagree.
    InitialRulingFeedbackB,
    /// The party who first disagreed is entering their rebuttal.
    RebuttalInputActive,
    /// The active party's summarized rebuttal is presented to the other
    /// party for agree/disagree.
    PresentRebuttalToOther,
    /// The other party disagreed and is entering a counter-rebuttal.
    RebuttalInputCounter,
    /// The ultimate ruling is on display; restartable terminal stage.
    UltimateRulingDisplay,
}

impl Stage {
    /// Whether this is the restartable per-cycle terminal stage.
    pub fn is_terminal(self) -> bool {
        matches!(self, Stage::UltimateRulingDisplay)
    }

    /// Stages at which free-text input from a participant is expected.
    pub fn expects_text_input(self) -> bool {
        matches!(
            self,
            Stage::ProblemInputA
                | Stage::ProblemInputB
                | Stage::RebuttalInputActive
                | Stage::RebuttalInputCounter
        )
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::LoadingProfile => "loadingProfile",
            Stage::ProfileIntake => "profileIntake",
            Stage::ProblemInputA => "problemInputA",
            Stage::PerspectiveA => "perspectiveA",
            Stage::ProblemInputB => "problemInputB",
            Stage::PerspectiveB => "perspectiveB",
            Stage::ClarificationIntakeA => "judgeClarificationIntakeA",
            Stage::ClarificationIntakeB => "judgeClarificationIntakeB",
            Stage::InitialRulingDisplay => "judgeFinalRulingDisplay",
            Stage::InitialRulingFeedbackB => "initialRulingFeedbackB",
            Stage::RebuttalInputActive => "rebuttalInputActiveUser",
            Stage::PresentRebuttalToOther => "presentRebuttalToOtherUser",
            Stage::RebuttalInputCounter => "rebuttalInputOtherUserCounter",
            Stage::UltimateRulingDisplay => "judgeUltimateFinalRulingDisplay",
        };
        write!(f, "{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_ultimate_ruling_is_terminal() {
        assert!(Stage::UltimateRulingDisplay.is_terminal());
        assert!(!Stage::InitialRulingDisplay.is_terminal());
        assert!(!Stage::LoadingProfile.is_terminal());
    }

    #[test]
    fn text_input_stages() {
        assert!(Stage::ProblemInputA.expects_text_input());
        assert!(Stage::RebuttalInputCounter.expects_text_input());
        assert!(!Stage::PerspectiveA.expects_text_input());
    }

    #[test]
    fn stage_names_round_trip_through_display() {
        assert_eq!(Stage::ClarificationIntakeA.to_string(), "judgeClarificationIntakeA");
        assert_eq!(
            Stage::UltimateRulingDisplay.to_string(),
            "judgeUltimateFinalRulingDisplay"
        );
    }
}
