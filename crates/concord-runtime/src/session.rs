//! The session controller: one state machine per mediation session.
//!
//! The controller owns the [`SessionData`] aggregate and the current
//! [`Stage`], and is the only thing that mutates either. Every operation
//! follows the same shape: validate stage and inputs first, then run any
//! collaborator calls, then commit results and advance the stage. A failed
//! call commits nothing, so the participant always stays on a retryable
//! screen.
//!
//! ## Key Guarantees
//!
//! - No operation ever advances the stage on a collaborator failure.
//! - At most one collaborator call chain runs at a time; concurrent
//!   requests are rejected with [`SessionError::Busy`], never queued.
//! - Results from a previous problem cycle are discarded, not applied:
//!   every call chain captures the cycle number before awaiting and
//!   checks it before committing.

use concord_core::clarify::parse_clarification_prompts;
use concord_core::extract::{parse_initial_ruling, parse_ultimate_ruling};
use concord_core::stage::Stage;
use concord_core::types::{
    ClarificationAnswer, Party, Perspective, Profile, RebuttalResponse, SessionData,
};
use thiserror::Error;

use crate::prompts::{self, PromptSpec};
use crate::providers::{ProviderError, TextGenerator};
use crate::storage::ProfileStore;

/// Errors surfaced to the session driver.
///
/// `Provider` wraps collaborator failures; callers use
/// [`ProviderError::is_auth`] to decide between the credential message and
/// the generic retry message.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("invalid input: {0}")]
    Validation(String),

    #[error("missing required context: {0}")]
    MissingContext(&'static str),

    #[error("another request is already in flight")]
    Busy,

    #[error("operation '{operation}' is not valid in stage {stage}")]
    WrongStage {
        operation: &'static str,
        stage: Stage,
    },

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

/// Drives one mediation session from profile load to ultimate ruling.
pub struct SessionController<G, S> {
    generator: G,
    store: S,
    language: String,
    data: SessionData,
    stage: Stage,
    busy: bool,
    cycle: u64,
}

impl<G: TextGenerator, S: ProfileStore> SessionController<G, S> {
    pub fn new(generator: G, store: S) -> Self {
        Self {
            generator,
            store,
            language: "English".to_string(),
            data: SessionData::default(),
            stage: Stage::LoadingProfile,
            busy: false,
            cycle: 0,
        }
    }

    /// Language name passed to every prompt builder.
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn data(&self) -> &SessionData {
        &self.data
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    /// Whether both parties accepted the initial ruling, in which case the
    /// ultimate ruling text is the initial ruling verbatim.
    pub fn initial_ruling_accepted(&self) -> bool {
        self.data.rebuttal.agreed_by_a == Some(true) && self.data.rebuttal.agreed_by_b == Some(true)
    }

    fn expect_stage(&self, expected: Stage, operation: &'static str) -> Result<(), SessionError> {
        if self.stage != expected {
            return Err(SessionError::WrongStage {
                operation,
                stage: self.stage,
            });
        }
        Ok(())
    }

    fn begin_call(&mut self) -> Result<u64, SessionError> {
        if self.busy {
            return Err(SessionError::Busy);
        }
        self.busy = true;
        Ok(self.cycle)
    }

    async fn generate(&self, spec: &PromptSpec) -> Result<String, SessionError> {
        tracing::debug!(backend = self.generator.name(), stage = %self.stage, "collaborator call");
        self.generator
            .generate(&spec.system, &spec.content, &spec.sampling)
            .await
            .map_err(SessionError::from)
    }

    fn profile(&self) -> Result<Profile, SessionError> {
        self.data
            .profile
            .clone()
            .ok_or(SessionError::MissingContext("complete profile"))
    }

    fn non_empty(text: &str, what: &str) -> Result<String, SessionError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(SessionError::Validation(format!("{what} is empty")));
        }
        Ok(trimmed.to_string())
    }

    /// Load the persisted profile and land on either problem intake or
    /// profile intake. Store failures degrade to "no profile", never fail
    /// the session.
    pub async fn start(&mut self) -> Result<(), SessionError> {
        self.expect_stage(Stage::LoadingProfile, "start")?;
        match self.store.load().await {
            Ok(Some(profile)) if profile.complete => {
                self.data.profile = Some(profile);
                self.stage = Stage::ProblemInputA;
            }
            Ok(_) => self.stage = Stage::ProfileIntake,
            Err(e) => {
                tracing::warn!(error = %e, "profile load failed, starting intake");
                self.stage = Stage::ProfileIntake;
            }
        }
        Ok(())
    }

    /// Accept a profile from intake (or re-intake after an edit), persist
    /// it, and enter a fresh problem cycle.
    pub async fn complete_profile(&mut self, mut profile: Profile) -> Result<(), SessionError> {
        self.expect_stage(Stage::ProfileIntake, "complete_profile")?;
        profile
            .validate()
            .map_err(|e| SessionError::Validation(e.to_string()))?;
        profile.complete = true;

        if let Err(e) = self.store.save(&profile).await {
            tracing::warn!(error = %e, "profile save failed, continuing in memory");
        }

        // A changed profile invalidates any generated content.
        self.data.profile = Some(profile);
        self.data.reset_problem_cycle();
        self.cycle += 1;
        self.stage = Stage::ProblemInputA;
        Ok(())
    }

    /// Return to profile intake with the current profile available for
    /// pre-filling. Cycle data stays until [`Self::complete_profile`]
    /// commits the edit.
    pub fn edit_profile(&mut self) {
        self.stage = Stage::ProfileIntake;
    }

    /// Forget the saved profile and all session data.
    pub async fn reset_profile(&mut self) -> Result<(), SessionError> {
        if let Err(e) = self.store.clear().await {
            tracing::warn!(error = %e, "profile clear failed");
        }
        self.data.profile = None;
        self.data.reset_problem_cycle();
        self.cycle += 1;
        self.stage = Stage::ProfileIntake;
        Ok(())
    }

    /// Record party A's account and generate their articulated perspective.
    ///
    /// The neutral summary of A's account is generated right after; a
    /// summary failure is logged and retried by
    /// [`Self::proceed_to_problem_b`], which will not advance without it.
    pub async fn submit_problem_a(&mut self, text: &str) -> Result<(), SessionError> {
        self.expect_stage(Stage::ProblemInputA, "submit_problem_a")?;
        let text = Self::non_empty(text, "problem description")?;
        let profile = self.profile()?;

        let cycle = self.begin_call()?;
        let spec = prompts::perspective_a(&text, &profile, &self.language);
        let result = self.generate(&spec).await;
        self.busy = false;
        let perspective_text = result?;
        if cycle != self.cycle {
            tracing::warn!("discarding perspective from a previous cycle");
            return Ok(());
        }

        let name = profile.display_name(Party::A).to_string();
        self.data.problem_a = text.clone();
        self.data.perspective_a = Some(Perspective {
            title: format!("{name}'s Perspective"),
            text: perspective_text,
        });
        self.data.summary_a = None;
        self.stage = Stage::PerspectiveA;

        if let Err(e) = self.summarize_problem_a().await {
            tracing::warn!(error = %e, "summary of party A's account failed, will retry before problem B");
        }
        Ok(())
    }

    async fn summarize_problem_a(&mut self) -> Result<(), SessionError> {
        let profile = self.profile()?;
        let name = profile.display_name(Party::A).to_string();
        let cycle = self.begin_call()?;
        let spec = prompts::summarize(
            &self.data.problem_a,
            &format!("{name}'s (Party A's) description of the problem"),
            &profile,
            &self.data.problem_a,
            None,
            &self.language,
        );
        let result = self.generate(&spec).await;
        self.busy = false;
        let summary = result?;
        if cycle == self.cycle {
            self.data.summary_a = Some(summary);
        }
        Ok(())
    }

    /// Advance from A's perspective display to B's problem intake.
    ///
    /// B's perspective prompt needs the neutral summary of A's account, so
    /// a missing summary is retried here and blocks the transition if it
    /// fails again.
    pub async fn proceed_to_problem_b(&mut self) -> Result<(), SessionError> {
        self.expect_stage(Stage::PerspectiveA, "proceed_to_problem_b")?;
        if self.data.summary_a.is_none() {
            self.summarize_problem_a().await?;
        }
        if self.data.summary_a.is_none() {
            return Err(SessionError::MissingContext("summary of party A's account"));
        }
        self.stage = Stage::ProblemInputB;
        Ok(())
    }

    /// Record party B's account and generate their articulated perspective.
    pub async fn submit_problem_b(&mut self, text: &str) -> Result<(), SessionError> {
        self.expect_stage(Stage::ProblemInputB, "submit_problem_b")?;
        let text = Self::non_empty(text, "problem description")?;
        let profile = self.profile()?;
        let perspective_a = self
            .data
            .perspective_a
            .clone()
            .ok_or(SessionError::MissingContext("party A's perspective"))?;
        let summary_a = self
            .data
            .summary_a
            .clone()
            .ok_or(SessionError::MissingContext("summary of party A's account"))?;

        let cycle = self.begin_call()?;
        let spec = prompts::perspective_b(
            &self.data.problem_a,
            &text,
            &profile,
            &perspective_a.text,
            &summary_a,
            &self.language,
        );
        let result = self.generate(&spec).await;
        self.busy = false;
        let perspective_text = result?;
        if cycle != self.cycle {
            tracing::warn!("discarding perspective from a previous cycle");
            return Ok(());
        }

        let name = profile.display_name(Party::B).to_string();
        self.data.problem_b = text;
        self.data.perspective_b = Some(Perspective {
            title: format!("{name}'s Perspective"),
            text: perspective_text,
        });
        self.stage = Stage::PerspectiveB;
        Ok(())
    }

    /// Generate and parse the judge's clarification question sets.
    ///
    /// Parsing never fails: a malformed response degrades to the built-in
    /// question sets inside the parser.
    pub async fn request_clarifications(&mut self) -> Result<(), SessionError> {
        self.expect_stage(Stage::PerspectiveB, "request_clarifications")?;
        let profile = self.profile()?;
        let perspective_a = self
            .data
            .perspective_a
            .clone()
            .ok_or(SessionError::MissingContext("party A's perspective"))?;
        let perspective_b = self
            .data
            .perspective_b
            .clone()
            .ok_or(SessionError::MissingContext("party B's perspective"))?;

        let cycle = self.begin_call()?;
        let spec = prompts::clarification_questions(
            &self.data.problem_a,
            &self.data.problem_b,
            &profile,
            &perspective_a.text,
            &perspective_b.text,
            &self.language,
        );
        let result = self.generate(&spec).await;
        self.busy = false;
        let raw = result?;
        if cycle != self.cycle {
            tracing::warn!("discarding clarifications from a previous cycle");
            return Ok(());
        }

        let prompts = parse_clarification_prompts(
            &raw,
            profile.display_name(Party::A),
            profile.display_name(Party::B),
        );
        self.data.clarifications = Some(prompts);
        self.stage = Stage::ClarificationIntakeA;
        Ok(())
    }

    /// Record one party's clarification answers.
    ///
    /// Party A's submission hands over to party B with no collaborator
    /// call. Party B's submission triggers the initial ruling.
    pub async fn submit_clarification_answers(
        &mut self,
        party: Party,
        answers: Vec<ClarificationAnswer>,
    ) -> Result<(), SessionError> {
        if answers.is_empty() {
            return Err(SessionError::Validation(
                "clarification answers are empty".to_string(),
            ));
        }

        match party {
            Party::A => {
                self.expect_stage(Stage::ClarificationIntakeA, "submit_clarification_answers")?;
                self.data.answers_a = answers;
                self.stage = Stage::ClarificationIntakeB;
                Ok(())
            }
            Party::B => {
                self.expect_stage(Stage::ClarificationIntakeB, "submit_clarification_answers")?;
                if self.data.answers_a.is_empty() {
                    return Err(SessionError::MissingContext("party A's answers"));
                }
                self.data.answers_b = answers;
                self.generate_initial_ruling().await
            }
        }
    }

    async fn generate_initial_ruling(&mut self) -> Result<(), SessionError> {
        let profile = self.profile()?;
        let perspective_a = self
            .data
            .perspective_a
            .clone()
            .ok_or(SessionError::MissingContext("party A's perspective"))?;
        let perspective_b = self
            .data
            .perspective_b
            .clone()
            .ok_or(SessionError::MissingContext("party B's perspective"))?;

        let cycle = self.begin_call()?;
        let spec = prompts::initial_ruling(
            &self.data.problem_a,
            &self.data.problem_b,
            &profile,
            &perspective_a.text,
            &perspective_b.text,
            &self.data.answers_a,
            &self.data.answers_b,
            &self.language,
        );
        let result = self.generate(&spec).await;
        self.busy = false;
        let raw = result?;
        if cycle != self.cycle {
            tracing::warn!("discarding initial ruling from a previous cycle");
            return Ok(());
        }

        self.data.initial_ruling = Some(parse_initial_ruling(&raw));
        self.data.initial_ruling_raw = raw;
        self.stage = Stage::InitialRulingDisplay;
        Ok(())
    }

    /// Record one party's agree/disagree feedback on the initial ruling.
    ///
    /// Party A responds first, during the ruling display. If A agrees the
    /// question passes to B; if both agree, the initial ruling stands
    /// verbatim as the ultimate ruling with no further call. The first
    /// party to disagree becomes the active rebuttal party.
    pub fn respond_to_initial_ruling(
        &mut self,
        party: Party,
        agree: bool,
    ) -> Result<(), SessionError> {
        match party {
            Party::A => {
                self.expect_stage(Stage::InitialRulingDisplay, "respond_to_initial_ruling")?;
                self.data.rebuttal.agreed_by_a = Some(agree);
                if agree {
                    self.stage = Stage::InitialRulingFeedbackB;
                } else {
                    self.data.rebuttal.active_party = Some(Party::A);
                    self.stage = Stage::RebuttalInputActive;
                }
            }
            Party::B => {
                self.expect_stage(Stage::InitialRulingFeedbackB, "respond_to_initial_ruling")?;
                self.data.rebuttal.agreed_by_b = Some(agree);
                if agree {
                    self.data.ultimate_ruling_raw = self.data.initial_ruling_raw.clone();
                    self.data.ultimate_ruling = None;
                    self.stage = Stage::UltimateRulingDisplay;
                } else {
                    self.data.rebuttal.active_party = Some(Party::B);
                    self.stage = Stage::RebuttalInputActive;
                }
            }
        }
        Ok(())
    }

    /// Record the active party's rebuttal and summarize it for
    /// presentation to the other party.
    ///
    /// A failed summary commits nothing: the stage stays on the rebuttal
    /// input and the same submission can be retried.
    pub async fn submit_rebuttal(&mut self, text: &str) -> Result<(), SessionError> {
        self.expect_stage(Stage::RebuttalInputActive, "submit_rebuttal")?;
        let text = Self::non_empty(text, "rebuttal")?;
        let profile = self.profile()?;
        let active = self
            .data
            .rebuttal
            .active_party
            .ok_or(SessionError::MissingContext("active rebuttal party"))?;

        let name = profile.display_name(active).to_string();
        let cycle = self.begin_call()?;
        let spec = prompts::summarize(
            &text,
            &format!("{name}'s rebuttal points against the initial ruling"),
            &profile,
            &self.data.problem_a,
            Some(&self.data.problem_b),
            &self.language,
        );
        let result = self.generate(&spec).await;
        self.busy = false;
        let summary = result?;
        if cycle != self.cycle {
            tracing::warn!("discarding rebuttal summary from a previous cycle");
            return Ok(());
        }

        self.data.rebuttal.active_raw = text;
        self.data.rebuttal.active_summary = Some(summary);
        self.stage = Stage::PresentRebuttalToOther;
        Ok(())
    }

    /// Record the other party's response to the presented rebuttal.
    ///
    /// Agreement goes straight to the ultimate ruling with the active
    /// party's points as the only rebuttal slot; disagreement opens the
    /// counter-rebuttal. A disagreement with no stored summary also goes
    /// direct, since there is nothing to counter. `submit_rebuttal` never
    /// commits without a summary, so that branch is a guard, not a path.
    pub async fn respond_to_rebuttal(
        &mut self,
        response: RebuttalResponse,
    ) -> Result<(), SessionError> {
        self.expect_stage(Stage::PresentRebuttalToOther, "respond_to_rebuttal")?;
        let active = self
            .data
            .rebuttal
            .active_party
            .ok_or(SessionError::MissingContext("active rebuttal party"))?;
        self.data.rebuttal.other_response = Some(response);

        if response == RebuttalResponse::Disagree && self.data.rebuttal.active_summary.is_some() {
            self.stage = Stage::RebuttalInputCounter;
            return Ok(());
        }

        let active_points = self.rebuttal_points_for(active);
        let (rebuttal_a, rebuttal_b) = match active {
            Party::A => (active_points, None),
            Party::B => (None, active_points),
        };
        self.generate_ultimate_ruling(rebuttal_a, rebuttal_b).await
    }

    /// Record the counter-rebuttal and generate the ultimate ruling with
    /// both parties' points in their own slots.
    pub async fn submit_counter_rebuttal(&mut self, text: &str) -> Result<(), SessionError> {
        self.expect_stage(Stage::RebuttalInputCounter, "submit_counter_rebuttal")?;
        let text = Self::non_empty(text, "counter-rebuttal")?;
        let profile = self.profile()?;
        let active = self
            .data
            .rebuttal
            .active_party
            .ok_or(SessionError::MissingContext("active rebuttal party"))?;
        let counter_party = active.other();

        let name = profile.display_name(counter_party).to_string();
        let cycle = self.begin_call()?;
        let spec = prompts::summarize(
            &text,
            &format!("{name}'s counter-rebuttal points"),
            &profile,
            &self.data.problem_a,
            Some(&self.data.problem_b),
            &self.language,
        );
        let result = self.generate(&spec).await;
        self.busy = false;
        let summary = result?;
        if cycle != self.cycle {
            tracing::warn!("discarding counter-rebuttal summary from a previous cycle");
            return Ok(());
        }

        self.data.rebuttal.counter_raw = text;
        self.data.rebuttal.counter_summary = Some(summary);

        let active_points = self.rebuttal_points_for(active);
        let counter_points = self.rebuttal_points_for(counter_party);
        let (rebuttal_a, rebuttal_b) = match active {
            Party::A => (active_points, counter_points),
            Party::B => (counter_points, active_points),
        };
        self.generate_ultimate_ruling(rebuttal_a, rebuttal_b).await
    }

    /// The content that represents a party's rebuttal in the ultimate
    /// ruling prompt: the summary when available, the raw text otherwise.
    fn rebuttal_points_for(&self, party: Party) -> Option<String> {
        let rebuttal = &self.data.rebuttal;
        let (summary, raw) = if Some(party) == rebuttal.active_party {
            (&rebuttal.active_summary, &rebuttal.active_raw)
        } else {
            (&rebuttal.counter_summary, &rebuttal.counter_raw)
        };
        summary
            .clone()
            .or_else(|| (!raw.is_empty()).then(|| raw.clone()))
    }

    async fn generate_ultimate_ruling(
        &mut self,
        rebuttal_a: Option<String>,
        rebuttal_b: Option<String>,
    ) -> Result<(), SessionError> {
        let profile = self.profile()?;
        let perspective_a = self
            .data
            .perspective_a
            .clone()
            .ok_or(SessionError::MissingContext("party A's perspective"))?;
        let perspective_b = self
            .data
            .perspective_b
            .clone()
            .ok_or(SessionError::MissingContext("party B's perspective"))?;

        let cycle = self.begin_call()?;
        let spec = prompts::ultimate_ruling(
            &profile,
            &self.data.problem_a,
            &self.data.problem_b,
            &perspective_a.text,
            &perspective_b.text,
            &self.data.answers_a,
            &self.data.answers_b,
            &self.data.initial_ruling_raw,
            rebuttal_a.as_deref(),
            rebuttal_b.as_deref(),
            &self.language,
        );
        let result = self.generate(&spec).await;
        self.busy = false;
        let raw = result?;
        if cycle != self.cycle {
            tracing::warn!("discarding ultimate ruling from a previous cycle");
            return Ok(());
        }

        self.data.ultimate_ruling = Some(parse_ultimate_ruling(&raw));
        self.data.ultimate_ruling_raw = raw;
        self.stage = Stage::UltimateRulingDisplay;
        Ok(())
    }

    /// Begin a new problem cycle with the same profile.
    pub fn start_new_analysis(&mut self) -> Result<(), SessionError> {
        self.expect_stage(Stage::UltimateRulingDisplay, "start_new_analysis")?;
        self.data.reset_problem_cycle();
        self.cycle += 1;
        self.stage = if self.data.profile.is_some() {
            Stage::ProblemInputA
        } else {
            Stage::ProfileIntake
        };
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::SamplingConfig;
    use crate::storage::MemoryStore;
    use async_trait::async_trait;
    use concord_core::clarify::{
        set_start_marker, INTRO_MARKER, OUTRO_MARKER, QUESTION_MARKER, SET_A_END, SET_B_END,
        SUGGESTION_A_MARKER, SUGGESTION_B_MARKER, SUGGESTION_C_MARKER,
    };
    use concord_core::extract::{
        INITIAL_ANALYSIS_MARKER, INITIAL_RECOMMENDATIONS_MARKER, INITIAL_SUMMARY_MARKER,
        ULTIMATE_PRIMARY_MARKER, ULTIMATE_REASONING_MARKER, ULTIMATE_SECONDARY_MARKER,
        ULTIMATE_VERDICT_MARKER,
    };
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Scripted collaborator: pops one canned result per call and records
    /// every prompt it was given.
    #[derive(Default)]
    struct MockProvider {
        responses: Mutex<VecDeque<Result<String, ProviderError>>>,
        calls: Mutex<Vec<(String, String)>>,
    }

    impl MockProvider {
        fn push(&self, response: Result<String, ProviderError>) {
            self.responses
                .lock()
                .unwrap()
                .push_back(response);
        }

        fn push_ok(&self, text: &str) {
            self.push(Ok(text.to_string()));
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }

        fn last_content(&self) -> String {
            self.calls.lock().unwrap().last().unwrap().1.clone()
        }
    }

    #[async_trait]
    impl TextGenerator for &MockProvider {
        async fn generate(
            &self,
            system_instruction: &str,
            content: &str,
            _sampling: &SamplingConfig,
        ) -> Result<String, ProviderError> {
            self.calls
                .lock()
                .unwrap()
                .push((system_instruction.to_string(), content.to_string()));
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(ProviderError::EmptyResponse))
        }

        fn name(&self) -> &str {
            "mock"
        }
    }

    fn profile() -> Profile {
        let mut profile = Profile {
            complete: true,
            ..Profile::default()
        };
        profile.party_a.name = "Mira".to_string();
        profile.party_b.name = "Sam".to_string();
        profile
    }

    fn clarification_raw() -> String {
        let mut raw = format!("{INTRO_MARKER}\nWelcome, Mira and Sam.\n\n");
        for (start, end, name) in [
            (set_start_marker(Party::A, "Mira"), SET_A_END, "Mira"),
            (set_start_marker(Party::B, "Sam"), SET_B_END, "Sam"),
        ] {
            raw.push_str(&format!("{start}\n"));
            for i in 1..=3 {
                raw.push_str(&format!(
                    "{QUESTION_MARKER}\n{name}, question {i}?\n\
                     {SUGGESTION_A_MARKER}\nOption a{i}\n\
                     {SUGGESTION_B_MARKER}\nOption b{i}\n\
                     {SUGGESTION_C_MARKER}\nOption c{i}\n"
                ));
            }
            raw.push_str(&format!("{end}\n\n"));
        }
        raw.push_str(&format!("{OUTRO_MARKER}\nThank you both."));
        raw
    }

    fn initial_ruling_raw() -> String {
        format!(
            "{INITIAL_SUMMARY_MARKER}\nThe core issue is chores.\n\
             {INITIAL_ANALYSIS_MARKER}\nBoth contribute.\n\
             {INITIAL_RECOMMENDATIONS_MARKER}\n- Talk weekly."
        )
    }

    fn ultimate_ruling_raw() -> String {
        format!(
            "{ULTIMATE_VERDICT_MARKER}\nShared responsibility.\n\
             {ULTIMATE_PRIMARY_MARKER}\n- Split the chores.\n\
             {ULTIMATE_SECONDARY_MARKER}\n- Weekly check-in.\n\
             {ULTIMATE_REASONING_MARKER}\nThe rebuttal did not change the weighing."
        )
    }

    fn answers_for(prompts: &concord_core::types::ClarificationPrompts, party: Party) -> Vec<ClarificationAnswer> {
        prompts
            .questions_for(party)
            .iter()
            .map(|q| ClarificationAnswer::chosen(q, concord_core::types::AnswerChoice::A))
            .collect()
    }

    async fn controller_with_profile(
        provider: &MockProvider,
    ) -> SessionController<&MockProvider, MemoryStore> {
        let mut controller =
            SessionController::new(provider, MemoryStore::with_profile(profile()));
        controller.start().await.unwrap();
        assert_eq!(controller.stage(), Stage::ProblemInputA);
        controller
    }

    /// Walk a controller up to the initial ruling display.
    async fn advance_to_initial_ruling(
        provider: &MockProvider,
    ) -> SessionController<&MockProvider, MemoryStore> {
        let mut controller = controller_with_profile(provider).await;

        provider.push_ok("I feel unheard about the chores.");
        provider.push_ok("Mira feels the chores fall on her.");
        controller.submit_problem_a("He never helps with chores").await.unwrap();
        controller.proceed_to_problem_b().await.unwrap();

        provider.push_ok("I feel my long hours go unseen.");
        controller.submit_problem_b("She ignores how much I work").await.unwrap();

        provider.push_ok(&clarification_raw());
        controller.request_clarifications().await.unwrap();
        assert_eq!(controller.stage(), Stage::ClarificationIntakeA);

        let prompts = controller.data().clarifications.clone().unwrap();
        controller
            .submit_clarification_answers(Party::A, answers_for(&prompts, Party::A))
            .await
            .unwrap();
        assert_eq!(controller.stage(), Stage::ClarificationIntakeB);

        provider.push_ok(&initial_ruling_raw());
        controller
            .submit_clarification_answers(Party::B, answers_for(&prompts, Party::B))
            .await
            .unwrap();
        assert_eq!(controller.stage(), Stage::InitialRulingDisplay);
        controller
    }

    #[tokio::test]
    async fn start_without_profile_enters_intake() {
        let provider = MockProvider::default();
        let mut controller = SessionController::new(&provider, MemoryStore::new());
        controller.start().await.unwrap();
        assert_eq!(controller.stage(), Stage::ProfileIntake);
    }

    #[tokio::test]
    async fn incomplete_profile_is_rejected_at_intake() {
        let provider = MockProvider::default();
        let mut controller = SessionController::new(&provider, MemoryStore::new());
        controller.start().await.unwrap();

        let result = controller.complete_profile(Profile::default()).await;
        assert!(matches!(result, Err(SessionError::Validation(_))));
        assert_eq!(controller.stage(), Stage::ProfileIntake);

        controller.complete_profile(profile()).await.unwrap();
        assert_eq!(controller.stage(), Stage::ProblemInputA);
    }

    #[tokio::test]
    async fn empty_problem_text_never_changes_stage_or_calls_out() {
        let provider = MockProvider::default();
        let mut controller = controller_with_profile(&provider).await;

        let result = controller.submit_problem_a("   \n  ").await;
        assert!(matches!(result, Err(SessionError::Validation(_))));
        assert_eq!(controller.stage(), Stage::ProblemInputA);
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn provider_failure_leaves_stage_unchanged_and_retryable() {
        let provider = MockProvider::default();
        let mut controller = controller_with_profile(&provider).await;

        provider.push(Err(ProviderError::Http("connection refused".into())));
        let result = controller.submit_problem_a("He never helps").await;
        assert!(matches!(result, Err(SessionError::Provider(_))));
        assert_eq!(controller.stage(), Stage::ProblemInputA);
        assert!(!controller.is_busy());

        provider.push_ok("I feel unheard.");
        provider.push_ok("A summary.");
        controller.submit_problem_a("He never helps").await.unwrap();
        assert_eq!(controller.stage(), Stage::PerspectiveA);
    }

    #[tokio::test]
    async fn auth_failure_is_distinguishable() {
        let provider = MockProvider::default();
        let mut controller = controller_with_profile(&provider).await;

        provider.push(Err(ProviderError::Auth));
        let result = controller.submit_problem_a("He never helps").await;
        match result {
            Err(SessionError::Provider(e)) => assert!(e.is_auth()),
            other => panic!("expected provider error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_summary_blocks_problem_b_until_retried() {
        let provider = MockProvider::default();
        let mut controller = controller_with_profile(&provider).await;

        provider.push_ok("I feel unheard.");
        provider.push(Err(ProviderError::EmptyResponse));
        controller.submit_problem_a("He never helps").await.unwrap();
        assert_eq!(controller.stage(), Stage::PerspectiveA);
        assert!(controller.data().summary_a.is_none());

        // Retry fails again: still stuck on the perspective display.
        provider.push(Err(ProviderError::EmptyResponse));
        assert!(controller.proceed_to_problem_b().await.is_err());
        assert_eq!(controller.stage(), Stage::PerspectiveA);

        provider.push_ok("Mira feels the chores fall on her.");
        controller.proceed_to_problem_b().await.unwrap();
        assert_eq!(controller.stage(), Stage::ProblemInputB);
    }

    #[tokio::test]
    async fn busy_controller_rejects_instead_of_queueing() {
        let provider = MockProvider::default();
        let mut controller = controller_with_profile(&provider).await;

        controller.busy = true;
        let result = controller.submit_problem_a("He never helps").await;
        assert!(matches!(result, Err(SessionError::Busy)));
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn answers_for_b_require_answers_from_a() {
        let provider = MockProvider::default();
        let mut controller = controller_with_profile(&provider).await;
        controller.stage = Stage::ClarificationIntakeB;

        let question = concord_core::types::ClarificationQuestion {
            question_text: "Sam, what changed?".to_string(),
            suggestions: Default::default(),
        };
        let answers = vec![ClarificationAnswer::skipped(&question)];
        let result = controller
            .submit_clarification_answers(Party::B, answers)
            .await;
        assert!(matches!(result, Err(SessionError::MissingContext(_))));
        assert_eq!(controller.stage(), Stage::ClarificationIntakeB);
    }

    #[tokio::test]
    async fn both_agree_path_reuses_the_initial_ruling_verbatim() {
        let provider = MockProvider::default();
        let mut controller = advance_to_initial_ruling(&provider).await;
        let calls_before = provider.call_count();

        controller.respond_to_initial_ruling(Party::A, true).unwrap();
        assert_eq!(controller.stage(), Stage::InitialRulingFeedbackB);
        controller.respond_to_initial_ruling(Party::B, true).unwrap();

        assert_eq!(controller.stage(), Stage::UltimateRulingDisplay);
        assert!(controller.initial_ruling_accepted());
        assert_eq!(
            controller.data().ultimate_ruling_raw,
            controller.data().initial_ruling_raw
        );
        assert_eq!(provider.call_count(), calls_before);
    }

    #[tokio::test]
    async fn single_rebuttal_path_reaches_the_ultimate_ruling() {
        let provider = MockProvider::default();
        let mut controller = advance_to_initial_ruling(&provider).await;

        controller.respond_to_initial_ruling(Party::A, true).unwrap();
        controller.respond_to_initial_ruling(Party::B, false).unwrap();
        assert_eq!(controller.stage(), Stage::RebuttalInputActive);
        assert_eq!(controller.data().rebuttal.active_party, Some(Party::B));

        provider.push_ok("Sam argues the hours were never acknowledged.");
        controller
            .submit_rebuttal("The ruling ignores my overtime")
            .await
            .unwrap();
        assert_eq!(controller.stage(), Stage::PresentRebuttalToOther);

        provider.push_ok(&ultimate_ruling_raw());
        controller
            .respond_to_rebuttal(RebuttalResponse::Agree)
            .await
            .unwrap();
        assert_eq!(controller.stage(), Stage::UltimateRulingDisplay);

        // B's summary fills B's slot; A actively submitted nothing.
        let content = provider.last_content();
        assert!(content.contains("Sam argues the hours were never acknowledged."));
        assert!(content.contains("No rebuttal points were actively submitted"));

        let sections = controller.data().ultimate_ruling.as_ref().unwrap();
        assert_eq!(sections.verdict, "Shared responsibility.");
        assert!(!sections.fallback);
    }

    #[tokio::test]
    async fn counter_rebuttal_path_fills_both_slots_correctly() {
        let provider = MockProvider::default();
        let mut controller = advance_to_initial_ruling(&provider).await;

        // A disagrees first, so A is the active rebuttal party.
        controller.respond_to_initial_ruling(Party::A, false).unwrap();
        assert_eq!(controller.data().rebuttal.active_party, Some(Party::A));

        provider.push_ok("Mira maintains the workload split is unfair.");
        controller.submit_rebuttal("The analysis understates my load").await.unwrap();

        controller
            .respond_to_rebuttal(RebuttalResponse::Disagree)
            .await
            .unwrap();
        assert_eq!(controller.stage(), Stage::RebuttalInputCounter);

        provider.push_ok("Sam counters that weekends are already his.");
        provider.push_ok(&ultimate_ruling_raw());
        controller
            .submit_counter_rebuttal("I already take the weekends")
            .await
            .unwrap();
        assert_eq!(controller.stage(), Stage::UltimateRulingDisplay);

        let content = provider.last_content();
        let a_pos = content
            .find("Mira maintains the workload split is unfair.")
            .expect("A's summary in A's slot");
        let b_pos = content
            .find("Sam counters that weekends are already his.")
            .expect("B's summary in B's slot");
        assert!(a_pos < b_pos, "party A's slot precedes party B's");
    }

    #[tokio::test]
    async fn failed_rebuttal_summary_keeps_the_stage_and_is_retryable() {
        let provider = MockProvider::default();
        let mut controller = advance_to_initial_ruling(&provider).await;

        controller.respond_to_initial_ruling(Party::A, false).unwrap();

        provider.push(Err(ProviderError::Http("connection refused".into())));
        let result = controller.submit_rebuttal("The analysis understates my load").await;
        assert!(matches!(result, Err(SessionError::Provider(_))));
        assert_eq!(controller.stage(), Stage::RebuttalInputActive);
        assert!(controller.data().rebuttal.active_raw.is_empty());
        assert!(controller.data().rebuttal.active_summary.is_none());
        assert!(!controller.is_busy());

        provider.push_ok("Mira maintains the workload split is unfair.");
        controller.submit_rebuttal("The analysis understates my load").await.unwrap();
        assert_eq!(controller.stage(), Stage::PresentRebuttalToOther);
        assert!(controller.data().rebuttal.active_summary.is_some());
    }

    #[tokio::test]
    async fn failed_counter_summary_keeps_the_counter_stage_and_is_retryable() {
        let provider = MockProvider::default();
        let mut controller = advance_to_initial_ruling(&provider).await;

        controller.respond_to_initial_ruling(Party::A, false).unwrap();
        provider.push_ok("Mira maintains the workload split is unfair.");
        controller.submit_rebuttal("The analysis understates my load").await.unwrap();
        controller
            .respond_to_rebuttal(RebuttalResponse::Disagree)
            .await
            .unwrap();
        assert_eq!(controller.stage(), Stage::RebuttalInputCounter);

        provider.push(Err(ProviderError::EmptyResponse));
        let result = controller.submit_counter_rebuttal("I already take the weekends").await;
        assert!(matches!(result, Err(SessionError::Provider(_))));
        assert_eq!(controller.stage(), Stage::RebuttalInputCounter);
        assert!(controller.data().rebuttal.counter_raw.is_empty());
        assert!(controller.data().rebuttal.counter_summary.is_none());

        provider.push_ok("Sam counters that weekends are already his.");
        provider.push_ok(&ultimate_ruling_raw());
        controller
            .submit_counter_rebuttal("I already take the weekends")
            .await
            .unwrap();
        assert_eq!(controller.stage(), Stage::UltimateRulingDisplay);
    }

    #[tokio::test]
    async fn absent_summary_guard_goes_direct_with_the_raw_rebuttal() {
        let provider = MockProvider::default();
        let mut controller = advance_to_initial_ruling(&provider).await;

        controller.respond_to_initial_ruling(Party::A, false).unwrap();
        provider.push_ok("Mira maintains the workload split is unfair.");
        controller.submit_rebuttal("The analysis understates my load").await.unwrap();
        assert_eq!(controller.stage(), Stage::PresentRebuttalToOther);

        // The guard branch: no summary on record means there is nothing to
        // counter, so even a disagreement goes direct to the ultimate
        // ruling with the raw rebuttal in A's slot.
        controller.data.rebuttal.active_summary = None;
        provider.push_ok(&ultimate_ruling_raw());
        controller
            .respond_to_rebuttal(RebuttalResponse::Disagree)
            .await
            .unwrap();
        assert_eq!(controller.stage(), Stage::UltimateRulingDisplay);
        assert!(provider.last_content().contains("The analysis understates my load"));
    }

    #[tokio::test]
    async fn start_new_analysis_keeps_profile_and_clears_the_cycle() {
        let provider = MockProvider::default();
        let mut controller = advance_to_initial_ruling(&provider).await;
        controller.respond_to_initial_ruling(Party::A, true).unwrap();
        controller.respond_to_initial_ruling(Party::B, true).unwrap();

        controller.start_new_analysis().unwrap();
        assert_eq!(controller.stage(), Stage::ProblemInputA);
        let data = controller.data();
        assert!(data.profile.is_some());
        assert!(data.problem_a.is_empty());
        assert!(data.initial_ruling_raw.is_empty());
        assert!(data.ultimate_ruling.is_none());
        assert_eq!(data.rebuttal, Default::default());
    }

    #[tokio::test]
    async fn operations_out_of_stage_are_rejected() {
        let provider = MockProvider::default();
        let mut controller = controller_with_profile(&provider).await;

        assert!(matches!(
            controller.proceed_to_problem_b().await,
            Err(SessionError::WrongStage { .. })
        ));
        assert!(matches!(
            controller.start_new_analysis(),
            Err(SessionError::WrongStage { .. })
        ));
        assert!(matches!(
            controller.respond_to_initial_ruling(Party::A, true),
            Err(SessionError::WrongStage { .. })
        ));
        assert_eq!(controller.stage(), Stage::ProblemInputA);
    }

    #[tokio::test]
    async fn reset_profile_clears_store_and_returns_to_intake() {
        let provider = MockProvider::default();
        let mut controller = controller_with_profile(&provider).await;

        controller.reset_profile().await.unwrap();
        assert_eq!(controller.stage(), Stage::ProfileIntake);
        assert!(controller.data().profile.is_none());
    }

    #[tokio::test]
    async fn malformed_clarifications_degrade_to_fallback_questions() {
        let provider = MockProvider::default();
        let mut controller = controller_with_profile(&provider).await;

        provider.push_ok("I feel unheard.");
        provider.push_ok("A summary.");
        controller.submit_problem_a("He never helps").await.unwrap();
        controller.proceed_to_problem_b().await.unwrap();
        provider.push_ok("I feel unseen.");
        controller.submit_problem_b("She ignores my work").await.unwrap();

        provider.push_ok("The judge rambled with no markers at all.");
        controller.request_clarifications().await.unwrap();
        assert_eq!(controller.stage(), Stage::ClarificationIntakeA);

        let prompts = controller.data().clarifications.as_ref().unwrap();
        assert!(prompts.questions_for(Party::A).len() >= 3);
        assert!(prompts.questions_for(Party::B).len() >= 3);
    }
}
