//! Prompt construction for the six generation calls a session makes.
//!
//! Wording here is presentation; the structural markers are not. The
//! clarification and ruling prompts embed the exact English marker strings
//! the parsers in `concord-core` scan for, so those constants are imported
//! rather than restated. Each builder carries the sampling constants tuned
//! for its call: role-play runs warm, summaries and rulings run cool.

use concord_core::clarify::{
    set_start_marker, QUESTION_MARKER, SET_A_END, SET_B_END, SUGGESTION_A_MARKER,
    SUGGESTION_B_MARKER, SUGGESTION_C_MARKER,
};
use concord_core::extract::{
    INITIAL_ANALYSIS_MARKER, INITIAL_RECOMMENDATIONS_MARKER, INITIAL_SUMMARY_MARKER,
    ULTIMATE_PRIMARY_MARKER, ULTIMATE_REASONING_MARKER, ULTIMATE_SECONDARY_MARKER,
    ULTIMATE_VERDICT_MARKER,
};
use concord_core::clarify::{INTRO_MARKER, OUTRO_MARKER};
use concord_core::types::{AnswerChoice, ClarificationAnswer, Party, Profile};

use crate::providers::SamplingConfig;

/// One fully-assembled generation call: instruction, content, sampling.
#[derive(Debug, Clone)]
pub struct PromptSpec {
    pub system: String,
    pub content: String,
    pub sampling: SamplingConfig,
}

const PERSPECTIVE_A_SAMPLING: SamplingConfig = SamplingConfig {
    temperature: 0.75,
    top_p: 0.9,
    top_k: 35,
    max_output_tokens: 2048,
};

const PERSPECTIVE_B_SAMPLING: SamplingConfig = SamplingConfig {
    temperature: 0.8,
    top_p: 0.9,
    top_k: 40,
    max_output_tokens: 2048,
};

const CLARIFICATION_SAMPLING: SamplingConfig = SamplingConfig {
    temperature: 0.7,
    top_p: 0.85,
    top_k: 38,
    max_output_tokens: 4096,
};

const INITIAL_RULING_SAMPLING: SamplingConfig = SamplingConfig {
    temperature: 0.55,
    top_p: 0.7,
    top_k: 20,
    max_output_tokens: 4096,
};

const SUMMARY_SAMPLING: SamplingConfig = SamplingConfig {
    temperature: 0.3,
    top_p: 0.8,
    top_k: 15,
    max_output_tokens: 512,
};

const ULTIMATE_RULING_SAMPLING: SamplingConfig = SamplingConfig {
    temperature: 0.45,
    top_p: 0.75,
    top_k: 25,
    max_output_tokens: 4096,
};

fn or_not_specified(value: &str) -> &str {
    if value.trim().is_empty() {
        "Not specified"
    } else {
        value
    }
}

/// Render the full profile block shared by every prompt.
pub fn format_profile(profile: &Profile) -> String {
    let a = &profile.party_a;
    let b = &profile.party_b;
    let rel = &profile.relationship;
    let children = if rel.has_children {
        or_not_specified(&rel.children_details)
    } else {
        "N/A"
    };
    format!(
        "Full Context for the Analysis:\n\n\
         Party A's Profile:\n\
         - Name: {}\n- Gender: {}\n- Age: {}\n- Country: {}\n- City: {}\n\
         - Religion/Beliefs: {}\n- Occupation: {}\n- Work Hours: {}\n\
         - Stress Level: {}\n- Financial Situation: {}\n\n\
         Party B's Profile:\n\
         - Name: {}\n- Gender: {}\n- Age: {}\n- Country: {}\n- City: {}\n\
         - Religion/Beliefs: {}\n- Occupation: {}\n- Work Hours: {}\n\
         - Stress Level: {}\n- Financial Situation: {}\n\n\
         Home and Relationship Context:\n\
         - Relationship Duration: {}\n\
         - Has Children: {}\n\
         - Children Details: {}\n\
         - Key Recurring Issues/Themes in Relationship: {}",
        or_not_specified(&profile.display_name(Party::A)),
        or_not_specified(&a.gender),
        or_not_specified(&a.age),
        or_not_specified(&a.country),
        or_not_specified(&a.city),
        or_not_specified(&a.beliefs),
        or_not_specified(&a.occupation),
        or_not_specified(&a.work_load),
        or_not_specified(&a.stress_level),
        or_not_specified(&a.financial_situation),
        or_not_specified(&profile.display_name(Party::B)),
        or_not_specified(&b.gender),
        or_not_specified(&b.age),
        or_not_specified(&b.country),
        or_not_specified(&b.city),
        or_not_specified(&b.beliefs),
        or_not_specified(&b.occupation),
        or_not_specified(&b.work_load),
        or_not_specified(&b.stress_level),
        or_not_specified(&b.financial_situation),
        or_not_specified(&rel.duration),
        if rel.has_children { "Yes" } else { "No" },
        children,
        or_not_specified(&rel.recurring_issues),
    )
}

/// Role-play prompt for party A's perspective.
pub fn perspective_a(problem_a: &str, profile: &Profile, language: &str) -> PromptSpec {
    let name = profile.display_name(Party::A);
    let system = format!(
        "You are an AI tasked with embodying {name} (Party A).\n\
         Articulate {name}'s perspective, feelings, and concerns regarding the specific problem \
         they described, based solely on their profile and the problem itself.\n\
         Speak in the first person, as if you ARE {name}. Reflect their likely emotional state, \
         their understanding of the issue, and what they might be hoping for or fearing.\n\
         Consider their age, gender, occupation, work hours, stress level, financial situation, \
         and cultural context. If they have children, consider how that shapes their view.\n\
         Do not offer solutions or advice. Structure the response as a personal narrative \
         focused on \"I feel\", \"I think\", \"I'm concerned about\".\n\
         IMPORTANT: Your entire response MUST be in {language}."
    );
    let content = format!(
        "{}\n\nThe Specific Problem {name} (Party A) is facing and has described:\n{problem_a}\n\n\
         Now, embody {name} (Party A) and describe their perspective on this problem in {language}:",
        format_profile(profile)
    );
    PromptSpec {
        system,
        content,
        sampling: PERSPECTIVE_A_SAMPLING,
    }
}

/// Role-play prompt for party B's perspective.
///
/// Opens by presenting the neutral summary of A's complaint to B, then
/// embodies B based on B's own account.
pub fn perspective_b(
    problem_a: &str,
    problem_b: &str,
    profile: &Profile,
    perspective_a_text: &str,
    summary_a: &str,
    language: &str,
) -> PromptSpec {
    let name_a = profile.display_name(Party::A);
    let name_b = profile.display_name(Party::B);
    let system = format!(
        "You are an AI facilitator addressing {name_b} (Party B), then embodying them.\n\
         1. Present {name_a}'s concern first, summarized as: \"{summary_a}\", and ask {name_b} \
         for their understanding of why this might be happening.\n\
         2. Then embody {name_b}: articulate their perspective, feelings, and concerns in the \
         first person, based solely on their profile AND THEIR OWN description of the problem.\n\
         Critically consider {name_b}'s age, gender, occupation, work hours, stress level, \
         financial situation, cultural context, and any children.\n\
         Do not offer solutions or advice. Keep the embodied part a personal narrative focused \
         on \"I feel\", \"I think\", \"I'm concerned about\" from {name_b}'s point of view.\n\
         You have {name_a}'s full account and articulated perspective for background only; \
         {name_b}'s embodied response must stem primarily from THEIR OWN inputs.\n\
         IMPORTANT: Your entire response MUST be in {language}."
    );
    let content = format!(
        "{}\n\n{name_a}'s (Party A's) Original Description of the Problem:\n{problem_a}\n\n\
         Summary of {name_a}'s Complaint (to be presented to {name_b}):\n{summary_a}\n\n\
         {name_b}'s (Party B's) OWN Description of the Problem:\n{problem_b}\n\n\
         {name_a}'s Full Articulated Perspective (background context only):\n{perspective_a_text}\n\n\
         Now, present {name_a}'s summarized complaint to {name_b}, ask for their view, then embody \
         {name_b} and describe their perspective in {language}.",
        format_profile(profile)
    );
    PromptSpec {
        system,
        content,
        sampling: PERSPECTIVE_B_SAMPLING,
    }
}

/// Judge prompt generating the clarification question sets.
///
/// The embedded markers are load-bearing: `concord_core::clarify` scans
/// for exactly these strings.
pub fn clarification_questions(
    problem_a: &str,
    problem_b: &str,
    profile: &Profile,
    perspective_a_text: &str,
    perspective_b_text: &str,
    language: &str,
) -> PromptSpec {
    let name_a = profile.display_name(Party::A);
    let name_b = profile.display_name(Party::B);
    let set_a_start = set_start_marker(Party::A, name_a);
    let set_b_start = set_start_marker(Party::B, name_b);
    let system = format!(
        "You are the AI Judge in the preliminary clarification phase. Generate:\n\
         1. An introductory statement addressing both parties.\n\
         2. EXACTLY 3 specific, insightful clarification questions FOR {name_a} (Party A). Each \
         question must include {name_a}'s name and provide THREE distinct suggested answers.\n\
         3. EXACTLY 3 such questions FOR {name_b} (Party B), likewise named, each with three \
         suggested answers.\n\
         4. A concluding statement addressing both parties.\n\n\
         You MUST structure the response with these exact English structural markers; all content \
         WITHIN the markers must be in {language}.\n\n\
         {INTRO_MARKER}\n...\n\n\
         {set_a_start}\n\
         {QUESTION_MARKER}\n...\n{SUGGESTION_A_MARKER}\n...\n{SUGGESTION_B_MARKER}\n...\n{SUGGESTION_C_MARKER}\n...\n\
         (repeat for each of the 3 questions)\n\
         {SET_A_END}\n\n\
         {set_b_start}\n\
         {QUESTION_MARKER}\n...\n{SUGGESTION_A_MARKER}\n...\n{SUGGESTION_B_MARKER}\n...\n{SUGGESTION_C_MARKER}\n...\n\
         (repeat for each of the 3 questions)\n\
         {SET_B_END}\n\n\
         {OUTRO_MARKER}\n...\n\n\
         Make the questions highly specific to both problem descriptions, both profiles, and the \
         articulated perspectives. Phrase questions neutrally; the suggested answers must be \
         distinct, plausible responses or feelings."
    );
    let content = format!(
        "{}\n\n{name_a}'s (Party A's) Description of the Problem:\n{problem_a}\n\n\
         {name_b}'s (Party B's) Description of the Problem:\n{problem_b}\n\n\
         {name_a}'s Articulated Perspective (role-play):\n{perspective_a_text}\n\n\
         {name_b}'s Articulated Perspective (role-play):\n{perspective_b_text}\n\n\
         Now generate the introductory statement, 3 questions for {name_a}, 3 questions for \
         {name_b} (each with suggested answers A, B, C), and the concluding statement, following \
         the output format EXACTLY.",
        format_profile(profile)
    );
    PromptSpec {
        system,
        content,
        sampling: CLARIFICATION_SAMPLING,
    }
}

/// Render one clarification answer as a prompt transcript line.
pub fn format_answer(answer: &ClarificationAnswer) -> String {
    let mut line = format!("Q: {}\nA: ", answer.question_text);
    match answer.choice {
        AnswerChoice::Skipped => line.push_str("(Skipped)"),
        AnswerChoice::D if !answer.custom_text.is_empty() => {
            line.push_str(&format!("Other - {}", answer.custom_text))
        }
        AnswerChoice::D => line.push_str("Other (No specification provided)"),
        choice if !answer.chosen_text.is_empty() => {
            line.push_str(&format!("{choice} - {}", answer.chosen_text))
        }
        choice => line.push_str(&format!("Selected option {choice} (text not available)")),
    }
    line
}

/// Render both parties' answer transcripts for the ruling prompts.
pub fn format_answer_bundle(
    answers_a: &[ClarificationAnswer],
    answers_b: &[ClarificationAnswer],
    name_a: &str,
    name_b: &str,
) -> String {
    let mut out = format!("{name_a}'s (Party A's) Answers to Clarification Questions:\n");
    for answer in answers_a {
        out.push_str(&format_answer(answer));
        out.push('\n');
    }
    out.push_str(&format!(
        "\n{name_b}'s (Party B's) Answers to Clarification Questions:\n"
    ));
    for answer in answers_b {
        out.push_str(&format_answer(answer));
        out.push('\n');
    }
    out.trim_end().to_string()
}

/// Judge prompt for the initial (pre-rebuttal) ruling.
pub fn initial_ruling(
    problem_a: &str,
    problem_b: &str,
    profile: &Profile,
    perspective_a_text: &str,
    perspective_b_text: &str,
    answers_a: &[ClarificationAnswer],
    answers_b: &[ClarificationAnswer],
    language: &str,
) -> PromptSpec {
    let name_a = profile.display_name(Party::A);
    let name_b = profile.display_name(Party::B);
    let system = format!(
        "You are the AI Judge delivering your Initial Ruling (pre-rebuttal). You have both \
         parties' profiles, problem descriptions, articulated perspectives, and their direct \
         answers to your clarification questions.\n\n\
         Structure your ruling under these exact English headings; all content under them must \
         be in {language}:\n\
         \"{INITIAL_SUMMARY_MARKER}\" - a concise 2-4 sentence synthesis of the central \
         conflict, refined by both sets of clarification answers.\n\
         \"{INITIAL_ANALYSIS_MARKER}\" - how each party's clarifications shed new light, where \
         their answers converge or diverge, and how each person's circumstances and behaviors \
         contribute to this specific problem. If the evidence clearly points to one party as the \
         primary driver, state it directly but without inflammatory language; if responsibility \
         is shared, explain those dynamics.\n\
         \"{INITIAL_RECOMMENDATIONS_MARKER}\" - 2-4 clear, actionable bullet points for BOTH \
         parties, concrete and compassionate, prioritizing children's well-being where relevant.\n\n\
         Remain impartial in analysis, direct in recommendations. If anything hints at abuse or \
         danger, strongly advise seeking immediate help from qualified professionals."
    );
    let content = format!(
        "{}\n\n{name_a}'s (Party A's) Description of the Problem:\n{problem_a}\n\n\
         {name_b}'s (Party B's) Description of the Problem:\n{problem_b}\n\n\
         {name_a}'s Articulated Perspective:\n{perspective_a_text}\n\n\
         {name_b}'s Articulated Perspective:\n{perspective_b_text}\n\n\
         BOTH PARTIES' Direct Answers to Your Clarification Questions:\n{}\n\n\
         Now provide your INITIAL RULING in {language} under the specified English headings.",
        format_profile(profile),
        format_answer_bundle(answers_a, answers_b, name_a, name_b)
    );
    PromptSpec {
        system,
        content,
        sampling: INITIAL_RULING_SAMPLING,
    }
}

/// Neutral summarization of free text (problem accounts, rebuttals).
///
/// `context_label` names what the text represents, including which party
/// it came from.
pub fn summarize(
    text: &str,
    context_label: &str,
    profile: &Profile,
    problem_a: &str,
    problem_b: Option<&str>,
    language: &str,
) -> PromptSpec {
    let name_a = profile.display_name(Party::A);
    let name_b = profile.display_name(Party::B);
    let system = format!(
        "You are an AI assistant. Concisely and neutrally summarize the following text, which \
         represents {context_label} in the context of a relationship disagreement.\n\
         Extract the core points and arguments; add no interpretation or judgment.\n\
         Respond ONLY with the summary, 1-3 sentences, in {language}."
    );
    let mut problem_context = format!("Original Problem (Party A - {name_a}): {problem_a}");
    if let Some(problem_b) = problem_b {
        problem_context.push_str(&format!(
            "\nOriginal Problem (Party B - {name_b}): {problem_b}"
        ));
    }
    let content = format!(
        "Context: Relationship Disagreement\n\
         Parties Involved: Party A ({name_a}) and Party B ({name_b}).\n\
         Full Profile Data:\n{}\n{problem_context}\n\n\
         Text to Summarize ({context_label}):\n{text}\n\nSummary (in {language}):",
        format_profile(profile)
    );
    PromptSpec {
        system,
        content,
        sampling: SUMMARY_SAMPLING,
    }
}

/// The rebuttal-phase context sentence for the ultimate ruling prompt.
///
/// The four branches (both summaries, only A, only B, neither) are
/// load-bearing: they tell the judge which party rebutted and whether the
/// other accepted.
pub fn rebuttal_context(
    rebuttal_a: Option<&str>,
    rebuttal_b: Option<&str>,
    name_a: &str,
    name_b: &str,
) -> String {
    match (rebuttal_a, rebuttal_b) {
        (Some(a), Some(b)) => format!(
            "Both parties provided rebuttals. {name_a}'s summarized rebuttal: \"{a}\". \
             {name_b}'s summarized rebuttal: \"{b}\"."
        ),
        (Some(a), None) => format!(
            "{name_a} provided rebuttal points: \"{a}\". {name_b} provided no counter-rebuttal \
             or accepted these points."
        ),
        (None, Some(b)) => format!(
            "{name_b} provided rebuttal points: \"{b}\". {name_a} provided no counter-rebuttal \
             or accepted these points."
        ),
        (None, None) => "Neither party provided new rebuttal points after the initial ruling, \
                         or both agreed with it."
            .to_string(),
    }
}

/// Judge prompt for the ultimate (post-rebuttal) ruling.
#[allow(clippy::too_many_arguments)]
pub fn ultimate_ruling(
    profile: &Profile,
    problem_a: &str,
    problem_b: &str,
    perspective_a_text: &str,
    perspective_b_text: &str,
    answers_a: &[ClarificationAnswer],
    answers_b: &[ClarificationAnswer],
    initial_ruling_raw: &str,
    rebuttal_a: Option<&str>,
    rebuttal_b: Option<&str>,
    language: &str,
) -> PromptSpec {
    let name_a = profile.display_name(Party::A);
    let name_b = profile.display_name(Party::B);
    let context = rebuttal_context(rebuttal_a, rebuttal_b, name_a, name_b);
    let system = format!(
        "You are the AI Judge delivering your ULTIMATE FINAL RULING, after an initial ruling and \
         a rebuttal process. You have both parties' profiles, problem descriptions, articulated \
         perspectives, clarification answers, your own initial ruling, and the rebuttal phase \
         outcome: {context}\n\n\
         Structure the response using these English headings EXACTLY; all content under them must \
         be in {language}:\n\n\
         {ULTIMATE_VERDICT_MARKER}\n\
         An extremely concise 1-2 sentence core verdict acknowledging the rebuttal process. Be \
         unflinchingly direct: if one party's position remains less substantiated after the \
         rebuttals, state it plainly; if responsibility is shared, affirm that; if the rebuttals \
         changed your mind from the initial ruling, say so.\n\n\
         {ULTIMATE_PRIMARY_MARKER}\n\
         1-3 highly summarized, directive bullet points naming the most critical actions.\n\n\
         {ULTIMATE_SECONDARY_MARKER}\n\
         2-3 concrete supporting bullet points for both parties' ongoing improvement.\n\n\
         {ULTIMATE_REASONING_MARKER}\n\
         Show your work: how the rebuttal points (or their absence) influenced the outcome \
         relative to the initial ruling, which profile facts informed the weighing of \
         responsibility, and why any rebuttal was judged strong or weak against the total \
         evidence.\n\n\
         The verdict and primary suggestions must be direct and assertive; empathy underpins the \
         reasoning. If anything hints at abuse or danger, prioritize advising immediate help from \
         qualified professionals."
    );
    let no_rebuttal = "No rebuttal points were actively submitted by this party.";
    let content = format!(
        "{}\n\n{name_a}'s (Party A's) Original Description of the Problem:\n{problem_a}\n\n\
         {name_b}'s (Party B's) Original Description of the Problem:\n{problem_b}\n\n\
         {name_a}'s Articulated Perspective:\n{perspective_a_text}\n\n\
         {name_b}'s Articulated Perspective:\n{perspective_b_text}\n\n\
         Clarification Phase - both parties' answers:\n{}\n\n\
         The AI Judge's Initial Ruling (before any rebuttal):\n{initial_ruling_raw}\n\n\
         Rebuttal Phase Information:\n\
         {name_a}'s (Party A) Summarized Rebuttal Points:\n{}\n\n\
         {name_b}'s (Party B) Summarized Rebuttal Points:\n{}\n\n\
         Now provide your ULTIMATE FINAL RULING in {language}, using the English structural \
         markers exactly.",
        format_profile(profile),
        format_answer_bundle(answers_a, answers_b, name_a, name_b),
        rebuttal_a.unwrap_or(no_rebuttal),
        rebuttal_b.unwrap_or(no_rebuttal),
    );
    PromptSpec {
        system,
        content,
        sampling: ULTIMATE_RULING_SAMPLING,
    }
}
