//! Clarification-phase parser.
//!
//! The judge prompt instructs the generator to emit an introductory
//! statement, one bounded question block per party containing repeated
//! `[[QUESTION]]`/`[[SUGGESTION_A..C]]` quadruples, and a concluding
//! statement. Generated output routinely deviates from that grammar, so
//! recovery here is the normal path, not an exception: a party block that
//! yields fewer than three questions is replaced wholesale by a built-in
//! set, and missing intro/outro text is substituted. Parsing never fails.

use lazy_static::lazy_static;
use regex::Regex;

use crate::extract::extract_section;
use crate::types::{ClarificationPrompts, ClarificationQuestion, Party, Suggestions};

pub const INTRO_MARKER: &str =
    "[[AI Judge's Introductory Statement for Clarification Phase]]";
pub const OUTRO_MARKER: &str =
    "[[AI Judge's Concluding Statement for this Clarification Phase]]";

pub const QUESTION_MARKER: &str = "[[QUESTION]]";
pub const SUGGESTION_A_MARKER: &str = "[[SUGGESTION_A]]";
pub const SUGGESTION_B_MARKER: &str = "[[SUGGESTION_B]]";
pub const SUGGESTION_C_MARKER: &str = "[[SUGGESTION_C]]";

pub const SET_A_START_PREFIX: &str = "[[User A Question Set Start";
pub const SET_A_END: &str = "[[User A Question Set End]]";
pub const SET_B_START_PREFIX: &str = "[[Partner B Question Set Start";
pub const SET_B_END: &str = "[[Partner B Question Set End]]";

/// The minimum usable question count per party; anything less triggers the
/// built-in replacement set.
pub const MIN_QUESTIONS_PER_PARTY: usize = 3;

/// Start marker for a party's question block, parameterized by the party's
/// display name as embedded by the prompt.
pub fn set_start_marker(party: Party, name: &str) -> String {
    match party {
        Party::A => format!("{SET_A_START_PREFIX} - For {name}]]"),
        Party::B => format!("{SET_B_START_PREFIX} - For {name}]]"),
    }
}

lazy_static! {
    // Applied per question segment, after splitting on [[QUESTION]]; the
    // trailing capture runs to the segment end, so no look-ahead is needed.
    static ref SUGGESTIONS_RE: Regex = Regex::new(
        r"(?is)^\s*(?P<q>.*?)\s*\[\[SUGGESTION_A\]\]\s*(?P<a>.*?)\s*\[\[SUGGESTION_B\]\]\s*(?P<b>.*?)\s*\[\[SUGGESTION_C\]\]\s*(?P<c>.*?)\s*$"
    )
    .expect("suggestion grammar regex is valid");
}

/// Parse a raw clarification response into prompts for both parties.
///
/// `name_a`/`name_b` are the display names the prompt embedded into the
/// party block markers and question texts.
pub fn parse_clarification_prompts(raw: &str, name_a: &str, name_b: &str) -> ClarificationPrompts {
    let intro = extract_section(
        raw,
        INTRO_MARKER,
        &[SET_A_START_PREFIX, SET_B_START_PREFIX, OUTRO_MARKER],
    );
    let outro = extract_section(raw, OUTRO_MARKER, &[]);

    let block_a = extract_section(raw, &set_start_marker(Party::A, name_a), &[SET_A_END]);
    let block_b = extract_section(raw, &set_start_marker(Party::B, name_b), &[SET_B_END]);

    let mut questions_for_a = parse_question_block(&block_a);
    let mut questions_for_b = parse_question_block(&block_b);

    if questions_for_a.len() < MIN_QUESTIONS_PER_PARTY {
        tracing::warn!(
            parsed = questions_for_a.len(),
            "too few clarification questions for party A, using built-in set"
        );
        questions_for_a = fallback_questions(Party::A, name_a, name_b);
    }
    if questions_for_b.len() < MIN_QUESTIONS_PER_PARTY {
        tracing::warn!(
            parsed = questions_for_b.len(),
            "too few clarification questions for party B, using built-in set"
        );
        questions_for_b = fallback_questions(Party::B, name_b, name_a);
    }

    ClarificationPrompts {
        intro: if intro.is_empty() {
            fallback_intro()
        } else {
            intro
        },
        questions_for_a,
        questions_for_b,
        outro: if outro.is_empty() {
            fallback_outro()
        } else {
            outro
        },
    }
}

/// Parse the repeated question quadruples inside one party block.
///
/// Tolerates an arbitrary quadruple count; segments missing any suggestion
/// marker are dropped rather than producing partial items.
pub fn parse_question_block(block: &str) -> Vec<ClarificationQuestion> {
    split_on_marker(block, QUESTION_MARKER)
        .into_iter()
        .filter_map(|segment| {
            let caps = SUGGESTIONS_RE.captures(segment)?;
            let question_text = caps["q"].trim().to_string();
            if question_text.is_empty() {
                return None;
            }
            Some(ClarificationQuestion {
                question_text,
                suggestions: Suggestions {
                    a: caps["a"].trim().to_string(),
                    b: caps["b"].trim().to_string(),
                    c: caps["c"].trim().to_string(),
                },
            })
        })
        .collect()
}

/// Segments of `text` following each ASCII-case-insensitive occurrence of
/// `marker`, excluding the text before the first occurrence.
fn split_on_marker<'t>(text: &'t str, marker: &str) -> Vec<&'t str> {
    let mut segments = Vec::new();
    let mut cursor = 0;
    let mut starts = Vec::new();
    while let Some(idx) = crate::extract::find_ignore_ascii_case(text, marker, cursor) {
        starts.push(idx);
        cursor = idx + marker.len();
    }
    for (i, &start) in starts.iter().enumerate() {
        let begin = start + marker.len();
        let end = starts.get(i + 1).copied().unwrap_or(text.len());
        segments.push(&text[begin..end]);
    }
    segments
}

/// Built-in three-question set used when parsing yields too few items.
///
/// `name` is the party being asked; `other_name` is their counterpart.
pub fn fallback_questions(
    party: Party,
    name: &str,
    other_name: &str,
) -> Vec<ClarificationQuestion> {
    match party {
        Party::A => vec![
            ClarificationQuestion {
                question_text: format!(
                    "{name}, reflecting on your own description of the events, what was your primary emotional response during the peak of this issue?"
                ),
                suggestions: Suggestions {
                    a: "Primarily frustration or anger.".to_string(),
                    b: "Primarily sadness or disappointment.".to_string(),
                    c: "Primarily confusion or anxiety.".to_string(),
                },
            },
            ClarificationQuestion {
                question_text: format!(
                    "{name}, what specific need or desire of yours was not met in this situation?"
                ),
                suggestions: Suggestions {
                    a: "The need for understanding or validation.".to_string(),
                    b: "The need for support or action.".to_string(),
                    c: "The need for space or autonomy.".to_string(),
                },
            },
            ClarificationQuestion {
                question_text: format!(
                    "{name}, considering the recurring issues you mentioned in your profile, how does this specific incident connect to those broader patterns?"
                ),
                suggestions: Suggestions {
                    a: "It is a clear example of the same pattern.".to_string(),
                    b: "It is related, but slightly different.".to_string(),
                    c: "It seems unrelated to past issues.".to_string(),
                },
            },
        ],
        Party::B => vec![
            ClarificationQuestion {
                question_text: format!(
                    "{name}, reflecting on your own description of the events, what was your primary emotional response during the peak of this issue?"
                ),
                suggestions: Suggestions {
                    a: "Mainly felt misunderstood or defensive.".to_string(),
                    b: "Mainly felt hurt or rejected.".to_string(),
                    c: "Mainly felt overwhelmed or stressed.".to_string(),
                },
            },
            ClarificationQuestion {
                question_text: format!(
                    "{name}, considering {other_name}'s description of the events, what is one point they made that you find most difficult to understand or accept from their perspective?"
                ),
                suggestions: Suggestions {
                    a: "Their interpretation of my intentions.".to_string(),
                    b: "Their description of my behavior.".to_string(),
                    c: "Their stated emotional reaction to what happened.".to_string(),
                },
            },
            ClarificationQuestion {
                question_text: format!(
                    "{name}, if you could change one thing about how this specific situation was handled by either of you, what would it be?"
                ),
                suggestions: Suggestions {
                    a: "My own initial reaction.".to_string(),
                    b: format!("{other_name}'s approach to the discussion."),
                    c: "The timing or setting of the conversation.".to_string(),
                },
            },
        ],
    }
}

fn fallback_intro() -> String {
    "I have reviewed both perspectives and problem descriptions. To provide the clearest final assessment, I need each of you to reflect on the following points regarding the current problem. Please answer thoughtfully:".to_string()
}

fn fallback_outro() -> String {
    "Your individual, thoughtful answers will be crucial for forming the final assessment.".to_string()
}
