//! Section extraction from generated ruling text.
//!
//! The upstream text generator is instructed to structure rulings with
//! fixed English headings, but generated output is not guaranteed to honor
//! the request. Marker lookup is therefore case-insensitive, and a ruling
//! whose headings are all missing degrades to a single fallback section
//! carrying the full raw text rather than dropping content.

use crate::types::{InitialRulingSections, UltimateRulingSections};

/// Initial-ruling grammar: each heading is the end marker for the previous.
pub const INITIAL_SUMMARY_MARKER: &str = "Judge's Definitive Re-summary of the Core Issue:";
pub const INITIAL_ANALYSIS_MARKER: &str = "In-depth Analysis & Contributing Factors:";
pub const INITIAL_RECOMMENDATIONS_MARKER: &str = "The AI Judge's Final Recommendations:";

/// Ultimate-ruling grammar.
pub const ULTIMATE_VERDICT_MARKER: &str = "[[Ultimate Verdict]]";
pub const ULTIMATE_PRIMARY_MARKER: &str = "[[Primary Suggestions]]";
pub const ULTIMATE_SECONDARY_MARKER: &str = "[[Secondary Suggestions]]";
pub const ULTIMATE_REASONING_MARKER: &str = "[[Detailed Reasoning]]";

/// Extract the substring strictly between the first occurrence of
/// `start_marker` and the earliest occurrence of any of `end_markers`
/// after it, trimmed. Returns empty when the start marker is absent;
/// runs to end of text when no end marker follows.
///
/// Marker lookup is case-insensitive because generated output may vary
/// heading case.
pub fn extract_section(text: &str, start_marker: &str, end_markers: &[&str]) -> String {
    let Some(start_idx) = find_ignore_ascii_case(text, start_marker, 0) else {
        return String::new();
    };
    let content_start = start_idx + start_marker.len();

    let mut end_idx = text.len();
    for marker in end_markers {
        if let Some(idx) = find_ignore_ascii_case(text, marker, content_start) {
            end_idx = end_idx.min(idx);
        }
    }

    text[content_start..end_idx].trim().to_string()
}

/// Byte offset of the first ASCII-case-insensitive occurrence of `needle`
/// in `haystack` at or after `from`. Markers are ASCII, so byte-window
/// comparison keeps offsets valid for the original (possibly non-ASCII)
/// text.
pub(crate) fn find_ignore_ascii_case(haystack: &str, needle: &str, from: usize) -> Option<usize> {
    let bytes = haystack.as_bytes();
    let needle = needle.as_bytes();
    if needle.is_empty() || from + needle.len() > bytes.len() {
        return None;
    }
    bytes[from..]
        .windows(needle.len())
        .position(|window| window.eq_ignore_ascii_case(needle))
        .map(|pos| from + pos)
}

/// Parse an initial ruling into its three sections.
///
/// Fallback policy: when every section comes back empty from non-empty raw
/// text, the full raw text is preserved in `analysis` and `fallback` is set
/// so the caller substitutes a parse-error heading for the summary.
pub fn parse_initial_ruling(raw: &str) -> InitialRulingSections {
    let summary = extract_section(
        raw,
        INITIAL_SUMMARY_MARKER,
        &[INITIAL_ANALYSIS_MARKER, INITIAL_RECOMMENDATIONS_MARKER],
    );
    let analysis = extract_section(raw, INITIAL_ANALYSIS_MARKER, &[INITIAL_RECOMMENDATIONS_MARKER]);
    let recommendations = extract_section(raw, INITIAL_RECOMMENDATIONS_MARKER, &[]);

    if summary.is_empty() && analysis.is_empty() && recommendations.is_empty() && !raw.is_empty() {
        tracing::warn!("initial ruling honored no section headings, preserving full text");
        return InitialRulingSections {
            summary: String::new(),
            analysis: raw.to_string(),
            recommendations: String::new(),
            fallback: true,
        };
    }

    InitialRulingSections {
        summary,
        analysis,
        recommendations,
        fallback: false,
    }
}

/// Parse an ultimate ruling into its four sections.
///
/// The designated fallback section for this grammar is `reasoning`.
pub fn parse_ultimate_ruling(raw: &str) -> UltimateRulingSections {
    let verdict = extract_section(
        raw,
        ULTIMATE_VERDICT_MARKER,
        &[
            ULTIMATE_PRIMARY_MARKER,
            ULTIMATE_SECONDARY_MARKER,
            ULTIMATE_REASONING_MARKER,
        ],
    );
    let primary = extract_section(
        raw,
        ULTIMATE_PRIMARY_MARKER,
        &[ULTIMATE_SECONDARY_MARKER, ULTIMATE_REASONING_MARKER],
    );
    let secondary = extract_section(raw, ULTIMATE_SECONDARY_MARKER, &[ULTIMATE_REASONING_MARKER]);
    let reasoning = extract_section(raw, ULTIMATE_REASONING_MARKER, &[]);

    if verdict.is_empty()
        && primary.is_empty()
        && secondary.is_empty()
        && reasoning.is_empty()
        && !raw.is_empty()
    {
        tracing::warn!("ultimate ruling honored no section headings, preserving full text");
        return UltimateRulingSections {
            verdict: String::new(),
            primary_suggestions: String::new(),
            secondary_suggestions: String::new(),
            reasoning: raw.to_string(),
            fallback: true,
        };
    }

    UltimateRulingSections {
        verdict,
        primary_suggestions: primary,
        secondary_suggestions: secondary,
        reasoning,
        fallback: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn initial_ruling_text() -> String {
        format!(
            "Preamble the judge added.\n{INITIAL_SUMMARY_MARKER}\nThe core issue is chore division.\n\n\
             {INITIAL_ANALYSIS_MARKER}\nBoth accounts describe an imbalance.\n\n\
             {INITIAL_RECOMMENDATIONS_MARKER}\n- Agree on a weekly plan.\n- Revisit in a month."
        )
    }

    #[test]
    fn extracts_bounded_sections_in_order() {
        let sections = parse_initial_ruling(&initial_ruling_text());
        assert_eq!(sections.summary, "The core issue is chore division.");
        assert_eq!(sections.analysis, "Both accounts describe an imbalance.");
        assert_eq!(
            sections.recommendations,
            "- Agree on a weekly plan.\n- Revisit in a month."
        );
        assert!(!sections.fallback);
    }

    #[test]
    fn marker_lookup_is_case_insensitive() {
        let text = initial_ruling_text().to_uppercase();
        let sections = parse_initial_ruling(&text);
        assert_eq!(sections.summary, "THE CORE ISSUE IS CHORE DIVISION.");
        assert!(!sections.fallback);
    }

    #[test]
    fn absent_start_marker_yields_empty_section() {
        assert_eq!(
            extract_section("no headings here", INITIAL_SUMMARY_MARKER, &[]),
            ""
        );
    }

    #[test]
    fn last_section_runs_to_end_of_text() {
        let text = format!("{ULTIMATE_REASONING_MARKER}\n  tail content  ");
        assert_eq!(
            extract_section(&text, ULTIMATE_REASONING_MARKER, &[]),
            "tail content"
        );
    }

    #[test]
    fn earliest_end_marker_wins() {
        let text = format!(
            "{ULTIMATE_VERDICT_MARKER} verdict body {ULTIMATE_REASONING_MARKER} r {ULTIMATE_PRIMARY_MARKER} p"
        );
        let verdict = extract_section(
            &text,
            ULTIMATE_VERDICT_MARKER,
            &[ULTIMATE_PRIMARY_MARKER, ULTIMATE_REASONING_MARKER],
        );
        assert_eq!(verdict, "verdict body");
    }

    #[test]
    fn initial_ruling_without_headings_falls_back_to_analysis() {
        let raw = "The model ignored the requested structure entirely.";
        let sections = parse_initial_ruling(raw);
        assert!(sections.fallback);
        assert_eq!(sections.analysis, raw);
        assert!(sections.summary.is_empty());
        assert!(sections.recommendations.is_empty());
    }

    #[test]
    fn ultimate_ruling_without_headings_falls_back_to_reasoning() {
        let raw = "Free-form verdict text without any markers.";
        let sections = parse_ultimate_ruling(raw);
        assert!(sections.fallback);
        assert_eq!(sections.reasoning, raw);
        assert!(sections.verdict.is_empty());
    }

    #[test]
    fn empty_raw_text_is_not_a_fallback() {
        let sections = parse_ultimate_ruling("");
        assert!(!sections.fallback);
        assert!(sections.reasoning.is_empty());
    }

    #[test]
    fn ultimate_sections_parse_fully() {
        let raw = format!(
            "{ULTIMATE_VERDICT_MARKER}\nShared responsibility, leaning toward A.\n\
             {ULTIMATE_PRIMARY_MARKER}\n- A must raise concerns earlier.\n\
             {ULTIMATE_SECONDARY_MARKER}\n- Weekly check-ins.\n\
             {ULTIMATE_REASONING_MARKER}\nThe rebuttal did not address the core inconsistency."
        );
        let sections = parse_ultimate_ruling(&raw);
        assert_eq!(sections.verdict, "Shared responsibility, leaning toward A.");
        assert_eq!(sections.primary_suggestions, "- A must raise concerns earlier.");
        assert_eq!(sections.secondary_suggestions, "- Weekly check-ins.");
        assert_eq!(
            sections.reasoning,
            "The rebuttal did not address the core inconsistency."
        );
        assert!(!sections.fallback);
    }

    // Non-blank section bodies free of marker text.
    fn body() -> impl Strategy<Value = String> {
        "[a-z][a-zA-Z0-9 ,.-]{0,79}".prop_map(|s| s.trim().to_string())
    }

    proptest! {
        #[test]
        fn all_markers_in_order_give_correctly_bounded_sections(
            summary in body(),
            analysis in body(),
            recommendations in body(),
        ) {
            let raw = format!(
                "{INITIAL_SUMMARY_MARKER}\n{summary}\n{INITIAL_ANALYSIS_MARKER}\n{analysis}\n{INITIAL_RECOMMENDATIONS_MARKER}\n{recommendations}"
            );
            let sections = parse_initial_ruling(&raw);
            prop_assert_eq!(sections.summary, summary.trim());
            prop_assert_eq!(sections.analysis, analysis.trim());
            prop_assert_eq!(sections.recommendations, recommendations.trim());
            prop_assert!(!sections.fallback);
        }

        #[test]
        fn markerless_text_always_lands_in_fallback(raw in "[a-z ]{1,120}") {
            let sections = parse_initial_ruling(&raw);
            prop_assert!(sections.fallback);
            prop_assert_eq!(sections.analysis, raw);
        }
    }
}
