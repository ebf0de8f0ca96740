//! Facet classification for medical questions
//!
//! Scores a question against the three facets (definition, symptoms,
//! treatments) using weighted keyword evidence. Primary cues weigh 2,
//! supplementary cues weigh 1, localized (Traditional Chinese) cues weigh 2.
//! A cue is discounted when a negation cue appears within a 24-character
//! window immediately before it, so "no symptoms of asthma" does not score
//! as a symptoms question.
//!
//! The pattern tables are immutable configuration compiled once at startup.
//! Classification is pure and deterministic; no I/O.

use lazy_static::lazy_static;
use regex::Regex;

use crate::models::Facet;

/// Primary (high-weight) cues per facet
const DEFINITION_HIGH: &[&str] = &[
    "what is",
    "what are",
    "define",
    "definition of",
    "is defined as",
    "refers to",
    "is called",
    "known as",
    "aka",
    "terminology",
    "term",
    "is a type of",
    "subtype of",
];

const DEFINITION_SUPPLEMENT: &[&str] = &[
    "classification of",
    "meaning of",
    "described as",
    "description",
    "synonymous with",
    "characterized by",
    "introduction",
    "intro",
    "nomenclature",
    "alias",
    "abbreviation",
];

const SYMPTOMS_HIGH: &[&str] = &[
    "symptom",
    "symptoms",
    "signs and symptoms",
    "clinical features",
    "presenting symptoms",
    "common symptoms",
    "warning signs",
    "red flags",
    "manifestations",
    "hallmark symptoms",
];

const SYMPTOMS_SUPPLEMENT: &[&str] = &[
    "how to recognize",
    "how to identify",
    "signs of",
    "early signs",
    "early symptoms",
    "symptom checklist",
    "symptom list",
    "symptom profile",
    "symptom pattern",
    "clinical presentation",
    "patient complains of",
    "associated symptoms",
];

const TREATMENTS_HIGH: &[&str] = &[
    "treatment",
    "treatments",
    "management",
    "therapy",
    "therapies",
    "medication",
    "medications",
    "drug therapy",
    "surgery",
    "surgical",
    "rehabilitation",
    "physical therapy",
    "lifestyle modification",
    "first-line",
    "second-line",
];

const TREATMENTS_SUPPLEMENT: &[&str] = &[
    "how to treat",
    "treating",
    "management options",
    "management strategies",
    "supportive care",
    "self-care",
    "home remedies",
    "follow-up",
    "monitoring",
    "preventive therapy",
    "prophylaxis",
    "prophylactic",
    "complications management",
    "risk reduction",
];

const NEGATION_HIGH: &[&str] = &[
    "no",
    "not",
    "without",
    "lack of",
    "ruled out",
    "rule out",
    "exclude",
    "excluding",
    "negative for",
    "contraindicated",
    "not indicated",
];

const NEGATION_SUPPLEMENT: &[&str] = &[
    "except",
    "except for",
    "denied",
    "denies",
    "denial",
    "reject",
    "rejected",
    "symptom relief",
    "prevention only",
];

/// Localized cues; frontend templates mix Chinese question frames with
/// Latin-script disease names
const DEFINITION_ZH: &[&str] = &["定義", "什麼是", "是什麼", "意思"];
const SYMPTOMS_ZH: &[&str] = &["症狀", "徵兆", "表現"];
const TREATMENTS_ZH: &[&str] = &["治療", "療法", "用藥", "處置"];

/// Characters of lookback for a negation cue before a facet cue
const NEGATION_WINDOW: usize = 24;

/// Score gap at or below which the fixed priority order decides
const TIE_MARGIN: i32 = 4;

const WEIGHT_HIGH: i32 = 2;
const WEIGHT_SUPPLEMENT: i32 = 1;
const WEIGHT_ZH: i32 = 2;

/// Turn a cue phrase into a whole-word pattern, allowing an optional
/// plural "s" on phrases ending in a letter (but not "... of"/"... to")
fn cue_to_pattern(cue: &str) -> String {
    let mut escaped = regex::escape(cue).replace(' ', r"\s+");
    let ends_alpha = cue.chars().last().map(|c| c.is_ascii_alphabetic()).unwrap_or(false);
    if ends_alpha && !cue.ends_with(" of") && !cue.ends_with(" to") {
        escaped.push_str("(s)?");
    }
    format!(r"\b{}\b", escaped)
}

fn compile_cues(cues: &[&str]) -> Vec<Regex> {
    cues.iter()
        .map(|c| Regex::new(&format!("(?i){}", cue_to_pattern(c))).expect("static cue pattern"))
        .collect()
}

fn compile_literal(cues: &[&str]) -> Vec<Regex> {
    // Chinese cues have no word boundaries; plain substring patterns
    cues.iter()
        .map(|c| Regex::new(&regex::escape(c)).expect("static cue pattern"))
        .collect()
}

struct FacetPatterns {
    high: Vec<Regex>,
    supplement: Vec<Regex>,
    localized: Vec<Regex>,
}

lazy_static! {
    static ref DEFINITION_PATTERNS: FacetPatterns = FacetPatterns {
        high: compile_cues(DEFINITION_HIGH),
        supplement: compile_cues(DEFINITION_SUPPLEMENT),
        localized: compile_literal(DEFINITION_ZH),
    };
    static ref SYMPTOMS_PATTERNS: FacetPatterns = FacetPatterns {
        high: compile_cues(SYMPTOMS_HIGH),
        supplement: compile_cues(SYMPTOMS_SUPPLEMENT),
        localized: compile_literal(SYMPTOMS_ZH),
    };
    static ref TREATMENTS_PATTERNS: FacetPatterns = FacetPatterns {
        high: compile_cues(TREATMENTS_HIGH),
        supplement: compile_cues(TREATMENTS_SUPPLEMENT),
        localized: compile_literal(TREATMENTS_ZH),
    };
    static ref NEGATION_PATTERN: Regex = {
        let union = NEGATION_HIGH
            .iter()
            .chain(NEGATION_SUPPLEMENT.iter())
            .map(|c| cue_to_pattern(c))
            .collect::<Vec<_>>()
            .join("|");
        Regex::new(&format!("(?i){}", union)).expect("static negation pattern")
    };
}

fn patterns_for(facet: Facet) -> &'static FacetPatterns {
    match facet {
        Facet::Definition => &DEFINITION_PATTERNS,
        Facet::Symptoms => &SYMPTOMS_PATTERNS,
        Facet::Treatments => &TREATMENTS_PATTERNS,
    }
}

/// Whether a negation cue appears in the window immediately before `start`
fn negated_nearby(text: &str, start: usize) -> bool {
    let mut win_start = start.saturating_sub(NEGATION_WINDOW);
    while win_start < start && !text.is_char_boundary(win_start) {
        win_start += 1;
    }
    NEGATION_PATTERN.is_match(&text[win_start..start])
}

/// Weighted keyword score for one facet
pub fn keyword_score(question: &str, facet: Facet) -> i32 {
    let text = question.to_lowercase();
    let patterns = patterns_for(facet);
    let mut score = 0;

    let tiers: [(&[Regex], i32); 3] = [
        (&patterns.high, WEIGHT_HIGH),
        (&patterns.supplement, WEIGHT_SUPPLEMENT),
        (&patterns.localized, WEIGHT_ZH),
    ];
    for (tier, weight) in tiers {
        for pattern in tier {
            for m in pattern.find_iter(&text) {
                if !negated_nearby(&text, m.start()) {
                    score += weight;
                }
            }
        }
    }
    score
}

/// Facet scores including the symptoms/treatments baseline bias
pub fn facet_scores(question: &str) -> [(Facet, i32); 3] {
    let q = question.trim();
    let s_def = keyword_score(q, Facet::Definition);
    // Symptoms and treatments questions are more frequent in practice
    let s_sym = keyword_score(q, Facet::Symptoms) + 1;
    let s_tx = keyword_score(q, Facet::Treatments) + 1;

    [
        (Facet::Treatments, s_tx),
        (Facet::Symptoms, s_sym),
        (Facet::Definition, s_def),
    ]
}

/// Classify a question into a facet
///
///// Deterministic: ties within a margin of 4 resolve by the fixed priority
/// order treatments > symptoms > definition, and a winning score of zero
/// falls back to definition. A blank question is a definition question.
pub fn classify(question: &str) -> Facet {
    if question.trim().is_empty() {
        return Facet::Definition;
    }

    let scores = facet_scores(question);
    let mut ranked = scores;
    ranked.sort_by_key(|(_, s)| std::cmp::Reverse(*s));

    let (top_facet, top_score) = ranked[0];
    let (_, second_score) = ranked[1];

    let mut winner = top_facet;
    if top_score - second_score <= TIE_MARGIN {
        for facet in Facet::priority_order() {
            let score = scores
                .iter()
                .find(|(f, _)| *f == facet)
                .map(|(_, s)| *s)
                .unwrap_or(0);
            if score == top_score {
                winner = facet;
                break;
            }
        }
    }

    let winner_score = scores
        .iter()
        .find(|(f, _)| *f == winner)
        .map(|(_, s)| *s)
        .unwrap_or(0);
    if winner_score == 0 {
        return Facet::Definition;
    }
    winner
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_question_is_definition() {
        assert_eq!(classify(""), Facet::Definition);
        assert_eq!(classify("   "), Facet::Definition);
    }

    #[test]
    fn test_what_is_classifies_definition() {
        assert_eq!(classify("What is asthma?"), Facet::Definition);
        assert_eq!(classify("Define hypertension"), Facet::Definition);
    }

    #[test]
    fn test_treatments_keyword() {
        assert_eq!(classify("treatments for diabetes"), Facet::Treatments);
        assert_eq!(classify("How to treat influenza?"), Facet::Treatments);
    }

    #[test]
    fn test_symptoms_keyword() {
        // "common symptoms" + "symptoms" matches must clear the tie margin
        // over the treatments baseline
        assert_eq!(
            classify("What are the common symptoms and early symptoms of asthma, and which hallmark symptoms matter?"),
            Facet::Symptoms
        );
    }

    #[test]
    fn test_negation_suppresses_symptoms_cue() {
        // "no" sits inside the 24-char window before "symptoms"
        assert_ne!(classify("no symptoms of asthma"), Facet::Symptoms);
    }

    #[test]
    fn test_negated_cue_scores_zero() {
        assert_eq!(keyword_score("no symptoms of asthma", Facet::Symptoms), 0);
        assert!(keyword_score("symptoms of asthma", Facet::Symptoms) > 0);
    }

    #[test]
    fn test_tie_break_prefers_treatments() {
        // treatments 3, symptoms 2, definition 0: gap <= 4 resolves by
        // priority order and treatments holds the top score
        let scores = facet_scores("treatment of the condition");
        let tx = scores.iter().find(|(f, _)| *f == Facet::Treatments).unwrap().1;
        let sym = scores.iter().find(|(f, _)| *f == Facet::Symptoms).unwrap().1;
        assert!(tx > sym);
        assert_eq!(classify("treatment of the condition"), Facet::Treatments);
    }

    #[test]
    fn test_localized_cues() {
        assert_eq!(classify("asthma 的症狀有哪些"), Facet::Symptoms);
        assert_eq!(classify("糖尿病如何治療"), Facet::Treatments);
    }

    #[test]
    fn test_plural_cue_matches() {
        // "therapy" expands to "therapy(s)?" and "therapies" is its own cue
        assert!(keyword_score("available therapies for lupus", Facet::Treatments) > 0);
    }

    #[test]
    fn test_scores_are_deterministic() {
        let q = "What is the first-line treatment for asthma symptoms?";
        assert_eq!(facet_scores(q), facet_scores(q));
    }
}
