//! Term extraction and normalization
//!
//! Turns a question into a short ordered list of clinical search terms:
//! spans from the entity recognizer plus generic Latin-script phrases
//! captured by pattern, then alias mapping, noise filtering, first-seen
//! deduplication, and a hard cap of five terms.
//!
//! Mixed Chinese/English prompts from frontend templates often keep
//! disease names in Latin script, which is why the pattern capture runs
//! in addition to the recognizer.

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::{HashMap, HashSet};

use crate::recognizer::EntityRecognizer;

/// Final term list never exceeds this
pub const MAX_TERMS: usize = 5;

lazy_static! {
    /// Colloquial/abbreviated names mapped to graph vocabulary
    static ref ALIASES: HashMap<&'static str, &'static str> = {
        let mut m = HashMap::new();
        m.insert("heart attack", "myocardial infarction");
        m.insert("uti", "urinary tract infection");
        m.insert("flu", "influenza");
        m.insert("tb", "tuberculosis");
        m.insert("copd", "chronic obstructive pulmonary disease");
        m.insert("high blood pressure", "hypertension");
        m.insert("gerd", "gastroesophageal reflux disease");
        m.insert("covid-19", "covid 19");
        m.insert("covid19", "covid 19");
        m
    };

    /// Stopwords and facet words that never make useful search terms
    static ref NOISE_TERMS: HashSet<&'static str> = [
        "what", "which", "who", "where", "when", "why", "how",
        "is", "are", "was", "were", "be", "to", "do", "does", "did",
        "a", "an", "the", "of", "for", "with", "and", "or", "in", "on",
        "symptom", "symptoms", "sign", "signs",
        "treat", "treated", "treating", "treatment", "treatments", "therapy", "management",
        "definition", "define", "disease", "disorder", "condition",
    ]
    .into_iter()
    .collect();

    /// 1-5 token Latin-script phrases
    static ref LATIN_TERM_RE: Regex =
        Regex::new(r"[A-Za-z][A-Za-z0-9'/-]*(?:\s+[A-Za-z0-9'/-]+){0,4}").expect("static pattern");

    static ref ALPHA_TOKEN_RE: Regex = Regex::new(r"[a-z]+").expect("static pattern");

    static ref PUNCT_DIGITS_ONLY_RE: Regex = Regex::new(r"^[0-9\W_]+$").expect("static pattern");
}

/// Whether a term is in the stopword set
pub fn is_stopword(token: &str) -> bool {
    NOISE_TERMS.contains(token)
}

/// Lowercase alphabetic tokens of a term
pub fn alpha_tokens(term: &str) -> Vec<String> {
    ALPHA_TOKEN_RE
        .find_iter(&term.to_lowercase())
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Noise filter for candidate terms
///
/// Rejects stopwords, very short strings, over-long phrases, phrases
/// dominated by stopwords, and punctuation/digit runs.
pub fn is_noise_term(term: &str) -> bool {
    let t = term.to_lowercase();
    let t = t.trim();
    if t.is_empty() {
        return true;
    }
    if NOISE_TERMS.contains(t) {
        return true;
    }
    if t.chars().count() <= 2 {
        return true;
    }
    let toks = alpha_tokens(t);
    if toks.len() > 6 {
        return true;
    }
    if toks.len() >= 3 {
        let stop_count = toks.iter().filter(|tok| NOISE_TERMS.contains(tok.as_str())).count();
        if stop_count >= 2 {
            return true;
        }
    }
    if PUNCT_DIGITS_ONLY_RE.is_match(t) {
        return true;
    }
    false
}

/// Lowercase, normalize full-width brackets, strip surrounding punctuation
fn clean_candidate(raw: &str) -> String {
    let t = raw.to_lowercase();
    let t = t.replace('（', "(").replace('）', ")");
    t.trim_matches(|c: char| " \t\r\n.,;:!?\"'()[]{}".contains(c))
        .to_string()
}

/// Merge candidate term lists into the final normalized, deduplicated,
/// capped list; `seed_terms` take priority over `base_terms`
pub fn merge_terms(seed_terms: &[String], base_terms: &[String]) -> Vec<String> {
    let mut merged: Vec<String> = Vec::new();

    for source in [seed_terms, base_terms] {
        for item in source {
            let cleaned = clean_candidate(item);
            if cleaned.is_empty() {
                continue;
            }
            let mapped = ALIASES
                .get(cleaned.as_str())
                .map(|s| s.to_string())
                .unwrap_or(cleaned);

            // The mapped form plus its parenthetical/slash-delimited
            // sub-phrases are all candidates
            let mut candidates = vec![mapped.clone()];
            for part in mapped.split(['(', ')', '/']) {
                let part = part.trim();
                if !part.is_empty() {
                    candidates.push(part.to_string());
                }
            }

            for cand in candidates {
                if is_noise_term(&cand) {
                    continue;
                }
                if !merged.contains(&cand) {
                    merged.push(cand);
                }
                if merged.len() >= MAX_TERMS {
                    return merged;
                }
            }
        }
    }
    merged
}

/// Latin-script phrase captures from raw text
pub fn latin_captures(text: &str) -> Vec<String> {
    LATIN_TERM_RE
        .find_iter(text)
        .map(|m| m.as_str().to_lowercase().trim().to_string())
        .collect()
}

/// Extract normalized search terms from a question
///
///// Recognizer failure is not a request failure: it just contributes no
/// spans, and the pattern capture still runs.
pub async fn extract_terms(recognizer: &dyn EntityRecognizer, text: &str) -> Vec<String> {
    let mut raw: Vec<String> = Vec::new();

    match recognizer.extract_entities(text).await {
        Ok(spans) => {
            for span in spans {
                raw.push(span.text.to_lowercase().trim().to_string());
            }
        }
        Err(err) => {
            tracing::warn!(error = %err, "entity recognizer unavailable, using pattern capture only");
        }
    }

    raw.extend(latin_captures(text));

    merge_terms(&raw, &[])
}

/// Extract terms with a topic hint prepended at top priority
pub async fn extract_terms_with_topic(
    recognizer: &dyn EntityRecognizer,
    text: &str,
    topic_hint: Option<&str>,
) -> Vec<String> {
    let question_terms = extract_terms(recognizer, text).await;
    match topic_hint {
        Some(topic) if !topic.trim().is_empty() => {
            merge_terms(&[topic.to_string()], &question_terms)
        }
        _ => question_terms,
    }
}
