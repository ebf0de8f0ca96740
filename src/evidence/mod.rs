//! Evidence ranking, combination, and sufficiency evaluation
//!
//! Candidates are ranked by (relevance, pair count), the top-K contribute
//! their hierarchy pairs, and the combined pairs are reranked by lexical
//! relevance to the question with facet-specific hint bonuses. The
//! sufficiency evaluator then grades the result strong/weak/none for the
//! requested facet. Everything here is pure and deterministic.

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashSet;

use crate::models::{Candidate, EvidenceLevel, EvidencePair, Facet};

/// Default candidate count when no facet item count is requested
const DEFAULT_TOP_K: usize = 2;

/// Pairs inspected by the overlap ratio
const OVERLAP_TOP_N: usize = 8;

/// Pairs parsed by the narrative derivation
const NARRATIVE_TOP_N: usize = 12;

/// Categories kept for a narrative
pub const NARRATIVE_MAX_CATEGORIES: usize = 3;

/// Symptom cue tokens in evidence labels
const SYMPTOM_HINTS: &[&str] = &[
    "itching",
    "swelling",
    "dizziness",
    "weakness",
    "fatigue",
    "chills",
    "edema",
    "palpitations",
    "nausea",
    "vomiting",
    "cough",
    "fever",
    "pain",
];

/// Treatment cue tokens in evidence labels
const TREATMENT_HINTS: &[&str] = &[
    "therapy",
    "medication",
    "drug",
    "procedure",
    "surgery",
    "insulin",
    "statin",
    "ace inhibitor",
    "arb",
    "beta-agonist",
    "antihistamine",
    "anticoagulant",
    "chemotherapy",
    "radiation",
    "steroid",
    "corticosteroid",
    "antibiotic",
    "inhaler",
    "bronchodilator",
];

lazy_static! {
    static ref ALPHA_RE: Regex = Regex::new(r"[a-z]+").expect("static pattern");

    /// Trailing bracketed qualifier, e.g. "Asthma (disorder)"
    static ref QUALIFIER_RE: Regex = Regex::new(r"\s*\([^)]*\)\s*$").expect("static pattern");
}

fn token_set(text: &str) -> HashSet<String> {
    ALPHA_RE
        .find_iter(&text.to_lowercase())
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Sort candidates by relevance, then by evidence size, both descending
pub fn rank_candidates(candidates: &mut [Candidate]) {
    candidates.sort_by(|a, b| {
        b.relevance
            .partial_cmp(&a.relevance)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.pair_count().cmp(&a.pair_count()))
    });
}

/// How many ranked candidates to keep
///
/// The facet item count overrides the default for symptoms/treatments;
/// the client max caps the result either way.
pub fn top_k(facet: Facet, facet_k: Option<usize>, max_k: Option<usize>) -> usize {
    let mut k = DEFAULT_TOP_K;
    if matches!(facet, Facet::Symptoms | Facet::Treatments) {
        if let Some(requested) = facet_k {
            k = requested.max(1);
        }
    }
    if let Some(cap) = max_k {
        k = k.min(cap.max(1));
    }
    k
}

/// Concatenate pairs from the selected candidates and deduplicate by
/// exact text, preserving first occurrence
pub fn combine_pairs(selected: &[Candidate]) -> Vec<EvidencePair> {
    let mut seen = HashSet::new();
    let mut combined = Vec::new();
    for candidate in selected {
        for pair in &candidate.pairs {
            if !pair.is_valid() {
                continue;
            }
            if seen.insert(pair.text()) {
                combined.push(pair.clone());
            }
        }
    }
    combined
}

/// Composite relevance score for one evidence pair
///
/// 0.5 per token shared with the question, a length component capped at
/// 0.5, plus a facet bonus when the pair text carries a facet hint token.
pub fn pair_score(pair_text: &str, question: &str, facet: Facet) -> f64 {
    let text = pair_text.to_lowercase();
    let q_tokens = token_set(question);
    let p_tokens = token_set(pair_text);
    let overlap = p_tokens.intersection(&q_tokens).count();

    let mut score = 0.5 * overlap as f64 + (text.chars().count() as f64 / 80.0).min(0.5);
    match facet {
        Facet::Treatments if TREATMENT_HINTS.iter().any(|h| text.contains(h)) => score += 0.7,
        Facet::Symptoms if SYMPTOM_HINTS.iter().any(|h| text.contains(h)) => score += 0.3,
        _ => {}
    }
    score
}

/// Rerank pairs by composite score, descending; ties keep prior order
pub fn rerank_pairs(pairs: Vec<EvidencePair>, question: &str, facet: Facet) -> Vec<EvidencePair> {
    let mut scored: Vec<(f64, EvidencePair)> = pairs
        .into_iter()
        .map(|p| (pair_score(&p.text(), question, facet), p))
        .collect();
    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
    scored.into_iter().map(|(_, p)| p).collect()
}

/// Lexical overlap between the question and the top reranked pairs
pub fn overlap_ratio(question: &str, pairs: &[EvidencePair]) -> f64 {
    let q_tokens = token_set(question);
    if q_tokens.is_empty() || pairs.is_empty() {
        return 0.0;
    }
    let mut hits = 0usize;
    let mut toks = 0usize;
    for pair in pairs.iter().take(OVERLAP_TOP_N) {
        let p_tokens = token_set(&pair.text());
        toks += p_tokens.len();
        hits += p_tokens.intersection(&q_tokens).count();
    }
    hits as f64 / toks.max(1) as f64
}

/// Whether the evidence carries facet-specific hint tokens
pub fn has_facet_evidence(pairs: &[EvidencePair], facet: Facet) -> bool {
    let bag = pairs
        .iter()
        .map(|p| p.text().to_lowercase())
        .collect::<Vec<_>>()
        .join(" ");
    match facet {
        Facet::Symptoms => SYMPTOM_HINTS.iter().any(|h| bag.contains(h)),
        Facet::Treatments => TREATMENT_HINTS.iter().any(|h| bag.contains(h)),
        Facet::Definition => true,
    }
}

/// A (condition, categories) digest of hierarchical evidence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Narrative {
    /// Most frequent source label
    pub condition: String,

    /// Up to three distinct target labels, in pair order
    pub categories: Vec<String>,
}

/// Strip bracketed qualifiers and suffix annotations from a graph label
pub fn normalize_label(label: &str) -> String {
    let stripped = QUALIFIER_RE.replace(label.trim(), "");
    let stripped = stripped.trim();
    let lower = stripped.to_lowercase();
    if let Some(base) = lower.strip_suffix(", nos") {
        return stripped[..base.len()].trim().to_string();
    }
    stripped.to_string()
}

/// Derive a narrative from the top reranked pairs
///
/// The most frequent normalized source becomes the condition (first seen
/// wins ties); distinct normalized targets become categories.
pub fn derive_narrative(pairs: &[EvidencePair]) -> Option<Narrative> {
    let top: Vec<&EvidencePair> = pairs.iter().take(NARRATIVE_TOP_N).collect();
    if top.is_empty() {
        return None;
    }

    let mut source_order: Vec<String> = Vec::new();
    let mut counts: std::collections::HashMap<String, usize> = std::collections::HashMap::new();
    for pair in &top {
        let source = normalize_label(&pair.source);
        if source.is_empty() {
            continue;
        }
        if !counts.contains_key(&source) {
            source_order.push(source.clone());
        }
        *counts.entry(source).or_insert(0) += 1;
    }

    let condition = source_order
        .iter()
        .max_by_key(|s| counts.get(*s).copied().unwrap_or(0))
        .cloned()?;
    // max_by_key returns the last maximum; prefer the first seen
    let best = counts.get(&condition).copied().unwrap_or(0);
    let condition = source_order
        .iter()
        .find(|s| counts.get(*s).copied().unwrap_or(0) == best)
        .cloned()?;

    let mut categories: Vec<String> = Vec::new();
    for pair in &top {
        let target = normalize_label(&pair.target);
        if target.is_empty() || target.eq_ignore_ascii_case(&condition) {
            continue;
        }
        if !categories.contains(&target) {
            categories.push(target);
        }
        if categories.len() >= NARRATIVE_MAX_CATEGORIES {
            break;
        }
    }

    Some(Narrative {
        condition,
        categories,
    })
}

/// Grade the combined evidence for the requested facet
///
/// Definition questions always count as strong: hierarchy pairs are by
/// construction definitional. Weak means no hint tokens but a narrative
/// (dominant condition plus at least two categories) can still be built.
pub fn evaluate_sufficiency(pairs: &[EvidencePair], facet: Facet) -> EvidenceLevel {
    if facet == Facet::Definition {
        return EvidenceLevel::Strong;
    }
    if has_facet_evidence(pairs, facet) {
        return EvidenceLevel::Strong;
    }
    match derive_narrative(pairs) {
        Some(narrative) if narrative.categories.len() >= 2 => EvidenceLevel::Weak,
        _ => EvidenceLevel::None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(source: &str, target: &str) -> EvidencePair {
        EvidencePair::new(source, target)
    }

    fn candidate(term: &str, relevance: f64, pairs: Vec<EvidencePair>) -> Candidate {
        Candidate {
            term: term.to_string(),
            concept_id: format!("id-{term}"),
            pairs,
            relevance,
        }
    }

    #[test]
    fn test_rank_by_size_within_relevance() {
        let mut candidates = vec![
            candidate("a", 1.0, vec![pair("A", "B"); 3]),
            candidate("b", 1.0, vec![pair("C", "D"); 5]),
        ];
        rank_candidates(&mut candidates);
        assert_eq!(candidates[0].term, "b");
    }

    #[test]
    fn test_relevance_dominates_size() {
        let mut candidates = vec![
            candidate("small", 1.0, vec![pair("A", "B")]),
            candidate("big", 0.5, vec![pair("C", "D"); 100]),
        ];
        rank_candidates(&mut candidates);
        assert_eq!(candidates[0].term, "small");
    }

    #[test]
    fn test_top_k_defaults_and_caps() {
        assert_eq!(top_k(Facet::Definition, None, None), 2);
        assert_eq!(top_k(Facet::Definition, None, Some(1)), 1);
        assert_eq!(top_k(Facet::Symptoms, Some(4), None), 4);
        assert_eq!(top_k(Facet::Symptoms, Some(4), Some(3)), 3);
        // facet item count does not apply to definition questions
        assert_eq!(top_k(Facet::Definition, Some(4), None), 2);
        assert_eq!(top_k(Facet::Treatments, Some(0), None), 1);
    }

    #[test]
    fn test_combine_dedup_preserves_order() {
        let selected = vec![
            candidate("a", 1.0, vec![pair("A", "B"), pair("A", "B")]),
            candidate("b", 1.0, vec![pair("C", "D"), pair("A", "B")]),
        ];
        let combined = combine_pairs(&selected);
        let texts: Vec<String> = combined.iter().map(|p| p.text()).collect();
        assert_eq!(texts, vec!["A → B".to_string(), "C → D".to_string()]);
    }

    #[test]
    fn test_combine_filters_malformed_pairs() {
        let selected = vec![candidate("a", 1.0, vec![pair("", "B"), pair("C", "D")])];
        let combined = combine_pairs(&selected);
        assert_eq!(combined.len(), 1);
    }

    #[test]
    fn test_pair_score_treatment_bonus() {
        let with_hint = pair_score("Asthma → Bronchodilator therapy", "x", Facet::Treatments);
        let without = pair_score("Asthma → Respiratory disease", "x", Facet::Treatments);
        assert!(with_hint > without + 0.5);
    }

    #[test]
    fn test_pair_score_overlap() {
        let q = "what is asthma";
        let relevant = pair_score("Asthma → Respiratory disease", q, Facet::Definition);
        let unrelated = pair_score("Gout → Joint disease", q, Facet::Definition);
        assert!(relevant > unrelated);
    }

    #[test]
    fn test_rerank_is_stable_for_ties() {
        let pairs = vec![pair("A", "B"), pair("A", "C"), pair("A", "D")];
        let reranked = rerank_pairs(pairs.clone(), "", Facet::Definition);
        // identical-length, zero-overlap pairs keep their prior order
        assert_eq!(reranked, pairs);
    }

    #[test]
    fn test_overlap_ratio_bounds() {
        assert_eq!(overlap_ratio("", &[pair("A", "B")]), 0.0);
        assert_eq!(overlap_ratio("asthma", &[]), 0.0);
        let ratio = overlap_ratio("asthma", &[pair("Asthma", "Respiratory disease")]);
        assert!(ratio > 0.0 && ratio <= 1.0);
    }

    #[test]
    fn test_has_facet_evidence() {
        let pairs = vec![pair("Asthma", "Inhaler use")];
        assert!(has_facet_evidence(&pairs, Facet::Treatments));
        assert!(!has_facet_evidence(&pairs, Facet::Symptoms));
        assert!(has_facet_evidence(&pairs, Facet::Definition));
    }

    #[test]
    fn test_normalize_label() {
        assert_eq!(normalize_label("Asthma (disorder)"), "Asthma");
        assert_eq!(normalize_label("Bronchitis, NOS"), "Bronchitis");
        assert_eq!(normalize_label("  Asthma  "), "Asthma");
    }

    #[test]
    fn test_derive_narrative_picks_dominant_source() {
        let pairs = vec![
            pair("Asthma (disorder)", "Respiratory disease"),
            pair("Asthma (disorder)", "Chronic disease"),
            pair("Bronchitis", "Lung finding"),
        ];
        let narrative = derive_narrative(&pairs).unwrap();
        assert_eq!(narrative.condition, "Asthma");
        assert_eq!(
            narrative.categories,
            vec![
                "Respiratory disease".to_string(),
                "Chronic disease".to_string(),
                "Lung finding".to_string()
            ]
        );
    }

    #[test]
    fn test_derive_narrative_empty() {
        assert!(derive_narrative(&[]).is_none());
    }

    #[test]
    fn test_sufficiency_strong_weak_none() {
        let strong = vec![pair("Asthma", "Bronchodilator therapy")];
        assert_eq!(
            evaluate_sufficiency(&strong, Facet::Treatments),
            EvidenceLevel::Strong
        );

        let weak = vec![
            pair("Asthma", "Respiratory disease"),
            pair("Asthma", "Chronic disease"),
        ];
        assert_eq!(
            evaluate_sufficiency(&weak, Facet::Treatments),
            EvidenceLevel::Weak
        );

        let none = vec![pair("Asthma", "Respiratory disease")];
        assert_eq!(
            evaluate_sufficiency(&none, Facet::Treatments),
            EvidenceLevel::None
        );

        assert_eq!(
            evaluate_sufficiency(&[], Facet::Definition),
            EvidenceLevel::Strong
        );
    }
}
