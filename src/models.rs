//! Core data structures for the question-answering pipeline
//!
//! All types here are request-scoped: nothing in this module is persisted.
//! The only externally visible result is [`AnswerRecord`], which is
//! immutable once the pipeline has built it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which aspect of a condition a question targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Facet {
    Definition,
    Symptoms,
    Treatments,
}

impl Facet {
    /// All facets in tie-break priority order (highest first)
    pub fn priority_order() -> [Facet; 3] {
        [Facet::Treatments, Facet::Symptoms, Facet::Definition]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Facet::Definition => "definition",
            Facet::Symptoms => "symptoms",
            Facet::Treatments => "treatments",
        }
    }

    /// Parse a facet name; returns `None` for anything unrecognized
    pub fn parse(s: &str) -> Option<Facet> {
        match s.trim().to_lowercase().as_str() {
            "definition" => Some(Facet::Definition),
            "symptoms" => Some(Facet::Symptoms),
            "treatments" => Some(Facet::Treatments),
            _ => None,
        }
    }
}

impl Default for Facet {
    fn default() -> Self {
        Facet::Definition
    }
}

impl fmt::Display for Facet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Answer presentation policy
///
/// Research mode keeps only graph-grounded content; user mode adds a
/// bounded general-knowledge supplement section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnswerMode {
    Research,
    User,
}

impl AnswerMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnswerMode::Research => "research",
            AnswerMode::User => "user",
        }
    }

    pub fn parse(s: &str) -> Option<AnswerMode> {
        match s.trim().to_lowercase().as_str() {
            "research" => Some(AnswerMode::Research),
            "user" => Some(AnswerMode::User),
            _ => None,
        }
    }
}

impl Default for AnswerMode {
    fn default() -> Self {
        AnswerMode::Research
    }
}

impl fmt::Display for AnswerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How well the retrieved evidence supports the requested facet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvidenceLevel {
    Strong,
    Weak,
    None,
}

impl EvidenceLevel {
    pub fn is_strong(&self) -> bool {
        matches!(self, EvidenceLevel::Strong)
    }
}

/// Machine-readable note recording which cascade tier produced the answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyNote {
    /// No clinical terms extracted; answered by the LLM alone
    NoTermsToKg,
    /// Terms extracted but nothing matched in the graph
    NoCandidatesFromKg,
    /// Low lexical overlap; degraded to the template summarizer
    FacetLiteLowOverlap,
    /// Low overlap and the template was also bad; LLM-only
    FacetLlmOnlyLowOverlapAfterLite,
    /// Research mode with weak evidence; fixed insufficiency narrative
    ResearchWeakEvidenceInsufficient,
    /// User mode with no facet evidence; LLM-only
    FacetLlmOnly,
    /// User mode with weak evidence; normal path with hedged grounding
    WeakEvidenceContext,
    /// Normal graph-grounded LLM answer
    GraphLlm,
    /// Lite flag set; deterministic template summarizer
    LiteTemplate,
    /// LLM answer was bad; recovered via the template summarizer
    FallbackLiteAfterBadLlm,
    /// Both the LLM and the template were bad; LLM-only
    FallbackLlmOnlyAfterBadLlmAndLite,
}

impl StrategyNote {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyNote::NoTermsToKg => "no_terms_to_kg",
            StrategyNote::NoCandidatesFromKg => "no_candidates_from_kg",
            StrategyNote::FacetLiteLowOverlap => "facet_lite_low_overlap",
            StrategyNote::FacetLlmOnlyLowOverlapAfterLite => {
                "facet_llm_only_low_overlap_after_lite"
            }
            StrategyNote::ResearchWeakEvidenceInsufficient => {
                "research_weak_evidence_insufficient"
            }
            StrategyNote::FacetLlmOnly => "facet_llm_only",
            StrategyNote::WeakEvidenceContext => "weak_evidence_context",
            StrategyNote::GraphLlm => "graph_llm",
            StrategyNote::LiteTemplate => "lite_template",
            StrategyNote::FallbackLiteAfterBadLlm => "fallback_lite_after_bad_llm",
            StrategyNote::FallbackLlmOnlyAfterBadLlmAndLite => {
                "fallback_llm_only_after_bad_llm_and_lite"
            }
        }
    }
}

impl fmt::Display for StrategyNote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A concept returned by the graph store for one search term
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConceptMatch {
    /// Graph concept identifier
    pub concept_id: String,

    /// Canonical label of the matched description
    pub label: String,
}

/// One hierarchical (is-a) relation drawn from the graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidencePair {
    pub source: String,
    pub target: String,
}

impl EvidencePair {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }

    /// A pair with an empty endpoint is malformed and filtered out
    pub fn is_valid(&self) -> bool {
        !self.source.trim().is_empty() && !self.target.trim().is_empty()
    }

    /// Display form used in prompts and the answer summary
    pub fn text(&self) -> String {
        format!("{} → {}", self.source, self.target)
    }
}

impl fmt::Display for EvidencePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} → {}", self.source, self.target)
    }
}

/// One (term, matched concept) pair with its retrieved evidence
///
/// Candidates live only long enough to be ranked; the top-K survivors
/// contribute their pairs to the combined evidence and are discarded.
#[derive(Debug, Clone)]
pub struct Candidate {
    /// Matched description label from the graph
    pub term: String,

    /// Graph concept identifier
    pub concept_id: String,

    /// Hierarchy pairs retrieved for this concept
    pub pairs: Vec<EvidencePair>,

    /// 1.0 when the query term is a literal substring of the label, else 0.5
    pub relevance: f64,
}

impl Candidate {
    pub fn pair_count(&self) -> usize {
        self.pairs.len()
    }
}

/// Client hints accompanying a question
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    /// Explicit facet; skips the classifier when recognized
    pub facet_hint: Option<Facet>,

    /// Topic term prepended ahead of question-derived terms
    pub topic_hint: Option<String>,

    /// Answer presentation policy
    pub mode: AnswerMode,

    /// Skip the language-model call and use the template summarizer
    pub lite: bool,

    /// Hard cap on selected candidate concepts
    pub max_k: Option<usize>,

    /// Requested item count for symptoms/treatments facets
    pub facet_k: Option<usize>,

    /// Disable the facet-insufficiency fallback tier
    pub no_facet_fallback: bool,

    /// Language model override
    pub model: Option<String>,
}

/// Per-term match count, kept for observability
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchDebug {
    pub input_term: String,
    pub match_count: usize,
}

/// Per-phase timing breakdown in milliseconds
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct PhaseTimings {
    /// Term extraction + concept matching + evidence retrieval
    pub lookup_ms: u64,

    /// Prompt building + generation (or template rendering)
    pub generation_ms: u64,

    pub total_ms: u64,
}

/// The externally visible result of one answered question
#[derive(Debug, Clone, Serialize)]
pub struct AnswerRecord {
    pub question: String,
    pub facet: Facet,
    pub mode: AnswerMode,
    pub extracted_terms: Vec<String>,

    /// Matched label of the best candidate, when the graph contributed
    pub term: Option<String>,
    pub concept_id: Option<String>,
    pub relevance: f64,

    /// Total pair count over the selected top-K candidates
    pub subgraph_size: usize,

    /// Top reranked pairs shown to the caller (at most 3)
    pub subgraph_summary: Vec<String>,

    pub answer: String,
    pub note: StrategyNote,
    pub evidence_level: EvidenceLevel,
    pub debug: Vec<MatchDebug>,
    pub timings: PhaseTimings,
    pub answered_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_facet_parse_roundtrip() {
        for facet in Facet::priority_order() {
            assert_eq!(Facet::parse(facet.as_str()), Some(facet));
        }
        assert_eq!(Facet::parse("DEFINITION"), Some(Facet::Definition));
        assert_eq!(Facet::parse("unknown"), None);
        assert_eq!(Facet::parse(""), None);
    }

    #[test]
    fn test_facet_default() {
        assert_eq!(Facet::default(), Facet::Definition);
    }

    #[test]
    fn test_mode_parse() {
        assert_eq!(AnswerMode::parse("user"), Some(AnswerMode::User));
        assert_eq!(AnswerMode::parse("Research"), Some(AnswerMode::Research));
        assert_eq!(AnswerMode::parse("strict"), None);
    }

    #[test]
    fn test_pair_validity() {
        assert!(EvidencePair::new("Asthma", "Respiratory disease").is_valid());
        assert!(!EvidencePair::new("", "Respiratory disease").is_valid());
        assert!(!EvidencePair::new("Asthma", "  ").is_valid());
    }

    #[test]
    fn test_pair_text() {
        let pair = EvidencePair::new("Asthma", "Respiratory disease");
        assert_eq!(pair.text(), "Asthma → Respiratory disease");
    }

    #[test]
    fn test_strategy_note_serialization() {
        let json = serde_json::to_string(&StrategyNote::NoTermsToKg).unwrap();
        assert_eq!(json, "\"no_terms_to_kg\"");
        let json = serde_json::to_string(&StrategyNote::ResearchWeakEvidenceInsufficient).unwrap();
        assert_eq!(json, "\"research_weak_evidence_insufficient\"");
    }
}
