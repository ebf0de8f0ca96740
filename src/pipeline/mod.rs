//! The facet-aware retrieval-and-fallback pipeline
//!
//! One request flows one way: classify facet → extract terms → match
//! concepts → retrieve evidence → rank/combine → evaluate sufficiency →
//! select strategy → build prompt/template → (optional) LLM call →
//! finalize. The strategy selector is an ordered list of guard tiers,
//! each terminal for the request; every terminal records a
//! machine-readable strategy note and a per-phase timing breakdown.
//!
//! Nothing in here is fatal to a request. Collaborator failures become
//! failure-marker text that the bad-answer check recognizes, and the
//! worst case is an LLM-only answer or a fixed insufficiency narrative.

use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;

use crate::config::{Config, PipelineConfig};
use crate::error::Result;
use crate::evidence::{
    combine_pairs, evaluate_sufficiency, overlap_ratio, rank_candidates, rerank_pairs, top_k,
};
use crate::graph::GraphStore;
use crate::llm::{answer_or_marker, GenerationParams, LanguageModel, LLM_FAILURE_MARKER};
use crate::matcher::ConceptMatcher;
use crate::models::{
    AnswerMode, AnswerRecord, Candidate, EvidenceLevel, EvidencePair, Facet, MatchDebug,
    PhaseTimings, QueryOptions, StrategyNote,
};
use crate::prompt::{
    build_kg_prompt, facet_limits, insufficiency_narrative, lite_summary, llm_only_prompt,
    DEFAULT_SUPPLEMENT, GENERAL_KNOWLEDGE_MARKER, GENERAL_KNOWLEDGE_VARIANTS, NO_EVIDENCE_MARKER,
};
use crate::recognizer::EntityRecognizer;
use crate::{facet, terms};

/// Answers shorter than this (after trimming) are considered bad
const MIN_ANSWER_CHARS: usize = 24;

/// Pairs kept in the externally visible evidence summary
const SUMMARY_PAIRS: usize = 3;

/// Supplement bullets kept in user mode
const MAX_SUPPLEMENT_LINES: usize = 3;

/// Whether a generated answer is unusable
///
/// Bad means empty, starting with a known failure prefix, carrying the
/// LLM failure marker, or implausibly short.
pub fn is_bad_answer(answer: &str) -> bool {
    let s = answer.trim().to_lowercase();
    if s.is_empty() {
        return true;
    }
    if s.starts_with("!!!") || s.contains(&LLM_FAILURE_MARKER.to_lowercase()) {
        return true;
    }
    s.chars().count() < MIN_ANSWER_CHARS
}

/// Earliest occurrence of any general-knowledge marker variant
fn find_marker(answer: &str) -> Option<(usize, usize)> {
    GENERAL_KNOWLEDGE_VARIANTS
        .iter()
        .filter_map(|v| answer.find(v).map(|idx| (idx, v.len())))
        .min_by_key(|(idx, _)| *idx)
}

/// Mode-dependent answer post-processing
///
/// Research mode keeps only graph-grounded content by stripping anything
/// from the general-knowledge marker on. User mode guarantees the
/// two-section structure: graph-grounded text, then the canonical marker
/// with at most three supplement bullet lines.
pub fn finalize_answer(answer: &str, mode: AnswerMode) -> String {
    match mode {
        AnswerMode::Research => match find_marker(answer) {
            Some((idx, _)) => answer[..idx].trim_end().to_string(),
            None => answer.trim().to_string(),
        },
        AnswerMode::User => {
            let (main, supplement) = match find_marker(answer) {
                Some((idx, len)) => (
                    answer[..idx].trim_end().to_string(),
                    Some(answer[idx + len..].trim().to_string()),
                ),
                None => (answer.trim().to_string(), None),
            };

            let bullets: Vec<String> = match supplement {
                Some(text) => text
                    .lines()
                    .map(str::trim)
                    .filter(|l| !l.is_empty())
                    .take(MAX_SUPPLEMENT_LINES)
                    .map(|l| {
                        if l.starts_with('-') || l.starts_with('•') || l.starts_with('*') {
                            l.to_string()
                        } else {
                            format!("- {l}")
                        }
                    })
                    .collect(),
                None => Vec::new(),
            };

            let bullets = if bullets.is_empty() {
                vec![DEFAULT_SUPPLEMENT.to_string()]
            } else {
                bullets
            };

            format!(
                "{main}\n\n{GENERAL_KNOWLEDGE_MARKER}\n{}",
                bullets.join("\n")
            )
        }
    }
}

/// The question-answering pipeline
pub struct Pipeline {
    recognizer: Arc<dyn EntityRecognizer>,
    store: Arc<dyn GraphStore>,
    llm: Arc<dyn LanguageModel>,
    matcher: ConceptMatcher,
    settings: PipelineConfig,
}

/// Everything a terminal tier needs to emit an AnswerRecord
struct RequestState {
    question: String,
    facet: Facet,
    mode: AnswerMode,
    extracted_terms: Vec<String>,
    debug: Vec<MatchDebug>,
    started: Instant,
    lookup_ms: u64,
}

impl RequestState {
    fn record(
        self,
        answer: String,
        note: StrategyNote,
        level: EvidenceLevel,
        top: Option<&Candidate>,
        subgraph_size: usize,
        summary: Vec<String>,
        generation_ms: u64,
    ) -> AnswerRecord {
        AnswerRecord {
            question: self.question,
            facet: self.facet,
            mode: self.mode,
            extracted_terms: self.extracted_terms,
            term: top.map(|c| c.term.clone()),
            concept_id: top.map(|c| c.concept_id.clone()),
            relevance: top.map(|c| c.relevance).unwrap_or(0.0),
            subgraph_size,
            subgraph_summary: summary,
            answer,
            note,
            evidence_level: level,
            debug: self.debug,
            timings: PhaseTimings {
                lookup_ms: self.lookup_ms,
                generation_ms,
                total_ms: self.started.elapsed().as_millis() as u64,
            },
            answered_at: Utc::now(),
        }
    }
}

impl Pipeline {
    pub fn new(
        recognizer: Arc<dyn EntityRecognizer>,
        store: Arc<dyn GraphStore>,
        llm: Arc<dyn LanguageModel>,
        config: &Config,
    ) -> Self {
        Self {
            recognizer,
            matcher: ConceptMatcher::new(store.clone(), config.graph.vocab_limit),
            store,
            llm,
            settings: config.pipeline.clone(),
        }
    }

    /// Classify the facet of a question (pure; usable for diagnostics)
    pub fn classify_facet(&self, question: &str) -> Facet {
        facet::classify(question)
    }

    /// Answer a question without graph evidence
    pub async fn llm_only(&self, question: &str, facet: Facet, model: Option<&str>) -> String {
        let prompt = llm_only_prompt(facet, question);
        answer_or_marker(
            self.llm
                .generate(&prompt, GenerationParams::default(), model)
                .await,
        )
    }

    /// Answer a question through the full cascade
    pub async fn answer(&self, question: &str, options: QueryOptions) -> Result<AnswerRecord> {
        let started = Instant::now();
        let facet = options.facet_hint.unwrap_or_else(|| facet::classify(question));
        let mode = options.mode;

        tracing::debug!(facet = %facet, mode = %mode, "answering question");

        let extracted = terms::extract_terms_with_topic(
            self.recognizer.as_ref(),
            question,
            options.topic_hint.as_deref(),
        )
        .await;

        // Tier 1: nothing to look up
        if extracted.is_empty() {
            let state = RequestState {
                question: question.to_string(),
                facet,
                mode,
                extracted_terms: Vec::new(),
                debug: Vec::new(),
                started,
                lookup_ms: started.elapsed().as_millis() as u64,
            };
            tracing::info!(note = "no_terms_to_kg", "no clinical terms extracted");
            let gen_started = Instant::now();
            let ans = if self.settings.enable_fallback {
                self.llm_only(question, facet, options.model.as_deref())
                    .await
            } else {
                NO_EVIDENCE_MARKER.to_string()
            };
            let ans = finalize_answer(&ans, mode);
            return Ok(state.record(
                ans,
                StrategyNote::NoTermsToKg,
                EvidenceLevel::None,
                None,
                0,
                Vec::new(),
                gen_started.elapsed().as_millis() as u64,
            ));
        }

        let (mut candidates, debug) = self.gather_candidates(&extracted).await;

        // Tier 2: terms matched nothing in the graph
        if candidates.is_empty() {
            let state = RequestState {
                question: question.to_string(),
                facet,
                mode,
                extracted_terms: extracted,
                debug,
                started,
                lookup_ms: started.elapsed().as_millis() as u64,
            };
            tracing::info!(note = "no_candidates_from_kg", "no graph concepts matched");
            let gen_started = Instant::now();
            let ans = if self.settings.enable_fallback {
                self.llm_only(question, facet, options.model.as_deref())
                    .await
            } else {
                NO_EVIDENCE_MARKER.to_string()
            };
            let ans = finalize_answer(&ans, mode);
            return Ok(state.record(
                ans,
                StrategyNote::NoCandidatesFromKg,
                EvidenceLevel::None,
                None,
                0,
                Vec::new(),
                gen_started.elapsed().as_millis() as u64,
            ));
        }

        rank_candidates(&mut candidates);
        let k = top_k(facet, options.facet_k, options.max_k).min(candidates.len());
        let selected = &candidates[..k];

        let combined = combine_pairs(selected);
        let sorted_pairs = rerank_pairs(combined, question, facet);

        let lookup_ms = started.elapsed().as_millis() as u64;
        let level = evaluate_sufficiency(&sorted_pairs, facet);
        let ratio = overlap_ratio(question, &sorted_pairs);
        let subgraph_size: usize = selected.iter().map(|c| c.pair_count()).sum();
        let summary: Vec<String> = sorted_pairs
            .iter()
            .take(SUMMARY_PAIRS)
            .map(|p| p.text())
            .collect();
        let top = selected[0].clone();

        tracing::debug!(
            candidates = candidates.len(),
            selected = k,
            pairs = sorted_pairs.len(),
            evidence = ?level,
            overlap = ratio,
            "evidence assembled"
        );

        let state = RequestState {
            question: question.to_string(),
            facet,
            mode,
            extracted_terms: extracted,
            debug,
            started,
            lookup_ms,
        };

        // Tier 3 (off by default): low lexical overlap without strong evidence
        if self.settings.enable_fallback
            && self.settings.enable_low_overlap
            && !level.is_strong()
            && ratio < self.settings.low_overlap_threshold
        {
            let gen_started = Instant::now();
            let lite = lite_summary(&sorted_pairs, facet);
            let (ans, note) = if is_bad_answer(&lite) {
                let ans = self
                    .llm_only(question, facet, options.model.as_deref())
                    .await;
                (ans, StrategyNote::FacetLlmOnlyLowOverlapAfterLite)
            } else {
                (lite, StrategyNote::FacetLiteLowOverlap)
            };
            tracing::info!(note = %note, overlap = ratio, "low-overlap degrade tier");
            let ans = finalize_answer(&ans, mode);
            return Ok(state.record(
                ans,
                note,
                level,
                None,
                0,
                summary,
                gen_started.elapsed().as_millis() as u64,
            ));
        }

        // Tier 4: symptoms/treatments question without strong facet evidence
        let mut weak_context = false;
        if self.settings.enable_fallback
            && !options.no_facet_fallback
            && matches!(facet, Facet::Symptoms | Facet::Treatments)
            && !level.is_strong()
        {
            match (mode, level) {
                (AnswerMode::Research, _) => {
                    let gen_started = Instant::now();
                    let ans = insufficiency_narrative(&sorted_pairs, facet);
                    tracing::info!(
                        note = "research_weak_evidence_insufficient",
                        "research mode: evidence insufficient for facet"
                    );
                    return Ok(state.record(
                        ans,
                        StrategyNote::ResearchWeakEvidenceInsufficient,
                        level,
                        Some(&top),
                        subgraph_size,
                        summary,
                        gen_started.elapsed().as_millis() as u64,
                    ));
                }
                (AnswerMode::User, EvidenceLevel::None) => {
                    let gen_started = Instant::now();
                    let ans = self
                        .llm_only(question, facet, options.model.as_deref())
                        .await;
                    let ans = finalize_answer(&ans, mode);
                    tracing::info!(note = "facet_llm_only", "user mode: no facet evidence");
                    return Ok(state.record(
                        ans,
                        StrategyNote::FacetLlmOnly,
                        level,
                        Some(&top),
                        subgraph_size,
                        summary,
                        gen_started.elapsed().as_millis() as u64,
                    ));
                }
                _ => {
                    // weak evidence in user mode: proceed, hedged
                    weak_context = true;
                }
            }
        }

        // Tier 5: normal graph-grounded generation
        let gen_started = Instant::now();
        let (ans, note) = if options.lite {
            (lite_summary(&sorted_pairs, facet), StrategyNote::LiteTemplate)
        } else {
            let prompt = build_kg_prompt(facet, mode, question, &sorted_pairs, weak_context);
            let params = GenerationParams::with_num_predict(facet_limits(facet).num_predict);
            let ans = answer_or_marker(
                self.llm
                    .generate(&prompt, params, options.model.as_deref())
                    .await,
            );

            if self.settings.enable_fallback && is_bad_answer(&ans) {
                let lite = lite_summary(&sorted_pairs, facet);
                if is_bad_answer(&lite) {
                    let ans = self
                        .llm_only(question, facet, options.model.as_deref())
                        .await;
                    (ans, StrategyNote::FallbackLlmOnlyAfterBadLlmAndLite)
                } else {
                    (lite, StrategyNote::FallbackLiteAfterBadLlm)
                }
            } else if weak_context {
                (ans, StrategyNote::WeakEvidenceContext)
            } else {
                (ans, StrategyNote::GraphLlm)
            }
        };

        tracing::info!(note = %note, "answer generated");
        let ans = finalize_answer(&ans, mode);
        Ok(state.record(
            ans,
            note,
            level,
            Some(&top),
            subgraph_size,
            summary,
            gen_started.elapsed().as_millis() as u64,
        ))
    }

    /// Match every term and retrieve evidence for each matched concept
    ///
    /// Terms are processed one at a time; a failing graph call contributes
    /// nothing and the cascade's no-signal tiers absorb the gap.
    async fn gather_candidates(&self, terms: &[String]) -> (Vec<Candidate>, Vec<MatchDebug>) {
        let mut candidates = Vec::new();
        let mut debug = Vec::new();

        for term in terms {
            let matches = match self.matcher.lookup(term).await {
                Ok(matches) => matches,
                Err(err) => {
                    tracing::warn!(term = %term, error = %err, "concept lookup failed");
                    Vec::new()
                }
            };
            debug.push(MatchDebug {
                input_term: term.clone(),
                match_count: matches.len(),
            });

            for m in matches {
                let pairs: Vec<EvidencePair> = match self.store.fetch_hierarchy(&m.concept_id).await
                {
                    Ok(pairs) => pairs.into_iter().filter(EvidencePair::is_valid).collect(),
                    Err(err) => {
                        tracing::warn!(
                            concept_id = %m.concept_id,
                            error = %err,
                            "hierarchy retrieval failed"
                        );
                        Vec::new()
                    }
                };

                let relevance = if m.label.to_lowercase().contains(term.as_str()) {
                    1.0
                } else {
                    0.5
                };

                candidates.push(Candidate {
                    term: m.label,
                    concept_id: m.concept_id,
                    pairs,
                    relevance,
                });
            }
        }

        (candidates, debug)
    }
}
