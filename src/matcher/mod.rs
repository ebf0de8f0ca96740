//! Concept matching against the terminology graph
//!
//! Each term is looked up exactly/by-containment through the graph store;
//! when nothing matches and the term looks like a plausible single concept
//! (one or two tokens, five or more characters, no stopwords), approximate
//! matching runs against a process-wide vocabulary cache and any close
//! labels are re-queried. Results are deduplicated by concept id,
//! preserving first occurrence.
//!
//! The vocabulary cache is owned by the matcher and lazily initialized
//! exactly once; concurrent first callers share one population attempt.
//! A failed fetch leaves the cache empty rather than failing requests.

use std::sync::Arc;
use tokio::sync::OnceCell;

use crate::error::Result;
use crate::graph::GraphStore;
use crate::models::ConceptMatch;
use crate::terms::{alpha_tokens, is_noise_term, is_stopword};

/// Similarity cutoff for approximate label matching
const FUZZY_CUTOFF: f64 = 0.82;

/// Approximate candidates considered per term
const FUZZY_TOP_N: usize = 5;

/// Maps search terms to graph concepts
pub struct ConceptMatcher {
    store: Arc<dyn GraphStore>,
    vocab_limit: usize,
    vocab: OnceCell<Vec<String>>,
}

impl ConceptMatcher {
    pub fn new(store: Arc<dyn GraphStore>, vocab_limit: usize) -> Self {
        Self {
            store,
            vocab_limit,
            vocab: OnceCell::new(),
        }
    }

    /// Look up graph concepts for one normalized term
    pub async fn lookup(&self, term: &str) -> Result<Vec<ConceptMatch>> {
        let term = term.trim();
        if term.is_empty() || is_noise_term(term) {
            return Ok(Vec::new());
        }

        let mut matches = self.store.match_concepts(term).await?;

        if matches.is_empty() && fuzzy_eligible(term) {
            for close in self.fuzzy_candidates(term).await {
                let more = self.store.match_concepts(&close).await?;
                matches.extend(more);
            }
        }

        Ok(dedup_by_concept_id(matches))
    }

    /// Close vocabulary labels for a term, best first
    async fn fuzzy_candidates(&self, term: &str) -> Vec<String> {
        let vocab = self
            .vocab
            .get_or_init(|| async {
                match self.store.list_vocabulary(self.vocab_limit).await {
                    Ok(labels) => {
                        tracing::info!(count = labels.len(), "vocabulary cache populated");
                        labels
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, "vocabulary fetch failed, fuzzy matching disabled");
                        Vec::new()
                    }
                }
            })
            .await;

        if vocab.is_empty() {
            return Vec::new();
        }

        let needle = term.to_lowercase();
        let mut scored: Vec<(f64, &String)> = vocab
            .iter()
            .filter_map(|label| {
                let sim = similarity(&needle, label);
                (sim >= FUZZY_CUTOFF).then_some((sim, label))
            })
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored
            .into_iter()
            .take(FUZZY_TOP_N)
            .map(|(_, label)| label.clone())
            .collect()
    }
}

/// Whether a term qualifies for approximate matching
fn fuzzy_eligible(term: &str) -> bool {
    let toks = alpha_tokens(term);
    (1..=2).contains(&toks.len())
        && term.chars().count() >= 5
        && !toks.iter().any(|t| is_stopword(t))
}

fn dedup_by_concept_id(matches: Vec<ConceptMatch>) -> Vec<ConceptMatch> {
    let mut seen = std::collections::HashSet::new();
    matches
        .into_iter()
        .filter(|m| !m.concept_id.is_empty() && seen.insert(m.concept_id.clone()))
        .collect()
}

/// Normalized Levenshtein similarity in 0.0..=1.0
fn similarity(a: &str, b: &str) -> f64 {
    if a == b {
        return 1.0;
    }
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    let max_len = a_chars.len().max(b_chars.len());
    if max_len == 0 {
        return 1.0;
    }
    1.0 - (levenshtein(&a_chars, &b_chars) as f64) / (max_len as f64)
}

fn levenshtein(a: &[char], b: &[char]) -> usize {
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0usize; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}
