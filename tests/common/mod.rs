//! Common test doubles for pipeline integration tests

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use wenzhen::config::Config;
use wenzhen::error::{Error, Result};
use wenzhen::graph::GraphStore;
use wenzhen::llm::{GenerationParams, LanguageModel};
use wenzhen::models::{ConceptMatch, EvidencePair};
use wenzhen::pipeline::Pipeline;
use wenzhen::recognizer::{EntityRecognizer, EntitySpan};

/// Recognizer that returns a fixed span list
pub struct FakeRecognizer {
    spans: Vec<String>,
    fail: bool,
}

impl FakeRecognizer {
    pub fn with_spans(spans: &[&str]) -> Self {
        Self {
            spans: spans.iter().map(|s| s.to_string()).collect(),
            fail: false,
        }
    }

    pub fn empty() -> Self {
        Self::with_spans(&[])
    }

    #[allow(dead_code)]
    pub fn failing() -> Self {
        Self {
            spans: Vec::new(),
            fail: true,
        }
    }
}

#[async_trait]
impl EntityRecognizer for FakeRecognizer {
    async fn extract_entities(&self, _text: &str) -> Result<Vec<EntitySpan>> {
        if self.fail {
            return Err(Error::Recognizer("recognizer down".to_string()));
        }
        Ok(self
            .spans
            .iter()
            .map(|s| EntitySpan {
                text: s.clone(),
                entity_type: "ENTITY".to_string(),
            })
            .collect())
    }
}

/// In-memory graph store keyed by lowercase term and concept id
#[derive(Default)]
pub struct FakeGraph {
    matches: HashMap<String, Vec<ConceptMatch>>,
    hierarchies: HashMap<String, Vec<EvidencePair>>,
    vocab: Vec<String>,
}

impl FakeGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_concept(mut self, term: &str, concept_id: &str, label: &str) -> Self {
        self.matches
            .entry(term.to_lowercase())
            .or_default()
            .push(ConceptMatch {
                concept_id: concept_id.to_string(),
                label: label.to_string(),
            });
        self
    }

    pub fn with_hierarchy(mut self, concept_id: &str, pairs: &[(&str, &str)]) -> Self {
        self.hierarchies.insert(
            concept_id.to_string(),
            pairs.iter().map(|(s, t)| EvidencePair::new(*s, *t)).collect(),
        );
        self
    }

    #[allow(dead_code)]
    pub fn with_vocab(mut self, labels: &[&str]) -> Self {
        self.vocab = labels.iter().map(|s| s.to_string()).collect();
        self
    }
}

#[async_trait]
impl GraphStore for FakeGraph {
    async fn match_concepts(&self, term: &str) -> Result<Vec<ConceptMatch>> {
        Ok(self
            .matches
            .get(&term.to_lowercase())
            .cloned()
            .unwrap_or_default())
    }

    async fn fetch_hierarchy(&self, concept_id: &str) -> Result<Vec<EvidencePair>> {
        Ok(self.hierarchies.get(concept_id).cloned().unwrap_or_default())
    }

    async fn list_vocabulary(&self, _limit: usize) -> Result<Vec<String>> {
        Ok(self.vocab.clone())
    }
}

/// Scripted language model; responses are consumed in order and the
/// last one repeats
pub struct FakeLlm {
    responses: Mutex<Vec<String>>,
    prompts: Mutex<Vec<String>>,
    calls: AtomicUsize,
    fail: bool,
}

impl FakeLlm {
    pub fn with_responses(responses: &[&str]) -> Self {
        Self {
            responses: Mutex::new(responses.iter().map(|s| s.to_string()).collect()),
            prompts: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            responses: Mutex::new(Vec::new()),
            prompts: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            fail: true,
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    #[allow(dead_code)]
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl LanguageModel for FakeLlm {
    async fn generate(
        &self,
        prompt: &str,
        _params: GenerationParams,
        _model: Option<&str>,
    ) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());
        if self.fail {
            return Err(Error::llm("ollama unreachable"));
        }
        let mut responses = self.responses.lock().unwrap();
        if responses.len() > 1 {
            Ok(responses.remove(0))
        } else {
            Ok(responses.first().cloned().unwrap_or_default())
        }
    }
}

/// Build a pipeline over the given fakes with default settings
pub fn build_pipeline(
    recognizer: FakeRecognizer,
    graph: FakeGraph,
    llm: Arc<FakeLlm>,
) -> Pipeline {
    let config = Config::default();
    Pipeline::new(Arc::new(recognizer), Arc::new(graph), llm, &config)
}

/// Same, with a caller-adjusted configuration
pub fn build_pipeline_with_config(
    recognizer: FakeRecognizer,
    graph: FakeGraph,
    llm: Arc<FakeLlm>,
    config: &Config,
) -> Pipeline {
    Pipeline::new(Arc::new(recognizer), Arc::new(graph), llm, config)
}
