//! Prompt and template building
//!
//! Renders facet- and mode-specific instructions with compressed graph
//! evidence for the language model, the facet-specific LLM-only prompts,
//! and the deterministic template summarizer used for `lite` requests and
//! bad-answer recovery. The summarizer performs no model call and is fully
//! deterministic given its evidence input.

use lazy_static::lazy_static;
use std::collections::HashMap;

use crate::evidence::{derive_narrative, Narrative};
use crate::models::{AnswerMode, EvidencePair, Facet};

/// Marker returned when no usable graph evidence exists
pub const NO_EVIDENCE_MARKER: &str = "--找不到足夠的知識圖資訊來回答問題。--";

/// Canonical general-knowledge section marker
pub const GENERAL_KNOWLEDGE_MARKER: &str = "【一般知識補充】";

/// Marker spellings the model is known to produce
pub const GENERAL_KNOWLEDGE_VARIANTS: &[&str] = &[
    "【一般知識補充】",
    "一般知識補充：",
    "一般知識補充",
    "General knowledge supplement:",
    "General knowledge:",
];

/// Default supplement bullet when the model omits the section in user mode
pub const DEFAULT_SUPPLEMENT: &str = "- 以上內容以知識圖譜證據為主；一般臨床背景請諮詢專業醫療人員。";

/// Evidence and output budgets for one facet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FacetLimits {
    /// Evidence pairs included in the prompt
    pub max_items: usize,

    /// Character budget per evidence line
    pub max_chars: usize,

    /// Output token budget for the model
    pub num_predict: u32,
}

/// Facet-dependent evidence/output budgets
pub fn facet_limits(facet: Facet) -> FacetLimits {
    match facet {
        Facet::Definition => FacetLimits {
            max_items: 6,
            max_chars: 260,
            num_predict: 220,
        },
        Facet::Symptoms => FacetLimits {
            max_items: 12,
            max_chars: 380,
            num_predict: 340,
        },
        Facet::Treatments => FacetLimits {
            max_items: 14,
            max_chars: 400,
            num_predict: 360,
        },
    }
}

fn facet_text(facet: Facet) -> &'static str {
    match facet {
        Facet::Symptoms => "the symptoms",
        Facet::Treatments => "the treatments",
        Facet::Definition => "the definition",
    }
}

fn facet_text_zh(facet: Facet) -> &'static str {
    match facet {
        Facet::Symptoms => "症狀",
        Facet::Treatments => "治療方式",
        Facet::Definition => "定義",
    }
}

lazy_static! {
    /// Localized display names for frequently asked conditions
    static ref LOCALIZED_CONDITIONS: HashMap<&'static str, &'static str> = {
        let mut m = HashMap::new();
        m.insert("asthma", "氣喘");
        m.insert("diabetes mellitus", "糖尿病");
        m.insert("diabetes", "糖尿病");
        m.insert("stroke", "中風");
        m.insert("cerebrovascular accident", "中風");
        m.insert("hypertension", "高血壓");
        m.insert("hypertensive disorder", "高血壓");
        m.insert("myocardial infarction", "心肌梗塞");
        m.insert("influenza", "流感");
        m
    };
}

/// Localized name for a condition, when one is known
pub fn localized_condition(condition: &str) -> Option<&'static str> {
    LOCALIZED_CONDITIONS
        .get(condition.to_lowercase().as_str())
        .copied()
}

/// Compress evidence lines to the facet's item/character budget
pub fn compress_pairs(pairs: &[String], max_items: usize, max_chars: usize) -> Vec<String> {
    let mut out = Vec::new();
    for raw in pairs.iter().take(max_items) {
        let mut line = raw.replace('\n', " ").trim().to_string();
        if line.chars().count() > max_chars {
            let truncated: String = line.chars().take(max_chars).collect();
            let cut = truncated.rfind(' ').unwrap_or(truncated.len());
            line = format!("{} ...", &truncated[..cut]);
        }
        if !line.is_empty() {
            out.push(line);
        }
    }
    out
}

/// Build the graph-grounded generation prompt
///
/// Research mode forbids anything beyond the evidence; user mode asks for
/// an additional bounded general-knowledge section under the canonical
/// marker. Weak evidence adds a hedging instruction.
pub fn build_kg_prompt(
    facet: Facet,
    mode: AnswerMode,
    question: &str,
    pairs: &[EvidencePair],
    weak_evidence: bool,
) -> String {
    let limits = facet_limits(facet);
    let texts: Vec<String> = pairs.iter().map(|p| p.text()).collect();
    let bullets = compress_pairs(&texts, limits.max_items, limits.max_chars);
    let rels = if bullets.is_empty() {
        "(no evidence)".to_string()
    } else {
        format!("- {}", bullets.join("\n- "))
    };

    let facet = facet_label_and_guidance(facet);
    let (facet_name, guidance) = facet;

    let mut prompt = format!(
        r#"You are a medical QA assistant.

Answer ONLY {facet_name} of the condition asked.
Prefer short bullet points when applicable. Reuse exact medical terms appearing in the Evidence.
If the Evidence does not specify {facet_name}, answer exactly:
"The provided sources do not specify {facet_name}."

Question:
{question}

Evidence (compressed from a medical knowledge graph):
{rels}

Now provide ONLY {facet_name}:
- Keep it brief (<= 3 bullets OR <= 3 short sentences).
- {guidance}
- Do NOT add background, caveats, or extra context.
"#
    );

    if weak_evidence {
        prompt.push_str(
            "- The Evidence is weak for this facet; state only what it supports and keep claims tentative.\n",
        );
    }

    if mode == AnswerMode::User {
        prompt.push_str(&format!(
            "\nAfter the evidence-based answer, add a section starting with \"{GENERAL_KNOWLEDGE_MARKER}\" containing at most 3 short bullet lines of widely accepted general knowledge.\n"
        ));
    }

    prompt
}

fn facet_label_and_guidance(facet: Facet) -> (&'static str, &'static str) {
    let guidance = match facet {
        Facet::Definition => {
            "Write ONE compact definitional sentence using terms from Evidence when possible. No background; avoid paraphrasing named medical terms."
        }
        Facet::Symptoms => {
            "Start with: 'Common symptoms include:' then list 2–4 concise items using Evidence terms when available. No background."
        }
        Facet::Treatments => {
            "Start with: 'Treatments include:' then list 2–4 concise options using Evidence terms when available. No background."
        }
    };
    (facet_text(facet), guidance)
}

/// Facet-specific short prompt for answering without graph evidence
pub fn llm_only_prompt(facet: Facet, question: &str) -> String {
    match facet {
        Facet::Symptoms => format!(
            r#"You are a medical assistant. Answer in about 120 English words.

Question: {question}

Write: 1 sentence to set context, then "Common symptoms include ..." followed by 5–7 concise symptom phrases separated by commas, then one short caution."#
        ),
        Facet::Treatments => format!(
            r#"You are a medical assistant. Answer in about 120 English words.

Question: {question}

Write: 1 sentence definition, then "Treatments include ..." listing 5–7 items (medications, procedures, self-care), end with a brief note on individualized plans."#
        ),
        Facet::Definition => format!(
            r#"You are a medical assistant. Answer in about 120 English words.

Question: {question}

Write a clear definition first, followed by 2–3 compact supporting facts on classification, typical features, or context."#
        ),
    }
}

/// Deterministic template answer from hierarchical evidence
///
/// Parses the top pairs into (condition, categories), substitutes the
/// localized condition name when known, and renders one fixed sentence
/// per facet. Used for `lite` requests and as bad-answer recovery.
pub fn lite_summary(pairs: &[EvidencePair], facet: Facet) -> String {
    let narrative = match derive_narrative(pairs) {
        Some(n) if !n.categories.is_empty() => n,
        _ => return NO_EVIDENCE_MARKER.to_string(),
    };

    let condition = display_condition(&narrative);
    let categories = narrative.categories.join("; ");

    match facet {
        Facet::Definition => format!(
            "Based on the knowledge graph, {condition} is classified under: {categories}. \
             This provides a concise definition with parent/child categories."
        ),
        Facet::Symptoms => format!(
            "Based on the knowledge graph hierarchy, {condition} is related to: {categories}. \
             The graph links these categories to its recognized clinical presentations."
        ),
        Facet::Treatments => format!(
            "Based on the knowledge graph hierarchy, {condition} is linked to these categories: {categories}. \
             Management follows the standard options recorded for these categories."
        ),
    }
}

fn display_condition(narrative: &Narrative) -> String {
    match localized_condition(&narrative.condition) {
        Some(zh) => format!("{} ({zh})", narrative.condition),
        None => narrative.condition.clone(),
    }
}

/// Fixed research-mode narrative for insufficient facet evidence
///
/// Names the derived condition and up to three categories, then states
/// explicitly that the graph evidence is insufficient. Never calls the
/// language model.
pub fn insufficiency_narrative(pairs: &[EvidencePair], facet: Facet) -> String {
    let insufficient = format!("目前的圖譜證據不足以說明其{}。", facet_text_zh(facet));

    match derive_narrative(pairs) {
        Some(narrative) if !narrative.categories.is_empty() => {
            let condition = display_condition(&narrative);
            let categories = narrative.categories.join("、");
            format!(
                "知識圖譜顯示「{condition}」與下列類別相關：{categories}。{insufficient}"
            )
        }
        _ => format!("{NO_EVIDENCE_MARKER}{insufficient}"),
    }
}
