use crate::models::statement::CandidateStatement;
use crate::services::embed_service::EmbedService;
use crate::services::grammar;
use crate::services::text_pipeline::split_sentences;
use std::collections::HashSet;

/// Tunable acceptance thresholds. Values mirror the production defaults; all
/// of them are overridable through configuration.
#[derive(Debug, Clone)]
pub struct FilterSettings {
    /// Candidates at or below this similarity are unrelated garbage.
    pub similarity_low: f32,
    /// Candidates at or above this similarity paraphrase the truth.
    pub similarity_high: f32,
    /// Preferred similarity: related but clearly different.
    pub similarity_target: f32,
    pub min_words: usize,
    pub max_words: usize,
    /// Years above this are treated as anachronisms and discarded.
    pub max_plausible_year: i32,
}

impl Default for FilterSettings {
    fn default() -> Self {
        Self {
            similarity_low: 0.3,
            similarity_high: 0.85,
            similarity_target: 0.6,
            min_words: 5,
            max_words: 30,
            max_plausible_year: 2000,
        }
    }
}

/// Turns raw generated strings into a ranked, deduplicated, validated short
/// list of false statements.
#[derive(Clone)]
pub struct CandidateFilter {
    embed: EmbedService,
    settings: FilterSettings,
}

impl CandidateFilter {
    pub fn new(embed: EmbedService, settings: FilterSettings) -> Self {
        Self { embed, settings }
    }

    /// Select up to `max_results` candidates that are plausibly different from
    /// `original`. An embedding failure degrades to the first structurally
    /// valid candidates, unranked, rather than failing the request.
    pub async fn select(
        &self,
        original: &str,
        raw_candidates: Vec<String>,
        max_results: usize,
    ) -> Vec<String> {
        let prepared = self.prepare(raw_candidates);
        if prepared.is_empty() {
            return Vec::new();
        }

        let mut inputs = Vec::with_capacity(prepared.len() + 1);
        inputs.push(original.to_string());
        inputs.extend(prepared.iter().cloned());

        match self.embed.embed_texts(&inputs).await {
            Ok(embeddings) => {
                let original_embedding = &embeddings[0];
                let scored = prepared
                    .into_iter()
                    .zip(embeddings[1..].iter())
                    .map(|(text, emb)| CandidateStatement {
                        similarity: EmbedService::cosine_sim(original_embedding, emb),
                        text,
                    })
                    .collect();
                rank_candidates(scored, &self.settings, max_results)
            }
            Err(e) => {
                tracing::warn!(
                    error = ?e,
                    "embedding computation failed, returning unranked candidates"
                );
                prepared.into_iter().take(max_results).collect()
            }
        }
    }

    /// Cleaning and structural validation: first sentence only, trailing
    /// punctuation normalized, exact duplicates dropped, then word count,
    /// verb, subject and year checks.
    fn prepare(&self, raw_candidates: Vec<String>) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut prepared = Vec::new();

        for raw in raw_candidates {
            let cleaned = first_sentence(&raw);
            if cleaned.is_empty() {
                continue;
            }
            if !seen.insert(cleaned.clone()) {
                continue;
            }
            if self.is_structurally_valid(&cleaned) {
                prepared.push(cleaned);
            }
        }
        prepared
    }

    fn is_structurally_valid(&self, candidate: &str) -> bool {
        let tokens = grammar::tokens(candidate);
        if tokens.len() < self.settings.min_words || tokens.len() > self.settings.max_words {
            return false;
        }
        if !grammar::has_verb(&tokens) {
            return false;
        }
        if !grammar::has_subject(&tokens) {
            return false;
        }
        if let Some(year) = grammar::find_year(&tokens) {
            if year > self.settings.max_plausible_year {
                return false;
            }
        }
        true
    }
}

/// Keep candidates strictly inside the similarity band, then rank by distance
/// from the target similarity. Deterministic for fixed inputs: ties keep
/// their incoming order.
fn rank_candidates(
    candidates: Vec<CandidateStatement>,
    settings: &FilterSettings,
    max_results: usize,
) -> Vec<String> {
    let mut in_band: Vec<CandidateStatement> = candidates
        .into_iter()
        .filter(|c| c.similarity > settings.similarity_low && c.similarity < settings.similarity_high)
        .collect();

    in_band.sort_by(|a, b| {
        let da = (settings.similarity_target - a.similarity).abs();
        let db = (settings.similarity_target - b.similarity).abs();
        da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal)
    });

    in_band
        .into_iter()
        .take(max_results)
        .map(|c| c.text)
        .collect()
}

/// First sentence of a generated continuation, trailing punctuation trimmed.
pub fn first_sentence(text: &str) -> String {
    let trimmed = text.trim();
    let first = split_sentences(trimmed)
        .into_iter()
        .next()
        .unwrap_or_default();
    first
        .trim()
        .trim_end_matches(|c: char| c.is_ascii_punctuation())
        .trim_end()
        .to_string()
}
