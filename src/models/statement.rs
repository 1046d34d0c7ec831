use serde::{Deserialize, Serialize};

/// One fully-assembled generation result, returned to the caller and never
/// persisted by the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationResult {
    pub original_sentence: String,
    pub partial_sentence: String,
    pub false_sentences: Vec<String>,
    pub generator_used: String,
}

/// A candidate surviving structural validation, scored against the original
/// sentence. Ephemeral: dropped once ranking has produced the final list.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateStatement {
    pub text: String,
    pub similarity: f32,
}
