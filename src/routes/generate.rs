use crate::{
    dto::generate_dto::{
        GenerateBatchPayload, GenerateFromTextPayload, GenerateQaPayload,
        GenerateStatementsPayload,
    },
    error::{Error, Result},
    models::statement::GenerationResult,
    services::orchestrator::{BatchOutcome, GenerationOutcome},
    AppState,
};
use axum::{extract::State, response::IntoResponse, Json};
use serde_json::json;
use validator::Validate;

/// First half of the whitespace-tokenized words. The partial-sentence
/// derivation is this layer's job, not the orchestrator's.
fn derive_partial(full_sentence: &str) -> String {
    let words: Vec<&str> = full_sentence.split_whitespace().collect();
    let cut = (words.len() / 2).max(1);
    words[..cut.min(words.len())].join(" ")
}

#[axum::debug_handler]
pub async fn generate_statements(
    State(state): State<AppState>,
    Json(payload): Json<GenerateStatementsPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;

    let partial_sentence = payload
        .partial_sentence
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| derive_partial(&payload.full_sentence));

    let outcome = state
        .orchestrator
        .generate_one_bounded(
            payload.generator,
            &partial_sentence,
            &payload.full_sentence,
            payload.num_statements,
        )
        .await;

    let (false_sentences, generator) = match outcome {
        GenerationOutcome::Unavailable => return Err(Error::NoGeneratorAvailable),
        GenerationOutcome::Generated {
            statements,
            generator,
        } => (statements, generator),
        GenerationOutcome::Empty { generator, reason } => {
            tracing::warn!(%generator, %reason, "generation returned no statements");
            (Vec::new(), generator)
        }
    };

    let result = GenerationResult {
        original_sentence: payload.full_sentence,
        partial_sentence,
        false_sentences,
        generator_used: generator.to_string(),
    };

    Ok(Json(json!({
        "success": true,
        "data": result,
    })))
}

#[axum::debug_handler]
pub async fn generate_batch(
    State(state): State<AppState>,
    Json(payload): Json<GenerateBatchPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;

    let pairs: Vec<(String, String)> = payload
        .sentences
        .iter()
        .map(|sentence| (derive_partial(sentence), sentence.clone()))
        .collect();

    batch_response(&state, payload.generator, pairs, payload.num_statements).await
}

/// Pipeline entry point: extract candidate sentences from free text, then
/// run the orchestrator batch path over the derived pairs.
#[axum::debug_handler]
pub async fn generate_from_text(
    State(state): State<AppState>,
    Json(payload): Json<GenerateFromTextPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;

    let pairs = state.pipeline.completion_pairs(&payload.text);
    if pairs.is_empty() {
        return Ok(Json(json!({
            "results": [],
            "count": 0,
        })));
    }
    if pairs.len() > 20 {
        return Err(Error::BadRequest(
            "text yields more than 20 candidate sentences".to_string(),
        ));
    }

    batch_response(&state, payload.generator, pairs, payload.num_statements).await
}

async fn batch_response(
    state: &AppState,
    generator: Option<crate::services::orchestrator::GeneratorKind>,
    pairs: Vec<(String, String)>,
    num_statements: usize,
) -> Result<Json<serde_json::Value>> {
    let outcome = state
        .orchestrator
        .generate_batch(generator, pairs.clone(), num_statements)
        .await;

    match outcome {
        BatchOutcome::Unavailable => Err(Error::NoGeneratorAvailable),
        BatchOutcome::Completed { items, generator } => {
            let results: Vec<serde_json::Value> = items
                .into_iter()
                .zip(pairs)
                .enumerate()
                .map(|(index, (false_sentences, (partial_sentence, full_sentence)))| {
                    json!({
                        "index": index,
                        "original_sentence": full_sentence,
                        "partial_sentence": partial_sentence,
                        "false_sentences": false_sentences,
                        "generator_used": generator.to_string(),
                    })
                })
                .collect();

            Ok(Json(json!({
                "count": results.len(),
                "results": results,
            })))
        }
    }
}

#[axum::debug_handler]
pub async fn generate_qa(
    State(state): State<AppState>,
    Json(payload): Json<GenerateQaPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;

    match state
        .orchestrator
        .generate_qa(&payload.text, payload.num_questions)
        .await
    {
        Some(output) => Ok(Json(json!({
            "success": true,
            "data": output,
        }))),
        None => Err(Error::NoGeneratorAvailable),
    }
}
