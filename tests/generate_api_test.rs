use std::env;
use std::time::Duration;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
};
use serde_json::{json, Value as JsonValue};
use tower::ServiceExt;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, Request as MockRequest, Respond, ResponseTemplate};

/// Embedding stub: the original sentence maps to a unit vector, every
/// candidate to a vector at cosine 0.6 to it.
struct EmbeddingResponder;

impl Respond for EmbeddingResponder {
    fn respond(&self, request: &MockRequest) -> ResponseTemplate {
        let body: JsonValue = serde_json::from_slice(&request.body).unwrap();
        let count = body["input"].as_array().map(|a| a.len()).unwrap_or(0);
        let data: Vec<JsonValue> = (0..count)
            .map(|i| {
                let embedding = if i == 0 {
                    vec![1.0, 0.0]
                } else {
                    vec![0.6, 0.8]
                };
                json!({"embedding": embedding})
            })
            .collect();
        ResponseTemplate::new(200).set_body_json(json!({"data": data}))
    }
}

async fn post_json(app: &axum::Router, uri: &str, body: JsonValue) -> (StatusCode, JsonValue) {
    let req = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), 1024 * 1024).await.unwrap();
    let body: JsonValue = serde_json::from_slice(&bytes).unwrap_or(JsonValue::Null);
    (status, body)
}

async fn get_json(app: &axum::Router, uri: &str) -> (StatusCode, JsonValue) {
    let req = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), 1024 * 1024).await.unwrap();
    let body: JsonValue = serde_json::from_slice(&bytes).unwrap_or(JsonValue::Null);
    (status, body)
}

#[tokio::test]
async fn generation_flow_end_to_end() {
    let claude = MockServer::start().await;
    let runtime = MockServer::start().await;
    let embeddings = MockServer::start().await;

    // Q&A prompts and statement prompts are told apart by their wording.
    let qa_body = json!({
        "questions": [
            {
                "question": "What did the company announce?",
                "answers": [
                    {"text": "Record profits", "correct": true},
                    {"text": "Record losses", "correct": false},
                    {"text": "A merger", "correct": false}
                ]
            }
        ]
    })
    .to_string();
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(body_string_contains("multiple-choice questions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "content": [{"type": "text", "text": qa_body}]
        })))
        .mount(&claude)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "content": [{"type": "text", "text":
                "record losses for the second consecutive quarter\n\
                 a merger with its largest competitor\n\
                 plans to close all retail stores"}]
        })))
        .mount(&claude)
        .await;

    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&runtime)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "completions": [
                "record losses for the second quarter in a row",
                "a partnership with the city government on housing",
                "plans to expand into three new markets abroad"
            ]
        })))
        .mount(&runtime)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .respond_with(EmbeddingResponder)
        .mount(&embeddings)
        .await;

    env::set_var("SERVER_ADDRESS", "127.0.0.1:0");
    env::set_var("ANTHROPIC_API_KEY", "sk-test");
    env::set_var(
        "ANTHROPIC_API_URL",
        format!("{}/v1/messages", claude.uri()),
    );
    env::set_var("LOCAL_RUNTIME_URL", runtime.uri());
    env::set_var("EMBEDDINGS_URL", embeddings.uri());
    env::set_var("GENERATE_RPS", "100");
    env::set_var("MAX_WORKERS", "4");
    env::set_var("BATCH_ITEM_TIMEOUT_SECS", "5");
    env::set_var("BATCH_MIN_TIMEOUT_SECS", "5");
    env::set_var("CLAUDE_TIMEOUT_SECS", "5");
    env::set_var("SHUTDOWN_DRAIN_SECS", "1");

    quizgen_backend::config::init_config().expect("init config");
    let state = quizgen_backend::AppState::new();
    let app = quizgen_backend::routes::router(state.clone(), 100);

    // Single statement generation, partial derived by the HTTP layer.
    let full_sentence = "The company announced record profits for the third quarter.";
    let (status, body) = post_json(
        &app,
        "/generate/statements",
        json!({"full_sentence": full_sentence, "num_statements": 3}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json!(true));
    let data = &body["data"];
    assert_eq!(data["original_sentence"], json!(full_sentence));
    assert_eq!(data["generator_used"], json!("claude"));
    let expected_partial = "The company announced record";
    assert_eq!(data["partial_sentence"], json!(expected_partial));
    let false_sentences = data["false_sentences"].as_array().unwrap();
    assert!(!false_sentences.is_empty() && false_sentences.len() <= 3);
    for sentence in false_sentences {
        let sentence = sentence.as_str().unwrap();
        assert!(sentence.starts_with(expected_partial));
        assert_ne!(sentence, full_sentence);
    }

    // Explicitly requesting the local generator exercises runtime, filter
    // and embeddings.
    let (status, body) = post_json(
        &app,
        "/generate/statements",
        json!({"full_sentence": full_sentence, "num_statements": 3, "generator": "local"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["generator_used"], json!("local"));
    assert!(!body["data"]["false_sentences"].as_array().unwrap().is_empty());

    // Validation failures are client errors, no generation is attempted.
    let (status, _) = post_json(
        &app,
        "/generate/statements",
        json!({"full_sentence": full_sentence, "num_statements": 0}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = post_json(
        &app,
        "/generate/statements",
        json!({"full_sentence": "short", "num_statements": 3}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Batch: one aligned result per input sentence.
    let sentences = [
        "The company announced record profits for the third quarter.",
        "The senate passed the controversial budget bill on Friday.",
        "The museum unveiled a newly restored renaissance painting.",
    ];
    let (status, body) = post_json(
        &app,
        "/generate/batch",
        json!({"sentences": sentences, "num_statements": 2}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], json!(3));
    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 3);
    for (i, result) in results.iter().enumerate() {
        assert_eq!(result["index"], json!(i));
        assert_eq!(result["original_sentence"], json!(sentences[i]));
        assert!(result["false_sentences"].as_array().unwrap().len() <= 2);
    }

    // Oversized batches are rejected up front.
    let too_many: Vec<String> = (0..21).map(|i| format!("Sentence number {i} here.")).collect();
    let (status, _) = post_json(
        &app,
        "/generate/batch",
        json!({"sentences": too_many, "num_statements": 2}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Free-text pipeline entry point.
    let text = "Musk has shown again he can influence the digital currency market with his tweets. \
                Tesla will not accept payments in Bitcoin because of environmental concerns today. \
                He tweeted that he was working with developers of Dogecoin on transaction efficiency.";
    let (status, body) = post_json(
        &app,
        "/generate/text",
        json!({"text": text, "num_statements": 2}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["count"].as_u64().unwrap() as usize,
        body["results"].as_array().unwrap().len()
    );

    // Q&A generation: exactly one correct answer per question.
    let (status, body) = post_json(
        &app,
        "/generate/qa",
        json!({"text": text, "num_questions": 1}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json!(true));
    let questions = body["data"]["questions"].as_array().unwrap();
    assert_eq!(questions.len(), 1);
    for question in questions {
        let correct = question["answers"]
            .as_array()
            .unwrap()
            .iter()
            .filter(|a| a["correct"] == json!(true))
            .count();
        assert_eq!(correct, 1);
    }
    let (status, _) = post_json(&app, "/generate/qa", json!({"text": "too short"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Health and readiness surfaces.
    let (status, body) = get_json(&app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], json!("ok"));
    let (status, body) = get_json(&app, "/ready").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["generators"]["claude"], json!(true));

    // A tight rate limit turns the surface into 429s.
    let throttled = quizgen_backend::routes::router(state.clone(), 1);
    let mut saw_throttle = false;
    for _ in 0..3 {
        let (status, _) = get_json(&throttled, "/health").await;
        // Health sits outside the limiter; hit the generate surface instead.
        assert_eq!(status, StatusCode::OK);
        let (status, _) = post_json(
            &throttled,
            "/generate/statements",
            json!({"full_sentence": full_sentence}),
        )
        .await;
        if status == StatusCode::TOO_MANY_REQUESTS {
            saw_throttle = true;
        }
    }
    assert!(saw_throttle);

    // Graceful shutdown drains and then refuses new work.
    state.orchestrator.shutdown().await;
    tokio::time::sleep(Duration::from_millis(10)).await;
    let (status, _) = post_json(
        &app,
        "/generate/statements",
        json!({"full_sentence": full_sentence}),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}
