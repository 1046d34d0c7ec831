use crate::models::qa::{QaAnswer, QaOutput, QaQuestion};
use rand::seq::SliceRandom;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::time::Duration;

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// False statement generator backed by Anthropic's Messages API.
///
/// All failures stop at this adapter's boundary: transient network errors are
/// retried with exponential backoff, anything else is reported as an error
/// that the orchestrator converts into an empty result.
#[derive(Clone)]
pub struct ClaudeGenerator {
    client: Client,
    api_key: String,
    api_url: String,
    model: String,
    request_timeout: Duration,
    max_attempts: u32,
    backoff_base: Duration,
}

struct ApiError {
    transient: bool,
    inner: anyhow::Error,
}

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: String,
}

impl ClaudeGenerator {
    pub fn new(
        api_key: String,
        api_url: String,
        model: String,
        request_timeout: Duration,
        client: Client,
    ) -> anyhow::Result<Self> {
        if api_key.is_empty() {
            anyhow::bail!("Anthropic API key not provided");
        }
        tracing::info!(model = %model, "initialized Claude generator");
        Ok(Self {
            client,
            api_key,
            api_url,
            model,
            request_timeout,
            max_attempts: 3,
            backoff_base: Duration::from_millis(500),
        })
    }

    /// Override the retry policy. Used to keep test runs fast.
    pub fn with_retry_policy(mut self, max_attempts: u32, backoff_base: Duration) -> Self {
        self.max_attempts = max_attempts.max(1);
        self.backoff_base = backoff_base;
        self
    }

    pub async fn generate_false_statements(
        &self,
        partial_sentence: &str,
        full_sentence: &str,
        num_statements: usize,
    ) -> anyhow::Result<Vec<String>> {
        let prompt = build_statement_prompt(partial_sentence, full_sentence, num_statements);
        let text = self.call_with_retry(&prompt).await?;
        let statements = parse_statements(&text, partial_sentence, num_statements);
        tracing::debug!(count = statements.len(), "generated false statements");
        Ok(statements)
    }

    /// Multiple-choice Q&A generation from raw text. Never fails outward: a
    /// broken response becomes a `QaOutput` carrying the error.
    pub async fn generate_qa(&self, text: &str, num_questions: usize) -> QaOutput {
        let prompt = build_qa_prompt(text, num_questions);
        let raw = match self.call_with_retry(&prompt).await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::error!(error = ?e, "Q&A generation request failed");
                return QaOutput::failed(e.to_string(), "claude");
            }
        };

        let Some(json_str) = extract_json(&raw) else {
            tracing::error!("Q&A response contained no JSON object");
            return QaOutput::failed("Failed to parse response: no JSON found".to_string(), "claude");
        };

        match serde_json::from_str::<JsonValue>(json_str) {
            Ok(value) => {
                let questions = value
                    .get("questions")
                    .and_then(|q| q.as_array())
                    .map(|arr| sanitize_questions(arr))
                    .unwrap_or_default();
                if questions.is_empty() {
                    QaOutput::failed("Response lacks usable questions".to_string(), "claude")
                } else {
                    QaOutput::new(questions, "claude")
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "error parsing Q&A response");
                QaOutput::failed(format!("Failed to parse response: {}", e), "claude")
            }
        }
    }

    /// Bounded-attempt retry loop with doubling backoff. Only transient
    /// failures (connect/timeout, 429, 5xx) are retried.
    async fn call_with_retry(&self, prompt: &str) -> anyhow::Result<String> {
        let mut delay = self.backoff_base;
        let mut attempt = 1;
        loop {
            match self.call_api(prompt).await {
                Ok(text) => return Ok(text),
                Err(err) if err.transient && attempt < self.max_attempts => {
                    tracing::warn!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err.inner,
                        "Claude API call failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                    attempt += 1;
                }
                Err(err) => return Err(err.inner),
            }
        }
    }

    async fn call_api(&self, prompt: &str) -> Result<String, ApiError> {
        let payload = serde_json::json!({
            "model": self.model,
            "messages": [{"role": "user", "content": prompt}],
            "max_tokens": 1024,
            // Higher temperature for more creative false statements.
            "temperature": 0.9
        });

        let res = self
            .client
            .post(&self.api_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&payload)
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|e| ApiError {
                transient: e.is_timeout() || e.is_connect() || e.is_request(),
                inner: anyhow::anyhow!("API request failed: {}", e),
            })?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(ApiError {
                transient: status.is_server_error() || status.as_u16() == 429,
                inner: anyhow::anyhow!("Claude API error {}: {}", status, body),
            });
        }

        let parsed: MessagesResponse = res.json().await.map_err(|e| ApiError {
            transient: false,
            inner: anyhow::anyhow!("invalid Claude response format: {}", e),
        })?;

        match parsed.content.into_iter().next() {
            Some(block) if !block.text.is_empty() => Ok(block.text),
            _ => Err(ApiError {
                transient: false,
                inner: anyhow::anyhow!("Claude response carried no text content"),
            }),
        }
    }
}

fn build_statement_prompt(
    partial_sentence: &str,
    full_sentence: &str,
    num_statements: usize,
) -> String {
    format!(
        r#"I need you to generate {num_statements} plausible but factually incorrect completions for this sentence fragment.
The original complete sentence is: "{full_sentence}"

The beginning of the sentence is: "{partial_sentence}"

Generate {num_statements} different completions that:
1. Sound plausible and grammatically correct
2. Are factually incorrect (different from the original)
3. Are diverse and creative
4. Are concise (try to match the length and style of the original)

Output the false statements only, one per line, with no explanations or numbering.
"#
    )
}

fn build_qa_prompt(text: &str, num_questions: usize) -> String {
    format!(
        r#"Please generate {num_questions} multiple-choice questions based on the following text.

Text:
```
{text}
```

For each question:
1. Create an accurate question based on the text
2. Provide THREE possible answers for each question:
   - One answer that is completely correct (mark this as "correct": true)
   - Two answers that sound plausible but are factually incorrect (mark these as "correct": false)
3. The false answers should be convincing but clearly wrong when compared to the text
4. Randomize the order of correct and incorrect answers

Return your response in this exact JSON format:
{{
  "questions": [
    {{
      "question": "What is stated in the text about X?",
      "answers": [
        {{ "text": "Correct answer based on the text", "correct": true }},
        {{ "text": "Plausible but incorrect answer 1", "correct": false }},
        {{ "text": "Plausible but incorrect answer 2", "correct": false }}
      ]
    }}
  ]
}}

Do not include any additional text outside of this JSON structure.
"#
    )
}

/// Line-delimited statements from the model's reply: numbering-only lines are
/// dropped, the list is truncated to the requested count, and the partial
/// sentence is re-prepended wherever the model dropped it.
fn parse_statements(text: &str, partial_sentence: &str, num_statements: usize) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.chars().all(|c| c.is_ascii_digit() || c == '.'))
        .take(num_statements)
        .map(|line| {
            if line.starts_with(partial_sentence.trim()) {
                line.to_string()
            } else {
                format!("{} {}", partial_sentence.trim_end(), line)
            }
        })
        .collect()
}

/// The outermost JSON object in a reply that may carry prose around it.
fn extract_json(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// Coerce raw question objects into the output shape, enforcing exactly one
/// correct answer per question and shuffling answer order.
fn sanitize_questions(raw: &[JsonValue]) -> Vec<QaQuestion> {
    let mut rng = rand::thread_rng();
    let mut questions = Vec::new();

    for value in raw {
        let Some(question_text) = value.get("question").and_then(|q| q.as_str()) else {
            continue;
        };
        let Some(raw_answers) = value.get("answers").and_then(|a| a.as_array()) else {
            continue;
        };

        let mut answers: Vec<QaAnswer> = raw_answers
            .iter()
            .filter_map(|a| {
                let text = a.get("text").and_then(|t| t.as_str())?;
                let correct = a.get("correct").and_then(|c| c.as_bool()).unwrap_or(false);
                Some(QaAnswer {
                    text: text.to_string(),
                    correct,
                })
            })
            .collect();

        if answers.len() < 2 {
            continue;
        }

        // Exactly one correct answer: drop questions with none, demote
        // duplicates past the first.
        let mut seen_correct = false;
        for answer in answers.iter_mut() {
            if answer.correct {
                if seen_correct {
                    answer.correct = false;
                } else {
                    seen_correct = true;
                }
            }
        }
        if !seen_correct {
            continue;
        }

        answers.shuffle(&mut rng);
        questions.push(QaQuestion {
            question: question_text.to_string(),
            answers,
        });
    }

    questions
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_prepends_partial_and_truncates() {
        let text = "ran away to the hills\n2.\nThe fox ran into town\n\nswam across the river";
        let parsed = parse_statements(text, "The fox ", 2);
        assert_eq!(
            parsed,
            vec!["The fox ran away to the hills", "The fox ran into town"]
        );
    }

    #[test]
    fn parse_drops_numbering_lines() {
        let parsed = parse_statements("1.\n2.\n3.", "The fox ", 3);
        assert!(parsed.is_empty());
    }

    #[test]
    fn extract_json_ignores_surrounding_prose() {
        let text = "Here you go:\n{\"questions\": []}\nHope that helps!";
        assert_eq!(extract_json(text), Some("{\"questions\": []}"));
        assert_eq!(extract_json("no json here"), None);
    }

    #[test]
    fn sanitize_enforces_single_correct_answer() {
        let raw = serde_json::json!([
            {
                "question": "Q1?",
                "answers": [
                    {"text": "a", "correct": true},
                    {"text": "b", "correct": true},
                    {"text": "c", "correct": false}
                ]
            },
            {
                "question": "Q2?",
                "answers": [
                    {"text": "a", "correct": false},
                    {"text": "b", "correct": false}
                ]
            },
            {
                "question": "Q3?",
                "answers": [{"text": "only one", "correct": true}]
            }
        ]);
        let questions = sanitize_questions(raw.as_array().unwrap());
        // Q2 has no correct answer, Q3 too few answers.
        assert_eq!(questions.len(), 1);
        let correct_count = questions[0].answers.iter().filter(|a| a.correct).count();
        assert_eq!(correct_count, 1);
        assert_eq!(questions[0].answers.len(), 3);
    }
}
