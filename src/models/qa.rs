use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QaAnswer {
    pub text: String,
    pub correct: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QaQuestion {
    pub question: String,
    pub answers: Vec<QaAnswer>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QaOutput {
    pub format_version: String,
    pub questions: Vec<QaQuestion>,
    pub total_questions: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub generated_at: DateTime<Utc>,
    pub processing_mode: String,
}

impl QaOutput {
    pub fn new(questions: Vec<QaQuestion>, processing_mode: &str) -> Self {
        Self {
            format_version: "1.0".to_string(),
            total_questions: questions.len(),
            questions,
            error: None,
            generated_at: Utc::now(),
            processing_mode: processing_mode.to_string(),
        }
    }

    pub fn failed(reason: String, processing_mode: &str) -> Self {
        Self {
            format_version: "1.0".to_string(),
            questions: Vec::new(),
            total_questions: 0,
            error: Some(reason),
            generated_at: Utc::now(),
            processing_mode: processing_mode.to_string(),
        }
    }
}
