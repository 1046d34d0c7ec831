use crate::services::orchestrator::GeneratorKind;
use serde::Deserialize;
use validator::Validate;

fn default_num_statements() -> usize {
    3
}

fn default_num_questions() -> usize {
    3
}

#[derive(Debug, Deserialize, Validate)]
pub struct GenerateStatementsPayload {
    #[validate(length(min = 10, message = "full_sentence is too short"))]
    pub full_sentence: String,
    pub partial_sentence: Option<String>,
    #[validate(range(min = 1, max = 10))]
    #[serde(default = "default_num_statements")]
    pub num_statements: usize,
    pub generator: Option<GeneratorKind>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct GenerateBatchPayload {
    #[validate(length(min = 1, max = 20, message = "batch size must be between 1 and 20"))]
    pub sentences: Vec<String>,
    #[validate(range(min = 1, max = 10))]
    #[serde(default = "default_num_statements")]
    pub num_statements: usize,
    pub generator: Option<GeneratorKind>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct GenerateFromTextPayload {
    #[validate(length(min = 20, message = "text is too short to extract sentences"))]
    pub text: String,
    #[validate(range(min = 1, max = 10))]
    #[serde(default = "default_num_statements")]
    pub num_statements: usize,
    pub generator: Option<GeneratorKind>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct GenerateQaPayload {
    #[validate(length(min = 20, message = "Input text is too short to generate meaningful Q&A"))]
    pub text: String,
    #[validate(range(min = 1, max = 10))]
    #[serde(default = "default_num_questions")]
    pub num_questions: usize,
}
