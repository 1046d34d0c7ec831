pub mod candidate_filter;
pub mod claude_generator;
pub mod embed_service;
pub mod grammar;
pub mod local_generator;
pub mod orchestrator;
pub mod text_pipeline;
