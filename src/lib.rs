pub mod config;
pub mod dto;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use crate::services::{
    candidate_filter::{CandidateFilter, FilterSettings},
    claude_generator::ClaudeGenerator,
    embed_service::EmbedService,
    local_generator::LocalGenerator,
    orchestrator::{GeneratorAdapter, GeneratorKind, Orchestrator},
    text_pipeline::TextPipeline,
};
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub pipeline: TextPipeline,
}

impl AppState {
    pub fn new() -> Self {
        let config = crate::config::get_config();
        let http_client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .unwrap();

        let embed_service = EmbedService::new(
            config.embeddings_url.clone(),
            config.embedding_model.clone(),
            http_client.clone(),
        );
        let filter = CandidateFilter::new(
            embed_service,
            FilterSettings {
                similarity_low: config.similarity_low,
                similarity_high: config.similarity_high,
                similarity_target: config.similarity_target,
                min_words: config.min_candidate_words,
                max_words: config.max_candidate_words,
                max_plausible_year: config.max_plausible_year,
            },
        );

        let mut orchestrator = Orchestrator::new(
            config.max_workers,
            Duration::from_secs(config.batch_item_timeout_secs),
            Duration::from_secs(config.batch_min_timeout_secs),
            Duration::from_secs(config.shutdown_drain_secs),
        );

        orchestrator.register(
            GeneratorKind::Claude,
            ClaudeGenerator::new(
                config.anthropic_api_key.clone().unwrap_or_default(),
                config.anthropic_api_url.clone(),
                config.claude_model.clone(),
                Duration::from_secs(config.claude_timeout_secs),
                http_client.clone(),
            )
            .map(GeneratorAdapter::Claude),
        );
        orchestrator.register(
            GeneratorKind::Local,
            LocalGenerator::new(
                config.local_runtime_url.clone().unwrap_or_default(),
                http_client,
                filter,
            )
            .map(GeneratorAdapter::Local),
        );

        Self {
            orchestrator: Arc::new(orchestrator),
            pipeline: TextPipeline::default(),
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
