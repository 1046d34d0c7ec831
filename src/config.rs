use crate::error::{Error, Result};
use dotenvy::dotenv;
use std::env;
use std::sync::OnceLock;

#[derive(Debug, Clone)]
pub struct Config {
    pub server_address: String,
    pub anthropic_api_key: Option<String>,
    pub anthropic_api_url: String,
    pub claude_model: String,
    pub local_runtime_url: Option<String>,
    pub embeddings_url: String,
    pub embedding_model: String,
    pub generate_rps: u32,
    pub max_workers: usize,
    pub similarity_low: f32,
    pub similarity_high: f32,
    pub similarity_target: f32,
    pub min_candidate_words: usize,
    pub max_candidate_words: usize,
    pub max_plausible_year: i32,
    pub batch_item_timeout_secs: u64,
    pub batch_min_timeout_secs: u64,
    pub claude_timeout_secs: u64,
    pub shutdown_drain_secs: u64,
}

pub static CONFIG: OnceLock<Config> = OnceLock::new();

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        Ok(Self {
            server_address: get_env("SERVER_ADDRESS")?,
            anthropic_api_key: env::var("ANTHROPIC_API_KEY").ok().filter(|k| !k.is_empty()),
            anthropic_api_url: get_env_or(
                "ANTHROPIC_API_URL",
                "https://api.anthropic.com/v1/messages",
            ),
            claude_model: get_env_or("CLAUDE_MODEL", "claude-3-7-sonnet-20250219"),
            local_runtime_url: env::var("LOCAL_RUNTIME_URL").ok().filter(|u| !u.is_empty()),
            embeddings_url: get_env("EMBEDDINGS_URL")?,
            embedding_model: get_env_or("EMBEDDING_MODEL", "bert-base-nli-mean-tokens"),
            generate_rps: get_env_parse_or("GENERATE_RPS", 10)?,
            max_workers: get_env_parse_or("MAX_WORKERS", num_cpus::get())?,
            similarity_low: get_env_parse_or("SIMILARITY_LOW", 0.3)?,
            similarity_high: get_env_parse_or("SIMILARITY_HIGH", 0.85)?,
            similarity_target: get_env_parse_or("SIMILARITY_TARGET", 0.6)?,
            min_candidate_words: get_env_parse_or("MIN_CANDIDATE_WORDS", 5)?,
            max_candidate_words: get_env_parse_or("MAX_CANDIDATE_WORDS", 30)?,
            max_plausible_year: get_env_parse_or("MAX_PLAUSIBLE_YEAR", 2000)?,
            batch_item_timeout_secs: get_env_parse_or("BATCH_ITEM_TIMEOUT_SECS", 30)?,
            batch_min_timeout_secs: get_env_parse_or("BATCH_MIN_TIMEOUT_SECS", 60)?,
            claude_timeout_secs: get_env_parse_or("CLAUDE_TIMEOUT_SECS", 20)?,
            shutdown_drain_secs: get_env_parse_or("SHUTDOWN_DRAIN_SECS", 30)?,
        })
    }
}

fn get_env(name: &str) -> Result<String> {
    env::var(name).map_err(|_| Error::Config(format!("Missing environment variable: {}", name)))
}

fn get_env_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn get_env_parse_or<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|e| Error::Config(format!("Invalid value for {}: {}", name, e))),
        Err(_) => Ok(default),
    }
}

pub fn init_config() -> Result<()> {
    let config = Config::from_env()?;
    CONFIG
        .set(config)
        .map_err(|_| Error::Config("Configuration has already been initialized".to_string()))?;
    Ok(())
}

pub fn get_config() -> &'static Config {
    CONFIG
        .get()
        .expect("Configuration has not been initialized")
}
