use anyhow::anyhow;
use async_openai::{config::OpenAIConfig, Client};
use backoff::ExponentialBackoffBuilder;
use std::time::Duration;

pub const API_KEY_VAR: &str = "OPENAI_API_KEY";

/// Reads the API key, failing with instructions on how to provide it.
pub fn api_key() -> anyhow::Result<String> {
    api_key_from(std::env::var(API_KEY_VAR).ok())
}

fn api_key_from(value: Option<String>) -> anyhow::Result<String> {
    match value {
        Some(key) if !key.trim().is_empty() => Ok(key.trim().to_string()),
        _ => Err(anyhow!(
            "{API_KEY_VAR} is not set.\nRun: export {API_KEY_VAR}='your-key-here'"
        )),
    }
}

/// Builds an OpenAI client that makes a single attempt per request.
pub fn openai_client(api_key: &str, api_base: Option<&str>) -> Client<OpenAIConfig> {
    let mut config = OpenAIConfig::new().with_api_key(api_key);
    if let Some(base) = api_base {
        config = config.with_api_base(base);
    }

    let no_retry = ExponentialBackoffBuilder::new()
        .with_max_elapsed_time(Some(Duration::ZERO))
        .build();

    Client::with_config(config).with_backoff(no_retry)
}
