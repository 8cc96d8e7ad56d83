use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use dotenv::dotenv;

use crate::utils::validation::MAX_FILE_COUNT;

#[derive(Debug, Clone)]
pub struct Config {
    pub api_url: String,
    pub state_file: PathBuf,
    pub cache_stale_time: Duration,
    pub request_timeout: Duration,
    pub max_upload_count: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();
        let api_url = env::var("DOCS_API_URL").unwrap_or_else(|_| "http://localhost:3000".to_string());
        let state_file = env::var("DOCS_STATE_FILE").unwrap_or_else(|_| ".docs_state.json".to_string());
        let stale_secs: u64 = parse_var("DOCS_CACHE_STALE_SECS", 60)?;
        let timeout_secs: u64 = parse_var("DOCS_REQUEST_TIMEOUT_SECS", 30)?;
        let max_upload_count: usize = parse_var("DOCS_MAX_UPLOAD_COUNT", MAX_FILE_COUNT)?;
        if max_upload_count == 0 {
            anyhow::bail!("DOCS_MAX_UPLOAD_COUNT must be at least 1");
        }
        Ok(Self {
            api_url: api_url.trim_end_matches('/').to_string(),
            state_file: PathBuf::from(state_file),
            cache_stale_time: Duration::from_secs(stale_secs),
            request_timeout: Duration::from_secs(timeout_secs),
            max_upload_count,
        })
    }
}

fn parse_var<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} must be a number, got '{}'", name, raw)),
        Err(_) => Ok(default),
    }
}
