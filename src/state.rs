use crate::config::Config;
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::Semaphore;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub client: reqwest::Client,
    pub fetch_semaphore: Arc<Semaphore>,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.fetch_timeout)
            .user_agent("logo-stamper/0.1")
            .build()
            .context("build reqwest client")?;
        let fetch_limit = if config.max_concurrent_fetches == 0 {
            Semaphore::MAX_PERMITS
        } else {
            config.max_concurrent_fetches
        };
        let fetch_semaphore = Arc::new(Semaphore::new(fetch_limit));
        Ok(Self {
            config: Arc::new(config),
            client,
            fetch_semaphore,
        })
    }
}
