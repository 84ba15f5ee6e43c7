use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use std::time::Duration;
use thiserror::Error;

use crate::cli::ProviderKind;
use crate::config::Config;
use crate::wire::{Completion, ModelCall};

pub mod anthropic;
pub mod openai;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("network error: {0}")]
    Transport(String),
    #[error("timeout")]
    Timeout,
    #[error("rate limited")]
    RateLimited,
    #[error("invalid api key")]
    InvalidApiKey,
    #[error("http {status}: {body}")]
    Http { status: u16, body: String },
    #[error("unexpected response: {0}")]
    Parse(String),
}

impl ProviderError {
    pub fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ProviderError::Timeout
        } else {
            ProviderError::Transport(e.to_string())
        }
    }

    pub fn from_status(status: StatusCode, body: String) -> Self {
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ProviderError::InvalidApiKey,
            StatusCode::TOO_MANY_REQUESTS => ProviderError::RateLimited,
            s => ProviderError::Http { status: s.as_u16(), body },
        }
    }
}

#[async_trait]
pub trait Provider: Send + Sync {
    async fn complete(&self, call: &ModelCall) -> Result<Completion, ProviderError>;
}

pub type DynProvider = Box<dyn Provider>;

pub fn make_provider(kind: ProviderKind, cfg: &Config) -> Result<DynProvider> {
    let timeout = Duration::from_secs(cfg.timeout_secs);
    match kind {
        ProviderKind::Anthropic => {
            let key = cfg
                .anthropic_api_key
                .clone()
                .ok_or_else(|| anyhow!("ANTHROPIC_API_KEY env var is not set"))?;
            Ok(Box::new(anthropic::Anthropic::new(key, timeout)?))
        }
        ProviderKind::OpenAI => {
            let key = cfg
                .openai_api_key
                .clone()
                .ok_or_else(|| anyhow!("OPENAI_API_KEY env var is not set"))?;
            Ok(Box::new(openai::OpenAIProvider::new(key, timeout)?))
        }
    }
}
