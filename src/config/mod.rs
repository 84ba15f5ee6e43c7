use anyhow::{Context, Result};
use fs_err as fs;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::cli::ProviderKind;
use crate::prompt;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub bind: String,
    pub database: String,
    pub provider: ProviderKind,
    pub cheap_model: String,
    pub expensive_model: String,
    pub cheap_max_tokens: u32,
    pub expensive_max_tokens: u32,
    pub timeout_secs: u64,
    pub cache_capacity: usize,
    pub history_keep: usize,
    pub max_context_bytes: usize,
    pub free_token_limit: u64,
    pub pro_token_limit: u64,
    pub snack_sdk_version: String,
    pub expose_upstream_errors: bool,
    #[serde(skip_serializing)]
    pub anthropic_api_key: Option<String>,
    #[serde(skip_serializing)]
    pub openai_api_key: Option<String>,
    #[serde(skip_serializing)]
    pub vercel_token: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8787".into(),
            database: "vibe.sqlite".into(),
            provider: ProviderKind::Anthropic,
            cheap_model: "claude-3-5-haiku-20241022".into(),
            expensive_model: "claude-sonnet-4-20250514".into(),
            cheap_max_tokens: 4_096,
            expensive_max_tokens: 8_192,
            timeout_secs: 120,
            cache_capacity: 128,
            history_keep: prompt::DEFAULT_HISTORY_KEEP,
            max_context_bytes: 48_000,
            free_token_limit: 100_000,
            pro_token_limit: 2_000_000,
            snack_sdk_version: "52.0.0".into(),
            expose_upstream_errors: false,
            anthropic_api_key: None,
            openai_api_key: None,
            vercel_token: None,
        }
    }
}

impl Config {
    /// Defaults, then the optional TOML file, then environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut cfg = match path {
            Some(p) => {
                let raw = fs::read_to_string(p)?;
                toml::from_str::<Config>(&raw)
                    .with_context(|| format!("parsing config {}", p.display()))?
            }
            None => Config::default(),
        };
        cfg.apply_env(|k| std::env::var(k).ok());
        Ok(cfg)
    }

    fn apply_env(&mut self, get: impl Fn(&str) -> Option<String>) {
        if let Some(v) = get("ANTHROPIC_API_KEY") {
            self.anthropic_api_key = Some(v);
        }
        if let Some(v) = get("OPENAI_API_KEY") {
            self.openai_api_key = Some(v);
        }
        if let Some(v) = get("VERCEL_TOKEN") {
            self.vercel_token = Some(v);
        }
        if let Some(v) = get("VIBE_DATABASE") {
            self.database = v;
        }
        if let Some(v) = get("VIBE_BIND") {
            self.bind = v;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn toml_overrides_only_named_fields() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "cheap_model = \"tiny\"").unwrap();
        writeln!(f, "history_keep = 6").unwrap();
        writeln!(f, "provider = \"openai\"").unwrap();
        let cfg = Config::load(Some(f.path())).unwrap();
        assert_eq!(cfg.cheap_model, "tiny");
        assert_eq!(cfg.history_keep, 6);
        assert!(matches!(cfg.provider, ProviderKind::OpenAI));
        assert_eq!(cfg.expensive_max_tokens, 8_192);
    }

    #[test]
    fn env_overrides_take_precedence() {
        let mut cfg = Config::default();
        cfg.apply_env(|k| match k {
            "VIBE_BIND" => Some("0.0.0.0:9000".into()),
            "VERCEL_TOKEN" => Some("tok".into()),
            _ => None,
        });
        assert_eq!(cfg.bind, "0.0.0.0:9000");
        assert_eq!(cfg.vercel_token.as_deref(), Some("tok"));
        assert!(cfg.anthropic_api_key.is_none());
    }
}
