use anyhow::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;

use crate::errors::AppError;

pub mod snack;
pub mod vercel;

/// Files to publish plus display metadata.
#[derive(Debug, Clone)]
pub struct Bundle {
    pub name: String,
    pub description: String,
    pub files: BTreeMap<String, String>,
}

#[async_trait]
pub trait Deployer: Send + Sync {
    /// Forward the bundle to the provider and return the public URL.
    async fn deploy(&self, bundle: &Bundle) -> Result<String>;
}

fn slug(name: &str) -> String {
    let s: String = name
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect();
    let s = s.split('-').filter(|p| !p.is_empty()).collect::<Vec<_>>().join("-");
    if s.is_empty() { "vibe-app".into() } else { s.chars().take(52).collect() }
}

/// Boundary validation shared by every deploy endpoint.
pub fn bundle_from_request(
    files: BTreeMap<String, String>,
    name: Option<String>,
    description: Option<String>,
) -> Result<Bundle, AppError> {
    if files.is_empty() {
        return Err(AppError::Validation("files must not be empty".into()));
    }
    if let Some(bad) = files.keys().find(|p| crate::safety::resolve_within(std::path::Path::new(""), p).is_none()) {
        return Err(AppError::Validation(format!("invalid file path \"{bad}\"")));
    }
    Ok(Bundle {
        name: slug(name.as_deref().unwrap_or("vibe-app")),
        description: description.unwrap_or_default(),
        files,
    })
}
