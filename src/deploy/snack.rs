use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::time::Duration;

use super::{Bundle, Deployer};

const SAVE_URL: &str = "https://exp.host/--/api/v2/snack/save";

/// Publishes React Native projects as Expo Snacks.
pub struct Snack {
    sdk_version: String,
    client: Client,
}

impl Snack {
    pub fn new(sdk_version: String, timeout: Duration) -> Result<Self> {
        Ok(Self { sdk_version, client: Client::builder().timeout(timeout).build()? })
    }
}

/// Snack wants `{name: {version}}`; take them from package.json when present.
fn dependencies(bundle: &Bundle) -> Value {
    let mut out = Map::new();
    let pkg = bundle.files.get("package.json").and_then(|s| serde_json::from_str::<Value>(s).ok());
    if let Some(deps) = pkg.as_ref().and_then(|p| p.get("dependencies")).and_then(Value::as_object) {
        for (name, version) in deps {
            if let Some(v) = version.as_str() {
                out.insert(name.clone(), json!({ "version": v }));
            }
        }
    }
    Value::Object(out)
}

fn body(bundle: &Bundle, sdk_version: &str) -> Value {
    let code: Map<String, Value> = bundle
        .files
        .iter()
        .filter(|(path, _)| path.as_str() != "package.json")
        .map(|(path, contents)| (path.clone(), json!({ "type": "CODE", "contents": contents })))
        .collect();
    json!({
        "manifest": {
            "name": bundle.name,
            "description": bundle.description,
            "sdkVersion": sdk_version,
            "dependencies": dependencies(bundle),
        },
        "code": code,
    })
}

#[derive(Deserialize)]
struct SaveResponse {
    id: String,
}

#[async_trait]
impl Deployer for Snack {
    async fn deploy(&self, bundle: &Bundle) -> Result<String> {
        let resp = self
            .client
            .post(SAVE_URL)
            .json(&body(bundle, &self.sdk_version))
            .send()
            .await
            .context("snack request failed")?;
        let status = resp.status();
        let text = resp.text().await.context("snack read body failed")?;
        tracing::debug!(%status, body = %text, "snack response");
        if !status.is_success() {
            return Err(anyhow!("snack API error ({}): {}", status, text));
        }
        let parsed: SaveResponse = serde_json::from_str(&text).context("snack response parse error")?;
        Ok(format!("https://snack.expo.dev/{}", parsed.id))
    }
}
