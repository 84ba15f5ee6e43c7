use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

use super::{Bundle, Deployer};

const DEPLOYMENTS_URL: &str = "https://api.vercel.com/v13/deployments";

pub struct Vercel {
    token: String,
    client: Client,
}

impl Vercel {
    pub fn new(token: String, timeout: Duration) -> Result<Self> {
        Ok(Self { token, client: Client::builder().timeout(timeout).build()? })
    }
}

fn body(bundle: &Bundle) -> Value {
    let files: Vec<Value> = bundle
        .files
        .iter()
        .map(|(path, data)| json!({ "file": path, "data": data }))
        .collect();
    let vite = bundle.files.contains_key("vite.config.js") || bundle.files.contains_key("src/main.jsx");
    let framework = if vite { json!("vite") } else { Value::Null };
    json!({
        "name": bundle.name,
        "files": files,
        "target": "production",
        "projectSettings": { "framework": framework },
    })
}

#[derive(Deserialize)]
struct DeploymentResponse {
    url: String,
}

#[async_trait]
impl Deployer for Vercel {
    async fn deploy(&self, bundle: &Bundle) -> Result<String> {
        let resp = self
            .client
            .post(DEPLOYMENTS_URL)
            .bearer_auth(&self.token)
            .json(&body(bundle))
            .send()
            .await
            .context("vercel request failed")?;
        let status = resp.status();
        let text = resp.text().await.context("vercel read body failed")?;
        tracing::debug!(%status, body = %text, "vercel response");
        if !status.is_success() {
            return Err(anyhow!("vercel API error ({}): {}", status, text));
        }
        let parsed: DeploymentResponse = serde_json::from_str(&text).context("vercel response parse error")?;
        Ok(format!("https://{}", parsed.url.trim_start_matches("https://")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn files_are_inlined() {
        let mut files = BTreeMap::new();
        files.insert("src/main.jsx".to_string(), "x".to_string());
        let b = body(&Bundle { name: "app".into(), description: String::new(), files });
        assert_eq!(b["files"][0], json!({ "file": "src/main.jsx", "data": "x" }));
        assert_eq!(b["projectSettings"]["framework"], "vite");
    }
}
