use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;

use super::{Provider, ProviderError};
use crate::wire::{Completion, ContentSegment, ModelCall, Role, TokenCounts, WireMessage};

const API_BASE: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";

pub struct Anthropic {
    api_key: String,
    api_base: String,
    client: Client,
}

impl Anthropic {
    pub fn new(api_key: String, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("vibe_appgen/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { api_key, api_base: API_BASE.to_string(), client })
    }
}

#[derive(Serialize)]
struct MsgRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<Msg>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
}

#[derive(Serialize)]
struct Msg {
    role: &'static str,
    content: Vec<Value>,
}

#[derive(Deserialize)]
struct MsgResponse {
    content: Vec<Block>,
    #[serde(default)]
    usage: Usage,
}

#[derive(Deserialize)]
struct Block {
    #[serde(default)]
    text: String,
    #[serde(default)]
    r#type: String,
}

#[derive(Deserialize, Default)]
struct Usage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
}

fn block(seg: &ContentSegment) -> Value {
    match seg {
        ContentSegment::Text { text } => json!({ "type": "text", "text": text }),
        ContentSegment::Image { url } => json!({ "type": "image", "source": { "type": "url", "url": url } }),
        ContentSegment::Summary { text } => json!({ "type": "text", "text": format!("Project summary: {text}") }),
    }
}

/// The messages API requires the conversation to open with a user turn.
fn to_messages(messages: &[WireMessage]) -> Vec<Msg> {
    messages
        .iter()
        .skip_while(|m| m.role != Role::User)
        .map(|m| Msg {
            role: match m.role {
                Role::User => "user",
                Role::Assistant => "assistant",
            },
            content: m.content.iter().map(block).collect(),
        })
        .collect()
}

#[async_trait]
impl Provider for Anthropic {
    async fn complete(&self, call: &ModelCall) -> Result<Completion, ProviderError> {
        let url = format!("{}/v1/messages", self.api_base.trim_end_matches('/'));
        let body = MsgRequest {
            model: &call.model,
            max_tokens: call.max_tokens,
            messages: to_messages(&call.messages),
            system: (!call.system.is_empty()).then_some(call.system.as_str()),
        };
        tracing::debug!(%url, model = %call.model, "anthropic request");

        let resp = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(ProviderError::from_reqwest)?;

        let status = resp.status();
        let text = resp.text().await.map_err(ProviderError::from_reqwest)?;
        tracing::debug!(%status, body = %text, "anthropic raw response");
        if !status.is_success() {
            return Err(ProviderError::from_status(status, text));
        }

        let parsed: MsgResponse =
            serde_json::from_str(&text).map_err(|e| ProviderError::Parse(format!("anthropic response: {e}")))?;
        let content = parsed
            .content
            .into_iter()
            .filter(|b| b.r#type == "text")
            .map(|b| b.text)
            .collect::<Vec<_>>()
            .join("");
        if content.is_empty() {
            return Err(ProviderError::Parse("anthropic: empty content".into()));
        }

        Ok(Completion {
            text: content,
            tokens: TokenCounts { input: parsed.usage.input_tokens, output: parsed.usage.output_tokens },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segments_map_to_content_blocks() {
        let msgs = vec![
            WireMessage { role: Role::Assistant, content: vec![ContentSegment::Text { text: "stale".into() }] },
            WireMessage {
                role: Role::User,
                content: vec![
                    ContentSegment::Text { text: "hi".into() },
                    ContentSegment::Image { url: "https://x/y.png".into() },
                    ContentSegment::Summary { text: "a shop".into() },
                ],
            },
        ];
        let out = to_messages(&msgs);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].role, "user");
        assert_eq!(out[0].content[1]["source"]["url"], "https://x/y.png");
        assert_eq!(out[0].content[2]["text"], "Project summary: a shop");
    }
}
