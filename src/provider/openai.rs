use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

use super::{Provider, ProviderError};
use crate::wire::{Completion, ContentSegment, ModelCall, Role, TokenCounts};

const CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";

/// OpenAI chat-completions adapter. The system prompt goes first as its own
/// message; user content keeps its segment order.
pub struct OpenAIProvider {
    api_key: String,
    client: Client,
}

impl OpenAIProvider {
    pub fn new(api_key: String, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { api_key, client })
    }
}

fn part(seg: &ContentSegment) -> Value {
    match seg {
        ContentSegment::Text { text } => json!({ "type": "text", "text": text }),
        ContentSegment::Image { url } => json!({ "type": "image_url", "image_url": { "url": url } }),
        ContentSegment::Summary { text } => json!({ "type": "text", "text": format!("Project summary: {text}") }),
    }
}

fn body(call: &ModelCall) -> Value {
    let mut messages = Vec::with_capacity(call.messages.len() + 1);
    if !call.system.is_empty() {
        messages.push(json!({ "role": "system", "content": call.system }));
    }
    for m in &call.messages {
        let role = match m.role {
            Role::User => "user",
            Role::Assistant => "assistant",
        };
        messages.push(json!({ "role": role, "content": m.content.iter().map(part).collect::<Vec<_>>() }));
    }
    json!({
        "model": call.model,
        "max_tokens": call.max_tokens,
        "messages": messages,
        "temperature": 0.0,
    })
}

#[async_trait]
impl Provider for OpenAIProvider {
    async fn complete(&self, call: &ModelCall) -> Result<Completion, ProviderError> {
        let body = body(call);
        tracing::debug!(model = %call.model, "openai request");

        let resp = self
            .client
            .post(CHAT_URL)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(ProviderError::from_reqwest)?;

        let status = resp.status();
        let text = resp.text().await.map_err(ProviderError::from_reqwest)?;
        tracing::debug!(%status, body = %text, "openai raw response");
        if !status.is_success() {
            return Err(ProviderError::from_status(status, text));
        }

        // Minimal structs to parse the chat response
        #[derive(Deserialize)]
        struct ChatMessage {
            #[serde(default)]
            content: Option<String>,
        }
        #[derive(Deserialize)]
        struct Choice {
            message: ChatMessage,
        }
        #[derive(Deserialize, Default)]
        struct Usage {
            #[serde(default)]
            prompt_tokens: u64,
            #[serde(default)]
            completion_tokens: u64,
        }
        #[derive(Deserialize)]
        struct ChatResponse {
            choices: Vec<Choice>,
            #[serde(default)]
            usage: Usage,
        }

        let parsed: ChatResponse =
            serde_json::from_str(&text).map_err(|e| ProviderError::Parse(format!("openai response: {e}")))?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.is_empty())
            .ok_or_else(|| ProviderError::Parse("openai: empty content".into()))?;

        Ok(Completion {
            text: content,
            tokens: TokenCounts { input: parsed.usage.prompt_tokens, output: parsed.usage.completion_tokens },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::WireMessage;

    #[test]
    fn system_prompt_leads_and_images_become_parts() {
        let call = ModelCall {
            model: "gpt".into(),
            max_tokens: 10,
            system: "sys".into(),
            messages: vec![WireMessage {
                role: Role::User,
                content: vec![
                    ContentSegment::Text { text: "hi".into() },
                    ContentSegment::Image { url: "u".into() },
                ],
            }],
        };
        let b = body(&call);
        assert_eq!(b["messages"][0]["role"], "system");
        assert_eq!(b["messages"][1]["content"][1]["image_url"]["url"], "u");
        assert_eq!(b["max_tokens"], 10);
    }
}
