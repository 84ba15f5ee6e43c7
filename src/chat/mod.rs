use std::collections::BTreeMap;
use thiserror::Error;

use crate::cache::{payload_key, ResponseCache};
use crate::config::Config;
use crate::errors::AppError;
use crate::patch::artifact::{self, ArtifactError};
use crate::patch::{validate_patch, PatchError};
use crate::prompt::{self, PromptInput};
use crate::provider::{Provider, ProviderError};
use crate::tier::{self, Route};
use crate::wire::{
    ChatMessage, ChatMode, ChatReply, ContentSegment, ModelCall, Role, Step, TokenCounts, WireMessage,
};

#[derive(Debug, Clone, Default)]
pub struct Turn {
    pub user_text: String,
    pub image_url: Option<String>,
    pub project_summary: Option<String>,
    pub history: Vec<ChatMessage>,
    pub mode: ChatMode,
    pub language: String,
    pub files: BTreeMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct ChatOutcome {
    pub reply: ChatReply,
    pub steps: Vec<Step>,
    pub route: Route,
    /// Zero on cache hits; nothing was spent.
    pub tokens: TokenCounts,
    pub cached: bool,
    pub raw: String,
    pub call: ModelCall,
}

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("model call failed: {0}")]
    Provider(#[from] ProviderError),
    #[error("model returned an invalid patch: {0}")]
    InvalidPatch(#[from] PatchError),
    #[error("model returned an invalid artifact: {0}")]
    InvalidArtifact(#[from] ArtifactError),
}

impl ChatError {
    pub fn into_app_error(self, expose: bool) -> AppError {
        match self {
            ChatError::Provider(ProviderError::RateLimited) => AppError::RateLimited,
            other => {
                let err = anyhow::Error::new(other);
                AppError::upstream("model call failed", &err, expose)
            }
        }
    }
}

fn history_message(m: &ChatMessage) -> WireMessage {
    let mut content = vec![ContentSegment::Text { text: m.text.clone() }];
    content.extend(m.images.iter().map(|url| ContentSegment::Image { url: url.clone() }));
    WireMessage { role: m.role, content }
}

/// Runs one chat turn: route, build, consult the cache, call the model, decode.
pub struct ChatService<'a> {
    provider: &'a dyn Provider,
    cache: &'a ResponseCache,
    cfg: &'a Config,
}

impl<'a> ChatService<'a> {
    pub fn new(provider: &'a dyn Provider, cache: &'a ResponseCache, cfg: &'a Config) -> Self {
        Self { provider, cache, cfg }
    }

    pub fn build_call(&self, turn: &Turn) -> (ModelCall, Route) {
        let first_turn = !turn.history.iter().any(|m| m.role == Role::Assistant);
        // Blank URLs carry no image; route and prompt must agree on that.
        let image_url = turn.image_url.as_deref().map(str::trim).filter(|u| !u.is_empty());
        let route = tier::select(&turn.user_text, image_url.is_some(), first_turn, self.cfg);

        let content = prompt::build_content(&PromptInput {
            text: &turn.user_text,
            image_url,
            summary: turn.project_summary.as_deref(),
        });
        let digest = prompt::summarize_history(&turn.history, self.cfg.history_keep);

        let mut system = match turn.mode {
            ChatMode::Generate => prompt::system_prompt_generate(&turn.language),
            ChatMode::Edit => prompt::system_prompt_edit(&turn.files, self.cfg.max_context_bytes),
        };
        if let Some(note) = &digest.note {
            system.push_str("\n\n");
            system.push_str(note);
        }

        let mut messages: Vec<WireMessage> = digest.recent.iter().map(history_message).collect();
        messages.push(WireMessage { role: Role::User, content });

        let call = ModelCall { model: route.model.clone(), max_tokens: route.max_tokens, system, messages };
        (call, route)
    }

    pub async fn respond(&self, turn: &Turn) -> Result<ChatOutcome, ChatError> {
        let (call, route) = self.build_call(turn);
        let key = match payload_key(&call) {
            Ok(k) => Some(k),
            Err(e) => {
                tracing::warn!(error = %e, "could not hash model call; skipping cache");
                None
            }
        };

        let cached = key.as_deref().and_then(|k| self.cache.get(k));
        let (completion, was_cached) = match cached {
            Some(hit) => {
                tracing::debug!(model = %route.model, "response cache hit");
                (hit, true)
            }
            None => {
                let fresh = self.provider.complete(&call).await?;
                if let Some(k) = key {
                    self.cache.insert(k, fresh.clone());
                }
                (fresh, false)
            }
        };

        let (reply, steps) = match turn.mode {
            ChatMode::Generate => {
                let steps = artifact::parse_steps(&completion.text)?;
                let response = artifact::strip_artifacts(&completion.text);
                (ChatReply::Text { response, steps: steps.clone() }, steps)
            }
            ChatMode::Edit => {
                let patch = validate_patch(&completion.text)?;
                let steps = patch.steps();
                (ChatReply::Patch { patch }, steps)
            }
        };

        tracing::info!(
            model = %route.model,
            tier = ?route.tier,
            steps = steps.len(),
            cached = was_cached,
            "chat turn complete"
        );

        Ok(ChatOutcome {
            reply,
            steps,
            route,
            tokens: if was_cached { TokenCounts::default() } else { completion.tokens },
            cached: was_cached,
            raw: completion.text,
            call,
        })
    }
}
