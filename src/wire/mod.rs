use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// ========================================
/// Conversation + model call protocol
/// ========================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenCounts {
    pub input: u64,
    pub output: u64,
}

impl TokenCounts {
    pub fn total(&self) -> u64 {
        self.input + self.output
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub role: Role,
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens: Option<TokenCounts>,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self { role: Role::User, text: text.into(), images: Vec::new(), tokens: None }
    }

    pub fn assistant(text: impl Into<String>, tokens: Option<TokenCounts>) -> Self {
        Self { role: Role::Assistant, text: text.into(), images: Vec::new(), tokens }
    }
}

/// Append-only turn log. Messages are never mutated once pushed.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    messages: Vec<ChatMessage>,
}

impl Conversation {
    pub fn push(&mut self, msg: ChatMessage) {
        self.messages.push(msg);
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn is_first_turn(&self) -> bool {
        !self.messages.iter().any(|m| m.role == Role::Assistant)
    }
}

/// One piece of the user content sent to the model, in fixed order:
/// text, then optional image, then optional project summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentSegment {
    Text { text: String },
    Image { url: String },
    Summary { text: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireMessage {
    pub role: Role,
    pub content: Vec<ContentSegment>,
}

/// Everything a provider needs for one completion. Also the cache key source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelCall {
    pub model: String,
    pub max_tokens: u32,
    pub system: String,
    pub messages: Vec<WireMessage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Completion {
    pub text: String,
    pub tokens: TokenCounts,
}

/// ========================================
/// Steps and patches
/// ========================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Step {
    CreateFile { path: String, content: String },
    EditFile { path: String, find: String, replace: String },
}

impl Step {
    pub fn path(&self) -> &str {
        match self {
            Step::CreateFile { path, .. } | Step::EditFile { path, .. } => path,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchOp {
    pub kind: String,
    pub path: String,
    pub find: String,
    pub replace: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Patch {
    pub ops: Vec<PatchOp>,
}

impl Patch {
    pub fn steps(&self) -> Vec<Step> {
        self.ops
            .iter()
            .map(|op| Step::EditFile {
                path: op.path.clone(),
                find: op.find.clone(),
                replace: op.replace.clone(),
            })
            .collect()
    }
}

/// ========================================
/// HTTP request/response schemas
/// ========================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatMode {
    #[default]
    Generate,
    Edit,
}

fn default_language() -> String {
    "react".into()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    pub user_text: Option<String>,
    #[serde(default = "default_language")]
    pub language: String,
    pub user_id: String,
    pub image_url: Option<String>,
    pub project_id: Option<String>,
    pub project_summary: Option<String>,
    #[serde(default)]
    pub mode: ChatMode,
    #[serde(default)]
    pub files: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ChatReply {
    Patch { patch: Patch },
    Text { response: String, steps: Vec<Step> },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    #[serde(flatten)]
    pub reply: ChatReply,
    pub model: String,
    pub usage: TokenCounts,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TemplateRequest {
    #[serde(default)]
    pub prompt: String,
    pub language: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateResponse {
    pub prompts: Vec<String>,
    pub ui_prompts: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub description: String,
    pub language: String,
    pub prompt: String,
    pub code: String,
    pub files: BTreeMap<String, String>,
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProject {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub files: BTreeMap<String, String>,
    #[serde(default)]
    pub is_public: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub language: Option<String>,
    pub prompt: Option<String>,
    pub code: Option<String>,
    pub files: Option<BTreeMap<String, String>>,
    pub is_public: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActionType {
    Chat,
    Template,
    Deploy,
    Publish,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::Chat => "chat",
            ActionType::Template => "template",
            ActionType::Deploy => "deploy",
            ActionType::Publish => "publish",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageEventRequest {
    pub user_id: String,
    pub action_type: ActionType,
    #[serde(default)]
    pub tokens_used: u64,
    #[serde(default)]
    pub metadata: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageQuery {
    pub user_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeployRequest {
    pub files: BTreeMap<String, String>,
    pub name: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeployResponse {
    pub url: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn chat_reply_serializes_flat() {
        let resp = ChatResponse {
            reply: ChatReply::Patch { patch: Patch::default() },
            model: "m".into(),
            usage: TokenCounts::default(),
        };
        let v = serde_json::to_value(&resp).unwrap();
        assert_eq!(v["patch"], json!({ "ops": [] }));
        assert_eq!(v["model"], "m");
    }

    #[test]
    fn steps_use_kind_tags() {
        let v = serde_json::to_value(Step::CreateFile { path: "a".into(), content: "b".into() }).unwrap();
        assert_eq!(v, json!({ "kind": "createFile", "path": "a", "content": "b" }));
    }

    #[test]
    fn usage_event_rejects_negative_tokens() {
        let bad = json!({ "userId": "u", "actionType": "chat", "tokensUsed": -3 });
        assert!(serde_json::from_value::<UsageEventRequest>(bad).is_err());
        let missing = json!({ "userId": "u", "actionType": "chat" });
        let ok: UsageEventRequest = serde_json::from_value(missing).unwrap();
        assert_eq!(ok.tokens_used, 0);
    }

    #[test]
    fn first_turn_until_assistant_replies() {
        let mut c = Conversation::default();
        c.push(ChatMessage::user("hi"));
        assert!(c.is_first_turn());
        c.push(ChatMessage::assistant("hello", None));
        assert!(!c.is_first_turn());
    }
}
