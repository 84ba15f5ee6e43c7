use std::collections::BTreeMap;

use crate::wire::{ChatMessage, ContentSegment, Role};

pub const USER_TEXT_LIMIT: usize = 1000;
pub const SUMMARY_LIMIT: usize = 240;
pub const DEFAULT_HISTORY_KEEP: usize = 4;

/// How many early user requests survive into the history note, and how long each may be.
const NOTE_REQUESTS: usize = 3;
const NOTE_REQUEST_CHARS: usize = 120;

#[derive(Debug, Clone, Copy, Default)]
pub struct PromptInput<'a> {
    pub text: &'a str,
    pub image_url: Option<&'a str>,
    pub summary: Option<&'a str>,
}

/// Truncate on char boundaries, never bytes.
pub fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

/// Build the user content list: text, then image, then project summary.
/// Always succeeds; oversize inputs are cut to their ceilings.
pub fn build_content(input: &PromptInput<'_>) -> Vec<ContentSegment> {
    let mut out = vec![ContentSegment::Text { text: truncate_chars(input.text, USER_TEXT_LIMIT) }];
    if let Some(url) = input.image_url.map(str::trim).filter(|u| !u.is_empty()) {
        out.push(ContentSegment::Image { url: url.to_string() });
    }
    if let Some(summary) = input.summary.map(str::trim).filter(|s| !s.is_empty()) {
        out.push(ContentSegment::Summary { text: truncate_chars(summary, SUMMARY_LIMIT) });
    }
    out
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistoryDigest {
    /// One-line note standing in for everything older than `recent`.
    pub note: Option<String>,
    pub recent: Vec<ChatMessage>,
}

/// Keep the last `keep` messages verbatim and collapse older ones into a note.
pub fn summarize_history(messages: &[ChatMessage], keep: usize) -> HistoryDigest {
    if messages.len() <= keep {
        return HistoryDigest { note: None, recent: messages.to_vec() };
    }
    let split = messages.len() - keep;
    let (older, recent) = messages.split_at(split);

    let requests: Vec<String> = older
        .iter()
        .filter(|m| m.role == Role::User)
        .take(NOTE_REQUESTS)
        .map(|m| truncate_chars(&one_line(&m.text), NOTE_REQUEST_CHARS))
        .collect();
    let replies = older.iter().filter(|m| m.role == Role::Assistant).count();

    let note = format!(
        "Earlier conversation ({} messages): user asked: {}; assistant replied {} time(s).",
        older.len(),
        if requests.is_empty() { "(nothing)".to_string() } else { requests.join(" | ") },
        replies
    );
    HistoryDigest { note: Some(note), recent: recent.to_vec() }
}

fn one_line(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn conventions(language: &str) -> String {
    match language {
        "node" => {
            "Target: Node.js (ES modules). Entry point is index.js; declare dependencies in package.json."
                .into()
        }
        "react-native" => {
            "Target: React Native via Expo. Entry point is App.js; use only Expo-compatible packages."
                .into()
        }
        _ => {
            "Target: React + Vite. Entry point is src/main.jsx rendering src/App.jsx; style with Tailwind classes."
                .into()
        }
    }
}

pub fn system_prompt_generate(language: &str) -> String {
    format!(r#"You are an expert web developer generating a complete, runnable project.

Reply with a short explanation followed by EXACTLY ONE artifact:

<artifact id="kebab-case-id" title="Human title">
  <action type="file" filePath="relative/path.ext">
full file contents
  </action>
</artifact>

Rules:
- Only type="file" actions are supported. Do not emit shell or start actions.
- Always write complete file contents; never elide with comments like "rest unchanged".
- Paths are relative, slash-separated, and never contain "..".
- Include package.json whenever dependencies change.

{conventions}"#,
        conventions = conventions(language)
    )
}

pub fn system_prompt_edit(files: &BTreeMap<String, String>, max_context_bytes: usize) -> String {
    let mut snapshot = String::new();
    let mut budget = max_context_bytes;
    for (path, content) in files {
        let (body, truncated) = if content.len() > budget {
            let mut cut = budget;
            while !content.is_char_boundary(cut) {
                cut -= 1;
            }
            (&content[..cut], true)
        } else {
            (content.as_str(), false)
        };
        budget -= body.len();
        let marker = if truncated { " (truncated)" } else { "" };
        snapshot.push_str(&format!("--- {path}{marker} ---\n{body}\n"));
        if budget == 0 {
            break;
        }
    }
    if snapshot.is_empty() {
        snapshot.push_str("(no files)\n");
    }

    format!(r#"You edit an existing project by returning a JSON patch.

Return EXACTLY ONE JSON object (no markdown, no prose) of the form:
{{ "ops": [ {{ "kind": "editFile", "path": string, "find": string, "replace": string }} ] }}

Rules:
- "find" must be copied verbatim from the current file and be long enough to be unique; only its first occurrence is replaced.
- "path", "find" and "replace" must all be non-empty.
- Return {{ "ops": [] }} when no change is needed.

Current files:
{snapshot}"#)
}
