use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::json;

use super::{require_non_empty, AppState, ValidJson};
use crate::apply::{apply_steps, NullSandbox};
use crate::chat::{ChatService, Turn};
use crate::errors::AppError;
use crate::template;
use crate::tree::FileTree;
use crate::wire::{
    ActionType, ChatMessage, ChatMode, ChatRequest, ChatResponse, Project, Role, Step, TemplateRequest,
    TemplateResponse,
};

/// Split the request into the current user text and the prior history.
/// `userText` wins; otherwise the last user message is the current turn.
fn current_turn(req: &ChatRequest) -> Result<(String, Vec<ChatMessage>), AppError> {
    if let Some(text) = req.user_text.as_deref().filter(|t| !t.trim().is_empty()) {
        return Ok((text.to_string(), req.messages.clone()));
    }
    let idx = req
        .messages
        .iter()
        .rposition(|m| m.role == Role::User && !m.text.trim().is_empty())
        .ok_or_else(|| AppError::Validation("either userText or a user message is required".into()))?;
    Ok((req.messages[idx].text.clone(), req.messages[..idx].to_vec()))
}

fn owned_project(state: &AppState, id: &str, user_id: &str) -> Result<Project, AppError> {
    let project = state
        .store
        .get_project(id)
        .map_err(AppError::internal)?
        .ok_or_else(|| AppError::NotFound(format!("project {id}")))?;
    if project.user_id != user_id {
        return Err(AppError::Forbidden("project belongs to another user".into()));
    }
    Ok(project)
}

/// Apply the turn's steps to the stored project. Auto-save is a side effect:
/// failures are logged, never returned.
fn autosave(state: &AppState, project: &Project, steps: &[Step]) {
    if steps.is_empty() {
        return;
    }
    let mut tree = match FileTree::from_map(&project.files) {
        Ok(t) => t,
        Err(e) => {
            tracing::warn!(project = %project.id, error = %e, "auto-save skipped: stored files are not a valid tree");
            return;
        }
    };
    let sum = apply_steps(&mut tree, steps, &NullSandbox);
    if sum.changed() == 0 {
        return;
    }
    if let Err(e) = state.store.save_files(&project.id, &tree.to_map()) {
        tracing::warn!(project = %project.id, error = %e, "auto-save failed");
    }
}

pub async fn chat(
    State(state): State<AppState>,
    ValidJson(req): ValidJson<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    require_non_empty("userId", &req.user_id)?;
    let (user_text, history) = current_turn(&req)?;

    let project = match req.project_id.as_deref() {
        Some(id) => Some(owned_project(&state, id, &req.user_id)?),
        None => None,
    };
    let files = match (&project, req.files.is_empty()) {
        (Some(p), true) => p.files.clone(),
        _ => req.files.clone(),
    };
    if req.mode == ChatMode::Edit && files.is_empty() {
        return Err(AppError::Validation("edit mode needs files or a projectId with files".into()));
    }

    let turn = Turn {
        user_text,
        image_url: req.image_url.clone(),
        project_summary: req
            .project_summary
            .clone()
            .or_else(|| project.as_ref().map(|p| p.description.clone())),
        history,
        mode: req.mode,
        language: req.language.clone(),
        files,
    };

    let service = ChatService::new(state.provider.as_ref(), &state.cache, &state.cfg);
    let outcome = service
        .respond(&turn)
        .await
        .map_err(|e| e.into_app_error(state.cfg.expose_upstream_errors))?;

    state.usage.record_best_effort(
        &req.user_id,
        ActionType::Chat,
        outcome.tokens.total(),
        Some(&json!({ "model": outcome.route.model, "cached": outcome.cached })),
    );
    if let Some(p) = &project {
        autosave(&state, p, &outcome.steps);
    }

    Ok(Json(ChatResponse { reply: outcome.reply, model: outcome.route.model, usage: outcome.tokens }))
}

pub async fn template(ValidJson(req): ValidJson<TemplateRequest>) -> Result<Json<TemplateResponse>, AppError> {
    require_non_empty("language", &req.language)?;
    Ok(Json(template::for_language(&req.language)?))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/chat", post(chat))
        .route("/template", post(template))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::tests::FakeProvider;
    use crate::server::tests::state_with;
    use crate::wire::{ChatReply, NewProject};
    use std::collections::BTreeMap;

    fn request(body: serde_json::Value) -> ChatRequest {
        serde_json::from_value(body).unwrap()
    }

    #[test]
    fn last_user_message_is_the_current_turn() {
        let req = request(json!({
            "userId": "u",
            "messages": [
                { "role": "user", "text": "first" },
                { "role": "assistant", "text": "done" },
                { "role": "user", "text": "second" }
            ]
        }));
        let (text, history) = current_turn(&req).unwrap();
        assert_eq!(text, "second");
        assert_eq!(history.len(), 2);

        let empty = request(json!({ "userId": "u" }));
        assert!(matches!(current_turn(&empty), Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn edit_turn_patches_and_autosaves_project() {
        let state = state_with(FakeProvider::ok(
            r#"{"ops":[{"kind":"editFile","path":"src/App.js","find":"red","replace":"blue"}]}"#,
        ));
        let mut files = BTreeMap::new();
        files.insert("src/App.js".to_string(), "color: red; red".to_string());
        let project = state
            .store
            .insert_project("u1", NewProject { name: "p".into(), language: "react".into(), files, ..Default::default() })
            .unwrap();

        let req = request(json!({
            "userId": "u1",
            "userText": "make it blue",
            "mode": "edit",
            "projectId": project.id,
        }));
        let Json(resp) = chat(State(state.clone()), ValidJson(req)).await.unwrap();
        assert!(matches!(resp.reply, ChatReply::Patch { .. }));

        let saved = state.store.get_project(&project.id).unwrap().unwrap();
        assert_eq!(saved.files["src/App.js"], "color: blue; red");
        assert_eq!(state.usage.summary("u1").unwrap().cumulative_tokens, 200);
    }

    #[tokio::test]
    async fn someone_elses_project_is_forbidden() {
        let state = state_with(FakeProvider::ok("ok"));
        let project = state
            .store
            .insert_project("owner", NewProject { name: "p".into(), language: "react".into(), ..Default::default() })
            .unwrap();
        let req = request(json!({ "userId": "intruder", "userText": "hi", "projectId": project.id }));
        let err = chat(State(state), ValidJson(req)).await.err().unwrap();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[tokio::test]
    async fn template_returns_static_prompts() {
        let req = TemplateRequest { prompt: "todo app".into(), language: "node".into() };
        let Json(resp) = template(ValidJson(req)).await.unwrap();
        assert_eq!(resp.prompts.len(), 2);
        assert!(resp.ui_prompts[0].contains("index.js"));
    }
}
