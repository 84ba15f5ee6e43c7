use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};

use super::{require_non_empty, AppState, UserId, ValidJson};
use crate::errors::AppError;
use crate::wire::{NewProject, Project, ProjectUpdate};

fn load(state: &AppState, id: &str) -> Result<Project, AppError> {
    state
        .store
        .get_project(id)
        .map_err(AppError::internal)?
        .ok_or_else(|| AppError::NotFound(format!("project {id}")))
}

fn ensure_owner(project: &Project, user_id: &str) -> Result<(), AppError> {
    if project.user_id != user_id {
        return Err(AppError::Forbidden("only the owner may change this project".into()));
    }
    Ok(())
}

pub async fn create_project(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    ValidJson(body): ValidJson<NewProject>,
) -> Result<(StatusCode, Json<Project>), AppError> {
    require_non_empty("name", &body.name)?;
    let project = state.store.insert_project(&user_id, body).map_err(AppError::internal)?;
    tracing::info!(project = %project.id, user = %user_id, "project created");
    Ok((StatusCode::CREATED, Json(project)))
}

pub async fn list_projects(
    State(state): State<AppState>,
    UserId(user_id): UserId,
) -> Result<Json<Vec<Project>>, AppError> {
    Ok(Json(state.store.list_projects(&user_id).map_err(AppError::internal)?))
}

pub async fn get_project(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Path(id): Path<String>,
) -> Result<Json<Project>, AppError> {
    let project = load(&state, &id)?;
    if !project.is_public && project.user_id != user_id {
        return Err(AppError::Forbidden("project is private".into()));
    }
    Ok(Json(project))
}

pub async fn update_project(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Path(id): Path<String>,
    ValidJson(body): ValidJson<ProjectUpdate>,
) -> Result<Json<Project>, AppError> {
    if let Some(name) = &body.name {
        require_non_empty("name", name)?;
    }
    ensure_owner(&load(&state, &id)?, &user_id)?;
    let updated = state
        .store
        .update_project(&id, body)
        .map_err(AppError::internal)?
        .ok_or_else(|| AppError::NotFound(format!("project {id}")))?;
    Ok(Json(updated))
}

pub async fn delete_project(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    ensure_owner(&load(&state, &id)?, &user_id)?;
    if !state.store.delete_project(&id).map_err(AppError::internal)? {
        return Err(AppError::NotFound(format!("project {id}")));
    }
    tracing::info!(project = %id, user = %user_id, "project deleted");
    Ok(StatusCode::NO_CONTENT)
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/projects", get(list_projects).post(create_project))
        .route("/projects/{id}", get(get_project).put(update_project).delete(delete_project))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::tests::FakeProvider;
    use crate::server::tests::state_with;

    fn new_project(name: &str, is_public: bool) -> NewProject {
        NewProject { name: name.into(), language: "react".into(), is_public, ..Default::default() }
    }

    async fn create(state: &AppState, user: &str, body: NewProject) -> Project {
        let (status, Json(p)) = create_project(State(state.clone()), UserId(user.into()), ValidJson(body))
            .await
            .unwrap();
        assert_eq!(status, StatusCode::CREATED);
        p
    }

    #[tokio::test]
    async fn blank_name_is_rejected() {
        let state = state_with(FakeProvider::ok(""));
        let err = create_project(State(state), UserId("u".into()), ValidJson(new_project("  ", false)))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn list_only_returns_own_projects() {
        let state = state_with(FakeProvider::ok(""));
        create(&state, "alice", new_project("a", false)).await;
        create(&state, "bob", new_project("b", false)).await;
        let Json(list) = list_projects(State(state), UserId("alice".into())).await.unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].name, "a");
    }

    #[tokio::test]
    async fn public_projects_are_readable_but_not_writable() {
        let state = state_with(FakeProvider::ok(""));
        let public = create(&state, "alice", new_project("pub", true)).await;
        let private = create(&state, "alice", new_project("priv", false)).await;

        let Json(p) = get_project(State(state.clone()), UserId("bob".into()), Path(public.id.clone()))
            .await
            .unwrap();
        assert_eq!(p.name, "pub");
        let err = get_project(State(state.clone()), UserId("bob".into()), Path(private.id.clone()))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, AppError::Forbidden(_)));

        let update = ProjectUpdate { name: Some("hijacked".into()), ..Default::default() };
        let err = update_project(State(state.clone()), UserId("bob".into()), Path(public.id.clone()), ValidJson(update))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, AppError::Forbidden(_)));

        let err = delete_project(State(state), UserId("bob".into()), Path(public.id)).await.err().unwrap();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[tokio::test]
    async fn owner_updates_then_deletes() {
        let state = state_with(FakeProvider::ok(""));
        let p = create(&state, "alice", new_project("draft", false)).await;

        let update = ProjectUpdate { description: Some("a todo app".into()), ..Default::default() };
        let Json(updated) = update_project(State(state.clone()), UserId("alice".into()), Path(p.id.clone()), ValidJson(update))
            .await
            .unwrap();
        assert_eq!(updated.description, "a todo app");
        assert_eq!(updated.name, "draft");

        let status = delete_project(State(state.clone()), UserId("alice".into()), Path(p.id.clone()))
            .await
            .unwrap();
        assert_eq!(status, StatusCode::NO_CONTENT);
        let err = get_project(State(state), UserId("alice".into()), Path(p.id)).await.err().unwrap();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
