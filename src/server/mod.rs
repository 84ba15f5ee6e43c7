use anyhow::{Context, Result};
use axum::extract::{FromRequest, FromRequestParts, Request};
use axum::http::request::Parts;
use axum::routing::get;
use axum::{Json, Router};
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::cache::ResponseCache;
use crate::config::Config;
use crate::deploy::{snack::Snack, vercel::Vercel, Deployer};
use crate::errors::AppError;
use crate::provider::{make_provider, Provider};
use crate::store::Store;
use crate::usage::UsageTracker;

pub mod chat;
pub mod deploy;
pub mod projects;
pub mod usage;

#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<Config>,
    pub store: Arc<Store>,
    pub usage: UsageTracker,
    pub cache: Arc<ResponseCache>,
    pub provider: Arc<dyn Provider>,
    pub vercel: Option<Arc<dyn Deployer>>,
    pub snack: Arc<dyn Deployer>,
}

impl AppState {
    pub fn new(cfg: Config, store: Store, provider: Arc<dyn Provider>) -> Result<Self> {
        let timeout = Duration::from_secs(cfg.timeout_secs);
        let store = Arc::new(store);
        let vercel: Option<Arc<dyn Deployer>> = match cfg.vercel_token.clone() {
            Some(token) => Some(Arc::new(Vercel::new(token, timeout)?)),
            None => None,
        };
        Ok(Self {
            usage: UsageTracker::new(store.clone(), &cfg),
            cache: Arc::new(ResponseCache::new(cfg.cache_capacity)),
            snack: Arc::new(Snack::new(cfg.snack_sdk_version.clone(), timeout)?),
            vercel,
            provider,
            store,
            cfg: Arc::new(cfg),
        })
    }
}

/// JSON body whose rejections surface as 400 validation errors.
pub struct ValidJson<T>(pub T);

impl<S, T> FromRequest<S> for ValidJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e| AppError::Validation(e.body_text()))?;
        Ok(ValidJson(value))
    }
}

/// Caller identity, set by the fronting auth proxy.
pub struct UserId(pub String);

impl<S: Send + Sync> FromRequestParts<S> for UserId {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get("x-user-id")
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| UserId(s.to_string()))
            .ok_or_else(|| AppError::Unauthorized("missing x-user-id header".into()))
    }
}

pub fn require_non_empty(field: &str, value: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{field} must not be empty")));
    }
    Ok(())
}

async fn health() -> &'static str {
    "OK"
}

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .merge(chat::router())
        .merge(projects::router())
        .merge(usage::router())
        .merge(deploy::router());
    Router::new()
        .route("/health", get(health))
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn serve(cfg: Config) -> Result<()> {
    let provider: Arc<dyn Provider> = Arc::from(make_provider(cfg.provider, &cfg)?);
    let store = Store::open(Path::new(&cfg.database))?;
    let bind = cfg.bind.clone();
    let state = AppState::new(cfg, store, provider)?;

    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("binding {bind}"))?;
    tracing::info!(addr = %bind, "vibe_appgen listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutting down");
        })
        .await?;
    Ok(())
}
