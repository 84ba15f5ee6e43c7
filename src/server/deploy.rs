use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};

use super::{AppState, ValidJson};
use crate::deploy::{bundle_from_request, Deployer};
use crate::errors::AppError;
use crate::wire::{DeployRequest, DeployResponse};

async fn publish(
    host: &str,
    deployer: &dyn Deployer,
    req: DeployRequest,
    expose: bool,
) -> Result<Json<DeployResponse>, AppError> {
    let bundle = bundle_from_request(req.files, req.name, req.description)?;
    tracing::info!(host, name = %bundle.name, files = bundle.files.len(), "deploying");
    let url = deployer
        .deploy(&bundle)
        .await
        .map_err(|e| AppError::upstream(&format!("{host} deployment failed"), &e, expose))?;
    Ok(Json(DeployResponse { url }))
}

pub async fn deploy_vercel(
    State(state): State<AppState>,
    ValidJson(req): ValidJson<DeployRequest>,
) -> Result<Json<DeployResponse>, AppError> {
    let Some(vercel) = state.vercel.clone() else {
        tracing::error!("vercel deploy requested but VERCEL_TOKEN is not configured");
        return Err(AppError::Internal("vercel deployment is not configured".into()));
    };
    publish("vercel", vercel.as_ref(), req, state.cfg.expose_upstream_errors).await
}

pub async fn deploy_snack(
    State(state): State<AppState>,
    ValidJson(req): ValidJson<DeployRequest>,
) -> Result<Json<DeployResponse>, AppError> {
    publish("snack", state.snack.as_ref(), req, state.cfg.expose_upstream_errors).await
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/deploy/vercel", post(deploy_vercel))
        .route("/deploy/snack", post(deploy_snack))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::tests::FakeProvider;
    use crate::deploy::Bundle;
    use crate::server::tests::state_with;
    use async_trait::async_trait;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    struct EchoDeployer;

    #[async_trait]
    impl Deployer for EchoDeployer {
        async fn deploy(&self, bundle: &Bundle) -> anyhow::Result<String> {
            Ok(format!("https://{}.example.test", bundle.name))
        }
    }

    struct FailingDeployer;

    #[async_trait]
    impl Deployer for FailingDeployer {
        async fn deploy(&self, _bundle: &Bundle) -> anyhow::Result<String> {
            anyhow::bail!("secret upstream detail")
        }
    }

    fn request(files: &[(&str, &str)]) -> DeployRequest {
        let files: BTreeMap<String, String> = files.iter().map(|(p, c)| (p.to_string(), c.to_string())).collect();
        DeployRequest { files, name: Some("My App".into()), description: None }
    }

    #[tokio::test]
    async fn missing_token_is_a_config_error() {
        let state = state_with(FakeProvider::ok(""));
        assert!(state.vercel.is_none());
        let err = deploy_vercel(State(state), ValidJson(request(&[("index.html", "<p/>")]))).await.err().unwrap();
        assert!(matches!(err, AppError::Internal(_)));
    }

    #[tokio::test]
    async fn configured_deployer_returns_url() {
        let mut state = state_with(FakeProvider::ok(""));
        state.vercel = Some(Arc::new(EchoDeployer));
        let Json(resp) = deploy_vercel(State(state), ValidJson(request(&[("index.html", "<p/>")]))).await.unwrap();
        assert_eq!(resp.url, "https://my-app.example.test");
    }

    #[tokio::test]
    async fn empty_bundle_and_upstream_failures() {
        let mut state = state_with(FakeProvider::ok(""));
        state.snack = Arc::new(FailingDeployer);
        let err = deploy_snack(State(state.clone()), ValidJson(request(&[]))).await.err().unwrap();
        assert!(matches!(err, AppError::Validation(_)));

        let err = deploy_snack(State(state), ValidJson(request(&[("App.js", "x")]))).await.err().unwrap();
        match err {
            AppError::Upstream(msg) => assert!(!msg.contains("secret")),
            other => panic!("unexpected {other:?}"),
        }
    }
}
