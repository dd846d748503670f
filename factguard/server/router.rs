use std::{net::SocketAddr, sync::Arc};

use anyhow::{Context, Result};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::HeaderMap,
    response::Json,
    routing::{get, post},
    Router,
};
use factguard_pipeline::{FactCheckReply, FactCheckRequest, FactCheckRuntime, FactguardConfig};
use serde_json::{json, Value};
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::{
    auth::{bearer_token, Authenticator, StaticTokenAuthenticator},
    error::AppError,
};

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    /// Verification pipeline.
    pub runtime: FactCheckRuntime,
    /// Caller authentication.
    pub auth: Arc<dyn Authenticator>,
}

impl AppState {
    /// Bundles a runtime with an authenticator.
    #[must_use]
    pub const fn new(runtime: FactCheckRuntime, auth: Arc<dyn Authenticator>) -> Self {
        Self { runtime, auth }
    }
}

async fn fact_check(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<FactCheckRequest>, JsonRejection>,
) -> Result<Json<FactCheckReply>, AppError> {
    let user_id = state
        .auth
        .authenticate(bearer_token(&headers))
        .ok_or(AppError::Unauthorized)?;
    let Json(request) = payload.map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;
    let reply = state.runtime.handle(&user_id, request).await?;
    Ok(Json(reply))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Builds the service router with tracing and a body size cap.
#[must_use]
pub fn router(state: AppState, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/api/fact-check", post(fact_check))
        .route("/health", get(health))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
}

/// Installs the JSON `tracing` subscriber; `RUST_LOG` overrides `default_level`.
pub fn init_tracing(default_level: &str) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().with_target(true))
        .try_init()
        .context("installing tracing subscriber")
}

/// Wires the runtime from `config` and serves until Ctrl-C.
pub async fn run(config: FactguardConfig, listen: Option<String>) -> Result<()> {
    let runtime = FactCheckRuntime::from_config(&config)?;
    let auth = StaticTokenAuthenticator::new(config.auth.all_tokens());
    if auth.is_empty() {
        tracing::warn!(target: "factguard.http", "no auth tokens configured; every request will be rejected");
    }
    let app = router(
        AppState::new(runtime, Arc::new(auth)),
        config.server.max_body_bytes,
    );

    let listen = listen.unwrap_or_else(|| config.server.listen.clone());
    let addr: SocketAddr = listen
        .parse()
        .with_context(|| format!("invalid listen address '{listen}'"))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!(target: "factguard.http", %addr, "fact-check service listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(target: "factguard.http", error = %e, "ctrl-c handler failed");
            }
            tracing::info!(target: "factguard.http", "shutting down gracefully");
        })
        .await
        .context("serving http")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, StatusCode},
    };
    use factguard_pipeline::{InferenceTask, LoopbackSearchClient, ScriptedInference};
    use tower::ServiceExt;

    const BODY_LIMIT: usize = 64 * 1024;

    fn app_with(runtime: FactCheckRuntime) -> Router {
        let auth = StaticTokenAuthenticator::new(BTreeMap::from([(
            "tok-alice".to_string(),
            "alice".to_string(),
        )]));
        router(AppState::new(runtime, Arc::new(auth)), BODY_LIMIT)
    }

    fn post_json(token: Option<&str>, body: &str) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/api/fact-check")
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let app = app_with(FactCheckRuntime::bootstrap());
        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let (status, body) = send(app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "status": "ok" }));
    }

    #[tokio::test]
    async fn unauthenticated_callers_get_401() {
        let app = app_with(FactCheckRuntime::bootstrap());
        let body = r#"{"content":"<p>The Great Wall is in Japan.</p>"}"#;
        let (status, payload) = send(app.clone(), post_json(None, body)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(payload["error"], "unauthorized");
        let (status, _) = send(app, post_json(Some("tok-mallory"), body)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn invalid_bodies_get_400() {
        let app = app_with(FactCheckRuntime::bootstrap());
        let (status, payload) = send(app.clone(), post_json(Some("tok-alice"), "{}")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(payload["message"], "content is required");

        let (status, _) = send(app.clone(), post_json(Some("tok-alice"), "{not json")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let bad_mode = r#"{"content":"Paris is the capital of Spain.","mode":"deep"}"#;
        let (status, payload) = send(app, post_json(Some("tok-alice"), bad_mode)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(payload["error"], "bad_request");
    }

    #[tokio::test]
    async fn feedback_is_acknowledged() {
        let runtime = FactCheckRuntime::bootstrap();
        let app = app_with(runtime.clone());
        let body = json!({
            "userFeedback": {
                "correctionType": "accepted",
                "originalText": "The Great Wall is located in Japan.",
                "correctedText": "The Great Wall is located in China."
            }
        });
        let (status, payload) = send(app, post_json(Some("tok-alice"), &body.to_string())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload, json!({ "message": "Feedback recorded" }));
        assert_eq!(runtime.memory().history("alice").len(), 1);
    }

    #[tokio::test]
    async fn repeated_checks_are_served_from_cache() {
        let app = app_with(FactCheckRuntime::bootstrap());
        let body = r#"{"content":"<p>The Eiffel Tower stands in Paris, France.</p>"}"#;
        let (status, first) = send(app.clone(), post_json(Some("tok-alice"), body)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(first["mode"], "realtime");
        assert_eq!(first["cached"], false);
        assert_eq!(first["result"], json!([]));
        let (_, second) = send(app, post_json(Some("tok-alice"), body)).await;
        assert_eq!(second["cached"], true);
    }

    #[tokio::test]
    async fn detection_failure_is_an_opaque_500() {
        let inference = Arc::new(ScriptedInference::default());
        inference.fail_task(InferenceTask::DetectRealtime, "connection reset by sk-secret");
        let runtime = FactCheckRuntime::builder(
            inference,
            Arc::new(LoopbackSearchClient::default()),
        )
        .build();
        let body = r#"{"content":"The Great Wall of China is located in Japan."}"#;
        let (status, payload) = send(app_with(runtime), post_json(Some("tok-alice"), body)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            payload,
            json!({ "error": "internal_error", "message": "Internal server error" })
        );
    }
}
