//! HTTP surface: health check and the inbound email webhook.

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use secrecy::{ExposeSecret, SecretString};
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

use crate::agent::ResponseLoop;
use crate::channels::email_types::EmailPayload;
use crate::channels::signature::{SIGNATURE_HEADER, verify_webhook_signature};
use crate::error::WebhookError;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub agent: Arc<ResponseLoop>,
    /// Webhook signing secret (None disables verification).
    pub webhook_secret: Option<SecretString>,
}

/// Build the Axum router with the webhook and health routes.
pub fn webhook_routes(agent: Arc<ResponseLoop>, webhook_secret: Option<SecretString>) -> Router {
    let state = AppState {
        agent,
        webhook_secret,
    };

    Router::new()
        .route("/healthz", get(health))
        .route("/receive-email", post(receive_email))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({"status": "ok"}))
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let status = match self {
            WebhookError::MissingSignature | WebhookError::InvalidSignature => {
                StatusCode::UNAUTHORIZED
            }
            WebhookError::InvalidPayload(_) => StatusCode::UNPROCESSABLE_ENTITY,
        };
        (status, Json(serde_json::json!({"detail": self.to_string()}))).into_response()
    }
}

/// Verify (when a secret is configured) and parse the webhook body.
fn validate_and_parse_email(
    headers: &HeaderMap,
    body: &[u8],
    secret: Option<&SecretString>,
) -> Result<EmailPayload, WebhookError> {
    match secret {
        None => {
            warn!("No webhook secret configured, skipping signature verification");
            Ok(serde_json::from_slice(body)?)
        }
        Some(secret) => {
            let signature = headers
                .get(SIGNATURE_HEADER)
                .and_then(|v| v.to_str().ok())
                .ok_or(WebhookError::MissingSignature)?;
            verify_webhook_signature(signature, body, secret.expose_secret())
        }
    }
}

/// Accept an email event and process it in the background.
async fn receive_email(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, WebhookError> {
    let payload = validate_and_parse_email(&headers, &body, state.webhook_secret.as_ref())?;

    let agent = Arc::clone(&state.agent);
    tokio::spawn(async move {
        if let Err(e) = agent.handle_email(&payload).await {
            error!(
                email_id = %payload.id,
                chat_id = payload.thread_key(),
                error = %e,
                "Failed to handle email"
            );
        }
    });

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    use super::*;
    use crate::channels::signature::sign_payload;
    use crate::store::LibSqlBackend;
    use crate::tools::ToolRegistry;

    const BODY: &str =
        r#"{"id":"e1","from_address":{"address":"a@example.com"},"thread_prompt":"hi"}"#;

    /// Router whose agent can never reach a model (zero tools, unreachable base URL).
    async fn router(secret: Option<&str>) -> Router {
        let llm = crate::llm::create_provider(&crate::llm::LlmConfig {
            api_key: SecretString::from("sk"),
            api_base: "http://127.0.0.1:9".into(),
            model: "gpt-4o".into(),
        })
        .unwrap();
        let store = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        let agent = Arc::new(ResponseLoop::new(
            llm,
            Arc::new(ToolRegistry::new()),
            store,
            "prompt",
            1,
        ));
        webhook_routes(agent, secret.map(SecretString::from))
    }

    fn post(body: &str, signature: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/receive-email")
            .header("content-type", "application/json");
        if let Some(sig) = signature {
            builder = builder.header(SIGNATURE_HEADER, sig);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    #[tokio::test]
    async fn healthz_reports_ok() {
        let response = router(None)
            .await
            .oneshot(Request::get("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json, serde_json::json!({"status": "ok"}));
    }

    #[tokio::test]
    async fn unsigned_webhook_accepted_without_secret() {
        let response = router(None).await.oneshot(post(BODY, None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn missing_signature_is_unauthorized() {
        let response = router(Some("whsec"))
            .await
            .oneshot(post(BODY, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn bad_signature_is_unauthorized() {
        let sig = sign_payload("wrong", BODY.as_bytes()).unwrap();
        let response = router(Some("whsec"))
            .await
            .oneshot(post(BODY, Some(&sig)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn good_signature_is_accepted() {
        let sig = sign_payload("whsec", BODY.as_bytes()).unwrap();
        let response = router(Some("whsec"))
            .await
            .oneshot(post(BODY, Some(&sig)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn malformed_payload_is_unprocessable() {
        let response = router(None)
            .await
            .oneshot(post(r#"{"id":"e1"}"#, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
