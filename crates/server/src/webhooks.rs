use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::post,
    Json, Router,
};
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use callbridge_core::domain::sync::{InboundWebhook, WorkItem};
use callbridge_core::domain::webhook::Platform;
use callbridge_core::errors::{AuthError, InterfaceError};
use callbridge_core::ports::QueueTransport;
use callbridge_core::signature::{
    CrmSignatureVerifier, SignatureVerifier, CRM_SIGNATURE_HEADER, TELEPHONY_SIGNATURE_HEADER,
};
use callbridge_db::WebhookConfigRepository;

#[derive(Clone)]
pub struct WebhookState {
    pub configs: Arc<dyn WebhookConfigRepository>,
    pub queue: Arc<dyn QueueTransport>,
    pub destination: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct WebhookAccepted {
    pub status: &'static str,
    pub correlation_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct WebhookError {
    pub error: String,
    pub correlation_id: String,
}

type Rejection = (StatusCode, Json<WebhookError>);

fn reject(status: StatusCode, error: impl Into<String>, correlation_id: &str) -> Rejection {
    (status, Json(WebhookError { error: error.into(), correlation_id: correlation_id.to_string() }))
}

pub fn router(state: WebhookState) -> Router {
    Router::new().route("/webhooks/{source}/{integration_id}", post(receive)).with_state(state)
}

/// Authenticates one delivery and queues it for the worker. Nothing is
/// queued unless the signature checks out.
async fn receive(
    Path((source, integration_id)): Path<(String, String)>,
    State(state): State<WebhookState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<WebhookAccepted>), Rejection> {
    let correlation_id = format!("req-{}", Uuid::new_v4().simple());
    let Some(platform) = Platform::parse(&source) else {
        return Err(reject(
            StatusCode::NOT_FOUND,
            format!("unknown webhook source `{source}`"),
            &correlation_id,
        ));
    };

    let event: Value = serde_json::from_slice(&body).map_err(|error| {
        warn!(
            event_name = "server.webhook.malformed",
            integration_id = %integration_id,
            source = platform.as_str(),
            correlation_id = %correlation_id,
            error = %error,
            "webhook body is not valid JSON"
        );
        reject(StatusCode::BAD_REQUEST, format!("invalid JSON body: {error}"), &correlation_id)
    })?;

    let config = state.configs.load(&integration_id).await.map_err(|error| {
        warn!(
            event_name = "server.webhook.config_unavailable",
            integration_id = %integration_id,
            correlation_id = %correlation_id,
            error = %error,
            "webhook config could not be loaded"
        );
        reject(StatusCode::SERVICE_UNAVAILABLE, "webhook config unavailable", &correlation_id)
    })?;

    let verified = match platform {
        Platform::Telephony => {
            let event_type = event.get("type").and_then(Value::as_str).unwrap_or_default();
            SignatureVerifier::from_config(&config)
                .verify(header(&headers, TELEPHONY_SIGNATURE_HEADER), &body, event_type)
                .map(|_| ())
        }
        Platform::Crm => CrmSignatureVerifier::from_config(&config)
            .verify(header(&headers, CRM_SIGNATURE_HEADER), &body),
    };
    if let Err(error) = verified {
        return Err(unauthorized(error, platform, &integration_id, &correlation_id));
    }

    let item = WorkItem::ProcessWebhook(InboundWebhook {
        integration_id: integration_id.clone(),
        source: platform,
        event,
        received_at: Utc::now(),
    });
    state.queue.batch_send(vec![item], &state.destination).await.map_err(|error| {
        warn!(
            event_name = "server.webhook.enqueue_failed",
            integration_id = %integration_id,
            correlation_id = %correlation_id,
            error = %error,
            "webhook could not be queued"
        );
        reject(StatusCode::SERVICE_UNAVAILABLE, "work queue unavailable", &correlation_id)
    })?;

    info!(
        event_name = "server.webhook.accepted",
        integration_id = %integration_id,
        source = platform.as_str(),
        correlation_id = %correlation_id,
        "webhook queued"
    );
    Ok((StatusCode::ACCEPTED, Json(WebhookAccepted { status: "accepted", correlation_id })))
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

fn unauthorized(
    error: AuthError,
    platform: Platform,
    integration_id: &str,
    correlation_id: &str,
) -> Rejection {
    warn!(
        event_name = "server.webhook.rejected",
        integration_id,
        source = platform.as_str(),
        correlation_id,
        reason = %error,
        "webhook signature rejected"
    );
    let interface: InterfaceError = error.into_interface(correlation_id);
    reject(StatusCode::UNAUTHORIZED, interface.to_string(), correlation_id)
}
