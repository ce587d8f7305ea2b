//! Operator endpoints: webhook provisioning and bulk sync kick-off per
//! integration.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use callbridge_core::domain::mapping::SyncMethod;
use callbridge_core::errors::{InterfaceError, SyncError};
use callbridge_sync::{
    BulkSyncCoordinator, RegistrationError, RegistrationState, SetupStatus,
    WebhookRegistrationManager,
};

#[derive(Clone)]
pub struct IntegrationState {
    /// Absent when no public base URL is configured.
    pub registration: Option<Arc<WebhookRegistrationManager>>,
    pub bulk: Arc<BulkSyncCoordinator>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct IntegrationError {
    pub error: String,
    pub correlation_id: String,
}

type Rejection = (StatusCode, Json<IntegrationError>);

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SetupResponse {
    pub status: &'static str,
    pub state: &'static str,
    pub created: usize,
    pub removed_orphans: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TeardownResponse {
    pub removed: usize,
}

#[derive(Clone, Debug, Deserialize)]
pub struct StartSyncRequest {
    pub object_type: String,
    #[serde(default)]
    pub sync_method: Option<SyncMethod>,
    #[serde(default)]
    pub modified_since: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StartSyncResponse {
    pub job_id: String,
    pub first_page_records: usize,
    pub planned_items: usize,
}

pub fn router(state: IntegrationState) -> Router {
    Router::new()
        .route("/integrations/{integration_id}/webhooks", post(setup_webhooks).delete(teardown))
        .route("/integrations/{integration_id}/sync", post(start_sync))
        .with_state(state)
}

fn correlation_id() -> String {
    format!("req-{}", Uuid::new_v4().simple())
}

fn registration(state: &IntegrationState) -> Result<&WebhookRegistrationManager, Rejection> {
    state.registration.as_deref().ok_or_else(|| {
        (
            StatusCode::CONFLICT,
            Json(IntegrationError {
                error: "webhook registration needs server.public_base_url".to_string(),
                correlation_id: correlation_id(),
            }),
        )
    })
}

fn status_label(status: SetupStatus) -> &'static str {
    match status {
        SetupStatus::Success => "success",
        SetupStatus::Partial => "partial",
        SetupStatus::AlreadyConfigured => "already_configured",
    }
}

fn state_label(state: RegistrationState) -> &'static str {
    match state {
        RegistrationState::Unconfigured => "unconfigured",
        RegistrationState::Configuring => "configuring",
        RegistrationState::Configured => "configured",
        RegistrationState::PartiallyConfigured => "partially_configured",
        RegistrationState::Failed => "failed",
    }
}

fn registration_rejection(integration_id: &str, error: RegistrationError) -> Rejection {
    let correlation_id = correlation_id();
    warn!(
        event_name = "server.integrations.registration_failed",
        integration_id,
        correlation_id = %correlation_id,
        error = %error,
        "webhook registration failed"
    );
    let status = match &error {
        RegistrationError::MandatorySideFailed { .. } => StatusCode::BAD_GATEWAY,
        RegistrationError::Persistence(_) => StatusCode::SERVICE_UNAVAILABLE,
        RegistrationError::Configuration(_) => StatusCode::CONFLICT,
    };
    (status, Json(IntegrationError { error: error.to_string(), correlation_id }))
}

fn sync_rejection(integration_id: &str, error: SyncError) -> Rejection {
    let correlation_id = correlation_id();
    warn!(
        event_name = "server.integrations.sync_failed",
        integration_id,
        correlation_id = %correlation_id,
        error = %error,
        "bulk sync could not start"
    );
    let interface = error.into_interface(correlation_id.clone());
    let status = match interface {
        InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
        InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        InterfaceError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
        InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(IntegrationError { error: interface.to_string(), correlation_id }))
}

async fn setup_webhooks(
    Path(integration_id): Path<String>,
    State(state): State<IntegrationState>,
) -> Result<Json<SetupResponse>, Rejection> {
    let report = registration(&state)?
        .setup(&integration_id)
        .await
        .map_err(|error| registration_rejection(&integration_id, error))?;

    Ok(Json(SetupResponse {
        status: status_label(report.status),
        state: state_label(report.state),
        created: report.created,
        removed_orphans: report.removed_orphans,
    }))
}

async fn teardown(
    Path(integration_id): Path<String>,
    State(state): State<IntegrationState>,
) -> Result<Json<TeardownResponse>, Rejection> {
    let removed = registration(&state)?
        .teardown(&integration_id)
        .await
        .map_err(|error| registration_rejection(&integration_id, error))?;
    Ok(Json(TeardownResponse { removed }))
}

async fn start_sync(
    Path(integration_id): Path<String>,
    State(state): State<IntegrationState>,
    Json(request): Json<StartSyncRequest>,
) -> Result<(StatusCode, Json<StartSyncResponse>), Rejection> {
    let start = state
        .bulk
        .start_sync(
            &integration_id,
            &request.object_type,
            request.sync_method.unwrap_or(SyncMethod::Backfill),
            request.modified_since,
        )
        .await
        .map_err(|error| sync_rejection(&integration_id, error))?;

    Ok((
        StatusCode::ACCEPTED,
        Json(StartSyncResponse {
            job_id: start.job_id,
            first_page_records: start.first_page_records,
            planned_items: start.planned_items,
        }),
    ))
}
