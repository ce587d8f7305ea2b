use thiserror::Error;

use crate::domain::webhook::WebhookKind;

/// Authenticity failures on inbound webhooks. Always fatal for the request.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("signature header is missing")]
    MissingHeader,
    #[error("signature header is malformed: {0}")]
    MalformedHeader(String),
    #[error("unsupported signature scheme `{0}`")]
    UnsupportedScheme(String),
    #[error("event type `{0}` does not belong to a known signing bucket")]
    UnknownEventBucket(String),
    #[error("no signing key registered for `{0}` webhooks")]
    NoKeyForBucket(WebhookKind),
    #[error("signature does not match any registered key")]
    SignatureMismatch,
}

/// Failures reported by the CRM or telephony client implementations.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ClientError {
    #[error("{resource} `{id}` was not found")]
    NotFound { resource: String, id: String },
    #[error("remote call failed: {0}")]
    Remote(String),
    #[error("operation not supported by this client: {0}")]
    Unsupported(String),
}

impl ClientError {
    pub fn not_found(resource: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound { resource: resource.into(), id: id.into() }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SyncError {
    #[error("{resource} `{id}` was not found")]
    NotFound { resource: String, id: String },
    #[error("webhook provisioning incomplete: {0}")]
    PartialProvisioning(String),
    #[error("downstream failure: {0}")]
    Downstream(String),
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error("invalid event: {0}")]
    InvalidEvent(String),
}

impl SyncError {
    /// Whether the queue transport should redeliver the work item.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Downstream(_) | Self::Persistence(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<ClientError> for SyncError {
    fn from(value: ClientError) -> Self {
        match value {
            ClientError::NotFound { resource, id } => Self::NotFound { resource, id },
            ClientError::Remote(message) | ClientError::Unsupported(message) => {
                Self::Downstream(message)
            }
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("unauthorized: {message}")]
    Unauthorized { message: String, correlation_id: String },
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Unauthorized { .. } => "The webhook could not be authenticated.",
            Self::BadRequest { .. } => {
                "The request could not be processed. Check inputs and try again."
            }
            Self::ServiceUnavailable { .. } => {
                "The service is temporarily unavailable. Please retry shortly."
            }
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::Unauthorized { correlation_id, .. }
            | Self::BadRequest { correlation_id, .. }
            | Self::ServiceUnavailable { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => correlation_id,
        }
    }

    fn with_correlation_id(mut self, correlation_id: String) -> Self {
        match &mut self {
            Self::Unauthorized { correlation_id: id, .. }
            | Self::BadRequest { correlation_id: id, .. }
            | Self::ServiceUnavailable { correlation_id: id, .. }
            | Self::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        self
    }
}

impl AuthError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        InterfaceError::from(self).with_correlation_id(correlation_id.into())
    }
}

impl SyncError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        InterfaceError::from(self).with_correlation_id(correlation_id.into())
    }
}

impl From<AuthError> for InterfaceError {
    fn from(value: AuthError) -> Self {
        Self::Unauthorized { message: value.to_string(), correlation_id: "unassigned".to_owned() }
    }
}

impl From<SyncError> for InterfaceError {
    fn from(value: SyncError) -> Self {
        match value {
            SyncError::InvalidEvent(message) => {
                Self::BadRequest { message, correlation_id: "unassigned".to_owned() }
            }
            SyncError::Downstream(message) | SyncError::Persistence(message) => {
                Self::ServiceUnavailable { message, correlation_id: "unassigned".to_owned() }
            }
            other @ (SyncError::NotFound { .. } | SyncError::PartialProvisioning(_)) => {
                Self::Internal { message: other.to_string(), correlation_id: "unassigned".to_owned() }
            }
        }
    }
}
