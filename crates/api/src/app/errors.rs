//! Error and success envelopes.
//!
//! Failures render as `{ "error": message }`, successes as `{ "data": ... }`.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde_json::json;

use kidsbook_auth::{AuthzError, DenialKind};
use kidsbook_core::DomainError;
use kidsbook_infra::ServiceError;

/// Which failures an endpoint answers with 405 instead of the usual status.
///
/// A handful of legacy endpoints report some refusals as "method not allowed";
/// clients depend on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotAllowed {
    Never,
    /// A `Forbidden` of this kind.
    OnDenial(DenialKind),
    /// Any rejected input (validation, conflicts, missing targets).
    OnInvalidInput,
    /// Both of the above.
    OnDenialOrInvalidInput(DenialKind),
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Map a service failure for an endpoint with the given 405 rule.
    pub fn from_service(err: ServiceError, not_allowed: NotAllowed) -> Self {
        match err {
            ServiceError::Authz(AuthzError::Unauthenticated) => {
                Self::new(StatusCode::UNAUTHORIZED, AuthzError::Unauthenticated.to_string())
            }
            ServiceError::Authz(AuthzError::Forbidden(denial)) => {
                let status = match not_allowed {
                    NotAllowed::OnDenial(kind) | NotAllowed::OnDenialOrInvalidInput(kind) if kind == denial.kind => {
                        StatusCode::METHOD_NOT_ALLOWED
                    }
                    _ => StatusCode::FORBIDDEN,
                };
                Self::new(status, denial.message)
            }
            ServiceError::Domain(DomainError::FeatureDisabled(msg)) => Self::new(StatusCode::FORBIDDEN, msg),
            ServiceError::Authz(e @ AuthzError::NotFound(_)) => Self::invalid_input(e.to_string(), not_allowed),
            ServiceError::Domain(e) => Self::invalid_input(e.to_string(), not_allowed),
            ServiceError::Store(e) => {
                tracing::error!(error = %e, "store failure");
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
            }
            ServiceError::Token(e) => {
                tracing::error!(error = %e, "token failure");
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
            }
            ServiceError::Revocation(e) => {
                tracing::error!(error = %e, "token revocation failed");
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
            }
        }
    }

    fn invalid_input(message: String, not_allowed: NotAllowed) -> Self {
        let status = match not_allowed {
            NotAllowed::OnInvalidInput | NotAllowed::OnDenialOrInvalidInput(_) => StatusCode::METHOD_NOT_ALLOWED,
            _ => StatusCode::BAD_REQUEST,
        };
        Self::new(status, message)
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        Self::from_service(err, NotAllowed::Never)
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ServiceError::from(err).into()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

pub type ApiResult = Result<Response, ApiError>;

/// Wrap `data` in the success envelope.
pub fn data(status: StatusCode, data: impl Serialize) -> ApiResult {
    Ok((status, Json(json!({ "data": data }))).into_response())
}

/// Extension trait for attaching a 405 rule at the call site.
pub trait ServiceResultExt<T> {
    fn or_not_allowed(self, rule: NotAllowed) -> Result<T, ApiError>;
}

impl<T> ServiceResultExt<T> for Result<T, ServiceError> {
    fn or_not_allowed(self, rule: NotAllowed) -> Result<T, ApiError> {
        self.map_err(|e| ApiError::from_service(e, rule))
    }
}
