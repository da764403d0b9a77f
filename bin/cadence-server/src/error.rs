//! Unified server error type.
//!
//! Every handler returns `Result<T, ServerError>`, which implements
//! [`axum::response::IntoResponse`] so errors are automatically converted
//! to a JSON-body HTTP response with an appropriate status code.
//!
//! **Security note:** internal failures are logged with full detail but only
//! a generic message is returned, so file paths and engine output never
//! reach clients.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use cadence_core::RuntimeError;
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// All errors that can occur in the cadence-server request lifecycle.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Propagated from the job runtime.
    #[error("runtime error: {0}")]
    Runtime(#[from] RuntimeError),

    /// The request body could not be parsed.
    #[error("invalid request body: {0}")]
    InvalidBody(String),
}

impl ServerError {
    fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            ServerError::InvalidBody(m) => (StatusCode::UNPROCESSABLE_ENTITY, m.clone()),
            ServerError::Runtime(e) => match e {
                RuntimeError::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, e.to_string()),
                RuntimeError::NotFound { .. } => (StatusCode::NOT_FOUND, e.to_string()),
                RuntimeError::InvalidState { .. } => (StatusCode::CONFLICT, e.to_string()),
                RuntimeError::InferenceFailure(_)
                | RuntimeError::PersistenceFailure(_)
                | RuntimeError::IdExhausted { .. }
                | RuntimeError::Shutdown => {
                    error!(error = %e, "job runtime error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "internal server error".to_owned(),
                    )
                }
            },
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, client_message) = self.status_and_message();
        (status, Json(json!({ "error": client_message }))).into_response()
    }
}

#[cfg(test)]
mod test {
    use cadence_core::{JobId, JobStatus};

    use super::*;

    fn status_of(err: impl Into<ServerError>) -> StatusCode {
        err.into().into_response().status()
    }

    #[test]
    fn runtime_errors_map_to_http_statuses() {
        let id = JobId::from("gen_0123456789ab");
        assert_eq!(
            status_of(RuntimeError::Validation("duration".into())),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status_of(RuntimeError::NotFound { job_id: id.clone() }),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(RuntimeError::InvalidState {
                job_id: id,
                status: JobStatus::Completed,
                action: "cancel",
            }),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(RuntimeError::IdExhausted { attempts: 8 }),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn internal_details_are_hidden() {
        let err = ServerError::from(RuntimeError::PersistenceFailure("/secret/path".into()));
        let (_, message) = err.status_and_message();
        assert_eq!(message, "internal server error");
    }
}
