use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use inkpad_shared::{ApiFailure, SignupError};

use crate::documents::DocumentError;

/// Everything an endpoint can fail with. The message is shown to the user
/// verbatim by the client, so variants carry human-readable text.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("There is no user record corresponding to this identifier")]
    InvalidCredentials,
    #[error("The email address is already in use by another account")]
    EmailTaken,
    #[error("{0}")]
    Signup(#[from] SignupError),
    #[error("No user found for {0}")]
    RecipientNotFound(String),
    #[error("Not signed in")]
    Unauthorized,
    #[error("Federated login is not configured")]
    FederatedDisabled,
    #[error("Federated login failed: {0}")]
    Federated(String),
    #[error("Invalid request: {0}")]
    BadRequest(String),
    #[error(transparent)]
    Document(#[from] DocumentError),
    #[error("Upload failed: {0}")]
    Upload(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::EmailTaken => StatusCode::CONFLICT,
            ApiError::Signup(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::RecipientNotFound(_) => StatusCode::NOT_FOUND,
            ApiError::FederatedDisabled => StatusCode::NOT_IMPLEMENTED,
            ApiError::Federated(_) => StatusCode::BAD_GATEWAY,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Document(DocumentError::NotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Document(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Upload(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let body = Json(ApiFailure {
            error: self.to_string(),
        });
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signup_errors_are_unprocessable() {
        let error = ApiError::Signup(SignupError::PasswordMismatch);
        assert_eq!(error.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn missing_document_maps_to_not_found() {
        let error = ApiError::Document(DocumentError::NotFound("u1".into()));
        assert_eq!(error.status(), StatusCode::NOT_FOUND);
    }
}
