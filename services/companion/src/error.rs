//! services/companion/src/error.rs
//!
//! Defines the primary error type for the companion service and its mapping to
//! HTTP responses.

use crate::config::ConfigError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use study_companion_core::chat::ChatError;
use study_companion_core::desk::DeskError;
use study_companion_core::onboarding::OnboardingError;
use study_companion_core::{CompanionError, PortError};
use tracing::error;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Companion(#[from] CompanionError),

    #[error("Database Error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration Error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}

fn port_status(e: &PortError) -> StatusCode {
    match e {
        PortError::NotFound(_) => StatusCode::NOT_FOUND,
        PortError::MissingCredential => StatusCode::SERVICE_UNAVAILABLE,
        PortError::Corrupted(_) | PortError::Unexpected(_) => StatusCode::BAD_GATEWAY,
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Companion(e) => match e {
                CompanionError::ProfileRequired => StatusCode::FORBIDDEN,
                CompanionError::UnknownBook(_) | CompanionError::UnknownChapter(_) => StatusCode::NOT_FOUND,
                CompanionError::EmptyScript => StatusCode::BAD_GATEWAY,
                CompanionError::Onboarding(OnboardingError::Port(p)) => port_status(p),
                CompanionError::Onboarding(OnboardingError::AlreadyFinished) => StatusCode::CONFLICT,
                CompanionError::Onboarding(_) => StatusCode::BAD_REQUEST,
                CompanionError::Chat(ChatError::UnknownSession(_)) => StatusCode::NOT_FOUND,
                CompanionError::Chat(ChatError::ReplyPending(_)) => StatusCode::CONFLICT,
                CompanionError::Chat(ChatError::EmptyMessage) => StatusCode::BAD_REQUEST,
                CompanionError::Desk(DeskError::UnknownBook(_)) => StatusCode::NOT_FOUND,
                CompanionError::Desk(_) => StatusCode::BAD_REQUEST,
                CompanionError::Port(p) => port_status(p),
            },
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed: {}", self);
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_and_credential_errors_map_to_client_statuses() {
        let pending: ApiError = CompanionError::Chat(ChatError::ReplyPending("case_1".into())).into();
        assert_eq!(pending.status(), StatusCode::CONFLICT);

        let blank: ApiError = CompanionError::Onboarding(OnboardingError::EmptyName).into();
        assert_eq!(blank.status(), StatusCode::BAD_REQUEST);

        let no_key: ApiError = CompanionError::Port(PortError::MissingCredential).into();
        assert_eq!(no_key.status(), StatusCode::SERVICE_UNAVAILABLE);

        let gated: ApiError = CompanionError::ProfileRequired.into();
        assert_eq!(gated.status(), StatusCode::FORBIDDEN);
    }
}
