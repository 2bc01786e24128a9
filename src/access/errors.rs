use axum::response::{IntoResponse, Response};
use thiserror::Error;
use uuid::Uuid;

use crate::responses::JsonResponse;

#[derive(Debug, Error)]
pub enum AccessError {
    #[error("{0}")]
    Forbidden(String),
    #[error("membership {membership_id} does not belong to user {user_id}")]
    InvalidMembership { membership_id: Uuid, user_id: Uuid },
    #[error("user {user_id} has {flagged} primary organization memberships")]
    InconsistentPrimaryState { user_id: Uuid, flagged: usize },
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl AccessError {
    pub fn forbidden(msg: impl Into<String>) -> Self {
        AccessError::Forbidden(msg.into())
    }

    pub fn code(&self) -> &'static str {
        match self {
            AccessError::Forbidden(_) => "FORBIDDEN",
            AccessError::InvalidMembership { .. } => "INVALID_MEMBERSHIP",
            AccessError::InconsistentPrimaryState { .. } => "INCONSISTENT_PRIMARY_STATE",
            AccessError::NotFound(_) => "NOT_FOUND",
            AccessError::Database(_) => "DATABASE_ERROR",
        }
    }
}

impl IntoResponse for AccessError {
    fn into_response(self) -> Response {
        match &self {
            AccessError::Forbidden(msg) => {
                JsonResponse::forbidden_with_code(msg, self.code()).into_response()
            }
            AccessError::InvalidMembership { .. } => JsonResponse::not_found_with_code(
                "Membership not found for this user",
                self.code(),
            )
            .into_response(),
            AccessError::NotFound(what) => {
                JsonResponse::not_found(&format!("{what} not found")).into_response()
            }
            AccessError::InconsistentPrimaryState { .. } | AccessError::Database(_) => {
                tracing::error!(error = %self, "request failed");
                JsonResponse::server_error("Something went wrong").into_response()
            }
        }
    }
}
