//! Translation of failures into HTTP error responses.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::chat::ChatError;

/// HTTP error carrying a status and a human-readable `detail`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    detail: String,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    detail: &'a str,
}

impl ApiError {
    /// Create an error with an explicit status.
    #[must_use]
    pub fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }

    /// `404 Not Found` for an unknown conversation.
    #[must_use]
    pub fn conversation_not_found(conversation_id: &str) -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            format!("Conversation {conversation_id} not found."),
        )
    }

    /// Status code of the response.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Detail text of the response.
    #[must_use]
    pub fn detail(&self) -> &str {
        &self.detail
    }
}

impl From<ChatError> for ApiError {
    fn from(err: ChatError) -> Self {
        let status = match err {
            ChatError::ConversationClosed => StatusCode::BAD_REQUEST,
            ChatError::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, err.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::new(rejection.status(), rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            detail: &self.detail,
        });
        (self.status, body).into_response()
    }
}
