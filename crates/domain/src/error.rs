//! The gateway's error taxonomy and its mapping onto the HTTP surface.
//!
//! Every variant here corresponds to exactly one row of the error table:
//! a cause, an HTTP status, and a body shape. Handlers return
//! `Result<T, GatewayError>` and let `IntoResponse` do the translation so
//! the mapping lives in one place instead of at every call site.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

#[derive(thiserror::Error, Debug)]
pub enum GatewayError {
    #[error("no configuration loaded")]
    ConfigurationMissing,

    #[error("malformed request: {0}")]
    MalformedRequest(String),

    #[error("invalid attachment: {0}")]
    InvalidAttachment(String),

    #[error("invalid conversation id: {0}")]
    InvalidConversationId(String),

    #[error("conversation not found")]
    ConversationNotFound,

    #[error("model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("no LLM models available upstream")]
    NoLlmAvailable,

    #[error("unauthenticated")]
    Unauthenticated,

    #[error("forbidden")]
    Forbidden,

    #[error("quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("upstream rate limited: model {0}")]
    UpstreamRateLimited(String),

    #[error("storage error: {0}")]
    StorageError(String),
}

/// `{response}` — bare message, used only for `ConfigurationMissing`.
#[derive(Serialize)]
struct ResponseOnly {
    response: &'static str,
}

/// `{response, cause}` — the shape used by most 4xx/5xx bodies.
#[derive(Serialize)]
struct ResponseWithCause {
    response: &'static str,
    cause: String,
}

/// `{detail}` — used for auth failures, matching the upstream's FastAPI
/// convention of a bare `detail` field on 401/403.
#[derive(Serialize)]
struct Detail {
    detail: DetailBody,
}

#[derive(Serialize)]
struct DetailBody {
    response: &'static str,
    cause: String,
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        match self {
            GatewayError::ConfigurationMissing => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ResponseOnly {
                    response: "Configuration is not loaded",
                }),
            )
                .into_response(),

            GatewayError::MalformedRequest(cause) => (
                StatusCode::BAD_REQUEST,
                Json(ResponseWithCause {
                    response: "Malformed request",
                    cause,
                }),
            )
                .into_response(),

            GatewayError::InvalidAttachment(cause) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(ResponseWithCause {
                    response: "Invalid attachment",
                    cause,
                }),
            )
                .into_response(),

            GatewayError::InvalidConversationId(cause) => (
                StatusCode::BAD_REQUEST,
                Json(ResponseWithCause {
                    response: "Invalid conversation ID",
                    cause,
                }),
            )
                .into_response(),

            GatewayError::ConversationNotFound => (
                StatusCode::NOT_FOUND,
                Json(ResponseWithCause {
                    response: "Conversation not found",
                    cause: "the requested conversation does not exist".into(),
                }),
            )
                .into_response(),

            GatewayError::ModelUnavailable(cause) => (
                StatusCode::BAD_REQUEST,
                Json(ResponseWithCause {
                    response: "Model unavailable",
                    cause,
                }),
            )
                .into_response(),

            GatewayError::NoLlmAvailable => (
                StatusCode::BAD_REQUEST,
                Json(ResponseWithCause {
                    response: "No LLM models available",
                    cause: "the upstream exposes zero LLM-typed models".into(),
                }),
            )
                .into_response(),

            GatewayError::Unauthenticated => (
                StatusCode::UNAUTHORIZED,
                Json(Detail {
                    detail: DetailBody {
                        response: "Unauthenticated",
                        cause: "missing or invalid credentials".into(),
                    },
                }),
            )
                .into_response(),

            GatewayError::Forbidden => (
                StatusCode::FORBIDDEN,
                Json(Detail {
                    detail: DetailBody {
                        response: "Forbidden",
                        cause: "the caller is not authorized for this action".into(),
                    },
                }),
            )
                .into_response(),

            GatewayError::QuotaExceeded(cause) => (
                StatusCode::TOO_MANY_REQUESTS,
                Json(ResponseWithCause {
                    response: "Quota exceeded",
                    cause,
                }),
            )
                .into_response(),

            GatewayError::UpstreamUnavailable(cause) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ResponseWithCause {
                    response: "Upstream unavailable",
                    cause,
                }),
            )
                .into_response(),

            GatewayError::UpstreamRateLimited(model) => (
                StatusCode::TOO_MANY_REQUESTS,
                Json(ResponseWithCause {
                    response: "Upstream rate limited",
                    cause: format!("model \"{model}\" is rate limited"),
                }),
            )
                .into_response(),

            GatewayError::StorageError(cause) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ResponseWithCause {
                    response: "Storage error",
                    cause,
                }),
            )
                .into_response(),
        }
    }
}

pub type Result<T> = std::result::Result<T, GatewayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversation_not_found_is_404() {
        let resp = GatewayError::ConversationNotFound.into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn quota_exceeded_is_429() {
        let resp = GatewayError::QuotaExceeded("daily_tokens".into()).into_response();
        assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[test]
    fn unauthenticated_is_401() {
        let resp = GatewayError::Unauthenticated.into_response();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn forbidden_is_403() {
        let resp = GatewayError::Forbidden.into_response();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn malformed_request_is_400() {
        let resp = GatewayError::MalformedRequest("bad json".into()).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn invalid_attachment_is_422() {
        let resp = GatewayError::InvalidAttachment("unsupported type".into()).into_response();
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn storage_error_is_500() {
        let resp = GatewayError::StorageError("connection refused".into()).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
