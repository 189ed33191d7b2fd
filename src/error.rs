use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// Request-level failure taxonomy. Everything a handler can return maps
/// onto one of these; storage errors are classified by the `From` impls
/// below so repo code can use plain `?`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Missing required fields")]
    Validation(Vec<&'static str>),

    #[error("{0}")]
    BadRequest(&'static str),

    /// `field` is "email" or "username".
    #[error("duplicate {0}")]
    DuplicateIdentity(&'static str),

    #[error("{0}")]
    Unauthorized(&'static str),

    #[error("Database not ready. Please try again later.")]
    StoreUnavailable,

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    success: bool,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    missing_fields: Option<Vec<&'static str>>,
}

impl ErrorBody {
    fn new(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            missing_fields: None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::Validation(fields) => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    missing_fields: Some(fields),
                    ..ErrorBody::new("Missing required fields")
                },
            ),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, ErrorBody::new(msg)),
            ApiError::DuplicateIdentity(field) => {
                let msg = match field {
                    "email" => "Email already registered",
                    "username" => "Username already exists",
                    _ => "Duplicate identity field",
                };
                (StatusCode::CONFLICT, ErrorBody::new(msg))
            }
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, ErrorBody::new(msg)),
            ApiError::StoreUnavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                ErrorBody::new("Database not ready. Please try again later."),
            ),
            ApiError::Internal(e) => {
                // Details stay in the log, the client gets a generic message
                error!(error = %e, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorBody::new("Internal server error"),
                )
            }
        };
        (status, Json(body)).into_response()
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                let constraint = db.constraint().unwrap_or_default();
                if constraint.contains("email") {
                    ApiError::DuplicateIdentity("email")
                } else if constraint.contains("username") {
                    ApiError::DuplicateIdentity("username")
                } else {
                    ApiError::Internal(sqlx::Error::Database(db).into())
                }
            }
            sqlx::Error::PoolClosed | sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => {
                ApiError::StoreUnavailable
            }
            other => ApiError::Internal(other.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn statuses_match_taxonomy() {
        let cases = [
            (ApiError::Validation(vec!["email"]), StatusCode::BAD_REQUEST),
            (
                ApiError::BadRequest("Passwords do not match"),
                StatusCode::BAD_REQUEST,
            ),
            (ApiError::DuplicateIdentity("email"), StatusCode::CONFLICT),
            (
                ApiError::DuplicateIdentity("username"),
                StatusCode::CONFLICT,
            ),
            (
                ApiError::Unauthorized("Invalid username or password"),
                StatusCode::UNAUTHORIZED,
            ),
            (ApiError::StoreUnavailable, StatusCode::SERVICE_UNAVAILABLE),
            (
                ApiError::Internal(anyhow::anyhow!("boom")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }

    #[tokio::test]
    async fn validation_body_lists_missing_fields() {
        let response = ApiError::Validation(vec!["email", "username"]).into_response();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["success"], false);
        assert_eq!(body["missingFields"][0], "email");
        assert_eq!(body["missingFields"][1], "username");
    }

    #[tokio::test]
    async fn internal_error_hides_details() {
        let response = ApiError::Internal(anyhow::anyhow!("secret detail")).into_response();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["message"], "Internal server error");
    }

    #[test]
    fn pool_errors_map_to_store_unavailable() {
        assert!(matches!(
            ApiError::from(sqlx::Error::PoolClosed),
            ApiError::StoreUnavailable
        ));
        assert!(matches!(
            ApiError::from(sqlx::Error::PoolTimedOut),
            ApiError::StoreUnavailable
        ));
    }
}
