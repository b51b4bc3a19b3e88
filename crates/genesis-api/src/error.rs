use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use genesis_graph::{AccessError, EngineError, ErrorCategory};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Conversation not found")]
    NotFound,

    #[error("Access denied")]
    Forbidden,

    #[error("Missing or invalid x-user-id header")]
    Unauthorized,

    #[error("Engine error: {0}")]
    Engine(EngineError),
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Access(AccessError::NotFound) => Self::NotFound,
            EngineError::Access(AccessError::Forbidden) => Self::Forbidden,
            other => Self::Engine(other),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound => (StatusCode::NOT_FOUND, self.to_string()),
            ApiError::Forbidden => (StatusCode::FORBIDDEN, self.to_string()),
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, self.to_string()),
            ApiError::Engine(EngineError::Busy) => {
                (StatusCode::TOO_MANY_REQUESTS, EngineError::Busy.public_message())
            }
            ApiError::Engine(ref e) => match e.category() {
                ErrorCategory::Validation => (StatusCode::BAD_REQUEST, e.public_message()),
                ErrorCategory::Authorization => (StatusCode::FORBIDDEN, e.public_message()),
                ErrorCategory::Capability => {
                    tracing::error!("Capability error: {}", e);
                    (StatusCode::BAD_GATEWAY, e.public_message())
                }
                ErrorCategory::Persistence => {
                    tracing::error!("Persistence error: {}", e);
                    (StatusCode::SERVICE_UNAVAILABLE, e.public_message())
                }
            },
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use genesis_persist::PersistError;

    #[test]
    fn test_access_errors_map_to_generic_statuses() {
        let not_found: ApiError = EngineError::Access(AccessError::NotFound).into();
        assert_eq!(not_found.into_response().status(), StatusCode::NOT_FOUND);

        let forbidden: ApiError = EngineError::Access(AccessError::Forbidden).into();
        assert_eq!(forbidden.into_response().status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_engine_error_statuses() {
        let busy = ApiError::from(EngineError::Busy).into_response();
        assert_eq!(busy.status(), StatusCode::TOO_MANY_REQUESTS);

        let invalid = ApiError::from(EngineError::Validation("Title cannot be empty".to_string()));
        assert_eq!(invalid.into_response().status(), StatusCode::BAD_REQUEST);

        let down = ApiError::from(EngineError::Persistence(PersistError::Unavailable(
            "pool exhausted".to_string(),
        )));
        assert_eq!(down.into_response().status(), StatusCode::SERVICE_UNAVAILABLE);

        let lookup = ApiError::from(EngineError::Access(AccessError::Persistence(
            PersistError::Unavailable("timeout".to_string()),
        )));
        assert_eq!(lookup.into_response().status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
