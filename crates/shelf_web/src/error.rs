use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use shelf_core::Error;
use tracing::error;

/// Maps domain errors onto HTTP responses; internal details are logged, not returned
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        Self(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            Error::NotFound(what) => (StatusCode::NOT_FOUND, format!("{} not found", what)),
            Error::InvalidInput(message) => (StatusCode::BAD_REQUEST, message.clone()),
            Error::InvalidUrl(message) => (StatusCode::BAD_REQUEST, format!("Invalid URL: {}", message)),
            Error::Forbidden(message) => (StatusCode::FORBIDDEN, message.clone()),
            Error::Recommendation(_) | Error::Timeout(_) => {
                error!("Recommendation request failed: {}", self.0);
                (StatusCode::INTERNAL_SERVER_ERROR, "Failed to generate recommendations".to_string())
            }
            other => {
                error!("Request failed: {}", other);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn status(error: Error) -> StatusCode {
        ApiError(error).into_response().status()
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(status(Error::NotFound("article".into())), StatusCode::NOT_FOUND);
        assert_eq!(status(Error::InvalidInput("bad".into())), StatusCode::BAD_REQUEST);
        assert_eq!(status(Error::InvalidUrl("x".into())), StatusCode::BAD_REQUEST);
        assert_eq!(status(Error::Forbidden("no".into())), StatusCode::FORBIDDEN);
        assert_eq!(status(Error::Database("down".into())), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            status(Error::Recommendation("engine failed".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
