//! HTTP error type.
//!
//! Client errors are returned verbatim. Server-side failures (500/502) are
//! logged with their cause and answered with a generic body.

use axum::{
    extract::{multipart::MultipartRejection, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::error;

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Unauthorized(String),
    NotFound(String),
    Conflict(String),
    PayloadTooLarge(String),
    UnsupportedMediaType(String),
    /// The generative model failed or answered with something unusable.
    BadGateway(String),
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

impl ApiError {
    pub fn unauthorized() -> Self {
        ApiError::Unauthorized("Unauthorized".to_string())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ApiError::BadGateway(_) => StatusCode::BAD_GATEWAY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<pocket_core::Error> for ApiError {
    fn from(err: pocket_core::Error) -> Self {
        use pocket_core::Error;
        match err {
            Error::NotFound(msg) => ApiError::NotFound(msg),
            Error::Conflict(msg) => ApiError::Conflict(msg),
            Error::InvalidInput(msg) => ApiError::BadRequest(msg),
            Error::UnsupportedMediaType(msg) => ApiError::UnsupportedMediaType(msg),
            Error::PayloadTooLarge(msg) => ApiError::PayloadTooLarge(msg),
            Error::Unauthorized(msg) => ApiError::Unauthorized(msg),
            Error::Inference(msg) => ApiError::BadGateway(msg),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(format!("Invalid request: {}", rejection.body_text()))
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(rejection: MultipartRejection) -> Self {
        ApiError::BadRequest(format!("Invalid form: {}", rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            ApiError::BadGateway(cause) => {
                error!(status = status.as_u16(), error = %cause, "Upstream model failure");
                ErrorBody {
                    error: "Failed to categorize content".to_string(),
                    message: Some("The AI model did not return a usable answer".to_string()),
                }
            }
            ApiError::Internal(cause) => {
                error!(status = status.as_u16(), error = %cause, "Request failed");
                ErrorBody {
                    error: "Internal server error".to_string(),
                    message: None,
                }
            }
            ApiError::BadRequest(msg)
            | ApiError::Unauthorized(msg)
            | ApiError::NotFound(msg)
            | ApiError::Conflict(msg)
            | ApiError::PayloadTooLarge(msg)
            | ApiError::UnsupportedMediaType(msg) => ErrorBody {
                error: msg,
                message: None,
            },
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pocket_core::Error;

    #[test]
    fn test_core_error_mapping() {
        let cases = [
            (Error::NotFound("x".into()), StatusCode::NOT_FOUND),
            (Error::Conflict("x".into()), StatusCode::CONFLICT),
            (Error::InvalidInput("x".into()), StatusCode::BAD_REQUEST),
            (
                Error::UnsupportedMediaType("x".into()),
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ),
            (Error::PayloadTooLarge("x".into()), StatusCode::PAYLOAD_TOO_LARGE),
            (Error::Inference("x".into()), StatusCode::BAD_GATEWAY),
            (Error::Storage("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (Error::Internal("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
    }

    #[tokio::test]
    async fn test_multipart_without_boundary_is_bad_request() {
        use axum::body::Body;
        use axum::extract::{FromRequest, Multipart, Request};

        let request = Request::builder()
            .header("content-type", "multipart/form-data")
            .body(Body::empty())
            .unwrap();
        let rejection = Multipart::from_request(request, &()).await.err().unwrap();

        let err = ApiError::from(rejection);
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        match err {
            ApiError::BadRequest(msg) => assert!(msg.starts_with("Invalid form"), "{}", msg),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_client_error_keeps_message() {
        let response = ApiError::Conflict("Email ID already exists".into()).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }
}
