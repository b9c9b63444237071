use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use domain::errors::{ExportError, NotFoundError, StoreError, ValidationError};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    /// Validation failure tied to specific request fields.
    #[error("Validation error: {}", summarize(.0))]
    InvalidFields(Vec<ValidationDetail>),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Vec<ValidationDetail>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ValidationDetail {
    pub field: String,
    pub message: String,
}

fn summarize(details: &[ValidationDetail]) -> String {
    match details {
        [single] => single.message.clone(),
        _ => format!("{} validation errors", details.len()),
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message, details) = match self {
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg, None),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg, None),
            ApiError::Validation(msg) => (StatusCode::BAD_REQUEST, "validation_error", msg, None),
            ApiError::InvalidFields(details) => (
                StatusCode::BAD_REQUEST,
                "validation_error",
                summarize(&details),
                Some(details),
            ),
            ApiError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".into(),
                    None,
                )
            }
            ApiError::ServiceUnavailable(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "service_unavailable",
                msg,
                None,
            ),
        };

        let body = ErrorBody {
            error: error_code.into(),
            message,
            details,
        };

        (status, Json(body)).into_response()
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        match err {
            ValidationError::InvalidField { field, message } => {
                ApiError::InvalidFields(vec![ValidationDetail { field, message }])
            }
            other => ApiError::Validation(other.to_string()),
        }
    }
}

impl From<NotFoundError> for ApiError {
    fn from(err: NotFoundError) -> Self {
        ApiError::NotFound(err.to_string())
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<ExportError> for ApiError {
    fn from(err: ExportError) -> Self {
        match err {
            ExportError::Validation(e) => e.into(),
            ExportError::NotFound(e) => e.into(),
            ExportError::Store(e) => e.into(),
            ExportError::Destination(e) => ApiError::Internal(e.to_string()),
            ExportError::QueueFull => ApiError::ServiceUnavailable(
                "Export queue is full. Please try again later.".into(),
            ),
            ExportError::QueueClosed => {
                ApiError::ServiceUnavailable("Export service is shutting down".into())
            }
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut details: Vec<ValidationDetail> = errors
            .field_errors()
            .iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |e| ValidationDetail {
                    field: field.to_string(),
                    message: e
                        .message
                        .clone()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| e.code.to_string()),
                })
            })
            .collect();
        details.sort_by(|a, b| a.field.cmp(&b.field));

        ApiError::InvalidFields(details)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use domain::errors::DestinationError;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_api_error_unauthorized() {
        let response = ApiError::Unauthorized("test message".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_api_error_not_found() {
        let response = ApiError::NotFound("resource not found".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_api_error_validation() {
        let response = ApiError::Validation("invalid input".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_internal_error_hides_detail() {
        let response = ApiError::Internal("connection refused".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = body_json(response).await;
        assert_eq!(body["error"], "internal_error");
        assert_eq!(body["message"], "An internal error occurred");
    }

    #[tokio::test]
    async fn test_invalid_field_carries_details() {
        let err: ApiError = ValidationError::InvalidField {
            field: "cnpj".to_string(),
            message: "must have 8 digits".to_string(),
        }
        .into();
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body_json(response).await;
        assert_eq!(body["message"], "must have 8 digits");
        assert_eq!(body["details"][0]["field"], "cnpj");
    }

    #[test]
    fn test_export_error_mapping() {
        let cases = [
            (ExportError::QueueFull, StatusCode::SERVICE_UNAVAILABLE),
            (ExportError::QueueClosed, StatusCode::SERVICE_UNAVAILABLE),
            (
                ExportError::Validation(ValidationError::UnsupportedDestination("fax".into())),
                StatusCode::BAD_REQUEST,
            ),
            (
                ExportError::NotFound(NotFoundError::new("Filter", "x")),
                StatusCode::NOT_FOUND,
            ),
            (
                ExportError::Store(StoreError::Unavailable("pool closed".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                ExportError::Destination(DestinationError::Cancelled),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, status) in cases {
            let api_error: ApiError = err.into();
            assert_eq!(api_error.into_response().status(), status);
        }
    }

    #[test]
    fn test_api_error_display() {
        assert_eq!(
            ApiError::Unauthorized("test".to_string()).to_string(),
            "Unauthorized: test"
        );
        assert_eq!(
            ApiError::InvalidFields(vec![ValidationDetail {
                field: "nome".to_string(),
                message: "Name is required".to_string(),
            }])
            .to_string(),
            "Validation error: Name is required"
        );
    }
}
