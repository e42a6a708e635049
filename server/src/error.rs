use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use std::fmt;

use docdesk::error::{DocdeskError, JobError, RejectReason, ValidationError};
use docdesk::UnknownTool;

pub type ApiResult<T> = Result<T, ApiError>;

/// Error body shared by every endpoint: `{error, details?}`.
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    details: Vec<String>,
}

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    pub details: Vec<String>,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            details: Vec::new(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn with_details(mut self, details: Vec<String>) -> Self {
        self.details = details;
        self
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(status = self.status.as_u16(), "{}", self.message);
        } else {
            tracing::debug!(status = self.status.as_u16(), "{}", self.message);
        }

        let body = Json(ErrorBody {
            error: self.message,
            details: self.details,
        });
        (self.status, body).into_response()
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        let status = match &err {
            ValidationError::Rejected { rejections } => {
                let reasons = || rejections.iter().map(|r| &r.reason);
                if reasons().all(|r| matches!(r, RejectReason::TooLarge { .. })) {
                    StatusCode::PAYLOAD_TOO_LARGE
                } else if reasons().all(|r| {
                    matches!(
                        r,
                        RejectReason::ExtensionNotAllowed { .. } | RejectReason::MimeNotAllowed { .. }
                    )
                }) {
                    StatusCode::UNSUPPORTED_MEDIA_TYPE
                } else {
                    StatusCode::BAD_REQUEST
                }
            }
            ValidationError::NoFiles | ValidationError::TooManyFiles { .. } => {
                StatusCode::BAD_REQUEST
            }
        };

        let details = err.details();
        Self::new(status, err.to_string()).with_details(details)
    }
}

impl From<DocdeskError> for ApiError {
    fn from(err: DocdeskError) -> Self {
        match err {
            DocdeskError::Validation(e) => e.into(),
            DocdeskError::Job(e @ JobError::NotFound(_)) => Self::not_found(e.to_string()),
            DocdeskError::Job(e @ JobError::NotReady { .. }) => {
                Self::new(StatusCode::CONFLICT, e.to_string())
            }
            other => Self::internal(other.to_string()),
        }
    }
}

impl From<UnknownTool> for ApiError {
    fn from(err: UnknownTool) -> Self {
        Self::not_found(err.to_string())
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        Self::new(err.status(), err.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docdesk::error::FileRejection;

    fn rejected(reasons: Vec<RejectReason>) -> ValidationError {
        ValidationError::Rejected {
            rejections: reasons
                .into_iter()
                .enumerate()
                .map(|(i, reason)| FileRejection {
                    filename: format!("f{}.pdf", i),
                    reason,
                })
                .collect(),
        }
    }

    #[test]
    fn test_size_only_rejections_are_413() {
        let err: ApiError = rejected(vec![RejectReason::TooLarge { size: 10, max: 5 }]).into();
        assert_eq!(err.status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(err.details.len(), 1);
    }

    #[test]
    fn test_type_only_rejections_are_415() {
        let err: ApiError = rejected(vec![
            RejectReason::ExtensionNotAllowed {
                extension: "exe".to_string(),
            },
            RejectReason::MimeNotAllowed {
                mime: "text/html".to_string(),
            },
        ])
        .into();
        assert_eq!(err.status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
    }

    #[test]
    fn test_mixed_rejections_are_400() {
        let err: ApiError = rejected(vec![
            RejectReason::TooLarge { size: 10, max: 5 },
            RejectReason::Empty,
        ])
        .into();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_job_errors_map_to_404_and_409() {
        let not_found: ApiError = DocdeskError::from(JobError::NotFound("x".to_string())).into();
        assert_eq!(not_found.status, StatusCode::NOT_FOUND);

        let not_ready: ApiError = DocdeskError::from(JobError::NotReady {
            job_id: "x".to_string(),
            state: "running",
        })
        .into();
        assert_eq!(not_ready.status, StatusCode::CONFLICT);
    }

    #[test]
    fn test_unknown_tool_is_404() {
        let err: ApiError = UnknownTool("nope".to_string()).into();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }
}
