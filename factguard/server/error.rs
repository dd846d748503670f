use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use factguard_pipeline::FactCheckError;
use thiserror::Error;

/// Error surfaced by an HTTP handler.
#[derive(Debug, Error)]
pub enum AppError {
    /// The request body or its fields were invalid.
    #[error("{0}")]
    BadRequest(String),
    /// No valid bearer token was presented.
    #[error("authentication required")]
    Unauthorized,
    /// Anything else; details stay in the logs.
    #[error(transparent)]
    Internal(anyhow::Error),
}

impl AppError {
    const fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    const fn code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "bad_request",
            Self::Unauthorized => "unauthorized",
            Self::Internal(_) => "internal_error",
        }
    }
}

impl From<FactCheckError> for AppError {
    fn from(err: FactCheckError) -> Self {
        match err {
            FactCheckError::Input(input) => Self::BadRequest(input.to_string()),
            other => Self::Internal(other.into()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let message = match &self {
            Self::Internal(err) => {
                tracing::error!(target: "factguard.http", error = %err, "request failed");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };
        (
            self.status(),
            Json(serde_json::json!({ "error": self.code(), "message": message })),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use factguard_pipeline::{CollaboratorError, InputError};

    #[test]
    fn pipeline_errors_map_to_status() {
        let input: AppError = FactCheckError::from(InputError::MissingContent).into();
        assert_eq!(input.status(), StatusCode::BAD_REQUEST);
        assert_eq!(input.to_string(), "content is required");

        let upstream: AppError = FactCheckError::from(CollaboratorError::Status {
            service: "inference",
            status: 502,
        })
        .into();
        assert_eq!(upstream.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(upstream.code(), "internal_error");
        assert_eq!(AppError::Unauthorized.status(), StatusCode::UNAUTHORIZED);
    }
}
