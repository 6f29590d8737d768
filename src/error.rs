use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Application-level errors
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Could not generate a movie suggestion after {attempts} attempts")]
    GenerationExhausted {
        attempts: u32,
        last_error: Option<String>,
    },
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::GenerationExhausted { ref last_error, .. } => {
                tracing::error!(last_error = ?last_error, "Suggestion generation exhausted");
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string())
            }
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        let cases = [
            (AppError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (AppError::InvalidInput("x".into()), StatusCode::BAD_REQUEST),
            (
                AppError::GenerationExhausted {
                    attempts: 3,
                    last_error: None,
                },
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (error, expected) in cases {
            assert_eq!(error.into_response().status(), expected);
        }
    }

    #[test]
    fn test_exhausted_message_counts_attempts() {
        let error = AppError::GenerationExhausted {
            attempts: 30,
            last_error: Some("timeout".into()),
        };
        assert_eq!(
            error.to_string(),
            "Could not generate a movie suggestion after 30 attempts"
        );
    }
}
