use axum::http::StatusCode;
use thiserror::Error;

#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub fn internal(err: impl std::error::Error) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: err.to_string(),
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::internal(err)
    }
}

impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        (self.status, self.message).into_response()
    }
}

/// Failure of a remote activity operation as seen by the client side.
///
/// The coordinator handles every variant the same way: rollback and notify.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("server rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("{0}")]
    Backend(String),
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        if err.status.is_server_error() {
            Self::Backend(err.message)
        } else {
            Self::Rejected {
                status: err.status.as_u16(),
                message: err.message,
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read calendar config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse calendar config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid calendar config: {0}")]
    Invalid(String),
}
