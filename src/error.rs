use axum::{
    response::{IntoResponse, Response},
    http::StatusCode,
};

use crate::api::response;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Failed to load dataset: {0}")]
    DataLoad(String),

    #[error("Index unavailable: no data loaded")]
    IndexUnavailable,

    #[error("Cache backend error: {0}")]
    CacheBackend(String),

    #[error("Webhook delivery failed: {0}")]
    DispatchDelivery(String),

    #[error("Country API error: {0}")]
    CountryApi(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("{0}")]
    Timeout(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::IndexUnavailable | AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Timeout(_) => StatusCode::REQUEST_TIMEOUT,
            AppError::CountryApi(_) | AppError::DispatchDelivery(_) => StatusCode::BAD_GATEWAY,
            AppError::DataLoad(_) | AppError::CacheBackend(_) | AppError::ConfigError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            // Same answer as an empty match; the distinction is logged.
            AppError::IndexUnavailable => "No return for the given search found".to_string(),
            other => other.to_string(),
        };
        response::error(status, message).into_response()
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::CountryApi(err.to_string())
    }
}

impl From<csv::Error> for AppError {
    fn from(err: csv::Error) -> Self {
        AppError::DataLoad(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
