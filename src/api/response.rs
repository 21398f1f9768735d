use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Success,
    Error,
}

#[derive(Serialize)]
pub struct ResponseMeta {
    pub status: Outcome,
    pub status_code: u16,
    pub timestamp: DateTime<Utc>,
    pub message: Option<String>,
    /// Number of items in `data`, for list answers only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
}

/// `{ data, meta }` body shared by every endpoint. Carries its own HTTP status.
#[derive(Serialize)]
pub struct ApiResponse<T> {
    pub data: Option<T>,
    pub meta: ResponseMeta,
    #[serde(skip)]
    code: StatusCode,
}

impl<T> ApiResponse<T> {
    fn new(code: StatusCode, data: Option<T>, message: Option<String>) -> Self {
        let status = if code.is_success() { Outcome::Success } else { Outcome::Error };
        Self {
            data,
            meta: ResponseMeta {
                status,
                status_code: code.as_u16(),
                timestamp: Utc::now(),
                message,
                count: None,
            },
            code,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (self.code, Json(self)).into_response()
    }
}

pub fn success<T: Serialize>(data: T) -> ApiResponse<T> {
    ApiResponse::new(StatusCode::OK, Some(data), None)
}

pub fn created<T: Serialize>(data: T) -> ApiResponse<T> {
    ApiResponse::new(StatusCode::CREATED, Some(data), None)
}

pub fn listing<T: Serialize>(items: Vec<T>) -> ApiResponse<Vec<T>> {
    let count = items.len();
    let mut response = success(items);
    response.meta.count = Some(count);
    response
}

pub fn error(code: StatusCode, message: String) -> ApiResponse<()> {
    ApiResponse::new(code, None, Some(message))
}
