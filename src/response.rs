use axum::{http::StatusCode, Json};
use serde::Serialize;

/// Success envelope shared by every JSON endpoint. Failures are rendered by
/// [`crate::errors::AppError`] with `success: false`.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data,
            message: None,
        })
    }

    pub fn with_message(data: T, message: impl Into<String>) -> Json<Self> {
        Json(Self {
            success: true,
            data,
            message: Some(message.into()),
        })
    }

    pub fn created(data: T) -> (StatusCode, Json<Self>) {
        (StatusCode::CREATED, Self::success(data))
    }
}

pub type ApiResult<T> = Result<Json<ApiResponse<T>>, crate::errors::AppError>;
pub type Created<T> = Result<(StatusCode, Json<ApiResponse<T>>), crate::errors::AppError>;
