//! Custom error types for the diary service

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

/// Failures that escape a handler
///
/// Provider failures never end up here; each handler turns them into a
/// page with a notice.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Template rendering failed: {0}")]
    Render(#[from] handlebars::RenderError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        error!("{}", self);

        let (status, message) = match self {
            AppError::Render(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error"),
        };

        (status, message).into_response()
    }
}

/// Type alias for handler results
pub type AppResult<T> = Result<T, AppError>;
