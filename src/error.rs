use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

use crate::auth::services::AuthFlowError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Forbidden(String),

    #[error(transparent)]
    Auth(#[from] AuthFlowError),

    #[error("template error: {0}")]
    Template(#[from] askama::Error),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn category_not_found(name: &str) -> Self {
        Self::NotFound(format!("Category {} not found", name))
    }

    pub fn item_not_found(title: &str) -> Self {
        Self::NotFound(format!("Item {} not found", title))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg).into_response(),
            AppError::Forbidden(msg) => (
                StatusCode::FORBIDDEN,
                Html(format!(
                    "<script>function notify() {{alert('{}');}}</script><body onload='notify()'></body>",
                    msg.replace('\'', "\\'")
                )),
            )
                .into_response(),
            AppError::Auth(e) => e.into_response(),
            AppError::Template(e) => {
                error!(error = %e, "template render failure");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
            }
            AppError::Internal(e) => {
                error!(error = %e, "internal failure");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
            }
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
