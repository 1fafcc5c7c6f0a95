use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;

use super::render;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("页面不存在")]
    NotFound,

    #[error("{0}")]
    BadRequest(String),

    #[error("LLM 服务暂时不可用：{0}")]
    Upstream(String),

    #[error("服务器内部错误")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Upstream(_) => StatusCode::BAD_GATEWAY,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if let AppError::Internal(ref e) = self {
            tracing::error!(error = %format!("{e:#}"), "request failed");
        }
        (status, Html(render::error_page(status, &self.to_string()))).into_response()
    }
}
