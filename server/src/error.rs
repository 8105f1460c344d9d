use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
};

const NOT_FOUND_PAGE: &str = include_str!("../templates/not_found.html");
const SERVER_ERROR_PAGE: &str = include_str!("../templates/server_error.html");

#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("not found")]
    NotFound,

    /// The request carried no valid admin session. Answered with a
    /// redirect to the login form, never with details about what exactly
    /// was missing or wrong.
    #[error("authentication required")]
    Unauthorized,

    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("connection pool error: {0}")]
    Pool(#[from] diesel_async::pooled_connection::deadpool::PoolError),

    #[error("template error: {0}")]
    Template(String),

    #[error("{0}")]
    Unhandled(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::NotFound => {
                (StatusCode::NOT_FOUND, Html(NOT_FOUND_PAGE)).into_response()
            }
            AppError::Unauthorized => Redirect::to("/admin/login").into_response(),
            AppError::Database(_) | AppError::Pool(_) | AppError::Template(_) => {
                tracing::error!("{self}");
                (StatusCode::INTERNAL_SERVER_ERROR, Html(SERVER_ERROR_PAGE)).into_response()
            }
            AppError::Unhandled(e) => {
                tracing::error!("unhandled error: {e}");
                (StatusCode::INTERNAL_SERVER_ERROR, Html(SERVER_ERROR_PAGE)).into_response()
            }
        }
    }
}

impl From<&'static str> for AppError {
    fn from(e: &'static str) -> Self {
        AppError::Unhandled(e.into())
    }
}

impl From<String> for AppError {
    fn from(e: String) -> Self {
        AppError::Unhandled(e)
    }
}
