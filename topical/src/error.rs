//! Failures that end a request with an error page instead of a redirect.

use crate::{store::StoreError, views};
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// The route matched but the path does not name anything.
    #[error("not found")]
    NotFound,

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, title, message) = match &self {
            Self::NotFound => (
                StatusCode::NOT_FOUND,
                "Not Found",
                "There is nothing at this address.",
            ),
            Self::Store(err) => {
                tracing::error!(error = %err, "storage failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Something went wrong",
                    "We could not complete that request. Please try again later.",
                )
            }
        };
        let page = views::error_page(title, message);
        (status, Html(page.into_string())).into_response()
    }
}
