use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

/// Failures of the blog operations. The `Display` text of the recoverable
/// variants doubles as the flash notice shown to the visitor.
#[derive(Error, Debug)]
pub enum BlogError {
    #[error("Email already exists! Please login instead.")]
    DuplicateEmail,

    #[error("This email doesn't exist in our database!")]
    UnknownEmail,

    #[error("Incorrect password, try again!")]
    BadPassword,

    #[error("Forbidden")]
    Forbidden,

    #[error("A post with that title already exists.")]
    DuplicateTitle,

    #[error("Not found")]
    NotFound,

    #[error("You need to be logged in to make a comment!")]
    Unauthenticated,

    #[error("{0}")]
    Invalid(String),

    #[error("Internal error")]
    Internal(#[from] anyhow::Error),
}

impl BlogError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::DuplicateEmail | Self::DuplicateTitle => StatusCode::CONFLICT,
            Self::UnknownEmail | Self::BadPassword | Self::Unauthenticated => {
                StatusCode::UNAUTHORIZED
            }
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Invalid(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for BlogError {
    fn into_response(self) -> Response {
        if let Self::Internal(ref e) = self {
            error!("Internal error: {:#}", e);
            return (self.status(), "Something went wrong").into_response();
        }

        (self.status(), self.to_string()).into_response()
    }
}
