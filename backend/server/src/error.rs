use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use menu::ValidationError;
use thiserror::Error;
use tracing::{error, warn};

use crate::{auth::AuthError, config::ConfigError, database::StoreError, upload::UploadError};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Malformed payload")]
    MalformedPayload,

    #[error("Please choose an image")]
    MissingImage,

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Upload(#[from] UploadError),

    #[error(transparent)]
    Auth(#[from] AuthError),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::MalformedPayload | AppError::MissingImage | AppError::Validation(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::Store(StoreError::NotFound { .. }) => StatusCode::NOT_FOUND,
            AppError::Store(_) => StatusCode::BAD_GATEWAY,
            AppError::Upload(e) if e.is_rejected_locally() => StatusCode::BAD_REQUEST,
            AppError::Upload(_) => StatusCode::BAD_GATEWAY,
            AppError::Auth(AuthError::InvalidCredentials | AuthError::MissingSession) => {
                StatusCode::UNAUTHORIZED
            }
            AppError::Auth(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            error!("Request failed: {self:?}");
        } else {
            warn!("Request rejected: {self}");
        }

        (status, self.to_string()).into_response()
    }
}

/// Start-up failures, surfaced by the binary.
#[derive(Error, Debug)]
pub enum ServerError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to bind server: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to build http client: {0}")]
    Client(#[from] reqwest::Error),
}
