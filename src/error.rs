use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::custody::CustodyError;
use crate::minting::MintError;
use crate::signer::SignerError;
use crate::types::ApiResponse;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Unauthorized")]
    Unauthorized,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Not owned: {0}")]
    NotOwned(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Bad request: {0}")]
    BadRequestWithHint(String, String),

    #[error("Signer unavailable: {0}")]
    SignerUnavailable(String),

    #[error("Minting service unavailable: {0}")]
    MintingUnavailable(String),

    #[error("Custody error: {0}")]
    Custody(#[from] CustodyError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn bad_request_with_hint(msg: impl Into<String>, hint: impl Into<String>) -> Self {
        Self::BadRequestWithHint(msg.into(), hint.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

impl From<SignerError> for ApiError {
    fn from(e: SignerError) -> Self {
        Self::SignerUnavailable(e.to_string())
    }
}

impl From<MintError> for ApiError {
    fn from(e: MintError) -> Self {
        Self::MintingUnavailable(e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message, hint) = match &self {
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "Invalid or missing session token".to_string(),
                Some("Include 'Authorization: Bearer YOUR_TOKEN' header"),
            ),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone(), None),
            ApiError::Conflict(msg) => (
                StatusCode::CONFLICT,
                msg.clone(),
                Some("The resource already exists or conflicts with existing data"),
            ),
            ApiError::NotOwned(msg) => (
                StatusCode::FORBIDDEN,
                msg.clone(),
                Some("No active claim exists for this book"),
            ),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone(), None),
            ApiError::BadRequestWithHint(msg, hint) => {
                (StatusCode::BAD_REQUEST, msg.clone(), Some(hint.as_str()))
            }
            ApiError::SignerUnavailable(msg) => (
                StatusCode::BAD_GATEWAY,
                msg.clone(),
                Some("The external signer may be inconsistent; check before retrying"),
            ),
            ApiError::MintingUnavailable(msg) => (
                StatusCode::BAD_GATEWAY,
                msg.clone(),
                Some("The minting service may be inconsistent; check before retrying"),
            ),
            ApiError::Custody(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string(), None),
            ApiError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                msg.clone(),
                Some("Please try again later or contact support"),
            ),
        };

        let body = if let Some(h) = hint {
            ApiResponse::<()>::error_with_hint(message, h)
        } else {
            ApiResponse::<()>::error(message)
        };

        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
