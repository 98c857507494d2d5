//! Error types.
//!
//! [`FetchError`] lives on the refresh path and never reaches a client: the
//! scheduler logs it and keeps the previous cache contents.  [`AppError`] is
//! the only thing a request can see.

use std::time::Duration;

use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use serde::Serialize;

/// Why a source could not produce a fresh batch.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// Transport failure or non-2xx response.
    #[error("upstream request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The whole refresh ran past its deadline.
    #[error("refresh timed out after {0:?}")]
    Timeout(Duration),

    /// The upstream answered, but with something we cannot parse.
    #[error("upstream returned malformed data: {0}")]
    Malformed(String),

    #[error("comments query failed: {0}")]
    Database(#[from] sqlx::Error),

    /// Every upstream call of a multi-call source failed.
    #[error("every upstream request for {0} failed")]
    Exhausted(String),
}

/// Coarse classification used for logging and for the podcast endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    Transient,
    Malformed,
}

impl FetchError {
    pub fn kind(&self) -> FailureKind {
        match self {
            FetchError::Malformed(_) => FailureKind::Malformed,
            FetchError::Http(e) if e.is_decode() => FailureKind::Malformed,
            _ => FailureKind::Transient,
        }
    }
}

/// Errors returned by HTTP handlers.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Bad gateway: {0}")]
    BadGateway(String),
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::BadGateway(_) => StatusCode::BAD_GATEWAY,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();

        HttpResponse::build(status).json(serde_json::json!({
            "error": self.to_string(),
            "status": status.as_u16(),
        }))
    }
}
