use std::io;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Failed to marshall json data {0}")]
    Json(#[from] serde_json::Error),

    #[error("Storage error {0}")]
    Storage(#[from] fjall::Error),

    #[error("Catalog request failed {0}")]
    Http(#[from] reqwest::Error),

    #[error("Catalog responded with {0}")]
    Upstream(reqwest::StatusCode),

    #[error("IO error {0}")]
    IoError(#[from] io::Error),

    #[error("Invalid header value {0}")]
    HeaderValue(#[from] axum::http::header::InvalidHeaderValue),

    #[error("{0}")]
    Validation(String),

    #[error("No such {0}")]
    NotFound(String),

    #[error("Book catalog unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("Generic error {0}")]
    Generic(String),
}

impl Error {
    pub fn validation(message: &str) -> Self {
        Self::Validation(message.to_owned())
    }
}

pub type Result<A> = std::result::Result<A, Error>;
