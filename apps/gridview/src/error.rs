use grid_sync::CellIdError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected status: {status} body={body}")]
    UnexpectedStatus {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("malformed response from {url}: {reason}")]
    Malformed { url: String, reason: String },
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
    #[error("invalid cell id: {0}")]
    CellId(#[from] CellIdError),
    #[error("stream setup failed: {0}")]
    Stream(String),
    #[error("no peer routes available")]
    NoRoutes,
}

pub type ClientResult<T> = Result<T, ClientError>;
