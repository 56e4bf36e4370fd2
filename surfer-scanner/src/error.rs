use thiserror::Error;

#[derive(Error, Debug)]
pub enum SurfError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("HTTP {status} from {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Task join error: {0}")]
    JoinError(#[from] tokio::task::JoinError),

    #[error("Other error: {0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, SurfError>;
