use thiserror::Error;

#[derive(Error, Debug)]
pub enum MarketError {
    #[error("Request timeout: {0}")]
    Timeout(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl From<reqwest::Error> for MarketError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            MarketError::Timeout(err.to_string())
        } else if err.is_connect() {
            MarketError::Connection(err.to_string())
        } else {
            MarketError::Http(err.to_string())
        }
    }
}

impl From<serde_json::Error> for MarketError {
    fn from(err: serde_json::Error) -> Self {
        MarketError::MalformedPayload(format!("JSON parsing error: {}", err))
    }
}

pub type MarketResult<T> = Result<T, MarketError>;
