use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Fetch error: {0}")]
    Fetch(String),

    #[error("Fetch timed out after {0:?}")]
    Timeout(Duration),

    #[error("Fetch cancelled")]
    Cancelled,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid selector: {0}")]
    Selector(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// True for every failure that aborts a scrape before extraction starts.
    pub fn is_fetch(&self) -> bool {
        matches!(
            self,
            Error::Fetch(_) | Error::Timeout(_) | Error::Cancelled | Error::Http(_) | Error::InvalidUrl(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_family() {
        assert!(Error::Fetch("status 503".to_string()).is_fetch());
        assert!(Error::Timeout(Duration::from_secs(3)).is_fetch());
        assert!(Error::Cancelled.is_fetch());
        assert!(!Error::NotFound("article 7".to_string()).is_fetch());
        assert!(!Error::Storage("disk full".to_string()).is_fetch());
    }

    #[test]
    fn test_display() {
        let err = Error::NotFound("article 42".to_string());
        assert_eq!(err.to_string(), "Not found: article 42");

        let err = Error::Timeout(Duration::from_secs(30));
        assert!(err.to_string().contains("30s"));
    }
}
