//! Listing-page retrieval.
//!
//! Every request is bounded by [`FetchConfig::timeout`] and can be abandoned
//! early through a [`CancellationToken`].

use std::time::Duration;

use reqwest::Client;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};
use url::Url;
use vx_core::{Error, Result};

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            user_agent: concat!("vx/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    config: FetchConfig,
}

impl Fetcher {
    pub fn new(config: FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self { client, config })
    }

    #[instrument(level = "info", skip(self, cancel))]
    pub async fn fetch(&self, url: &str, cancel: &CancellationToken) -> Result<String> {
        let url = Url::parse(url).map_err(|e| Error::InvalidUrl(format!("{}: {}", url, e)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::InvalidUrl(format!("unsupported scheme {}", url.scheme())));
        }

        let request = async {
            let response = self.client.get(url.clone()).send().await?;
            let status = response.status();
            if !status.is_success() {
                return Err(Error::Fetch(format!("{} returned {}", url, status)));
            }
            Ok::<_, Error>(response.text().await?)
        };

        let result = tokio::select! {
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            result = tokio::time::timeout(self.config.timeout, request) => match result {
                Ok(body) => body,
                Err(_) => return Err(Error::Timeout(self.config.timeout)),
            },
        };
        let body = result.map_err(|e| match e {
            Error::Http(e) if e.is_timeout() => Error::Timeout(self.config.timeout),
            other => other,
        })?;

        debug!(bytes = body.len(), "Fetched listing page");
        Ok(body)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    fn fetcher(timeout: Duration) -> Fetcher {
        Fetcher::new(FetchConfig { timeout, ..FetchConfig::default() }).unwrap()
    }

    #[test]
    fn test_fetch_config_default() {
        let config = FetchConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert!(config.user_agent.starts_with("vx/"));
    }

    #[tokio::test]
    async fn test_fetch_ok() {
        let url = test_server::serve("200 OK", "<html>hello</html>".to_string()).await;
        let body = fetcher(Duration::from_secs(5)).fetch(&url, &CancellationToken::new()).await.unwrap();
        assert_eq!(body, "<html>hello</html>");
    }

    #[tokio::test]
    async fn test_fetch_non_success_status() {
        let url = test_server::serve("503 Service Unavailable", "down".to_string()).await;
        let result = fetcher(Duration::from_secs(5)).fetch(&url, &CancellationToken::new()).await;
        assert!(matches!(result, Err(Error::Fetch(_))));
    }

    #[tokio::test]
    async fn test_fetch_invalid_url() {
        let f = fetcher(Duration::from_secs(5));
        let token = CancellationToken::new();
        assert!(matches!(f.fetch("not-a-url", &token).await, Err(Error::InvalidUrl(_))));
        assert!(matches!(f.fetch("ftp://example.com/", &token).await, Err(Error::InvalidUrl(_))));
    }

    #[tokio::test]
    async fn test_fetch_times_out_on_hung_upstream() {
        let url = test_server::hang().await;
        let result = fetcher(Duration::from_millis(200)).fetch(&url, &CancellationToken::new()).await;
        assert!(matches!(result, Err(Error::Timeout(_))));
    }

    #[tokio::test]
    async fn test_fetch_cancelled() {
        let url = test_server::hang().await;
        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            canceller.cancel();
        });
        let result = fetcher(Duration::from_secs(30)).fetch(&url, &token).await;
        assert!(matches!(result, Err(Error::Cancelled)));
    }
}
