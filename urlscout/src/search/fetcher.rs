use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use super::matcher::PatternMatcher;
use crate::errors::{FetchError, SearchError, SearchResult};
use crate::metrics::FetchMetrics;

/// Retrieves the body of a target
#[async_trait]
pub trait Fetch: Send + Sync {
    /// Returns the complete body of a successful (2xx) response
    async fn fetch(&self, target: &str) -> Result<Bytes, FetchError>;
}

/// Settings for the HTTP client
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    /// Per-request timeout covering connect, headers and body
    pub timeout: Option<Duration>,
    pub user_agent: Option<String>,
}

/// Fetches targets with a single GET request, without retries
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    timeout: Option<Duration>,
}

impl HttpFetcher {
    pub fn new(options: &FetchOptions) -> SearchResult<Self> {
        let mut builder = reqwest::Client::builder().user_agent(
            options
                .user_agent
                .clone()
                .unwrap_or_else(|| format!("urlscout/{}", env!("CARGO_PKG_VERSION"))),
        );
        if let Some(timeout) = options.timeout {
            builder = builder.timeout(timeout);
        }

        let client = builder
            .build()
            .map_err(|e| SearchError::client_error(e.to_string()))?;

        Ok(Self {
            client,
            timeout: options.timeout,
        })
    }

    fn classify(&self, err: reqwest::Error) -> FetchError {
        match self.timeout {
            Some(timeout) if err.is_timeout() => FetchError::Timeout(timeout),
            _ if err.is_body() || err.is_decode() => FetchError::read(error_chain(&err)),
            _ => FetchError::network(error_chain(&err)),
        }
    }
}

#[async_trait]
impl Fetch for HttpFetcher {
    async fn fetch(&self, target: &str) -> Result<Bytes, FetchError> {
        let response = self
            .client
            .get(target)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            // Dropping the response releases the connection without reading the body
            return Err(FetchError::UnexpectedStatus(status.as_u16()));
        }

        response.bytes().await.map_err(|e| match self.classify(e) {
            FetchError::Network(msg) => FetchError::Read(msg),
            other => other,
        })
    }
}

/// Flattens an error and its sources into one line
fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

/// Fetches one target and counts matches in its body.
///
/// Resolves to [`FetchError::Cancelled`] as soon as `cancel` fires.
pub async fn search_target<F: Fetch + ?Sized>(
    fetcher: &F,
    target: &str,
    matcher: &PatternMatcher,
    cancel: &CancellationToken,
    metrics: &FetchMetrics,
) -> Result<usize, FetchError> {
    let outcome = if cancel.is_cancelled() {
        Err(FetchError::Cancelled)
    } else {
        trace!("Fetching {}", target);
        tokio::select! {
            _ = cancel.cancelled() => Err(FetchError::Cancelled),
            body = fetcher.fetch(target) => body.map(|body| {
                let count = matcher.count_matches(&body);
                metrics.record_success(body.len() as u64, count as u64);
                count
            }),
        }
    };

    match &outcome {
        Ok(count) => debug!("{}: {} matches", target, count),
        Err(e) => {
            metrics.record_failure();
            debug!("{}: {}", target, e);
        }
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::matcher::MatchMode;
    use axum::{http::StatusCode, response::IntoResponse, routing::get, Router};
    use tokio::net::TcpListener;

    async fn start_test_server() -> String {
        let app = Router::new()
            .route("/cats", get(|| async { "cat dog cat" }))
            .route("/missing", get(|| async { StatusCode::NOT_FOUND.into_response() }))
            .route(
                "/slow",
                get(|| async {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    "cat"
                }),
            );

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        format!("http://{}", addr)
    }

    /// Address of a port that was bound once and then released
    async fn closed_port_url() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        format!("http://{}/", addr)
    }

    fn matcher() -> PatternMatcher {
        PatternMatcher::new("cat", MatchMode::Literal).unwrap()
    }

    #[tokio::test]
    async fn test_success_counts_matches() {
        let server = start_test_server().await;
        let fetcher = HttpFetcher::new(&FetchOptions::default()).unwrap();
        let metrics = FetchMetrics::new();

        let outcome = search_target(
            &fetcher,
            &format!("{}/cats", server),
            &matcher(),
            &CancellationToken::new(),
            &metrics,
        )
        .await;

        assert_eq!(outcome, Ok(2));
        let stats = metrics.get_stats();
        assert_eq!(stats.targets_succeeded, 1);
        assert_eq!(stats.bytes_read, "cat dog cat".len() as u64);
    }

    #[tokio::test]
    async fn test_unexpected_status() {
        let server = start_test_server().await;
        let fetcher = HttpFetcher::new(&FetchOptions::default()).unwrap();

        let err = fetcher
            .fetch(&format!("{}/missing", server))
            .await
            .unwrap_err();
        assert_eq!(err, FetchError::UnexpectedStatus(404));
    }

    #[tokio::test]
    async fn test_connection_failure() {
        let fetcher = HttpFetcher::new(&FetchOptions::default()).unwrap();
        let err = fetcher.fetch(&closed_port_url().await).await.unwrap_err();
        assert!(matches!(err, FetchError::Network(_)), "got {:?}", err);
    }

    #[tokio::test]
    async fn test_timeout() {
        let server = start_test_server().await;
        let fetcher = HttpFetcher::new(&FetchOptions {
            timeout: Some(Duration::from_millis(200)),
            user_agent: None,
        })
        .unwrap();

        let err = fetcher.fetch(&format!("{}/slow", server)).await.unwrap_err();
        assert_eq!(err, FetchError::Timeout(Duration::from_millis(200)));
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let server = start_test_server().await;
        let fetcher = HttpFetcher::new(&FetchOptions::default()).unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let metrics = FetchMetrics::new();

        let outcome = search_target(
            &fetcher,
            &format!("{}/cats", server),
            &matcher(),
            &cancel,
            &metrics,
        )
        .await;
        assert_eq!(outcome, Err(FetchError::Cancelled));
        assert_eq!(metrics.get_stats().targets_failed, 1);
    }

    #[tokio::test]
    async fn test_cancelled_in_flight() {
        let server = start_test_server().await;
        let fetcher = HttpFetcher::new(&FetchOptions::default()).unwrap();
        let cancel = CancellationToken::new();
        let metrics = FetchMetrics::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let outcome = search_target(
            &fetcher,
            &format!("{}/slow", server),
            &matcher(),
            &cancel,
            &metrics,
        )
        .await;
        assert_eq!(outcome, Err(FetchError::Cancelled));
        assert_eq!(metrics.get_stats().targets_failed, 1);
    }
}
