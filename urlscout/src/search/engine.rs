use std::num::NonZeroUsize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::collector::collect;
use super::fetcher::{Fetch, HttpFetcher};
use super::matcher::PatternMatcher;
use super::pool::{SearchContext, WorkItem, WorkerPool};
use crate::config::SearchConfig;
use crate::errors::SearchResult;
use crate::metrics::FetchMetrics;
use crate::results::ResultSet;

/// Sizing and ordering of a search run
#[derive(Debug, Clone, Copy)]
pub struct PoolOptions {
    /// Number of workers and capacity of the work queue
    pub concurrency: NonZeroUsize,
    /// Sort the result set by input position before returning
    pub preserve_order: bool,
}

impl From<&SearchConfig> for PoolOptions {
    fn from(config: &SearchConfig) -> Self {
        Self {
            concurrency: config.concurrency,
            preserve_order: config.preserve_order,
        }
    }
}

/// Fetches every target over HTTP and counts matches of the configured term
pub async fn search(config: &SearchConfig, targets: Vec<String>) -> SearchResult<ResultSet> {
    search_with_cancel(config, targets, CancellationToken::new()).await
}

/// Like [`search`], aborting outstanding requests when `cancel` fires.
///
/// Fails only if the search term cannot be compiled or the HTTP client cannot be
/// built; both are checked before any request is made.
pub async fn search_with_cancel(
    config: &SearchConfig,
    targets: Vec<String>,
    cancel: CancellationToken,
) -> SearchResult<ResultSet> {
    info!(
        "Starting search for {:?} across {} targets",
        config.search_term,
        targets.len()
    );

    let metrics = FetchMetrics::new();
    let matcher = PatternMatcher::with_metrics(&config.search_term, config.match_mode(), &metrics)?;
    let fetcher = Arc::new(HttpFetcher::new(&config.fetch_options())?);

    let context = SearchContext::new(fetcher, matcher)
        .with_cancel(cancel)
        .with_metrics(metrics.clone());
    let result = search_with(targets, context, PoolOptions::from(config)).await;

    metrics.log_stats();
    info!(
        "Search complete. Found {} matches, {} targets failed",
        result.total_matches, result.targets_failed
    );

    Ok(result)
}

/// Runs the worker pool over `targets` with any [`Fetch`] implementation.
///
/// Always returns one result per target. Every spawned task has exited by the
/// time this returns.
pub async fn search_with<F>(
    targets: Vec<String>,
    context: SearchContext<F>,
    options: PoolOptions,
) -> ResultSet
where
    F: Fetch + ?Sized + 'static,
{
    if targets.is_empty() {
        debug!("No targets provided, returning empty result");
        return ResultSet::new();
    }

    let concurrency = options.concurrency;
    debug!(
        "Dispatching {} targets to {} workers",
        targets.len(),
        concurrency
    );

    let (queue_tx, queue_rx) = mpsc::channel::<WorkItem>(concurrency.get());
    let (results_tx, results_rx) = mpsc::unbounded_channel();
    let pool = WorkerPool::spawn(concurrency, queue_rx, results_tx, &context);

    let (_, mut result) = tokio::join!(
        feed_queue(queue_tx, &targets),
        collect(results_rx, &targets)
    );
    pool.join().await;

    if options.preserve_order {
        result.sort_by_input_order();
    }
    result
}

/// Pushes every target onto the queue, then closes it by dropping the sender
async fn feed_queue(queue: mpsc::Sender<WorkItem>, targets: &[String]) {
    for (index, target) in targets.iter().enumerate() {
        if queue.send((index, target.clone())).await.is_err() {
            warn!(
                "All workers exited; {} targets were never dispatched",
                targets.len() - index
            );
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::FetchError;
    use crate::search::matcher::MatchMode;
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Canned responses keyed by target; unknown targets fail to connect
    struct StubFetcher {
        pages: HashMap<String, Result<&'static str, FetchError>>,
        in_flight: AtomicUsize,
        peak_in_flight: AtomicUsize,
    }

    impl StubFetcher {
        fn new(pages: &[(&str, Result<&'static str, FetchError>)]) -> Self {
            Self {
                pages: pages
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.clone()))
                    .collect(),
                in_flight: AtomicUsize::new(0),
                peak_in_flight: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Fetch for StubFetcher {
        async fn fetch(&self, target: &str) -> Result<Bytes, FetchError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(5)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            match self.pages.get(target) {
                Some(Ok(body)) => Ok(Bytes::from_static(body.as_bytes())),
                Some(Err(e)) => Err(e.clone()),
                None => Err(FetchError::network("connection refused")),
            }
        }
    }

    fn options(concurrency: usize) -> PoolOptions {
        PoolOptions {
            concurrency: NonZeroUsize::new(concurrency).unwrap(),
            preserve_order: false,
        }
    }

    fn context(fetcher: Arc<StubFetcher>) -> SearchContext<StubFetcher> {
        SearchContext::new(
            fetcher,
            PatternMatcher::new("cat", MatchMode::Literal).unwrap(),
        )
    }

    fn many_targets(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("http://site{}.test/", i)).collect()
    }

    fn sorted_pairs(set: &ResultSet) -> Vec<(String, i64)> {
        let mut pairs: Vec<_> = set.iter().map(|r| (r.target.clone(), r.count())).collect();
        pairs.sort();
        pairs
    }

    #[tokio::test]
    async fn test_empty_targets() {
        let fetcher = Arc::new(StubFetcher::new(&[]));
        let ctx = context(fetcher);
        let set = search_with(Vec::new(), ctx.clone(), options(4)).await;
        assert!(set.is_empty());
        assert_eq!(ctx.metrics.get_stats().targets_dispatched, 0);
    }

    #[tokio::test]
    async fn test_mixed_outcomes() {
        let fetcher = Arc::new(StubFetcher::new(&[
            ("http://a.test/", Ok("cat dog cat")),
            ("http://b.test/", Err(FetchError::UnexpectedStatus(404))),
            ("http://c.test/", Ok("nothing here")),
        ]));
        let targets = vec![
            "http://a.test/".to_string(),
            "http://b.test/".to_string(),
            "http://c.test/".to_string(),
            "http://unreachable.test/".to_string(),
        ];

        let mut set = search_with(
            targets,
            context(fetcher),
            PoolOptions {
                preserve_order: true,
                ..options(2)
            },
        )
        .await;

        assert_eq!(set.len(), 4);
        assert_eq!(set.results[0].outcome, Ok(2));
        assert_eq!(set.results[1].outcome, Err(FetchError::UnexpectedStatus(404)));
        assert_eq!(set.results[2].outcome, Ok(0));
        assert!(matches!(set.results[3].outcome, Err(FetchError::Network(_))));
        assert_eq!(set.total_matches, 2);
        assert_eq!(set.targets_failed, 2);

        for result in set.results.drain(..) {
            match result.error() {
                Some(_) => assert_eq!(result.count(), -1),
                None => assert!(result.count() >= 0),
            }
        }
    }

    #[tokio::test]
    async fn test_completeness_without_duplicates() {
        let targets = many_targets(57);
        let fetcher = Arc::new(StubFetcher::new(&[]));
        let set = search_with(targets.clone(), context(fetcher), options(5)).await;

        assert_eq!(set.len(), targets.len());
        let mut seen: Vec<usize> = set.iter().map(|r| r.index).collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..targets.len()).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let fetcher = Arc::new(StubFetcher::new(&[]));
        search_with(many_targets(40), context(fetcher.clone()), options(3)).await;

        let peak = fetcher.peak_in_flight.load(Ordering::SeqCst);
        assert!(peak <= 3, "peak in-flight requests was {}", peak);
        assert!(peak >= 1);
    }

    #[tokio::test]
    async fn test_concurrency_beyond_target_count() {
        let pages: Vec<(&str, Result<&'static str, FetchError>)> = vec![
            ("http://a.test/", Ok("cat")),
            ("http://b.test/", Ok("Cat CAT")),
        ];
        let targets = vec!["http://a.test/".to_string(), "http://b.test/".to_string()];

        let small = search_with(
            targets.clone(),
            context(Arc::new(StubFetcher::new(&pages))),
            options(1),
        )
        .await;
        let large = search_with(
            targets,
            context(Arc::new(StubFetcher::new(&pages))),
            options(64),
        )
        .await;

        assert_eq!(sorted_pairs(&small), sorted_pairs(&large));
    }

    #[tokio::test]
    async fn test_repeated_runs_are_equal() {
        let pages: Vec<(&str, Result<&'static str, FetchError>)> = vec![
            ("http://site0.test/", Ok("cat")),
            ("http://site3.test/", Err(FetchError::read("reset"))),
            ("http://site7.test/", Ok("a cat, a CAT, concatenate")),
        ];
        let fetcher = Arc::new(StubFetcher::new(&pages));

        let first = search_with(many_targets(10), context(fetcher.clone()), options(4)).await;
        let second = search_with(many_targets(10), context(fetcher), options(4)).await;

        let mut a = first.results.clone();
        let mut b = second.results.clone();
        a.sort_by_key(|r| r.index);
        b.sort_by_key(|r| r.index);
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_cancellation_resolves_every_target() {
        let fetcher = Arc::new(StubFetcher::new(&[]));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let set = search_with(
            many_targets(12),
            context(fetcher.clone()).with_cancel(cancel),
            options(3),
        )
        .await;

        assert_eq!(set.len(), 12);
        assert!(set.iter().all(|r| r.error() == Some(&FetchError::Cancelled)));
        assert_eq!(fetcher.peak_in_flight.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_invalid_pattern_aborts_before_dispatch() {
        let config = SearchConfig {
            search_term: "(".to_string(),
            regex: true,
            ..SearchConfig::default()
        };

        let err = search(&config, vec!["http://a.test/".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, crate::errors::SearchError::InvalidPattern(_)));
    }
}
