use std::num::NonZeroUsize;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{trace, warn};

use super::fetcher::{search_target, Fetch};
use super::matcher::PatternMatcher;
use crate::errors::FetchError;
use crate::metrics::FetchMetrics;
use crate::results::TargetResult;

/// A target and its position in the input list
pub(crate) type WorkItem = (usize, String);

/// Shared receiving end of the work queue
pub(crate) type WorkQueue = Arc<Mutex<mpsc::Receiver<WorkItem>>>;

/// Everything a worker needs besides its queue
pub struct SearchContext<F: ?Sized> {
    pub fetcher: Arc<F>,
    pub matcher: PatternMatcher,
    pub cancel: CancellationToken,
    pub metrics: FetchMetrics,
}

impl<F: ?Sized> SearchContext<F> {
    pub fn new(fetcher: Arc<F>, matcher: PatternMatcher) -> Self {
        Self {
            fetcher,
            matcher,
            cancel: CancellationToken::new(),
            metrics: FetchMetrics::new(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_metrics(mut self, metrics: FetchMetrics) -> Self {
        self.metrics = metrics;
        self
    }
}

impl<F: ?Sized> Clone for SearchContext<F> {
    fn clone(&self) -> Self {
        Self {
            fetcher: Arc::clone(&self.fetcher),
            matcher: self.matcher.clone(),
            cancel: self.cancel.clone(),
            metrics: self.metrics.clone(),
        }
    }
}

/// Fixed set of workers draining a shared queue
pub(crate) struct WorkerPool {
    workers: JoinSet<()>,
}

impl WorkerPool {
    /// Spawns exactly `concurrency` workers.
    ///
    /// Each worker holds its own clone of `results`; the channel closes once every
    /// worker has exited.
    pub(crate) fn spawn<F>(
        concurrency: NonZeroUsize,
        queue: mpsc::Receiver<WorkItem>,
        results: mpsc::UnboundedSender<TargetResult>,
        context: &SearchContext<F>,
    ) -> Self
    where
        F: Fetch + ?Sized + 'static,
    {
        let queue: WorkQueue = Arc::new(Mutex::new(queue));
        let mut workers = JoinSet::new();

        for id in 0..concurrency.get() {
            workers.spawn(run_worker(
                id,
                Arc::clone(&queue),
                results.clone(),
                context.clone(),
            ));
        }

        Self { workers }
    }

    /// Waits for every worker to exit
    pub(crate) async fn join(mut self) {
        while let Some(joined) = self.workers.join_next().await {
            if let Err(e) = joined {
                warn!("Worker terminated abnormally: {}", e);
            }
        }
    }
}

async fn run_worker<F>(
    id: usize,
    queue: WorkQueue,
    results: mpsc::UnboundedSender<TargetResult>,
    context: SearchContext<F>,
) where
    F: Fetch + ?Sized + 'static,
{
    loop {
        let next = queue.lock().await.recv().await;
        let Some((index, target)) = next else {
            break;
        };

        context.metrics.record_dispatch();
        let pending = PendingResult::new(index, target, &results);
        let task = tokio::spawn(process_target(pending.target().to_string(), context.clone()));
        let outcome = match task.await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("Search of {} aborted: {}", pending.target(), e);
                context.metrics.record_failure();
                Err(FetchError::WorkerLost)
            }
        };
        pending.complete(outcome);
    }
    trace!("Worker {} exiting", id);
}

/// Searches one target on its own task so a panic is confined to that target
async fn process_target<F>(
    target: String,
    context: SearchContext<F>,
) -> Result<usize, FetchError>
where
    F: Fetch + ?Sized,
{
    search_target(
        context.fetcher.as_ref(),
        &target,
        &context.matcher,
        &context.cancel,
        &context.metrics,
    )
    .await
}

/// Guarantees one result per dequeued target.
///
/// If the worker unwinds before [`PendingResult::complete`] runs, dropping the
/// guard reports [`FetchError::WorkerLost`] for the target.
struct PendingResult<'a> {
    index: usize,
    target: Option<String>,
    results: &'a mpsc::UnboundedSender<TargetResult>,
}

impl<'a> PendingResult<'a> {
    fn new(index: usize, target: String, results: &'a mpsc::UnboundedSender<TargetResult>) -> Self {
        Self {
            index,
            target: Some(target),
            results,
        }
    }

    fn target(&self) -> &str {
        self.target.as_deref().unwrap_or_default()
    }

    fn complete(mut self, outcome: Result<usize, FetchError>) {
        if let Some(target) = self.target.take() {
            self.send(TargetResult {
                target,
                index: self.index,
                outcome,
            });
        }
    }

    fn send(&self, result: TargetResult) {
        // Only fails once the collector has stopped listening
        if self.results.send(result).is_err() {
            trace!("Collector gone, dropping result for index {}", self.index);
        }
    }
}

impl Drop for PendingResult<'_> {
    fn drop(&mut self) {
        if let Some(target) = self.target.take() {
            warn!("Worker lost while processing {}", target);
            self.send(TargetResult::failed(self.index, target, FetchError::WorkerLost));
        }
    }
}
