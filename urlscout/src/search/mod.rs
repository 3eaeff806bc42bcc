//! This module implements the concurrent fetch-and-count engine.
//!
//! # Data Flow
//!
//! ```text
//!  targets ──► bounded queue ──► N workers ──► results channel ──► collector ──► ResultSet
//!               (capacity N)     (fetch+count)                     (exactly one per target)
//! ```
//!
//! 1. **Matcher**: the search term is compiled once into a case-insensitive,
//!    whole-word pattern and shared read-only by every worker.
//! 2. **Fetcher**: one GET per target; non-2xx statuses, transport failures and
//!    body-read failures become per-target errors.
//! 3. **Worker Pool**: a fixed number of tasks pull from the shared queue, so at
//!    most `concurrency` requests are in flight and the producer feels
//!    backpressure once the queue is full.
//! 4. **Collector**: gathers one result per target. A worker that dies mid-request
//!    still produces a result for its target, so the collector never waits on a
//!    result that will not come.
//!
//! # Cancellation
//!
//! A [`CancellationToken`](tokio_util::sync::CancellationToken) reaches every
//! in-flight request:
//! ```rust,ignore
//! let cancel = CancellationToken::new();
//! let results = search_with_cancel(&config, targets, cancel.clone()).await?;
//! // elsewhere: cancel.cancel();
//! ```
//! Requests still running resolve to `FetchError::Cancelled`, as do queued
//! targets, which are never sent.
pub mod collector;
pub mod engine;
pub mod fetcher;
pub mod matcher;
pub mod pool;

pub use engine::{search, search_with, search_with_cancel, PoolOptions};
pub use fetcher::{Fetch, FetchOptions, HttpFetcher};
pub use matcher::{MatchMode, PatternMatcher};
pub use pool::SearchContext;
