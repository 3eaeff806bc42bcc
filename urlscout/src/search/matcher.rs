use dashmap::DashMap;
use once_cell::sync::Lazy;
use regex::bytes::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use crate::errors::{SearchError, SearchResult};
use crate::metrics::FetchMetrics;

static PATTERN_CACHE: Lazy<DashMap<(MatchMode, String), Arc<Regex>>> = Lazy::new(DashMap::new);

/// How the search term is embedded into the compiled pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    /// The term is escaped and matched literally
    #[default]
    Literal,
    /// The term is spliced into the pattern as a regular expression
    Regex,
}

/// Case-insensitive whole-word matcher over raw response bytes
#[derive(Debug, Clone)]
pub struct PatternMatcher {
    term: String,
    mode: MatchMode,
    regex: Arc<Regex>,
}

impl PatternMatcher {
    /// Compiles the search term into a whole-word, case-insensitive pattern
    pub fn new(term: &str, mode: MatchMode) -> SearchResult<Self> {
        Self::with_metrics(term, mode, &FetchMetrics::new())
    }

    /// Compiles the search term, recording pattern cache hits and misses
    pub fn with_metrics(term: &str, mode: MatchMode, metrics: &FetchMetrics) -> SearchResult<Self> {
        if term.is_empty() {
            return Err(SearchError::invalid_pattern("search term is empty"));
        }

        let key = (mode, term.to_string());
        if let Some(cached) = PATTERN_CACHE.get(&key) {
            debug!("Using cached pattern for: {}", term);
            metrics.record_cache_operation(true);
            return Ok(Self {
                term: key.1,
                mode,
                regex: cached.clone(),
            });
        }

        let pattern = Self::build_pattern(term, mode);
        debug!("Compiling pattern {} for term: {}", pattern, term);
        let regex = RegexBuilder::new(&pattern)
            .case_insensitive(true)
            .build()
            .map_err(|e| SearchError::invalid_pattern(e.to_string()))?;
        let regex = Arc::new(regex);

        metrics.record_cache_operation(false);
        PATTERN_CACHE.insert(key, regex.clone());

        Ok(Self {
            term: term.to_string(),
            mode,
            regex,
        })
    }

    fn build_pattern(term: &str, mode: MatchMode) -> String {
        let body = match mode {
            MatchMode::Literal => regex::escape(term),
            MatchMode::Regex => term.to_string(),
        };
        format!(r"\b(?:{})\b", body)
    }

    /// The search term this matcher was built from
    pub fn term(&self) -> &str {
        &self.term
    }

    pub fn mode(&self) -> MatchMode {
        self.mode
    }

    /// Counts non-overlapping matches in the body
    pub fn count_matches(&self, body: &[u8]) -> usize {
        self.regex.find_iter(body).count()
    }
}
