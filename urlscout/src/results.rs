/// Result types produced by a search run.
///
/// Every target yields exactly one [`TargetResult`]. Its outcome is either a match
/// count or the [`FetchError`] that stopped the scan, so "an error with a count" or
/// "a count with an error" cannot be represented. For output, [`TargetResult::count`]
/// flattens the outcome into the traditional `-1` sentinel:
/// ```rust,ignore
/// let result = TargetResult::failed(0, "http://example.com", FetchError::UnexpectedStatus(404));
/// assert_eq!(result.count(), -1);
/// assert!(result.error().is_some());
/// ```
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

use crate::errors::FetchError;

/// Outcome of fetching and scanning one target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetResult {
    /// The URL that was fetched
    pub target: String,
    /// Position of the target in the input list
    pub index: usize,
    /// Match count on success, the failure otherwise
    pub outcome: Result<usize, FetchError>,
}

impl TargetResult {
    pub fn succeeded(index: usize, target: impl Into<String>, count: usize) -> Self {
        Self {
            target: target.into(),
            index,
            outcome: Ok(count),
        }
    }

    pub fn failed(index: usize, target: impl Into<String>, error: FetchError) -> Self {
        Self {
            target: target.into(),
            index,
            outcome: Err(error),
        }
    }

    /// Match count, or -1 when the target failed
    pub fn count(&self) -> i64 {
        match &self.outcome {
            Ok(count) => *count as i64,
            Err(_) => -1,
        }
    }

    pub fn error(&self) -> Option<&FetchError> {
        self.outcome.as_ref().err()
    }

    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }
}

impl Serialize for TargetResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("TargetResult", 3)?;
        state.serialize_field("target", &self.target)?;
        state.serialize_field("count", &self.count())?;
        state.serialize_field("error", &self.error())?;
        state.end()
    }
}

/// The complete set of outcomes for a search run
#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    /// Results in arrival order unless sorted
    pub results: Vec<TargetResult>,
    /// Sum of match counts over successful targets
    pub total_matches: usize,
    /// Number of targets scanned successfully
    pub targets_succeeded: usize,
    /// Number of targets that ended in an error
    pub targets_failed: usize,
}

impl ResultSet {
    /// Creates a new empty result set
    pub fn new() -> Self {
        Default::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            results: Vec::with_capacity(capacity),
            ..Default::default()
        }
    }

    /// Adds a result and updates the summary counters
    pub fn add_result(&mut self, result: TargetResult) {
        match &result.outcome {
            Ok(count) => {
                self.targets_succeeded += 1;
                self.total_matches += count;
            }
            Err(_) => self.targets_failed += 1,
        }
        self.results.push(result);
    }

    /// Restores input order
    pub fn sort_by_input_order(&mut self) {
        self.results.sort_unstable_by_key(|r| r.index);
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TargetResult> {
        self.results.iter()
    }
}

impl<'a> IntoIterator for &'a ResultSet {
    type Item = &'a TargetResult;
    type IntoIter = std::slice::Iter<'a, TargetResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.results.iter()
    }
}

impl IntoIterator for ResultSet {
    type Item = TargetResult;
    type IntoIter = std::vec::IntoIter<TargetResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.results.into_iter()
    }
}
