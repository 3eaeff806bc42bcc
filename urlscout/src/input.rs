use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::{debug, trace};

use crate::errors::{SearchError, SearchResult};

const FIELDS_PER_ROW: usize = 6;
const TARGET_FIELD: usize = 1;

/// How the target list is parsed
#[derive(Debug, Clone)]
pub struct InputOptions {
    /// Skip the first line as a header row
    pub skip_header: bool,
    /// Scheme prepended to targets without one
    pub default_scheme: String,
}

impl Default for InputOptions {
    fn default() -> Self {
        Self {
            skip_header: true,
            default_scheme: "http".to_string(),
        }
    }
}

/// Reads the target list from a file
pub fn read_targets(path: &Path, options: &InputOptions) -> SearchResult<Vec<String>> {
    let file = File::open(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => SearchError::file_not_found(path),
        _ => SearchError::IoError(e),
    })?;

    let targets = parse_targets(BufReader::new(file), options)?;
    debug!("Read {} targets from {}", targets.len(), path.display());
    Ok(targets)
}

/// Parses comma-delimited rows, taking the second field of each as the target.
///
/// Every row must have exactly six fields. Blank lines are skipped.
pub fn parse_targets<R: BufRead>(reader: R, options: &InputOptions) -> SearchResult<Vec<String>> {
    let mut targets = Vec::new();

    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        if i == 0 && options.skip_header {
            trace!("Skipping header: {}", line);
            continue;
        }
        if line.trim().is_empty() {
            continue;
        }

        let fields: Vec<&str> = line.split(',').collect();
        if fields.len() != FIELDS_PER_ROW {
            return Err(SearchError::malformed_row(i + 1, fields.len()));
        }

        let target = strip_quotes(fields[TARGET_FIELD]);
        targets.push(with_scheme(target, &options.default_scheme));
    }

    Ok(targets)
}

fn strip_quotes(field: &str) -> &str {
    field
        .strip_prefix('"')
        .and_then(|f| f.strip_suffix('"'))
        .unwrap_or(field)
}

/// Prepends `scheme://` unless the target already carries a scheme
pub fn with_scheme(target: &str, scheme: &str) -> String {
    if has_scheme(target) {
        target.to_string()
    } else {
        format!("{}://{}", scheme, target)
    }
}

/// A scheme is a leading run of `[A-Za-z][A-Za-z0-9+.-]*` directly followed by `://`
fn has_scheme(target: &str) -> bool {
    let Some((prefix, _)) = target.split_once("://") else {
        return false;
    };
    let mut chars = prefix.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}
