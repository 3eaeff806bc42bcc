use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::str::FromStr;
use tracing::debug;

use crate::errors::{SearchError, SearchResult};
use crate::results::ResultSet;

/// Serialization format for the results file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// One `"<target>",<count>,<error>` line per result
    #[default]
    Csv,
    /// A JSON array of result objects
    Json,
}

impl FromStr for OutputFormat {
    type Err = SearchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "json" => Ok(Self::Json),
            other => Err(SearchError::config_error(format!(
                "Unknown output format: {}",
                other
            ))),
        }
    }
}

/// Writes the results in the given format.
///
/// Targets are wrapped in double quotes but embedded quotes are not escaped.
pub fn write_results<W: Write>(
    writer: W,
    results: &ResultSet,
    format: OutputFormat,
) -> SearchResult<()> {
    let mut out = BufWriter::new(writer);
    match format {
        OutputFormat::Csv => {
            for result in results {
                match result.error() {
                    None => writeln!(out, "\"{}\",{},", result.target, result.count())?,
                    Some(e) => writeln!(out, "\"{}\",{},{}", result.target, result.count(), e)?,
                }
            }
        }
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut out, &results.results)?;
            writeln!(out)?;
        }
    }
    out.flush()?;
    Ok(())
}

/// Creates (or truncates) the results file
pub fn create_output(path: &Path) -> SearchResult<File> {
    Ok(File::create(path)?)
}

/// Creates (or truncates) the file at `path` and writes the results to it
pub fn write_results_to(path: &Path, results: &ResultSet, format: OutputFormat) -> SearchResult<()> {
    let file = create_output(path)?;
    write_results(file, results, format)?;
    debug!("Wrote {} results to {}", results.len(), path.display());
    Ok(())
}
