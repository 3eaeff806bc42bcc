use config::{Config as ConfigBuilder, File};
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::errors::{SearchError, SearchResult};
use crate::input::InputOptions;
use crate::output::OutputFormat;
use crate::search::fetcher::FetchOptions;
use crate::search::matcher::MatchMode;

const DEFAULT_CONCURRENCY: usize = 20;
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration for a search run.
///
/// # Configuration Locations
///
/// The configuration can be loaded from multiple locations, later ones overriding
/// earlier ones:
/// 1. Global `$CONFIG_DIR/urlscout/config.yaml`
/// 2. Local `.urlscout.yaml` in the current directory
/// 3. Custom config file specified via `--config`
///
/// Command-line arguments are applied last, see [`SearchConfig::merge_with_cli`].
///
/// # Configuration Format
///
/// ```yaml
/// # Treat the search term as a regular expression
/// regex: false
///
/// # Number of concurrent fetchers
/// concurrency: 20
///
/// # Per-request timeout ("0" disables it)
/// timeout: "30s"
///
/// # Input list and output file
/// input_path: "url.txt"
/// output_path: "results.txt"
///
/// # Output format (csv|json)
/// output_format: "csv"
///
/// # Log level (trace, debug, info, warn, error)
/// log_level: "warn"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// The term to count in each response body
    pub search_term: String,

    /// Splice the term into the pattern as a regular expression instead of
    /// matching it literally
    pub regex: bool,

    /// Number of concurrent fetchers, and capacity of the work queue
    pub concurrency: NonZeroUsize,

    /// Per-request timeout; `None` waits indefinitely
    #[serde(with = "timeout_serde")]
    pub timeout: Option<Duration>,

    /// File listing the targets
    pub input_path: PathBuf,

    /// File the results are written to
    pub output_path: PathBuf,

    /// Whether the first line of the input is a header row
    pub skip_header: bool,

    /// Scheme prepended to targets that have none
    pub default_scheme: String,

    /// User-Agent header sent with every request
    pub user_agent: Option<String>,

    /// Sort results by input position instead of arrival order
    pub preserve_order: bool,

    pub output_format: OutputFormat,

    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            search_term: String::new(),
            regex: false,
            concurrency: default_concurrency(),
            timeout: Some(DEFAULT_TIMEOUT),
            input_path: PathBuf::from("url.txt"),
            output_path: PathBuf::from("results.txt"),
            skip_header: true,
            default_scheme: "http".to_string(),
            user_agent: None,
            preserve_order: false,
            output_format: OutputFormat::default(),
            log_level: default_log_level(),
        }
    }
}

fn default_concurrency() -> NonZeroUsize {
    NonZeroUsize::new(DEFAULT_CONCURRENCY).unwrap_or(NonZeroUsize::MIN)
}

fn default_log_level() -> String {
    "warn".to_string()
}

/// Values supplied on the command line; `None` keeps the configured value
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub search_term: Option<String>,
    pub regex: Option<bool>,
    pub concurrency: Option<NonZeroUsize>,
    pub timeout: Option<Option<Duration>>,
    pub input_path: Option<PathBuf>,
    pub output_path: Option<PathBuf>,
    pub preserve_order: bool,
    pub output_format: Option<OutputFormat>,
    pub log_level: Option<String>,
}

impl SearchConfig {
    /// Loads configuration from the default locations
    pub fn load() -> SearchResult<Self> {
        Self::load_from(None)
    }

    /// Loads configuration, layering an explicit file over the default locations
    pub fn load_from(config_path: Option<&Path>) -> SearchResult<Self> {
        if let Some(path) = config_path {
            if !path.exists() {
                return Err(SearchError::file_not_found(path));
            }
        }

        let mut builder = ConfigBuilder::builder();

        let config_files = [
            dirs::config_dir().map(|p| p.join("urlscout/config.yaml")),
            Some(PathBuf::from(".urlscout.yaml")),
            config_path.map(PathBuf::from),
        ];

        for path in config_files.iter().flatten() {
            if path.exists() {
                builder = builder.add_source(File::from(path.as_path()));
            }
        }

        Ok(builder.build()?.try_deserialize()?)
    }

    /// Merges CLI arguments with configuration file values
    pub fn merge_with_cli(mut self, cli: ConfigOverrides) -> Self {
        if let Some(term) = cli.search_term {
            self.search_term = term;
        }
        if let Some(regex) = cli.regex {
            self.regex = regex;
        }
        if let Some(concurrency) = cli.concurrency {
            self.concurrency = concurrency;
        }
        if let Some(timeout) = cli.timeout {
            self.timeout = timeout;
        }
        if let Some(path) = cli.input_path {
            self.input_path = path;
        }
        if let Some(path) = cli.output_path {
            self.output_path = path;
        }
        if cli.preserve_order {
            self.preserve_order = true;
        }
        if let Some(format) = cli.output_format {
            self.output_format = format;
        }
        if let Some(level) = cli.log_level {
            self.log_level = level;
        }
        self
    }

    pub fn match_mode(&self) -> MatchMode {
        if self.regex {
            MatchMode::Regex
        } else {
            MatchMode::Literal
        }
    }

    pub fn fetch_options(&self) -> FetchOptions {
        FetchOptions {
            timeout: self.timeout,
            user_agent: self.user_agent.clone(),
        }
    }

    pub fn input_options(&self) -> InputOptions {
        InputOptions {
            skip_header: self.skip_header,
            default_scheme: self.default_scheme.clone(),
        }
    }
}

/// Parses a human-readable timeout such as `30s` or `1m 30s`; `0` and `none`
/// disable the timeout
pub fn parse_timeout(raw: &str) -> Result<Option<Duration>, humantime::DurationError> {
    let raw = raw.trim();
    if raw == "0" || raw.eq_ignore_ascii_case("none") {
        return Ok(None);
    }
    let duration = humantime::parse_duration(raw)?;
    Ok((!duration.is_zero()).then_some(duration))
}

mod timeout_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => s.serialize_str(&humantime::format_duration(*d).to_string()),
            None => s.serialize_str("0"),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        let raw = String::deserialize(d)?;
        super::parse_timeout(&raw).map_err(serde::de::Error::custom)
    }
}
