use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use urlscout::{
    config::{parse_timeout, ConfigOverrides, SearchConfig},
    input::read_targets,
    output::{create_output, write_results, OutputFormat},
    search::search_with_cancel,
    ResultSet,
};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Term to count in every response body (whole words, case-insensitive)
    search_term: String,

    /// File listing the targets, one per row in the second of six comma-separated fields
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// File the results are written to (truncated if it exists)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Number of concurrent requests
    #[arg(short = 'j', long)]
    concurrency: Option<NonZeroUsize>,

    /// Treat the search term as a regular expression instead of literal text
    #[arg(short, long, conflicts_with = "literal")]
    regex: bool,

    /// Treat the search term as literal text, even if the config enables regex
    #[arg(short = 'l', long)]
    literal: bool,

    /// Per-request timeout, e.g. 30s or 2m ("0" disables)
    #[arg(short, long)]
    timeout: Option<String>,

    /// Output format (csv|json)
    #[arg(long)]
    format: Option<String>,

    /// Write results in input order instead of completion order
    #[arg(long)]
    ordered: bool,

    /// Configuration file layered over the default locations
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    let timeout = cli
        .timeout
        .as_deref()
        .map(parse_timeout)
        .transpose()
        .context("Invalid --timeout value")?;
    let output_format = cli
        .format
        .as_deref()
        .map(str::parse::<OutputFormat>)
        .transpose()?;

    let config = SearchConfig::load_from(cli.config.as_deref())?.merge_with_cli(ConfigOverrides {
        search_term: Some(cli.search_term),
        regex: match (cli.regex, cli.literal) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        },
        concurrency: cli.concurrency,
        timeout,
        input_path: cli.input,
        output_path: cli.output,
        preserve_order: cli.ordered,
        output_format,
        log_level: cli.log_level,
    });

    init_tracing(&config.log_level);

    let targets = read_targets(&config.input_path, &config.input_options()).with_context(|| {
        format!("Could not read URL file {}", config.input_path.display())
    })?;

    let output = create_output(&config.output_path).with_context(|| {
        format!("Could not create output file {}", config.output_path.display())
    })?;

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling outstanding requests");
            on_interrupt.cancel();
        }
    });

    let results = search_with_cancel(&config, targets, cancel).await?;

    write_results(output, &results, config.output_format).with_context(|| {
        format!("Problem writing to output file {}", config.output_path.display())
    })?;
    info!("Results written to {}", config.output_path.display());

    print_summary(&results, &config);
    Ok(())
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_summary(results: &ResultSet, config: &SearchConfig) {
    let failed = if results.targets_failed > 0 {
        results.targets_failed.to_string().red()
    } else {
        results.targets_failed.to_string().green()
    };

    println!(
        "Found {} matches of {} across {} targets ({} failed), results in {}",
        results.total_matches.to_string().green(),
        config.search_term.blue(),
        results.len(),
        failed,
        config.output_path.display()
    );
}
