use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use paperfetch::config::{load_config, Config, ProgressSettings};
use paperfetch::download::load_doi_file;
use paperfetch::models::{DownloadItem, PaperDetail, SearchCriteria, SortOrder};
use paperfetch::ui::{is_terminal, outcomes_table, records_table, BatchProgress};
use paperfetch::utils::{ProgressEvent, ProgressSource};
use paperfetch::{
    DownloadManager, Error, ErrorKind, Fetcher, ProgressMonitor, ProviderRegistry,
    ResultCollector,
};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// paperfetch - Fetch paper metadata from academic search providers and download the documents
#[derive(Parser, Debug)]
#[command(name = "paperfetch")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(author = "hongkongkiwi")]
#[command(about = "Fetch paper metadata from academic search providers and download the documents", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose logging (can be used multiple times for more verbosity: -v, -vv)
    #[arg(long, short, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Output format
    #[arg(long, short, value_enum, global = true, default_value_t = OutputFormat::Auto)]
    output: OutputFormat,

    /// Configuration file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Output format for results
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum OutputFormat {
    /// Automatic based on terminal (table if TTY, JSON otherwise)
    Auto,
    /// Table format (human-readable)
    Table,
    /// JSON format (machine-readable)
    Json,
}

impl OutputFormat {
    fn resolve(self) -> Self {
        match self {
            OutputFormat::Auto if is_terminal() => OutputFormat::Table,
            OutputFormat::Auto => OutputFormat::Json,
            other => other,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum SortArg {
    Relevance,
    /// Newest first
    Date,
    /// Oldest first
    DateReversed,
}

impl From<SortArg> for SortOrder {
    fn from(sort: SortArg) -> Self {
        match sort {
            SortArg::Relevance => SortOrder::Relevance,
            SortArg::Date => SortOrder::Date,
            SortArg::DateReversed => SortOrder::DateReversed,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List available providers
    Providers,

    /// Show how many results a search has
    Count(SearchArgs),

    /// Fetch paper details
    Fetch {
        #[command(flatten)]
        search: SearchArgs,

        /// Number of papers to fetch
        #[arg(long, short = 'n', default_value_t = 20)]
        num: usize,

        /// Also save the records as JSON
        #[arg(long)]
        save: Option<PathBuf>,
    },

    /// Download documents through a DOI mirror
    Download {
        /// Mirror host or URL (overrides the config file)
        #[arg(long, short)]
        mirror: Option<String>,

        /// Target directory (overrides the config file)
        #[arg(long, short)]
        dir: Option<PathBuf>,

        /// Text file with one DOI per line
        #[arg(long, conflicts_with = "results", required_unless_present = "results")]
        doi_file: Option<PathBuf>,

        /// JSON file written by `fetch --save`
        #[arg(long)]
        results: Option<PathBuf>,
    },
}

#[derive(Args, Debug)]
struct SearchArgs {
    /// Search keywords
    keyword: String,

    /// Provider id (see `providers`)
    #[arg(long, short, default_value = "pubmed")]
    provider: String,

    /// First publication year
    #[arg(long)]
    start_year: Option<String>,

    /// Last publication year
    #[arg(long)]
    end_year: Option<String>,

    /// Author filter
    #[arg(long)]
    author: Option<String>,

    /// Journal filter
    #[arg(long)]
    journal: Option<String>,

    /// Sort order
    #[arg(long, value_enum, default_value_t = SortArg::Relevance)]
    sort: SortArg,
}

impl SearchArgs {
    fn criteria(&self) -> SearchCriteria {
        SearchCriteria::new(&self.keyword)
            .years(
                self.start_year.clone().unwrap_or_default(),
                self.end_year.clone().unwrap_or_default(),
            )
            .author(self.author.clone().unwrap_or_default())
            .journal(self.journal.clone().unwrap_or_default())
            .sort_order(self.sort.into())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing based on verbosity
    let log_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let env_filter = if cli.quiet { "error" } else { log_level };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| format!("paperfetch={}", env_filter)),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = load_config(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(path) = &cli.config {
        tracing::info!("Using config file: {}", path.display());
    }

    let registry = ProviderRegistry::new();
    let format = cli.output.resolve();
    let show_progress = !cli.quiet && is_terminal();

    // Ctrl-C cancels the running batch
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupted, cancelling");
                cancel.cancel();
            }
        });
    }

    match cli.command {
        Commands::Providers => {
            for id in registry.ids() {
                let provider = registry.get_required(id)?;
                let layout = provider.layout();
                println!(
                    "{:<8} {} ({:?}, {} per page)",
                    id,
                    provider.name(),
                    layout.mode,
                    layout.page_size
                );
            }
        }

        Commands::Count(search) => {
            let provider = Arc::clone(registry.get_required(&search.provider)?);
            let query = provider.parse_query(&search.criteria());
            let fetcher =
                Fetcher::new(provider, &config.fetch, &config.http)?.with_cancellation(cancel);

            let total = match fetcher.total_count(&query).await {
                Ok(total) => total,
                Err(e) if e.kind() == ErrorKind::Unknown => {
                    tracing::warn!("Count unavailable: {}", e);
                    0
                }
                Err(e) => bail!("{}: {}", e.status_message(), e),
            };
            println!("{}", total);
        }

        Commands::Fetch { search, num, save } => {
            let records = fetch(&registry, &config, &search, num, cancel, show_progress).await?;

            if let Some(path) = save {
                let json = serde_json::to_string_pretty(&records)?;
                std::fs::write(&path, json)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                tracing::info!("Saved {} records to {}", records.len(), path.display());
            }

            match format {
                OutputFormat::Table => println!("{}", records_table(&records)),
                _ => println!("{}", serde_json::to_string_pretty(&records)?),
            }
        }

        Commands::Download {
            mirror,
            dir,
            doi_file,
            results,
        } => {
            let items = match (doi_file, results) {
                (Some(path), _) => load_doi_file(&path)?,
                (None, Some(path)) => {
                    let content = std::fs::read_to_string(&path)
                        .with_context(|| format!("Failed to read {}", path.display()))?;
                    let records: Vec<PaperDetail> = serde_json::from_str(&content)
                        .with_context(|| format!("{} is not a results file", path.display()))?;
                    records.iter().map(DownloadItem::from_detail).collect()
                }
                (None, None) => bail!("Either --doi-file or --results is required"),
            };

            let mirror = mirror
                .or_else(|| config.download.mirror_url.clone())
                .ok_or_else(|| anyhow!("No mirror given; use --mirror or set download.mirror_url"))?;
            let dir = dir.unwrap_or_else(|| config.download.default_dir.clone());

            let manager = DownloadManager::new(&mirror, &config.download, &config.http)?
                .with_cancellation(cancel.clone());
            let sink = Arc::new(ResultCollector::new(items.len()));

            let result = with_progress(
                Arc::clone(&sink),
                items.len(),
                "Downloading",
                &config.progress,
                show_progress,
                &cancel,
                manager.download_many(&items, &dir, &sink),
            )
            .await;

            let report = match result {
                Ok(report) => report,
                Err(Error::Cancelled) => bail!("Download cancelled"),
                Err(e) => return Err(e.into()),
            };

            match format {
                OutputFormat::Table => println!("{}", outcomes_table(&report)),
                _ => println!("{}", serde_json::to_string_pretty(&report)?),
            }
            eprintln!("{}", report.summary());

            let retry = report.retryable();
            if !retry.is_empty() {
                eprintln!("{} downloads timed out and can be retried", retry.len());
            }
        }
    }

    Ok(())
}

async fn fetch(
    registry: &ProviderRegistry,
    config: &Config,
    search: &SearchArgs,
    num: usize,
    cancel: CancellationToken,
    show_progress: bool,
) -> Result<Vec<PaperDetail>> {
    let provider = Arc::clone(registry.get_required(&search.provider)?);
    let query = provider.parse_query(&search.criteria());
    let fetcher =
        Fetcher::new(provider, &config.fetch, &config.http)?.with_cancellation(cancel.clone());

    let total = fetcher
        .total_count(&query)
        .await
        .map_err(|e| anyhow!("{}: {}", e.status_message(), e))?;
    let expected = num.min(total).max(1);
    tracing::info!("Found {} results, fetching {}", total, num.min(total));

    let sink = Arc::new(ResultCollector::new(num));
    let result = with_progress(
        Arc::clone(&sink),
        expected,
        "Fetching",
        &config.progress,
        show_progress,
        &cancel,
        fetcher.fetch_all(&query, num, &sink),
    )
    .await;

    match result {
        Ok(()) => Ok(sink.drain()),
        // Keep what arrived before the batch was cancelled
        Err(Error::Cancelled) => {
            let records = sink.drain();
            tracing::warn!("Fetch cancelled after {} records", records.len());
            Ok(records)
        }
        Err(e) => Err(anyhow!("{}: {}", e.status_message(), e)),
    }
}

/// Drive `work` while a spawned monitor feeds a progress bar.
///
/// A stalled batch is cancelled through `batch_cancel`.
async fn with_progress<S, F, T>(
    source: Arc<S>,
    total: usize,
    msg: &str,
    settings: &ProgressSettings,
    visible: bool,
    batch_cancel: &CancellationToken,
    work: F,
) -> T
where
    S: ProgressSource + 'static,
    F: Future<Output = T>,
{
    let (tx, mut rx) = mpsc::unbounded_channel();
    let monitor_cancel = CancellationToken::new();
    let monitor = ProgressMonitor::from_settings(settings).spawn(
        source,
        total,
        tx,
        monitor_cancel.clone(),
    );

    let bar = BatchProgress::new(total, msg, visible);
    let drive = async {
        while let Some(event) = rx.recv().await {
            if let ProgressEvent::Stalled(progress) = event {
                tracing::warn!(
                    "No progress for {:?} ({}/{}), cancelling",
                    settings.stall_timeout(),
                    progress.completed,
                    progress.total
                );
                batch_cancel.cancel();
            }
            if bar.apply(event) {
                break;
            }
        }
    };

    let (output, ()) = tokio::join!(work, drive);
    monitor_cancel.cancel();
    let _ = monitor.await;
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_version() {
        let version = env!("CARGO_PKG_VERSION");
        assert!(!version.is_empty());
        let parts: Vec<&str> = version.split('.').collect();
        assert!(parts.len() >= 2);
        assert!(parts[0].parse::<u32>().is_ok());
    }

    #[test]
    fn test_search_args_to_criteria() {
        let cli = Cli::parse_from([
            "paperfetch",
            "fetch",
            "dna human",
            "--provider",
            "acs",
            "--start-year",
            "2010",
            "--sort",
            "date-reversed",
            "-n",
            "5",
        ]);

        match cli.command {
            Commands::Fetch { search, num, .. } => {
                assert_eq!(num, 5);
                assert_eq!(search.provider, "acs");
                let criteria = search.criteria();
                assert_eq!(criteria.keyword, "dna human");
                assert_eq!(criteria.start_year, "2010");
                assert!(criteria.end_year.is_empty());
                assert_eq!(criteria.sort_order, SortOrder::DateReversed);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_download_requires_input() {
        let parsed = Cli::try_parse_from(["paperfetch", "download", "--mirror", "m.example"]);
        assert!(parsed.is_err());

        let parsed = Cli::try_parse_from([
            "paperfetch",
            "download",
            "--doi-file",
            "dois.txt",
            "--results",
            "r.json",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_output_format_resolves() {
        assert_eq!(OutputFormat::Json.resolve(), OutputFormat::Json);
        assert_eq!(OutputFormat::Table.resolve(), OutputFormat::Table);
        assert_ne!(OutputFormat::Auto.resolve(), OutputFormat::Auto);
    }
}
