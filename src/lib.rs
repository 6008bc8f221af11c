//! # paperfetch
//!
//! Concurrent retrieval of bibliographic metadata from academic search
//! providers, plus batch download of the referenced documents through a
//! DOI-addressed mirror.
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`models`]: Core data structures (PaperDetail, SearchCriteria, DownloadOutcome, etc.)
//! - [`sources`]: Search providers with an extensible trait-based architecture
//! - [`fetcher`]: Provider-agnostic concurrent metadata fetcher
//! - [`download`]: Mirror downloads, one file per requested document
//! - [`utils`]: HTTP client, result collector, progress monitor and stagger delays
//! - [`ui`]: Terminal progress bars and tables
//! - [`config`]: Configuration management
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use paperfetch::{Fetcher, ProviderRegistry, ResultCollector};
//! use paperfetch::config::get_config;
//! use paperfetch::models::SearchCriteria;
//!
//! # async fn run() -> Result<(), paperfetch::Error> {
//! let config = get_config();
//! let registry = ProviderRegistry::new();
//! let provider = Arc::clone(registry.get_required("pubmed")?);
//!
//! let query = provider.parse_query(&SearchCriteria::new("crispr").years("2020", ""));
//! let fetcher = Fetcher::new(provider, &config.fetch, &config.http)?;
//!
//! let sink = ResultCollector::new(50);
//! fetcher.fetch_all(&query, 50, &sink).await?;
//! for record in sink.drain() {
//!     println!("{} ({})", record.title, record.doi);
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod download;
pub mod error;
pub mod fetcher;
pub mod models;
pub mod sources;
pub mod ui;
pub mod utils;

// Re-export commonly used types
pub use download::DownloadManager;
pub use error::{Error, ErrorKind};
pub use fetcher::{FetchState, Fetcher};
pub use models::PaperDetail;
pub use sources::{Provider, ProviderRegistry};
pub use utils::{ProgressMonitor, ResultCollector};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
