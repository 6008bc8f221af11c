//! Mirror-based document downloads.
//!
//! A document is located by requesting `{mirror}/{doi}` and looking for the
//! embedded viewer (`iframe#pdf` or `embed#pdf`) on the landing page. Every
//! requested item ends up as exactly one file in the target directory: the
//! PDF itself, or a short `.txt` note explaining why it is missing.
//!
//! | Outcome        | File                 |
//! |----------------|----------------------|
//! | `Success`      | `<name>.pdf`         |
//! | `NotIndexed`   | `<name>.txt`         |
//! | `Timeout`      | `Timeout_<name>.txt` |
//! | `UnknownError` | `ERROR_<name>.txt`   |
//! | `MissingDoi`   | `NotFound_<name>.txt`|
//!
//! Each document gets one network attempt. Timed-out items can be collected
//! with [`DownloadReport::retryable`] and submitted again.

mod filename;

pub use filename::sanitize_filename;

use futures_util::stream::{self, StreamExt};
use scraper::Html;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::{DownloadSettings, HttpSettings};
use crate::models::{DownloadItem, DownloadOutcome, DownloadReport, DownloadStatus};
use crate::sources::select_attr;
use crate::utils::{HttpClient, ResultCollector, Stagger};
use crate::{Error, ErrorKind};

const PDF_SUFFIX: &str = ".pdf";
const NOTE_SUFFIX: &str = ".txt";

/// Downloads documents from a mirror, one file per requested item
#[derive(Debug)]
pub struct DownloadManager {
    client: HttpClient,
    mirror: Url,
    settings: DownloadSettings,
    cancel: CancellationToken,
}

impl DownloadManager {
    /// Create a manager with its own HTTP client
    pub fn new(
        mirror: &str,
        settings: &DownloadSettings,
        http: &HttpSettings,
    ) -> Result<Self, Error> {
        Self::with_client(mirror, HttpClient::with_settings(http)?, settings.clone())
    }

    pub fn with_client(
        mirror: &str,
        client: HttpClient,
        settings: DownloadSettings,
    ) -> Result<Self, Error> {
        Ok(Self {
            client,
            mirror: parse_mirror(mirror)?,
            settings,
            cancel: CancellationToken::new(),
        })
    }

    /// Use an externally owned cancellation token
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn mirror(&self) -> &Url {
        &self.mirror
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Download one document to `destination` (a `.pdf` path).
    ///
    /// The request is issued `rank × stagger_delay` after the call. Failures
    /// are reported through the outcome status; the only error is
    /// [`Error::Cancelled`].
    pub async fn download_one(
        &self,
        doi: &str,
        destination: &Path,
        rank: usize,
        stagger_delay: Duration,
    ) -> Result<DownloadOutcome, Error> {
        let title = base_name(destination);
        self.download_ranked(&title, doi, destination, rank, &Stagger::new(stagger_delay))
            .await
    }

    /// Download every item into `target_dir`, reporting each outcome into `sink`.
    ///
    /// File names come from [`sanitize_filename`] applied to the titles.
    /// Items sharing a name overwrite each other. `sink` must hold at least
    /// `items.len()` ranks, otherwise nothing is downloaded and
    /// [`Error::MissingInput`] is returned. The sink is closed when the batch
    /// ends.
    pub async fn download_many(
        &self,
        items: &[DownloadItem],
        target_dir: &Path,
        sink: &ResultCollector<DownloadOutcome>,
    ) -> Result<DownloadReport, Error> {
        if sink.capacity() < items.len() {
            sink.close();
            return Err(Error::MissingInput(format!(
                "result slots for {} items, sink holds {}",
                items.len(),
                sink.capacity()
            )));
        }
        if let Err(e) = tokio::fs::create_dir_all(target_dir).await {
            sink.close();
            return Err(e.into());
        }

        info!(
            count = items.len(),
            dir = %target_dir.display(),
            mirror = %self.mirror,
            "Starting downloads"
        );

        let stagger = Stagger::new(self.settings.stagger());
        let stagger = &stagger;
        stream::iter(items.iter().enumerate())
            .for_each_concurrent(self.settings.max_concurrency.max(1), |(rank, item)| async move {
                let path = target_dir.join(sanitize_filename(&item.title, PDF_SUFFIX));
                match self
                    .download_ranked(&item.title, &item.doi, &path, rank, stagger)
                    .await
                {
                    Ok(outcome) => {
                        sink.put(rank, outcome);
                    }
                    Err(e) => debug!(rank, error = %e, "Download not started"),
                }
            })
            .await;
        sink.close();

        if self.cancel.is_cancelled() {
            info!(completed = sink.size(), "Downloads cancelled");
            return Err(Error::Cancelled);
        }

        let report = DownloadReport::new(sink.drain());
        info!("{}", report.summary());
        Ok(report)
    }

    async fn download_ranked(
        &self,
        title: &str,
        doi: &str,
        pdf_path: &Path,
        rank: usize,
        stagger: &Stagger,
    ) -> Result<DownloadOutcome, Error> {
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let doi = doi.trim();
        let name = base_name(pdf_path);
        let outcome = |status: DownloadStatus, saved_path: PathBuf| DownloadOutcome {
            rank,
            source_title: title.to_string(),
            doi: doi.to_string(),
            status,
            saved_path,
        };

        if doi.is_empty() {
            debug!(rank, title, "No DOI, writing note");
            let path = self
                .write_note(pdf_path, DownloadStatus::MissingDoi, &format!("{}\nNot found doi", name))
                .await;
            return Ok(outcome(DownloadStatus::MissingDoi, path));
        }

        if !stagger.wait(rank, &self.cancel).await {
            return Err(Error::Cancelled);
        }

        let landing = self.landing_url(doi);
        debug!(rank, doi, url = %landing, "Downloading");

        let fetched = tokio::select! {
            _ = self.cancel.cancelled() => return Err(Error::Cancelled),
            fetched = self.fetch_document(&landing) => fetched,
        };

        let file_name = format!("{}{}", name, PDF_SUFFIX);
        let (status, path) = match fetched {
            Ok(Some(bytes)) => match tokio::fs::write(pdf_path, &bytes).await {
                Ok(()) => {
                    debug!(rank, doi, bytes = bytes.len(), "Saved document");
                    (DownloadStatus::Success, pdf_path.to_path_buf())
                }
                Err(e) => {
                    warn!(rank, doi, path = %pdf_path.display(), error = %e, "Failed to write document");
                    let note = format!("Unknown Error\n{}\nURL: {}", file_name, landing);
                    let status = DownloadStatus::UnknownError;
                    (status, self.write_note(pdf_path, status, &note).await)
                }
            },
            Ok(None) => {
                info!(rank, doi, "Not indexed by mirror");
                let host = self.mirror.host_str().unwrap_or("The mirror");
                let note = format!("{} has not yet included this paper\ndoi: {}", host, doi);
                let status = DownloadStatus::NotIndexed;
                (status, self.write_note(pdf_path, status, &note).await)
            }
            Err(e) if e.kind() == ErrorKind::Timeout => {
                warn!(rank, doi, url = %landing, "Download timed out");
                let note = format!("Connect timeout\n{}\nURL: {}", file_name, landing);
                let status = DownloadStatus::Timeout;
                (status, self.write_note(pdf_path, status, &note).await)
            }
            Err(e) => {
                warn!(rank, doi, url = %landing, error = %e, "Download failed");
                let note = format!("Unknown Error\n{}\nURL: {}", file_name, landing);
                let status = DownloadStatus::UnknownError;
                (status, self.write_note(pdf_path, status, &note).await)
            }
        };

        Ok(outcome(status, path))
    }

    fn landing_url(&self, doi: &str) -> String {
        format!("{}/{}", self.mirror.as_str().trim_end_matches('/'), doi)
    }

    /// Landing page, then the referenced document. `None` when the page
    /// carries no reference.
    async fn fetch_document(&self, landing: &str) -> Result<Option<Vec<u8>>, Error> {
        let response = self.client.client().get(landing).send().await?;
        let status = response.status();
        if status.is_server_error() {
            return Err(Error::Api(format!("{} returned status: {}", landing, status)));
        }

        let markup = response.text().await?;
        let Some(url) = find_document_reference(&markup)
            .and_then(|src| resolve_document_url(&self.mirror, &src))
        else {
            return Ok(None);
        };

        debug!(url = %url, "Document reference found");
        Ok(Some(self.client.fetch_bytes(&url).await?))
    }

    /// Write a `.txt` note next to `pdf_path` and return its path
    async fn write_note(&self, pdf_path: &Path, status: DownloadStatus, content: &str) -> PathBuf {
        let name = format!("{}{}{}", status.file_prefix(), base_name(pdf_path), NOTE_SUFFIX);
        let path = pdf_path.with_file_name(name);
        if let Err(e) = tokio::fs::write(&path, content).await {
            warn!(path = %path.display(), error = %e, "Failed to write note");
        }
        path
    }
}

/// File name without its `.pdf` suffix
fn base_name(path: &Path) -> String {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    match file_name.strip_suffix(PDF_SUFFIX) {
        Some(stem) => stem.to_string(),
        None => file_name,
    }
}

/// Parse a mirror address; a bare host gets `https://`.
pub fn parse_mirror(mirror: &str) -> Result<Url, Error> {
    let mirror = mirror.trim();
    if mirror.is_empty() {
        return Err(Error::MissingInput("mirror URL".to_string()));
    }
    if mirror.starts_with("http://") || mirror.starts_with("https://") {
        Ok(Url::parse(mirror)?)
    } else {
        Ok(Url::parse(&format!("https://{}", mirror))?)
    }
}

/// `src` of the embedded document viewer, if the page has one
fn find_document_reference(markup: &str) -> Option<String> {
    let document = Html::parse_document(markup);
    select_attr(document.root_element(), "iframe#pdf, embed#pdf", "src")
}

/// Absolute document URL for a viewer `src`, without its `#fragment`
fn resolve_document_url(mirror: &Url, src: &str) -> Option<String> {
    let src = src.split('#').next().unwrap_or_default().trim();
    if src.is_empty() {
        return None;
    }
    if src.starts_with("//") {
        return Some(format!("https:{}", src));
    }
    if src.starts_with("http://") || src.starts_with("https://") {
        return Some(src.to_string());
    }
    mirror.join(src).ok().map(String::from)
}

/// Load DOIs from a text file, one per line.
///
/// Lines that do not start with `10.` are skipped. Each DOI doubles as the
/// item title.
pub fn load_doi_file(path: &Path) -> Result<Vec<DownloadItem>, Error> {
    let content = std::fs::read_to_string(path)?;
    let items: Vec<DownloadItem> = content
        .lines()
        .map(str::trim)
        .filter(|line| line.starts_with("10."))
        .map(|doi| DownloadItem::new(doi, doi))
        .collect();

    debug!(path = %path.display(), count = items.len(), "Loaded DOI list");
    Ok(items)
}
