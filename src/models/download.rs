//! Download inputs, per-item outcomes and batch reports.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::PaperDetail;

/// One document to download: the title names the file, the DOI locates it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadItem {
    pub title: String,

    /// Empty when unknown
    pub doi: String,
}

impl DownloadItem {
    pub fn new(title: impl Into<String>, doi: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            doi: doi.into(),
        }
    }

    /// Build an item from a fetched record. Sentinel DOIs become "missing".
    pub fn from_detail(detail: &PaperDetail) -> Self {
        Self {
            title: detail.title.clone(),
            doi: detail.valid_doi().unwrap_or_default().to_string(),
        }
    }
}

impl From<&PaperDetail> for DownloadItem {
    fn from(detail: &PaperDetail) -> Self {
        Self::from_detail(detail)
    }
}

/// How a single download ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadStatus {
    /// PDF written
    Success,
    /// Mirror page loaded but carried no document reference
    NotIndexed,
    /// Mirror did not answer in time
    Timeout,
    /// Any other failure
    UnknownError,
    /// No DOI was given; no request was made
    MissingDoi,
}

impl DownloadStatus {
    pub fn is_success(self) -> bool {
        self == DownloadStatus::Success
    }

    /// Filename prefix of the diagnostic file written for this status
    pub fn file_prefix(self) -> &'static str {
        match self {
            DownloadStatus::Success | DownloadStatus::NotIndexed => "",
            DownloadStatus::Timeout => "Timeout_",
            DownloadStatus::UnknownError => "ERROR_",
            DownloadStatus::MissingDoi => "NotFound_",
        }
    }
}

impl std::fmt::Display for DownloadStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            DownloadStatus::Success => "success",
            DownloadStatus::NotIndexed => "not indexed",
            DownloadStatus::Timeout => "timeout",
            DownloadStatus::UnknownError => "error",
            DownloadStatus::MissingDoi => "missing doi",
        };
        f.write_str(text)
    }
}

/// Terminal record of one download. Exactly one exists per requested item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadOutcome {
    pub rank: usize,
    pub source_title: String,
    pub doi: String,
    pub status: DownloadStatus,

    /// File written for this item (PDF on success, `.txt` otherwise)
    pub saved_path: PathBuf,
}

/// Ordered outcomes of a `download_many` batch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DownloadReport {
    pub outcomes: Vec<DownloadOutcome>,
}

impl DownloadReport {
    /// Build a report, ordering outcomes by rank
    pub fn new(mut outcomes: Vec<DownloadOutcome>) -> Self {
        outcomes.sort_by_key(|o| o.rank);
        Self { outcomes }
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn succeeded(&self) -> usize {
        self.count(DownloadStatus::Success)
    }

    pub fn failed(&self) -> usize {
        self.len() - self.succeeded()
    }

    pub fn count(&self, status: DownloadStatus) -> usize {
        self.outcomes.iter().filter(|o| o.status == status).count()
    }

    /// Items that timed out, ready to be submitted again
    pub fn retryable(&self) -> Vec<DownloadItem> {
        self.outcomes
            .iter()
            .filter(|o| o.status == DownloadStatus::Timeout)
            .map(|o| DownloadItem::new(o.source_title.clone(), o.doi.clone()))
            .collect()
    }

    /// One-line summary for the final status message
    pub fn summary(&self) -> String {
        format!(
            "Downloaded {}/{} ({} not indexed, {} timed out, {} errors, {} without DOI)",
            self.succeeded(),
            self.len(),
            self.count(DownloadStatus::NotIndexed),
            self.count(DownloadStatus::Timeout),
            self.count(DownloadStatus::UnknownError),
            self.count(DownloadStatus::MissingDoi),
        )
    }
}
