//! Core data models for paper records, queries and downloads.

mod download;
mod paper;
mod query;

pub use download::{DownloadItem, DownloadOutcome, DownloadReport, DownloadStatus};
pub use paper::{
    PaperDetail, PaperDetailBuilder, RankedItem, ERROR_SENTINEL, NO_ABSTRACT, NO_AUTHORS,
    NO_DATE, NO_PUBLICATION, NO_RESULTS_TITLE, NO_TITLE,
};
pub use query::{PageRequest, ProviderQuery, SearchCriteria, SortOrder};
