//! Search providers with an extensible trait-based architecture.
//!
//! A [`Provider`] turns user criteria into a [`ProviderQuery`], describes the
//! requests needed to page through its results, and hands out the
//! [`PageParser`] that understands its markup. The provider-agnostic
//! [`Fetcher`](crate::Fetcher) drives the actual requests.
//!
//! # Feature Flags
//!
//! - `pubmed` - Enable the PubMed provider (default: enabled)
//! - `acs` - Enable the ACS Publications provider (default: enabled)
//!
//! # Fetch modes
//!
//! - [`FetchMode::Paged`]: every listing page already carries full records,
//!   one request per page.
//! - [`FetchMode::Itemized`]: listing pages carry identifiers only; every
//!   identifier needs its own detail request.

#[cfg(feature = "source-acs")]
mod acs;
#[cfg(feature = "source-pubmed")]
mod pubmed;
mod registry;

#[cfg(feature = "source-acs")]
pub use acs::{AcsParser, AcsProvider};
#[cfg(feature = "source-pubmed")]
pub use pubmed::{PubMedParser, PubMedProvider};
pub use registry::ProviderRegistry;

use scraper::{ElementRef, Selector};

use crate::models::{PageRequest, PaperDetail, ProviderQuery, SearchCriteria};
use crate::Error;

/// How a provider's results are retrieved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
    /// Listing pages contain full records
    Paged,
    /// Listing pages contain identifiers, details are fetched one by one
    Itemized,
}

/// Paging layout of a provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLayout {
    pub mode: FetchMode,

    /// Records (or identifiers) per listing page
    pub page_size: usize,
}

/// Extracts structured data from a provider's raw markup.
///
/// Detail parsing never fails: fields that cannot be found fall back to their
/// "unavailable" sentinel.
pub trait PageParser: Send + Sync + std::fmt::Debug {
    /// Total number of results announced on a search page
    fn parse_count(&self, markup: &str) -> Result<usize, Error>;

    /// Full records of a listing page (paged providers)
    fn parse_records(&self, _markup: &str) -> Result<Vec<PaperDetail>, Error> {
        Err(Error::Parse(
            "Listing pages of this provider carry no records".to_string(),
        ))
    }

    /// Identifiers of a listing page (itemized providers)
    fn parse_identifiers(&self, _markup: &str) -> Result<Vec<String>, Error> {
        Err(Error::Parse(
            "Listing pages of this provider carry no identifiers".to_string(),
        ))
    }

    /// One paper from its detail page (itemized providers).
    ///
    /// Providers whose listing pages carry full records yield an error
    /// placeholder.
    fn parse_detail(&self, _markup: &str) -> PaperDetail {
        PaperDetail::error()
    }
}

/// The Provider trait defines the interface for all search providers.
///
/// # Implementing a New Provider
///
/// 1. Create a struct implementing `Provider` and a [`PageParser`] for its markup
/// 2. Map [`SearchCriteria`] onto the provider's query parameters in `parse_query`
/// 3. Describe the listing and detail requests
/// 4. Add the provider to `ProviderRegistry::new()` or register it dynamically
pub trait Provider: Send + Sync + std::fmt::Debug {
    /// Unique identifier (used for registry lookup, e.g. "pubmed")
    fn id(&self) -> &str;

    /// Human-readable name
    fn name(&self) -> &str;

    fn layout(&self) -> PageLayout;

    /// Normalize user criteria into this provider's query parameters. No I/O.
    fn parse_query(&self, criteria: &SearchCriteria) -> ProviderQuery;

    /// Request for the page announcing the total result count
    fn count_request(&self, query: &ProviderQuery) -> PageRequest;

    /// Request for the zero-based listing page `page`
    fn listing_request(&self, query: &ProviderQuery, page: usize) -> PageRequest;

    /// Request for a single record's detail page. Defaults to treating `id`
    /// as the page URL; itemized providers override it.
    fn detail_request(&self, id: &str) -> PageRequest {
        PageRequest::get(id)
    }

    fn parser(&self) -> &dyn PageParser;
}

/// Collapse runs of whitespace into single spaces
pub(crate) fn clean_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Cleaned text of the first non-empty match of `selector` below `root`
pub(crate) fn select_text(root: ElementRef<'_>, selector: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    root.select(&selector)
        .map(|elem| clean_text(&elem.text().collect::<String>()))
        .find(|text| !text.is_empty())
}

/// Cleaned text of every non-empty match of `selector` below `root`
pub(crate) fn select_all_text(root: ElementRef<'_>, selector: &str) -> Vec<String> {
    let Ok(selector) = Selector::parse(selector) else {
        return Vec::new();
    };
    root.select(&selector)
        .map(|elem| clean_text(&elem.text().collect::<String>()))
        .filter(|text| !text.is_empty())
        .collect()
}

/// Attribute of the first match of `selector` that carries it
pub(crate) fn select_attr(root: ElementRef<'_>, selector: &str, attr: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    root.select(&selector)
        .filter_map(|elem| elem.value().attr(attr))
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty())
}

/// Parse a count like "12,345" or "250 results"
pub(crate) fn parse_count_text(text: &str) -> Option<usize> {
    let digits: String = text
        .split_whitespace()
        .find(|part| part.chars().next().is_some_and(|c| c.is_ascii_digit()))?
        .chars()
        .filter(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}
