//! Paper detail records and rank-tagged payloads.

use serde::{Deserialize, Serialize};

/// Sentinel written into every field of a record whose fetch failed.
pub const ERROR_SENTINEL: &str = "Error";

/// Title of the single record emitted when a search has no results.
pub const NO_RESULTS_TITLE: &str = "No results";

pub const NO_TITLE: &str = "No Title";
pub const NO_AUTHORS: &str = "No Authors";
pub const NO_DATE: &str = "No Date";
pub const NO_PUBLICATION: &str = "No Publication";
pub const NO_ABSTRACT: &str = "No Abstract";

/// Bibliographic detail of one paper.
///
/// Fields are plain text. A sentinel value ("No Title", "Error", ...) means the
/// field was unavailable; it is not an error. Identity is positional: two
/// records with the same DOI fetched at different ranks are distinct entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaperDetail {
    pub title: String,

    /// Authors (semicolon-separated)
    pub authors: String,

    /// Publication date as printed by the provider
    pub date: String,

    /// Journal or venue
    pub publication: String,

    pub r#abstract: String,

    /// Digital Object Identifier, empty when unknown
    pub doi: String,

    /// Paper page URL
    pub url: String,
}

impl PaperDetail {
    /// Placeholder for an item whose page or detail request failed.
    pub fn error() -> Self {
        Self {
            title: ERROR_SENTINEL.to_string(),
            authors: ERROR_SENTINEL.to_string(),
            date: ERROR_SENTINEL.to_string(),
            publication: ERROR_SENTINEL.to_string(),
            r#abstract: ERROR_SENTINEL.to_string(),
            doi: ERROR_SENTINEL.to_string(),
            url: ERROR_SENTINEL.to_string(),
        }
    }

    /// Placeholder signaling that the provider returned nothing.
    pub fn no_results() -> Self {
        Self {
            title: NO_RESULTS_TITLE.to_string(),
            authors: String::new(),
            date: String::new(),
            publication: String::new(),
            r#abstract: String::new(),
            doi: String::new(),
            url: String::new(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.title == ERROR_SENTINEL && self.doi == ERROR_SENTINEL
    }

    pub fn is_no_results(&self) -> bool {
        self.title == NO_RESULTS_TITLE && self.doi.is_empty() && self.url.is_empty()
    }

    /// True for synthetic records that stand in for a missing result.
    pub fn is_placeholder(&self) -> bool {
        self.is_error() || self.is_no_results()
    }

    /// The DOI if it looks like one. All registered DOIs start with "10.".
    pub fn valid_doi(&self) -> Option<&str> {
        let doi = self.doi.trim();
        doi.starts_with("10.").then_some(doi)
    }

    /// Returns the author names as a vector
    pub fn author_list(&self) -> Vec<&str> {
        self.authors
            .split(';')
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .collect()
    }
}

/// Builder used by page parsers.
///
/// Fields left unset or set to blank text fall back to their "unavailable"
/// sentinel when the record is built.
#[derive(Debug, Clone, Default)]
pub struct PaperDetailBuilder {
    title: Option<String>,
    authors: Option<String>,
    date: Option<String>,
    publication: Option<String>,
    abstract_text: Option<String>,
    doi: Option<String>,
    url: Option<String>,
}

impl PaperDetailBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = non_blank(title.into());
        self
    }

    pub fn authors(mut self, authors: impl Into<String>) -> Self {
        self.authors = non_blank(authors.into());
        self
    }

    pub fn date(mut self, date: impl Into<String>) -> Self {
        self.date = non_blank(date.into());
        self
    }

    pub fn publication(mut self, publication: impl Into<String>) -> Self {
        self.publication = non_blank(publication.into());
        self
    }

    pub fn abstract_text(mut self, abstract_text: impl Into<String>) -> Self {
        self.abstract_text = non_blank(abstract_text.into());
        self
    }

    pub fn doi(mut self, doi: impl Into<String>) -> Self {
        self.doi = non_blank(doi.into());
        self
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = non_blank(url.into());
        self
    }

    pub fn build(self) -> PaperDetail {
        PaperDetail {
            title: self.title.unwrap_or_else(|| NO_TITLE.to_string()),
            authors: self.authors.unwrap_or_else(|| NO_AUTHORS.to_string()),
            date: self.date.unwrap_or_else(|| NO_DATE.to_string()),
            publication: self
                .publication
                .unwrap_or_else(|| NO_PUBLICATION.to_string()),
            r#abstract: self.abstract_text.unwrap_or_else(|| NO_ABSTRACT.to_string()),
            doi: self.doi.unwrap_or_default(),
            url: self.url.unwrap_or_default(),
        }
    }
}

fn non_blank(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// A payload tagged with the zero-based position it was requested at.
///
/// The rank is assigned once when the request is issued and is the only key
/// used to order output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedItem<T> {
    pub rank: usize,
    pub item: T,
}

impl<T> RankedItem<T> {
    pub fn new(rank: usize, item: T) -> Self {
        Self { rank, item }
    }

    pub fn into_item(self) -> T {
        self.item
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_applies_fallbacks() {
        let detail = PaperDetailBuilder::new()
            .title("  Gut microbiome and  ")
            .authors("")
            .doi("10.1126/science.2470152")
            .build();

        assert_eq!(detail.title, "Gut microbiome and");
        assert_eq!(detail.authors, NO_AUTHORS);
        assert_eq!(detail.date, NO_DATE);
        assert_eq!(detail.publication, NO_PUBLICATION);
        assert_eq!(detail.r#abstract, NO_ABSTRACT);
        assert_eq!(detail.doi, "10.1126/science.2470152");
        assert_eq!(detail.url, "");
    }

    #[test]
    fn test_placeholders() {
        let error = PaperDetail::error();
        assert!(error.is_error());
        assert!(error.is_placeholder());
        assert_eq!(error.r#abstract, ERROR_SENTINEL);
        assert_eq!(error.valid_doi(), None);

        let empty = PaperDetail::no_results();
        assert!(empty.is_no_results());
        assert!(!empty.is_error());
        assert_eq!(empty.valid_doi(), None);
    }

    #[test]
    fn test_valid_doi() {
        let detail = PaperDetailBuilder::new().doi(" 10.1/x ").build();
        assert_eq!(detail.valid_doi(), Some("10.1/x"));

        let detail = PaperDetailBuilder::new().doi("doi unavailable").build();
        assert_eq!(detail.valid_doi(), None);
    }

    #[test]
    fn test_author_list() {
        let detail = PaperDetailBuilder::new()
            .authors("John Doe; Jane Smith; ")
            .build();
        assert_eq!(detail.author_list(), vec!["John Doe", "Jane Smith"]);
    }
}
