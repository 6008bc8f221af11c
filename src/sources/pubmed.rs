//! PubMed provider scraping the public web interface.
//!
//! Search pages are requested in `pmid` format, which lists up to 200 PubMed
//! identifiers per page; every identifier then gets its own detail request.
//! A search with exactly one hit is redirected by PubMed straight to the
//! article page, which therefore counts as a single result.

use chrono::Datelike;
use scraper::Html;

use super::{
    clean_text, parse_count_text, select_all_text, select_attr, select_text, FetchMode,
    PageLayout, PageParser, Provider,
};
use crate::models::{
    PageRequest, PaperDetail, PaperDetailBuilder, ProviderQuery, SearchCriteria, SortOrder,
};
use crate::Error;

const PUBMED_BASE_URL: &str = "https://pubmed.ncbi.nlm.nih.gov/";

/// Identifiers per listing page
const PUBMED_PAGE_SIZE: usize = 200;

/// Default first year of the publication date range
const DEFAULT_START_YEAR: &str = "1900";

/// PubMed provider
#[derive(Debug, Clone)]
pub struct PubMedProvider {
    base_url: String,
    parser: PubMedParser,
}

impl PubMedProvider {
    pub fn new() -> Self {
        Self::with_base_url(PUBMED_BASE_URL)
    }

    /// Point the provider at another host (mirrors, tests)
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        Self {
            base_url,
            parser: PubMedParser,
        }
    }

    /// Build the `term` expression: keyword, date range, author and journal
    /// clauses joined with AND.
    fn build_term(criteria: &SearchCriteria) -> String {
        let start = non_empty(&criteria.start_year).unwrap_or(DEFAULT_START_YEAR);
        let end = non_empty(&criteria.end_year)
            .map(str::to_string)
            .unwrap_or_else(|| (chrono::Local::now().year() + 1).to_string());

        let mut term = Vec::new();
        if let Some(keyword) = non_empty(&criteria.keyword) {
            term.push(keyword.to_string());
        }
        term.push(format!("{}:{}[dp]", start, end));
        if let Some(author) = non_empty(&criteria.author) {
            term.push(format!("{}[author]", author));
        }
        if let Some(journal) = non_empty(&criteria.journal) {
            term.push(format!("{}[journal]", journal));
        }

        term.join(" AND ")
    }
}

impl Default for PubMedProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl Provider for PubMedProvider {
    fn id(&self) -> &str {
        "pubmed"
    }

    fn name(&self) -> &str {
        "PubMed"
    }

    fn layout(&self) -> PageLayout {
        PageLayout {
            mode: FetchMode::Itemized,
            page_size: PUBMED_PAGE_SIZE,
        }
    }

    fn parse_query(&self, criteria: &SearchCriteria) -> ProviderQuery {
        let mut params = vec![("term".to_string(), Self::build_term(criteria))];

        match criteria.sort_order {
            SortOrder::Relevance => {}
            SortOrder::Date => {
                params.push(("sort".to_string(), "date".to_string()));
            }
            SortOrder::DateReversed => {
                params.push(("sort".to_string(), "date".to_string()));
                params.push(("sort_order".to_string(), "asc".to_string()));
            }
        }

        ProviderQuery::new(self.id(), params)
    }

    // The first listing page also announces the total, so counting costs no
    // extra request.
    fn count_request(&self, query: &ProviderQuery) -> PageRequest {
        self.listing_request(query, 0)
    }

    fn listing_request(&self, query: &ProviderQuery, page: usize) -> PageRequest {
        PageRequest::get(&self.base_url)
            .query(query)
            .param("format", "pmid")
            .param("size", PUBMED_PAGE_SIZE)
            .param("page", page + 1)
    }

    fn detail_request(&self, id: &str) -> PageRequest {
        PageRequest::get(format!("{}{}/", self.base_url, id))
    }

    fn parser(&self) -> &dyn PageParser {
        &self.parser
    }
}

/// Parser for PubMed search and article pages
#[derive(Debug, Clone, Copy, Default)]
pub struct PubMedParser;

impl PageParser for PubMedParser {
    fn parse_count(&self, markup: &str) -> Result<usize, Error> {
        let document = Html::parse_document(markup);
        let root = document.root_element();

        if let Some(amount) = select_text(root, "div.results-amount span.value") {
            return parse_count_text(&amount)
                .ok_or_else(|| Error::Parse(format!("Unreadable PubMed result count: {}", amount)));
        }

        // "No results were found." keeps the container but drops the value.
        if select_text(root, "div.results-amount").is_some() {
            return Ok(0);
        }

        if select_text(root, "h1.heading-title").is_some() {
            return Ok(1);
        }

        Err(Error::Parse(
            "PubMed page carries no result count".to_string(),
        ))
    }

    fn parse_identifiers(&self, markup: &str) -> Result<Vec<String>, Error> {
        let document = Html::parse_document(markup);
        let chunks = select_all_text(document.root_element(), "pre.search-results-chunk");

        Ok(chunks
            .iter()
            .flat_map(|chunk| chunk.split_whitespace())
            .filter(|id| id.chars().all(|c| c.is_ascii_digit()))
            .map(str::to_string)
            .collect())
    }

    fn parse_detail(&self, markup: &str) -> PaperDetail {
        let document = Html::parse_document(markup);
        let root = document.root_element();

        let title = select_text(root, "h1.heading-title")
            .or_else(|| select_attr(root, "meta[name='citation_title']", "content"));

        // The author list is rendered twice (inline and expanded); the first
        // one is complete.
        let authors = scraper::Selector::parse("div.authors-list")
            .ok()
            .and_then(|selector| root.select(&selector).next())
            .map(|list| {
                let mut names = select_all_text(list, "span.authors-list-item a.full-name");
                names.dedup();
                names.join("; ")
            })
            .unwrap_or_default();

        let date = select_text(root, "span.cit")
            .map(|cit| cit.split(';').next().unwrap_or_default().trim().to_string())
            .or_else(|| select_attr(root, "meta[name='citation_date']", "content"));

        let publication = select_text(root, "button#full-view-journal-trigger")
            .or_else(|| select_attr(root, "meta[name='citation_journal_title']", "content"));

        let abstract_text = select_all_text(root, "div#abstract div.abstract-content").join(" ");

        let doi = select_text(root, "span.citation-doi")
            .map(|text| clean_doi(&text))
            .or_else(|| select_attr(root, "meta[name='citation_doi']", "content"));

        let url = select_attr(root, "link[rel='canonical']", "href")
            .or_else(|| select_attr(root, "meta[property='og:url']", "content"));

        PaperDetailBuilder::new()
            .title(title.unwrap_or_default())
            .authors(authors)
            .date(date.unwrap_or_default())
            .publication(publication.unwrap_or_default())
            .abstract_text(clean_text(&abstract_text))
            .doi(doi.unwrap_or_default())
            .url(url.unwrap_or_default())
            .build()
    }
}

/// "doi: 10.1126/science.2470152." -> "10.1126/science.2470152"
fn clean_doi(text: &str) -> String {
    let text = text.trim();
    let text = text
        .strip_prefix("doi:")
        .or_else(|| text.strip_prefix("DOI:"))
        .unwrap_or(text);
    text.trim().trim_end_matches('.').to_string()
}

fn non_empty(value: &str) -> Option<&str> {
    let value = value.trim();
    (!value.is_empty()).then_some(value)
}
