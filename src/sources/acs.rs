//! ACS Publications provider.
//!
//! ACS search result pages already carry the full record of every hit, so
//! the provider is fetched page by page without per-item requests.

use scraper::{Html, Selector};
use tracing::debug;

use super::{
    parse_count_text, select_all_text, select_attr, select_text, FetchMode,
    PageLayout, PageParser, Provider,
};
use crate::models::{
    PageRequest, PaperDetail, PaperDetailBuilder, ProviderQuery, SearchCriteria, SortOrder,
};
use crate::Error;

const ACS_BASE_URL: &str = "https://pubs.acs.org";

const ACS_SEARCH_PATH: &str = "/action/doSearch";

/// Records per search page
const ACS_PAGE_SIZE: usize = 100;

/// ACS Publications provider
#[derive(Debug, Clone)]
pub struct AcsProvider {
    base_url: String,
    parser: AcsParser,
}

impl AcsProvider {
    pub fn new() -> Self {
        Self::with_base_url(ACS_BASE_URL)
    }

    /// Point the provider at another host (mirrors, tests)
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            parser: AcsParser {
                base_url: base_url.clone(),
            },
            base_url,
        }
    }
}

impl Default for AcsProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl Provider for AcsProvider {
    fn id(&self) -> &str {
        "acs"
    }

    fn name(&self) -> &str {
        "ACS Publications"
    }

    fn layout(&self) -> PageLayout {
        PageLayout {
            mode: FetchMode::Paged,
            page_size: ACS_PAGE_SIZE,
        }
    }

    fn parse_query(&self, criteria: &SearchCriteria) -> ProviderQuery {
        let mut params = vec![("AllField".to_string(), criteria.keyword.trim().to_string())];

        let start = criteria.start_year.trim();
        if !start.is_empty() {
            params.push(("AfterYear".to_string(), start.to_string()));
        }
        let end = criteria.end_year.trim();
        if !end.is_empty() {
            params.push(("BeforeYear".to_string(), end.to_string()));
        }

        let author = criteria.author.trim();
        if !author.is_empty() {
            params.push(("Contrib".to_string(), author.to_string()));
        }

        if !criteria.journal.trim().is_empty() {
            debug!(journal = %criteria.journal, "ACS search ignores the journal filter");
        }

        match criteria.sort_order {
            SortOrder::Relevance => {}
            SortOrder::Date => params.push(("sortBy".to_string(), "Earliest".to_string())),
            SortOrder::DateReversed => {
                params.push(("sortBy".to_string(), "Earliest_asc".to_string()))
            }
        }

        ProviderQuery::new(self.id(), params)
    }

    fn count_request(&self, query: &ProviderQuery) -> PageRequest {
        self.listing_request(query, 0)
    }

    fn listing_request(&self, query: &ProviderQuery, page: usize) -> PageRequest {
        PageRequest::get(format!("{}{}", self.base_url, ACS_SEARCH_PATH))
            .query(query)
            .param("pageSize", ACS_PAGE_SIZE)
            .param("startPage", page)
    }

    fn parser(&self) -> &dyn PageParser {
        &self.parser
    }
}

/// Parser for ACS search result pages
#[derive(Debug, Clone)]
pub struct AcsParser {
    base_url: String,
}

impl AcsParser {
    fn absolute_url(&self, href: &str) -> String {
        if href.starts_with("http://") || href.starts_with("https://") {
            href.to_string()
        } else {
            format!("{}/{}", self.base_url, href.trim_start_matches('/'))
        }
    }
}

impl Default for AcsParser {
    fn default() -> Self {
        Self {
            base_url: ACS_BASE_URL.to_string(),
        }
    }
}

impl PageParser for AcsParser {
    fn parse_count(&self, markup: &str) -> Result<usize, Error> {
        let document = Html::parse_document(markup);
        let root = document.root_element();

        match select_text(root, "span.result__count") {
            Some(count) => parse_count_text(&count)
                .ok_or_else(|| Error::Parse(format!("Unreadable ACS result count: {}", count))),
            // The counter is omitted when nothing matched
            None if select_text(root, "div.search__no-results").is_some() => {
                Ok(0)
            }
            None => Err(Error::Parse("ACS page carries no result count".to_string())),
        }
    }

    fn parse_records(&self, markup: &str) -> Result<Vec<PaperDetail>, Error> {
        let document = Html::parse_document(markup);
        let item_selector = Selector::parse("div.issue-item")
            .map_err(|e| Error::Parse(format!("Invalid selector: {:?}", e)))?;

        let records = document
            .select(&item_selector)
            .map(|item| {
                let href = select_attr(item, ".issue-item_title a", "href");
                let doi = href
                    .as_deref()
                    .and_then(|href| href.split_once("/doi/"))
                    .map(|(_, doi)| doi.trim_start_matches("abs/").trim_start_matches("full/"))
                    .map(str::to_string);

                PaperDetailBuilder::new()
                    .title(select_text(item, ".issue-item_title").unwrap_or_default())
                    .authors(
                        select_all_text(item, "ul.issue-item_loa li span.hlFld-ContribAuthor")
                            .join("; "),
                    )
                    .date(select_text(item, "span.pub-date-value").unwrap_or_default())
                    .publication(select_text(item, ".issue-item_jour-name").unwrap_or_default())
                    .abstract_text(
                        select_text(item, ".accordion__content, div.hlFld-Abstract")
                            .unwrap_or_default(),
                    )
                    .doi(doi.unwrap_or_default())
                    .url(href.map(|href| self.absolute_url(&href)).unwrap_or_default())
                    .build()
            })
            .collect();

        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NO_ABSTRACT;

    const SEARCH_PAGE: &str = r#"
        <html><body>
          <span class="result__count">1,234</span>
          <div class="issue-item">
            <h2 class="issue-item_title"><a href="/doi/10.1021/jacs.0c01234">Catalytic
              Water Splitting</a></h2>
            <ul class="issue-item_loa">
              <li><span class="hlFld-ContribAuthor">Ada Lovelace</span></li>
              <li><span class="hlFld-ContribAuthor">Alan Turing</span></li>
            </ul>
            <span class="issue-item_jour-name">Journal of the American Chemical Society</span>
            <span class="pub-date-value">March 3, 2020</span>
            <div class="accordion__content"><p>We report a catalyst.</p></div>
          </div>
          <div class="issue-item">
            <h2 class="issue-item_title"><a href="https://pubs.acs.org/doi/abs/10.1021/acs.jpcb.9b0">Second</a></h2>
          </div>
        </body></html>"#;

    #[test]
    fn test_parse_query() {
        let provider = AcsProvider::new();
        let criteria = SearchCriteria::new(" perovskite ")
            .years("2018", "")
            .author("Curie M")
            .journal("JACS")
            .sort_order(SortOrder::Date);
        let query = provider.parse_query(&criteria);

        assert_eq!(query.provider(), "acs");
        assert_eq!(query.param("AllField"), Some("perovskite"));
        assert_eq!(query.param("AfterYear"), Some("2018"));
        assert_eq!(query.param("BeforeYear"), None);
        assert_eq!(query.param("Contrib"), Some("Curie M"));
        assert_eq!(query.param("sortBy"), Some("Earliest"));
    }

    #[test]
    fn test_requests() {
        let provider = AcsProvider::with_base_url("http://127.0.0.1:9999/");
        let query = provider.parse_query(&SearchCriteria::new("x"));

        let listing = provider.listing_request(&query, 2);
        assert_eq!(listing.url, "http://127.0.0.1:9999/action/doSearch");
        assert!(listing.params.contains(&("pageSize".to_string(), "100".to_string())));
        assert!(listing.params.contains(&("startPage".to_string(), "2".to_string())));
        assert_eq!(provider.count_request(&query), provider.listing_request(&query, 0));

        assert_eq!(provider.layout().mode, FetchMode::Paged);
    }

    #[test]
    fn test_parse_count() {
        let parser = AcsParser::default();
        assert_eq!(parser.parse_count(SEARCH_PAGE).unwrap(), 1234);
        assert_eq!(
            parser
                .parse_count(r#"<div class="search__no-results">Nothing found</div>"#)
                .unwrap(),
            0
        );
        assert!(parser.parse_count("<p>maintenance</p>").is_err());
    }

    #[test]
    fn test_parse_records() {
        let records = AcsParser::default().parse_records(SEARCH_PAGE).unwrap();
        assert_eq!(records.len(), 2);

        let first = &records[0];
        assert_eq!(first.title, "Catalytic Water Splitting");
        assert_eq!(first.authors, "Ada Lovelace; Alan Turing");
        assert_eq!(first.date, "March 3, 2020");
        assert_eq!(first.publication, "Journal of the American Chemical Society");
        assert_eq!(first.r#abstract, "We report a catalyst.");
        assert_eq!(first.doi, "10.1021/jacs.0c01234");
        assert_eq!(first.url, "https://pubs.acs.org/doi/10.1021/jacs.0c01234");

        let second = &records[1];
        assert_eq!(second.doi, "10.1021/acs.jpcb.9b0");
        assert_eq!(second.url, "https://pubs.acs.org/doi/abs/10.1021/acs.jpcb.9b0");
        assert_eq!(second.r#abstract, NO_ABSTRACT);
    }

    #[test]
    fn test_parse_records_empty_page() {
        let records = AcsParser::default()
            .parse_records("<html><body></body></html>")
            .unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_search_pages_are_the_only_record_source() {
        let parser = AcsParser::default();
        assert!(parser.parse_identifiers(SEARCH_PAGE).is_err());
        assert!(parser.parse_detail(SEARCH_PAGE).is_error());
    }
}
