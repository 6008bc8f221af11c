//! Search criteria, normalized provider queries and page requests.

use serde::{Deserialize, Serialize};

/// Result ordering requested by the user
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    /// Provider's own relevance ranking
    #[default]
    Relevance,
    /// Newest first
    Date,
    /// Oldest first
    DateReversed,
}

/// Provider-independent search criteria as entered by the user.
///
/// Empty strings mean "not set".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchCriteria {
    /// Keywords, separated by spaces
    pub keyword: String,

    /// First publication year (inclusive)
    pub start_year: String,

    /// Last publication year (inclusive)
    pub end_year: String,

    /// Author filter
    pub author: String,

    /// Journal / venue filter
    pub journal: String,

    #[serde(default)]
    pub sort_order: SortOrder,
}

impl SearchCriteria {
    /// Create criteria for a keyword search
    pub fn new(keyword: impl Into<String>) -> Self {
        Self {
            keyword: keyword.into(),
            ..Default::default()
        }
    }

    /// Set the year range; either end may be empty
    pub fn years(mut self, start: impl Into<String>, end: impl Into<String>) -> Self {
        self.start_year = start.into();
        self.end_year = end.into();
        self
    }

    pub fn author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }

    pub fn journal(mut self, journal: impl Into<String>) -> Self {
        self.journal = journal.into();
        self
    }

    pub fn sort_order(mut self, order: SortOrder) -> Self {
        self.sort_order = order;
        self
    }
}

/// A provider-specific query, built once per search and never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderQuery {
    provider: String,
    params: Vec<(String, String)>,
}

impl ProviderQuery {
    pub fn new(provider: impl Into<String>, params: Vec<(String, String)>) -> Self {
        Self {
            provider: provider.into(),
            params,
        }
    }

    /// Id of the provider that produced this query
    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }

    /// Look up the first value of a parameter
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// A GET request for one page of markup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub url: String,
    pub params: Vec<(String, String)>,
}

impl PageRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            params: Vec::new(),
        }
    }

    /// Append all parameters of a query
    pub fn query(mut self, query: &ProviderQuery) -> Self {
        self.params.extend(query.params().iter().cloned());
        self
    }

    pub fn param(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.params.push((key.into(), value.to_string()));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_criteria_builder() {
        let criteria = SearchCriteria::new("dna human")
            .years("2010", "")
            .author("Smith J")
            .sort_order(SortOrder::DateReversed);

        assert_eq!(criteria.keyword, "dna human");
        assert_eq!(criteria.start_year, "2010");
        assert_eq!(criteria.end_year, "");
        assert_eq!(criteria.author, "Smith J");
        assert!(criteria.journal.is_empty());
        assert_eq!(criteria.sort_order, SortOrder::DateReversed);
    }

    #[test]
    fn test_page_request_params() {
        let query = ProviderQuery::new("pubmed", vec![("term".into(), "cancer".into())]);
        let request = PageRequest::get("https://example.com/")
            .query(&query)
            .param("page", 2);

        assert_eq!(
            request.params,
            vec![
                ("term".to_string(), "cancer".to_string()),
                ("page".to_string(), "2".to_string()),
            ]
        );
        assert_eq!(query.param("term"), Some("cancer"));
        assert_eq!(query.param("page"), None);
    }
}
