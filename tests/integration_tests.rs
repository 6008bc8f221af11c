//! Integration tests for paperfetch
//!
//! These tests verify the provider registry and the public wiring between
//! configuration, providers and the fetcher.

use paperfetch::config::{get_config, load_config};
use paperfetch::models::{SearchCriteria, SortOrder};
use paperfetch::sources::FetchMode;
use paperfetch::{Error, Fetcher, ProviderRegistry};
use std::io::Write;

fn expected_provider_count() -> usize {
    let mut count = 0;

    if cfg!(feature = "source-pubmed") {
        count += 1;
    }
    if cfg!(feature = "source-acs") {
        count += 1;
    }

    count
}

#[test]
fn test_registry_matches_enabled_features() {
    let registry = ProviderRegistry::new();
    assert_eq!(registry.len(), expected_provider_count());

    for id in registry.ids() {
        let provider = registry.get_required(id).unwrap();
        assert_eq!(provider.id(), id);
        assert!(!provider.name().is_empty());
        assert!(provider.layout().page_size > 0);
    }
}

#[test]
fn test_unknown_provider_is_typed_error() {
    let registry = ProviderRegistry::new();
    match registry.get_required("web-of-science") {
        Err(Error::UnknownProvider(id)) => assert_eq!(id, "web-of-science"),
        other => panic!("expected UnknownProvider, got {:?}", other.map(|p| p.id().to_string())),
    }
}

#[test]
#[cfg(all(feature = "source-pubmed", feature = "source-acs"))]
fn test_bundled_provider_modes() {
    let registry = ProviderRegistry::new();

    let pubmed = registry.get_required("pubmed").unwrap();
    assert_eq!(pubmed.layout().mode, FetchMode::Itemized);
    assert_eq!(pubmed.layout().page_size, 200);

    let acs = registry.get_required("acs").unwrap();
    assert_eq!(acs.layout().mode, FetchMode::Paged);
    assert_eq!(acs.layout().page_size, 100);
}

#[test]
#[cfg(feature = "source-pubmed")]
fn test_queries_are_provider_specific() {
    let registry = ProviderRegistry::new();
    let criteria = SearchCriteria::new("sperm quality")
        .years("2019", "2021")
        .sort_order(SortOrder::Date);

    let query = registry.get_required("pubmed").unwrap().parse_query(&criteria);
    assert_eq!(query.provider(), "pubmed");
    assert_eq!(query.param("term"), Some("sperm quality AND 2019:2021[dp]"));
    assert_eq!(query.param("sort"), Some("date"));
}

#[test]
fn test_fetcher_from_loaded_config() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(file, "[fetch]\nmax_concurrency = 4\n\n[http]\ntimeout_secs = 5").unwrap();

    let config = load_config(Some(file.path())).unwrap();
    assert_eq!(config.fetch.max_concurrency, 4);
    assert_eq!(config.http.timeout_secs, 5);
    assert_eq!(config.progress, get_config().progress);

    let registry = ProviderRegistry::new();
    let first = registry.all().next().cloned();
    if let Some(provider) = first {
        let fetcher = Fetcher::new(provider, &config.fetch, &config.http).unwrap();
        assert_eq!(fetcher.state(), paperfetch::FetchState::Idle);
    }
}
