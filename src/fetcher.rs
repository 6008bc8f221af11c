//! Provider-agnostic concurrent metadata fetcher.
//!
//! The fetcher asks a [`Provider`] how to page through its results and runs
//! the requests concurrently. Every result is written into a
//! [`ResultCollector`] at the rank it was requested for, so output order never
//! depends on completion order.
//!
//! Failures are contained where they happen: a failing listing page (paged
//! providers) or detail request (itemized providers) degrades only its own
//! ranks to [`PaperDetail::error`] placeholders. Only the count lookup and the
//! identifier listing end the whole batch.

use futures_util::stream::{self, StreamExt};
use std::sync::{Arc, Mutex, PoisonError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{FetchSettings, HttpSettings};
use crate::models::{PageRequest, PaperDetail, ProviderQuery};
use crate::sources::{FetchMode, Provider};
use crate::utils::{HttpClient, ResultCollector, Stagger};
use crate::Error;

/// Lifecycle of a fetcher
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchState {
    Idle,
    CountRequested,
    CountKnown,
    Fetching,
    Completed,
    /// The count or identifier listing could not be retrieved
    Aborted,
    Cancelled,
}

/// Concurrent fetcher bound to one provider
#[derive(Debug)]
pub struct Fetcher {
    provider: Arc<dyn Provider>,
    client: HttpClient,
    settings: FetchSettings,
    cancel: CancellationToken,
    state: Mutex<FetchState>,
    total: Mutex<Option<(ProviderQuery, usize)>>,
}

impl Fetcher {
    /// Create a fetcher with its own HTTP client
    pub fn new(
        provider: Arc<dyn Provider>,
        settings: &FetchSettings,
        http: &HttpSettings,
    ) -> Result<Self, Error> {
        Ok(Self::with_client(
            provider,
            HttpClient::with_settings(http)?,
            settings.clone(),
        ))
    }

    pub fn with_client(
        provider: Arc<dyn Provider>,
        client: HttpClient,
        settings: FetchSettings,
    ) -> Self {
        Self {
            provider,
            client,
            settings,
            cancel: CancellationToken::new(),
            state: Mutex::new(FetchState::Idle),
            total: Mutex::new(None),
        }
    }

    /// Use an externally owned cancellation token
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn provider(&self) -> &Arc<dyn Provider> {
        &self.provider
    }

    pub fn state(&self) -> FetchState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    fn set_state(&self, state: FetchState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    fn cached_total(&self, query: &ProviderQuery) -> Option<usize> {
        self.total
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .filter(|(cached, _)| cached == query)
            .map(|(_, total)| *total)
    }

    fn concurrency(&self) -> usize {
        self.settings.max_concurrency.max(1)
    }

    /// GET a page unless the batch is cancelled first
    async fn fetch_page(&self, request: &PageRequest) -> Result<String, Error> {
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        tokio::select! {
            _ = self.cancel.cancelled() => Err(Error::Cancelled),
            result = self.client.fetch_text(request) => result,
        }
    }

    /// Number of results the provider announces for `query`.
    ///
    /// A timeout is reported as [`Error::Timeout`]; any other failure leaves
    /// the count unknown and the fetcher in [`FetchState::Aborted`].
    pub async fn total_count(&self, query: &ProviderQuery) -> Result<usize, Error> {
        self.set_state(FetchState::CountRequested);

        let request = self.provider.count_request(query);
        let result = match self.fetch_page(&request).await {
            Ok(markup) => self.provider.parser().parse_count(&markup),
            Err(e) => Err(e),
        };

        match result {
            Ok(total) => {
                info!(provider = self.provider.id(), total, "Result count known");
                *self.total.lock().unwrap_or_else(PoisonError::into_inner) =
                    Some((query.clone(), total));
                self.set_state(FetchState::CountKnown);
                Ok(total)
            }
            Err(Error::Cancelled) => {
                self.set_state(FetchState::Cancelled);
                Err(Error::Cancelled)
            }
            Err(e) => {
                warn!(provider = self.provider.id(), error = %e, "Count lookup failed");
                self.set_state(FetchState::Aborted);
                Err(e)
            }
        }
    }

    /// Fetch up to `num` records for `query` into `sink`.
    ///
    /// At most `min(num, total, sink.capacity())` ranks are requested. The
    /// sink is closed when the call returns, whatever the outcome.
    pub async fn fetch_all(
        &self,
        query: &ProviderQuery,
        num: usize,
        sink: &ResultCollector<PaperDetail>,
    ) -> Result<(), Error> {
        let result = self.run(query, num, sink).await;
        sink.close();

        let result = match result {
            Ok(()) if self.cancel.is_cancelled() => Err(Error::Cancelled),
            other => other,
        };
        match &result {
            Ok(()) => self.set_state(FetchState::Completed),
            Err(Error::Cancelled) => {
                info!(provider = self.provider.id(), "Fetch cancelled");
                self.set_state(FetchState::Cancelled);
            }
            Err(_) => self.set_state(FetchState::Aborted),
        }
        result
    }

    async fn run(
        &self,
        query: &ProviderQuery,
        num: usize,
        sink: &ResultCollector<PaperDetail>,
    ) -> Result<(), Error> {
        let total = match self.cached_total(query) {
            Some(total) => total,
            None => self.total_count(query).await?,
        };

        if total == 0 {
            info!(provider = self.provider.id(), "No results");
            if num > 0 {
                sink.put(0, PaperDetail::no_results());
            }
            return Ok(());
        }

        let effective = num.min(total).min(sink.capacity());
        if effective == 0 {
            return Ok(());
        }

        self.set_state(FetchState::Fetching);
        let layout = self.provider.layout();
        info!(
            provider = self.provider.id(),
            total,
            requested = num,
            effective,
            mode = ?layout.mode,
            "Fetching records"
        );

        match layout.mode {
            FetchMode::Paged => self.fetch_paged(query, effective, sink).await,
            FetchMode::Itemized if total == 1 => self.fetch_single(query, sink).await,
            FetchMode::Itemized => self.fetch_itemized(query, effective, sink).await,
        }
    }

    /// One task per listing page. A failed page becomes placeholders for its
    /// span, and so do the missing ranks of a short page that is not the last.
    async fn fetch_paged(
        &self,
        query: &ProviderQuery,
        effective: usize,
        sink: &ResultCollector<PaperDetail>,
    ) -> Result<(), Error> {
        let page_size = self.provider.layout().page_size.max(1);
        let pages = effective.div_ceil(page_size);
        let stagger = Stagger::new(self.settings.stagger());

        stream::iter(0..pages)
            .for_each_concurrent(self.concurrency(), |page| async move {
                if !stagger.wait(page, &self.cancel).await {
                    return;
                }

                let base = page * page_size;
                let span = page_size.min(effective - base);
                let request = self.provider.listing_request(query, page);

                let records = match self.fetch_page(&request).await {
                    Ok(markup) => self.provider.parser().parse_records(&markup),
                    Err(e) => Err(e),
                };

                match records {
                    Ok(records) => {
                        let got = records.len().min(span);
                        for (offset, record) in records.into_iter().take(span).enumerate() {
                            sink.put(base + offset, record);
                        }
                        if got < span {
                            if base + span < effective {
                                warn!(
                                    provider = self.provider.id(),
                                    page,
                                    expected = span,
                                    got,
                                    "Short listing page"
                                );
                                for rank in base + got..base + span {
                                    sink.put(rank, PaperDetail::error());
                                }
                            } else {
                                debug!(page, expected = span, got, "Short last listing page");
                            }
                        }
                    }
                    Err(Error::Cancelled) => {}
                    Err(e) => {
                        warn!(
                            provider = self.provider.id(),
                            page,
                            first_rank = base,
                            error = %e,
                            "Listing page failed"
                        );
                        for rank in base..base + span {
                            sink.put(rank, PaperDetail::error());
                        }
                    }
                }
            })
            .await;

        Ok(())
    }

    /// A single hit is served by the count page itself
    async fn fetch_single(
        &self,
        query: &ProviderQuery,
        sink: &ResultCollector<PaperDetail>,
    ) -> Result<(), Error> {
        let request = self.provider.count_request(query);
        match self.fetch_page(&request).await {
            Ok(markup) => {
                sink.put(0, self.provider.parser().parse_detail(&markup));
            }
            Err(Error::Cancelled) => return Err(Error::Cancelled),
            Err(e) => {
                warn!(provider = self.provider.id(), rank = 0, error = %e, "Detail request failed");
                sink.put(0, PaperDetail::error());
            }
        }
        Ok(())
    }

    /// Collect identifiers page by page, then fetch one detail page per identifier.
    ///
    /// A listing that ends before `effective` identifiers were found yields a
    /// single "No results" placeholder and no detail requests.
    async fn fetch_itemized(
        &self,
        query: &ProviderQuery,
        effective: usize,
        sink: &ResultCollector<PaperDetail>,
    ) -> Result<(), Error> {
        let ids = self.collect_identifiers(query, effective).await?;

        if ids.len() < effective {
            info!(
                provider = self.provider.id(),
                expected = effective,
                got = ids.len(),
                "Identifier listing ran short"
            );
            sink.put(0, PaperDetail::no_results());
            return Ok(());
        }

        let stagger = Stagger::new(self.settings.stagger());
        stream::iter(ids.iter().enumerate())
            .for_each_concurrent(self.concurrency(), |(rank, id)| async move {
                if !stagger.wait(rank, &self.cancel).await {
                    return;
                }

                let request = self.provider.detail_request(id);
                match self.fetch_page(&request).await {
                    Ok(markup) => {
                        sink.put(rank, self.provider.parser().parse_detail(&markup));
                    }
                    Err(Error::Cancelled) => {}
                    Err(e) => {
                        warn!(
                            provider = self.provider.id(),
                            rank,
                            id = %id,
                            error = %e,
                            "Detail request failed"
                        );
                        sink.put(rank, PaperDetail::error());
                    }
                }
            })
            .await;

        Ok(())
    }

    /// Identifier listing pages are fetched in order and stop at the first
    /// empty or short page.
    async fn collect_identifiers(
        &self,
        query: &ProviderQuery,
        effective: usize,
    ) -> Result<Vec<String>, Error> {
        let page_size = self.provider.layout().page_size.max(1);
        let pages = effective.div_ceil(page_size);
        let mut ids = Vec::with_capacity(effective);

        for page in 0..pages {
            let request = self.provider.listing_request(query, page);
            let markup = self.fetch_page(&request).await.inspect_err(|e| {
                warn!(provider = self.provider.id(), page, error = %e, "Identifier listing failed");
            })?;
            let batch = self.provider.parser().parse_identifiers(&markup)?;

            let short = batch.len() < page_size;
            debug!(page, count = batch.len(), "Identifier page");
            ids.extend(batch);
            if short {
                break;
            }
        }

        ids.truncate(effective);
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SearchCriteria;
    use crate::sources::{PageLayout, PageParser};

    /// Provider answering from a fixed local address; parsing is line based.
    #[derive(Debug)]
    struct LineProvider {
        base: String,
        mode: FetchMode,
        parser: LineParser,
    }

    #[derive(Debug)]
    struct LineParser;

    impl PageParser for LineParser {
        fn parse_count(&self, markup: &str) -> Result<usize, Error> {
            markup
                .lines()
                .next()
                .and_then(|line| line.trim().parse().ok())
                .ok_or_else(|| Error::Parse("no count".to_string()))
        }

        fn parse_records(&self, markup: &str) -> Result<Vec<PaperDetail>, Error> {
            Ok(markup
                .lines()
                .skip(1)
                .map(|title| crate::models::PaperDetailBuilder::new().title(title).build())
                .collect())
        }

        fn parse_detail(&self, markup: &str) -> PaperDetail {
            crate::models::PaperDetailBuilder::new().title(markup).build()
        }
    }

    impl Provider for LineProvider {
        fn id(&self) -> &str {
            "lines"
        }

        fn name(&self) -> &str {
            "Lines"
        }

        fn layout(&self) -> PageLayout {
            PageLayout {
                mode: self.mode,
                page_size: 2,
            }
        }

        fn parse_query(&self, criteria: &SearchCriteria) -> ProviderQuery {
            ProviderQuery::new("lines", vec![("q".to_string(), criteria.keyword.clone())])
        }

        fn count_request(&self, query: &ProviderQuery) -> PageRequest {
            self.listing_request(query, 0)
        }

        fn listing_request(&self, query: &ProviderQuery, page: usize) -> PageRequest {
            PageRequest::get(&self.base).query(query).param("page", page)
        }

        fn detail_request(&self, id: &str) -> PageRequest {
            PageRequest::get(format!("{}/{}", self.base, id))
        }

        fn parser(&self) -> &dyn PageParser {
            &self.parser
        }
    }

    fn fetcher(base: String, mode: FetchMode) -> Fetcher {
        let provider = Arc::new(LineProvider {
            base,
            mode,
            parser: LineParser,
        });
        let settings = FetchSettings {
            stagger_ms: 0,
            max_concurrency: 4,
        };
        Fetcher::with_client(provider, HttpClient::new().unwrap(), settings)
    }

    #[tokio::test]
    async fn test_fetch_all_clamps_to_total() {
        let mut server = mockito::Server::new_async().await;
        let page = server
            .mock("GET", "/")
            .match_query(mockito::Matcher::Any)
            .with_body("3\nfirst\nsecond")
            .expect_at_least(1)
            .create_async()
            .await;

        let fetcher = fetcher(server.url(), FetchMode::Paged);
        let query = fetcher.provider().parse_query(&SearchCriteria::new("x"));
        let sink = ResultCollector::new(10);

        fetcher.fetch_all(&query, 10, &sink).await.unwrap();
        page.assert_async().await;

        // Page 1 repeats the same body; only one rank of it is within the total.
        let titles: Vec<String> = sink.drain().into_iter().map(|d| d.title).collect();
        assert_eq!(titles, vec!["first", "second", "first"]);
        assert!(sink.is_closed());
        assert_eq!(fetcher.state(), FetchState::Completed);
    }

    #[tokio::test]
    async fn test_count_is_cached_per_query() {
        let mut server = mockito::Server::new_async().await;
        let count = server
            .mock("GET", "/")
            .match_query(mockito::Matcher::UrlEncoded("page".into(), "0".into()))
            .with_body("0")
            .expect(1)
            .create_async()
            .await;

        let fetcher = fetcher(server.url(), FetchMode::Paged);
        let query = fetcher.provider().parse_query(&SearchCriteria::new("x"));

        assert_eq!(fetcher.total_count(&query).await.unwrap(), 0);
        assert_eq!(fetcher.state(), FetchState::CountKnown);

        let sink = ResultCollector::new(5);
        fetcher.fetch_all(&query, 5, &sink).await.unwrap();
        count.assert_async().await;

        let records = sink.drain();
        assert_eq!(records.len(), 1);
        assert!(records[0].is_no_results());
    }

    #[tokio::test]
    async fn test_unreadable_count_aborts() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/")
            .match_query(mockito::Matcher::Any)
            .with_body("maintenance")
            .create_async()
            .await;

        let fetcher = fetcher(server.url(), FetchMode::Itemized);
        let query = fetcher.provider().parse_query(&SearchCriteria::new("x"));
        let sink = ResultCollector::new(5);

        let err = fetcher.fetch_all(&query, 5, &sink).await.unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
        assert_eq!(fetcher.state(), FetchState::Aborted);
        assert!(sink.is_closed());
        assert_eq!(sink.size(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let fetcher = fetcher("http://127.0.0.1:9".to_string(), FetchMode::Paged);
        fetcher.cancellation_token().cancel();

        let query = fetcher.provider().parse_query(&SearchCriteria::new("x"));
        let sink = ResultCollector::new(5);

        let err = fetcher.fetch_all(&query, 5, &sink).await.unwrap_err();
        assert!(matches!(err, Error::Cancelled));
        assert_eq!(fetcher.state(), FetchState::Cancelled);
        assert_eq!(sink.size(), 0);
    }
}
