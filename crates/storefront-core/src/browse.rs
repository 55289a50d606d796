//! ============================================================================
//! Browse Store - Paginated Product Listing State
//! ============================================================================
//! Owns the current filters (search text + category), the accumulated result
//! pages, the pagination cursor and the loading/error status, and drives
//! catalog fetches in response to filter changes.
//!
//! Request ordering: every page request gets a fresh token and remembers the
//! filters it was issued under. A response is applied only while its token is
//! the active one and the filters have not changed since; anything else is a
//! stale response and is dropped. Filter changes and pagination resets revoke
//! the active token.
//! ============================================================================

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{watch, RwLock};
use tracing::{debug, info, warn};

use crate::catalog::{CatalogApi, ProductPage, ProductQuery};
use crate::types::{Category, CategoryId, FetchError, Product};

/// Monotonic id handed to each page request
pub type RequestToken = u64;

/// The filter dimensions. A change to either invalidates the result set.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BrowseQuery {
    pub search_text: String,
    pub category: CategoryId,
}

impl BrowseQuery {
    pub fn to_product_query(&self, offset: usize, limit: usize) -> ProductQuery {
        let query = ProductQuery::page(offset, limit).with_category(self.category);
        let title = self.search_text.trim();
        if title.is_empty() {
            query
        } else {
            query.with_title(title)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub offset: usize,
    pub limit: usize,
    /// Replace the result set instead of appending to it
    pub is_reset: bool,
}

impl PageRequest {
    /// First page for the current filters
    pub fn first(limit: usize) -> Self {
        Self {
            offset: 0,
            limit,
            is_reset: true,
        }
    }

    pub fn next(offset: usize, limit: usize) -> Self {
        Self {
            offset,
            limit,
            is_reset: false,
        }
    }
}

/// An issued request, tagged with the state it was issued under
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageTicket {
    pub token: RequestToken,
    pub query: BrowseQuery,
    pub request: PageRequest,
}

impl PageTicket {
    pub fn product_query(&self) -> ProductQuery {
        self.query
            .to_product_query(self.request.offset, self.request.limit)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageOutcome {
    Applied { received: usize, has_more: bool },
    Failed,
    /// Filters changed (or a newer request replaced this one) while in flight
    Stale,
}

/// What the product area should primarily show
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum BrowseView {
    /// Nothing to show yet, first page in flight
    Loading,
    /// No results and the last request failed; offer a retry
    Failed(String),
    Empty,
    Results,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrowseSnapshot {
    pub query: BrowseQuery,
    pub items: Vec<Product>,
    pub categories: Vec<Category>,
    pub cursor: usize,
    pub has_more: bool,
    pub loading: bool,
    pub error: Option<String>,
    pub category_error: Option<String>,
    pub view: BrowseView,
}

/// More pages may exist only when the catalog filled the whole page
pub fn page_has_more(received: usize, limit: usize) -> bool {
    received == limit
}

/// Pure browse state and its transitions
#[derive(Debug, Clone, PartialEq)]
pub struct BrowseState {
    query: BrowseQuery,
    items: Vec<Product>,
    categories: Vec<Category>,
    cursor: usize,
    has_more: bool,
    error: Option<String>,
    category_error: Option<String>,
    active: Option<RequestToken>,
    next_token: RequestToken,
}

impl Default for BrowseState {
    fn default() -> Self {
        Self {
            query: BrowseQuery::default(),
            items: Vec::new(),
            categories: Vec::new(),
            cursor: 0,
            has_more: true,
            error: None,
            category_error: None,
            active: None,
            next_token: 1,
        }
    }
}

impl BrowseState {
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Filter transitions
    // ========================================================================

    /// Does not fetch; the caller triggers the refetch
    pub fn set_search_text(&mut self, text: impl Into<String>) {
        self.query.search_text = text.into();
        self.restart_pagination();
    }

    pub fn set_category_filter(&mut self, category: CategoryId) {
        self.query.category = category;
        self.restart_pagination();
    }

    /// Drop the result set, keep the filters
    pub fn reset_pagination(&mut self) {
        self.items.clear();
        self.restart_pagination();
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }

    fn restart_pagination(&mut self) {
        self.cursor = 0;
        self.has_more = true;
        if let Some(token) = self.active.take() {
            debug!("Request {} superseded by a filter change", token);
        }
    }

    // ========================================================================
    // Page requests
    // ========================================================================

    /// Mark a request as in flight and tag it with the current filters
    pub fn begin_page(&mut self, request: PageRequest) -> PageTicket {
        let token = self.next_token;
        self.next_token += 1;
        self.active = Some(token);
        self.error = None;

        PageTicket {
            token,
            query: self.query.clone(),
            request,
        }
    }

    /// Apply a finished request, unless it went stale while in flight
    pub fn complete_page(
        &mut self,
        ticket: &PageTicket,
        result: Result<ProductPage, FetchError>,
    ) -> PageOutcome {
        if self.active != Some(ticket.token) || self.query != ticket.query {
            debug!(
                "Discarding stale response for request {} ({:?})",
                ticket.token, ticket.query
            );
            return PageOutcome::Stale;
        }
        self.active = None;

        match result {
            Ok(page) => {
                if ticket.request.is_reset {
                    self.items = page.products;
                    self.cursor = page.received;
                } else {
                    self.items.extend(page.products);
                    self.cursor += page.received;
                }
                self.has_more = page_has_more(page.received, ticket.request.limit);
                PageOutcome::Applied {
                    received: page.received,
                    has_more: self.has_more,
                }
            }
            Err(e) => {
                warn!("Product request {} failed: {}", ticket.token, e);
                self.error = Some(e.to_string());
                PageOutcome::Failed
            }
        }
    }

    /// Replace the category list (with the "All" entry first) or, on failure,
    /// note the problem and keep what was there
    pub fn apply_categories(&mut self, result: Result<Vec<Category>, FetchError>) {
        match result {
            Ok(fetched) => {
                let mut categories = Vec::with_capacity(fetched.len() + 1);
                categories.push(Category::all());
                categories.extend(fetched.into_iter().filter(|c| !c.id.is_all()));
                self.categories = categories;
                self.category_error = None;
            }
            Err(e) => {
                warn!("Keeping {} categories after fetch failure: {}", self.categories.len(), e);
                self.category_error = Some(e.to_string());
            }
        }
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn query(&self) -> &BrowseQuery {
        &self.query
    }

    pub fn items(&self) -> &[Product] {
        &self.items
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    pub fn loading(&self) -> bool {
        self.active.is_some()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn view(&self) -> BrowseView {
        if !self.items.is_empty() {
            return BrowseView::Results;
        }
        if self.loading() {
            return BrowseView::Loading;
        }
        match &self.error {
            Some(message) => BrowseView::Failed(message.clone()),
            None => BrowseView::Empty,
        }
    }

    pub fn snapshot(&self) -> BrowseSnapshot {
        BrowseSnapshot {
            query: self.query.clone(),
            items: self.items.clone(),
            categories: self.categories.clone(),
            cursor: self.cursor,
            has_more: self.has_more,
            loading: self.loading(),
            error: self.error.clone(),
            category_error: self.category_error.clone(),
            view: self.view(),
        }
    }
}

/// Browse state shared behind a lock, wired to a catalog.
/// The lock is never held across a network call, so a filter change can land
/// while a page is still in flight.
pub struct BrowseStore {
    catalog: Arc<dyn CatalogApi>,
    page_size: usize,
    state: RwLock<BrowseState>,
    updates: watch::Sender<BrowseSnapshot>,
}

impl BrowseStore {
    pub fn new(catalog: Arc<dyn CatalogApi>, page_size: usize) -> Self {
        let state = BrowseState::new();
        let (updates, _) = watch::channel(state.snapshot());
        Self {
            catalog,
            page_size: page_size.max(1),
            state: RwLock::new(state),
            updates,
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub async fn set_search_text(&self, text: impl Into<String>) {
        let text = text.into();
        info!("Search text set to {:?}", text);
        self.mutate(|state| state.set_search_text(text)).await;
    }

    pub async fn set_category_filter(&self, category: CategoryId) {
        info!("Category filter set to {}", category);
        self.mutate(|state| state.set_category_filter(category)).await;
    }

    pub async fn reset_pagination(&self) {
        self.mutate(BrowseState::reset_pagination).await;
    }

    pub async fn clear_error(&self) {
        self.mutate(BrowseState::clear_error).await;
    }

    /// Fetch a page for the current filters
    pub async fn request_page(&self, request: PageRequest) -> PageOutcome {
        let ticket = self.mutate(|state| state.begin_page(request)).await;
        self.run(ticket).await
    }

    /// Next page at the cursor. `None` while a request is in flight or when
    /// the listing is exhausted.
    pub async fn load_next_page(&self) -> Option<PageOutcome> {
        let page_size = self.page_size;
        let ticket = self
            .mutate(|state| {
                if state.loading() || !state.has_more() {
                    return None;
                }
                Some(state.begin_page(PageRequest::next(state.cursor(), page_size)))
            })
            .await?;
        Some(self.run(ticket).await)
    }

    /// Drop the results and fetch the first page again. This is the retry
    /// action after a failure and the refetch after a filter change.
    pub async fn refresh(&self) -> PageOutcome {
        let page_size = self.page_size;
        let ticket = self
            .mutate(|state| {
                state.reset_pagination();
                state.begin_page(PageRequest::first(page_size))
            })
            .await;
        self.run(ticket).await
    }

    pub async fn load_categories(&self) {
        let result = self.catalog.try_fetch_categories().await;
        if let Ok(categories) = &result {
            debug!("Loaded {} categories", categories.len());
        }
        self.mutate(|state| state.apply_categories(result)).await;
    }

    pub async fn snapshot(&self) -> BrowseSnapshot {
        self.state.read().await.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<BrowseSnapshot> {
        self.updates.subscribe()
    }

    async fn run(&self, ticket: PageTicket) -> PageOutcome {
        let query = ticket.product_query();
        debug!("Request {} fetching {:?}", ticket.token, query);

        let result = self.catalog.fetch_products(&query).await;

        let mut state = self.state.write().await;
        let outcome = state.complete_page(&ticket, result);
        if outcome != PageOutcome::Stale {
            self.updates.send_replace(state.snapshot());
        }
        outcome
    }

    async fn mutate<R>(&self, f: impl FnOnce(&mut BrowseState) -> R) -> R {
        let mut state = self.state.write().await;
        let result = f(&mut state);
        self.updates.send_replace(state.snapshot());
        result
    }
}
