//! ============================================================================
//! Storefront Session - Intents In, Snapshots Out
//! ============================================================================
//! Wires the catalog, browse store, cart store, scroll controller and the
//! search debouncer together. Front ends (the CLI, a UI shell) only dispatch
//! [`Intent`]s and read snapshots; they never touch the stores directly.
//!
//! Search input is debounced: a background task applies the settled text to
//! the browse store and fetches the first page for it. Category selection
//! applies immediately.
//! ============================================================================

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::browse::{BrowseSnapshot, BrowseStore, PageOutcome};
use crate::cart::{CartSnapshot, CartStore};
use crate::catalog::{CatalogApi, CatalogClient};
use crate::config::StorefrontConfig;
use crate::db::{KvStore, LocalDb};
use crate::debounce::Debouncer;
use crate::scroll::{ScrollController, ScrollStatus, Viewport};
use crate::types::{CategoryId, CheckoutReceipt, FetchError, Product};

/// Something the user did
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum Intent {
    SearchChanged(String),
    CategorySelected(CategoryId),
    AddToCart(Product),
    RemoveFromCart(u64),
    SetQuantity { id: u64, quantity: i64 },
    ClearCart,
    Checkout,
    ToggleCart,
    SetCartOpen(bool),
    Scrolled(Viewport),
    LoadMore,
    Retry,
}

#[derive(Debug, Clone, PartialEq)]
pub enum IntentOutcome {
    Applied,
    /// Nothing to do (empty cart checkout, no page to load, ...)
    Ignored,
    CheckedOut(CheckoutReceipt),
    Page(PageOutcome),
}

pub struct Storefront {
    config: StorefrontConfig,
    catalog: Arc<dyn CatalogApi>,
    browse: Arc<BrowseStore>,
    cart: Arc<RwLock<CartStore>>,
    cart_updates: watch::Receiver<CartSnapshot>,
    scroll: Arc<RwLock<ScrollController>>,
    search: Debouncer<String>,
    applied_search: watch::Receiver<String>,
    search_task: JoinHandle<()>,
}

impl Storefront {
    /// Session against the configured HTTP catalog and on-disk database
    pub fn open(config: StorefrontConfig) -> Result<Self> {
        config.validate()?;
        let storage = LocalDb::open(config.db_path.as_deref())?;
        let catalog = CatalogClient::from_config(&config);
        info!("Catalog at {}, cart in {:?}", catalog.base_url(), storage.path());
        Ok(Self::new(config, Arc::new(catalog), Arc::new(storage)))
    }

    /// Must be called inside a tokio runtime
    pub fn new(
        config: StorefrontConfig,
        catalog: Arc<dyn CatalogApi>,
        storage: Arc<dyn KvStore>,
    ) -> Self {
        let browse = Arc::new(BrowseStore::new(catalog.clone(), config.page_size));
        let cart = CartStore::load(storage);
        let cart_updates = cart.subscribe();
        let scroll = Arc::new(RwLock::new(ScrollController::new(browse.page_size())));
        let search = Debouncer::new(String::new(), config.search_debounce());

        let (applied_tx, applied_search) = watch::channel(String::new());
        let mut settled = search.subscribe();
        let search_task = {
            let browse = browse.clone();
            let scroll = scroll.clone();
            tokio::spawn(async move {
                while settled.changed().await.is_ok() {
                    let text = settled.borrow_and_update().clone();
                    browse.set_search_text(text.clone()).await;
                    scroll.write().await.release();
                    let outcome = browse.refresh().await;
                    debug!("Search {:?} applied: {:?}", text, outcome);
                    applied_tx.send_replace(text);
                }
            })
        };

        Self {
            config,
            catalog,
            browse,
            cart: Arc::new(RwLock::new(cart)),
            cart_updates,
            scroll,
            search,
            applied_search,
            search_task,
        }
    }

    pub fn config(&self) -> &StorefrontConfig {
        &self.config
    }

    /// Load the category list and the first page
    pub async fn start(&self) -> PageOutcome {
        info!("Starting storefront session");
        self.browse.load_categories().await;
        self.browse.refresh().await
    }

    pub async fn dispatch(&self, intent: Intent) -> IntentOutcome {
        debug!("Dispatching {:?}", intent);

        match intent {
            Intent::SearchChanged(text) => {
                self.search.push(text);
                IntentOutcome::Applied
            }
            Intent::CategorySelected(category) => {
                self.browse.set_category_filter(category).await;
                self.scroll.write().await.release();
                IntentOutcome::Page(self.browse.refresh().await)
            }
            Intent::AddToCart(product) => {
                self.cart.write().await.add_item(&product);
                IntentOutcome::Applied
            }
            Intent::RemoveFromCart(id) => {
                self.cart.write().await.remove_item(id);
                IntentOutcome::Applied
            }
            Intent::SetQuantity { id, quantity } => {
                self.cart.write().await.set_quantity(id, quantity);
                IntentOutcome::Applied
            }
            Intent::ClearCart => {
                self.cart.write().await.clear();
                IntentOutcome::Applied
            }
            Intent::Checkout => match self.cart.write().await.checkout() {
                Some(receipt) => IntentOutcome::CheckedOut(receipt),
                None => IntentOutcome::Ignored,
            },
            Intent::ToggleCart => {
                self.cart.write().await.toggle_visibility();
                IntentOutcome::Applied
            }
            Intent::SetCartOpen(open) => {
                self.cart.write().await.set_visibility(open);
                IntentOutcome::Applied
            }
            Intent::Scrolled(viewport) => {
                let snapshot = self.browse.snapshot().await;
                let status = ScrollStatus {
                    loading: snapshot.loading,
                    has_more: snapshot.has_more,
                    cursor: snapshot.cursor,
                };
                let signal = self.scroll.write().await.observe(viewport, status);
                if signal.is_none() {
                    return IntentOutcome::Ignored;
                }
                let outcome = self.load_more().await;
                // The load has finished by now, so the next bottom observation may fire
                self.scroll.write().await.release();
                outcome
            }
            Intent::LoadMore => self.load_more().await,
            Intent::Retry => {
                self.browse.clear_error().await;
                self.scroll.write().await.release();
                IntentOutcome::Page(self.browse.refresh().await)
            }
        }
    }

    /// Refresh only the category list
    pub async fn load_categories(&self) {
        self.browse.load_categories().await;
    }

    /// Set both filters at once and fetch the first page, skipping the search
    /// debounce. For one-shot front ends that already know the final query.
    pub async fn apply_filters(&self, search: &str, category: CategoryId) -> PageOutcome {
        self.browse.set_search_text(search).await;
        self.browse.set_category_filter(category).await;
        self.scroll.write().await.release();
        self.browse.refresh().await
    }

    async fn load_more(&self) -> IntentOutcome {
        match self.browse.load_next_page().await {
            Some(outcome) => IntentOutcome::Page(outcome),
            None => IntentOutcome::Ignored,
        }
    }

    /// Product details straight from the catalog, images normalized
    pub async fn product(&self, id: u64) -> Result<Product, FetchError> {
        self.catalog.fetch_product(id).await
    }

    pub async fn browse_snapshot(&self) -> BrowseSnapshot {
        self.browse.snapshot().await
    }

    pub fn cart_snapshot(&self) -> CartSnapshot {
        self.cart_updates.borrow().clone()
    }

    pub fn subscribe_browse(&self) -> watch::Receiver<BrowseSnapshot> {
        self.browse.subscribe()
    }

    pub fn subscribe_cart(&self) -> watch::Receiver<CartSnapshot> {
        self.cart_updates.clone()
    }

    /// Wait until the latest search input has been applied and its first
    /// page has landed
    pub async fn settle_search(&self) {
        let target = self.search.pending();
        let mut applied = self.applied_search.clone();
        while *applied.borrow_and_update() != target {
            if applied.changed().await.is_err() {
                return;
            }
        }
    }
}

impl Drop for Storefront {
    fn drop(&mut self) {
        self.search_task.abort();
    }
}
