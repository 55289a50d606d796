//! ============================================================================
//! STOREFRONT-CORE: Catalog Browsing and Cart Engine
//! ============================================================================
//! This crate handles all backend logic for the storefront client:
//! - Remote product catalog access via reqwest
//! - Paginated, filterable browse state with stale-response protection
//! - Persistent shopping cart backed by an embedded redb database
//! - Infinite scroll signalling and debounced search input
//! ============================================================================

pub mod browse;
pub mod cart;
pub mod catalog;
pub mod config;
pub mod db;
pub mod debounce;
pub mod scroll;
pub mod session;
pub mod types;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export main types for convenience
pub use types::*;
pub use browse::{BrowseSnapshot, BrowseStore, BrowseView, PageOutcome, PageRequest};
pub use cart::{CartSnapshot, CartStore};
pub use catalog::{CatalogApi, CatalogClient, ProductPage, ProductQuery};
pub use config::StorefrontConfig;
pub use db::{KvStore, LocalDb, MemoryKv};
pub use debounce::Debouncer;
pub use scroll::{LoadMore, ScrollController, ScrollStatus, Viewport};
pub use session::{Intent, IntentOutcome, Storefront};
