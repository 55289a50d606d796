//! ============================================================================
//! Cart Store - Persistent Shopping Cart
//! ============================================================================
//! Holds the cart lines and writes the whole collection back to local storage
//! after every mutation. Total and item count are always computed from the
//! lines, never stored.
//!
//! Storage problems never break the cart: unreadable data loads as an empty
//! cart, failed writes are logged and the session carries on in memory.
//! ============================================================================

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::db::KvStore;
use crate::types::{CartItem, CheckoutReceipt, Product};

/// Storage key holding the JSON array of cart lines
pub const CART_STORAGE_KEY: &str = "cart";

/// Read-only view handed to observers
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CartSnapshot {
    pub items: Vec<CartItem>,
    pub total: f64,
    pub item_count: u64,
    pub is_open: bool,
}

pub fn cart_total(items: &[CartItem]) -> f64 {
    items.iter().map(CartItem::line_total).sum()
}

pub fn cart_item_count(items: &[CartItem]) -> u64 {
    items.iter().map(|item| u64::from(item.quantity)).sum()
}

pub struct CartStore {
    items: Vec<CartItem>,
    is_open: bool,
    storage: Arc<dyn KvStore>,
    updates: watch::Sender<CartSnapshot>,
}

impl CartStore {
    /// Build the store from whatever was persisted under [`CART_STORAGE_KEY`]
    pub fn load(storage: Arc<dyn KvStore>) -> Self {
        let items = load_items(storage.as_ref());
        info!(
            "Cart loaded: {} lines, {} items",
            items.len(),
            cart_item_count(&items)
        );

        let (updates, _) = watch::channel(CartSnapshot::default());
        let store = Self {
            items,
            is_open: false,
            storage,
            updates,
        };
        store.publish();
        store
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    /// Add one unit of `product`. Repeated adds accumulate on the same line.
    pub fn add_item(&mut self, product: &Product) {
        match self.items.iter_mut().find(|item| item.id == product.id) {
            Some(existing) => {
                existing.quantity = existing.quantity.saturating_add(1);
                debug!("Cart line {} now x{}", product.id, existing.quantity);
            }
            None => {
                self.items.push(CartItem::from_product(product));
                debug!("Cart line {} added", product.id);
            }
        }
        self.commit();
    }

    /// Remove a line. Absent ids are not an error.
    pub fn remove_item(&mut self, product_id: u64) {
        let before = self.items.len();
        self.items.retain(|item| item.id != product_id);
        if self.items.len() != before {
            debug!("Cart line {} removed", product_id);
        }
        self.commit();
    }

    /// Replace a line's quantity; zero or below removes it.
    /// Does nothing when the line does not exist.
    pub fn set_quantity(&mut self, product_id: u64, quantity: i64) {
        if !self.contains(product_id) {
            debug!("Ignoring quantity change for missing cart line {}", product_id);
            return;
        }
        if quantity <= 0 {
            self.remove_item(product_id);
            return;
        }

        let quantity = u32::try_from(quantity).unwrap_or(u32::MAX);
        if let Some(item) = self.items.iter_mut().find(|item| item.id == product_id) {
            item.quantity = quantity;
        }
        self.commit();
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.commit();
        info!("Cart cleared");
    }

    /// Simulated checkout: acknowledge and empty the cart.
    /// Returns `None` when there is nothing to check out.
    pub fn checkout(&mut self) -> Option<CheckoutReceipt> {
        if self.items.is_empty() {
            return None;
        }

        let receipt = CheckoutReceipt {
            lines: self.items.len(),
            item_count: self.item_count(),
            total: self.total(),
            completed_at: chrono::Utc::now().timestamp(),
        };
        self.clear();

        info!(
            "Checkout complete: {} items, total {:.2}",
            receipt.item_count, receipt.total
        );
        Some(receipt)
    }

    // ========================================================================
    // Visibility (not persisted)
    // ========================================================================

    pub fn toggle_visibility(&mut self) {
        self.set_visibility(!self.is_open);
    }

    pub fn set_visibility(&mut self, open: bool) {
        if self.is_open != open {
            self.is_open = open;
            self.publish();
        }
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    pub fn contains(&self, product_id: u64) -> bool {
        self.items.iter().any(|item| item.id == product_id)
    }

    pub fn total(&self) -> f64 {
        cart_total(&self.items)
    }

    pub fn item_count(&self) -> u64 {
        cart_item_count(&self.items)
    }

    pub fn is_open(&self) -> bool {
        self.is_open
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn snapshot(&self) -> CartSnapshot {
        CartSnapshot {
            items: self.items.clone(),
            total: self.total(),
            item_count: self.item_count(),
            is_open: self.is_open,
        }
    }

    /// Receiver notified after every change
    pub fn subscribe(&self) -> watch::Receiver<CartSnapshot> {
        self.updates.subscribe()
    }

    // ========================================================================
    // Persistence
    // ========================================================================

    fn commit(&mut self) {
        self.persist();
        self.publish();
    }

    fn persist(&self) {
        let payload = match serde_json::to_vec(&self.items) {
            Ok(payload) => payload,
            Err(e) => {
                error!("Failed to serialize cart: {}", e);
                return;
            }
        };
        if let Err(e) = self.storage.put(CART_STORAGE_KEY, &payload) {
            error!("Failed to save cart to local storage: {}", e);
        }
    }

    fn publish(&self) {
        self.updates.send_replace(self.snapshot());
    }
}

/// Read and sanitize persisted lines. Anything unreadable means an empty cart.
fn load_items(storage: &dyn KvStore) -> Vec<CartItem> {
    let raw = match storage.get(CART_STORAGE_KEY) {
        Ok(Some(raw)) => raw,
        Ok(None) => return Vec::new(),
        Err(e) => {
            warn!("Failed to read cart from local storage: {}", e);
            return Vec::new();
        }
    };

    let stored: Vec<CartItem> = match serde_json::from_slice(&raw) {
        Ok(items) => items,
        Err(e) => {
            warn!("Discarding unreadable cart data: {}", e);
            return Vec::new();
        }
    };

    // Lines are unique per product and never stored at zero
    let mut items: Vec<CartItem> = Vec::with_capacity(stored.len());
    for item in stored.into_iter().filter(|item| item.quantity > 0) {
        match items.iter_mut().find(|existing| existing.id == item.id) {
            Some(existing) => existing.quantity = existing.quantity.saturating_add(item.quantity),
            None => items.push(item),
        }
    }
    items
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryKv;
    use crate::types::ProductCategory;
    use anyhow::{anyhow, Result};

    fn product(id: u64, title: &str, price: f64) -> Product {
        Product {
            id,
            title: title.to_string(),
            price,
            description: String::new(),
            category: ProductCategory {
                id: 1,
                name: "Clothes".to_string(),
                image: None,
            },
            images: vec![format!("https://i.imgur.com/{}.jpeg", id)],
        }
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn empty_store() -> (Arc<MemoryKv>, CartStore) {
        let storage = Arc::new(MemoryKv::new());
        let store = CartStore::load(storage.clone());
        (storage, store)
    }

    fn assert_derived(store: &CartStore) {
        let total: f64 = store.items().iter().map(|i| i.price * f64::from(i.quantity)).sum();
        let count: u64 = store.items().iter().map(|i| u64::from(i.quantity)).sum();
        assert!(approx(store.total(), total), "total drifted from lines");
        assert_eq!(store.item_count(), count, "count drifted from lines");
    }

    /// Storage that accepts nothing
    struct BrokenKv;

    impl KvStore for BrokenKv {
        fn get(&self, _key: &str) -> Result<Option<Vec<u8>>> {
            Err(anyhow!("disk on fire"))
        }
        fn put(&self, _key: &str, _value: &[u8]) -> Result<()> {
            Err(anyhow!("disk on fire"))
        }
    }

    #[test]
    fn test_cart_arithmetic_scenario() {
        let (_storage, mut store) = empty_store();
        let x = product(1, "X", 9.99);

        store.add_item(&x);
        assert!(approx(store.total(), 9.99));
        assert_eq!(store.item_count(), 1);

        store.add_item(&x);
        assert!(approx(store.total(), 19.98));
        assert_eq!(store.item_count(), 2);

        store.set_quantity(1, 5);
        assert!(approx(store.total(), 49.95));
        assert_eq!(store.item_count(), 5);

        store.remove_item(1);
        assert!(approx(store.total(), 0.0));
        assert_eq!(store.item_count(), 0);
    }

    #[test]
    fn test_repeated_add_accumulates_on_one_line() {
        let (_storage, mut store) = empty_store();
        let p = product(3, "Shirt", 20.0);
        store.add_item(&p);
        store.add_item(&p);

        assert_eq!(store.items().len(), 1);
        assert_eq!(store.items()[0].quantity, 2);
    }

    #[test]
    fn test_set_quantity_edges() {
        let (_storage, mut store) = empty_store();
        store.add_item(&product(1, "A", 1.0));

        store.set_quantity(99, 4);
        assert_eq!(store.items().len(), 1);
        assert!(!store.contains(99));

        store.set_quantity(1, 0);
        assert!(store.is_empty());

        store.add_item(&product(2, "B", 2.0));
        store.set_quantity(2, -3);
        assert!(store.is_empty());
    }

    #[test]
    fn test_remove_absent_is_noop() {
        let (_storage, mut store) = empty_store();
        store.add_item(&product(1, "A", 1.0));
        store.remove_item(42);
        assert_eq!(store.items().len(), 1);
    }

    #[test]
    fn test_derived_fields_track_mixed_mutations() {
        let (_storage, mut store) = empty_store();
        let a = product(1, "A", 3.25);
        let b = product(2, "B", 10.0);
        let c = product(3, "C", 0.5);

        store.add_item(&a);
        assert_derived(&store);
        store.add_item(&b);
        assert_derived(&store);
        store.add_item(&a);
        assert_derived(&store);
        store.set_quantity(2, 7);
        assert_derived(&store);
        store.add_item(&c);
        assert_derived(&store);
        store.remove_item(1);
        assert_derived(&store);
        store.set_quantity(3, 0);
        assert_derived(&store);

        assert_eq!(store.item_count(), 7);
        assert!(approx(store.total(), 70.0));
    }

    #[test]
    fn test_line_snapshots_product_at_add_time() {
        let (_storage, mut store) = empty_store();
        let mut p = product(5, "Old title", 5.0);
        store.add_item(&p);

        p.title = "New title".to_string();
        p.price = 50.0;
        store.add_item(&p);

        assert_eq!(store.items()[0].title, "Old title");
        assert!(approx(store.total(), 10.0));
        assert_eq!(store.items()[0].image, "https://i.imgur.com/5.jpeg");
    }

    #[test]
    fn test_persistence_round_trip() {
        let (storage, mut store) = empty_store();
        store.add_item(&product(3, "C", 3.0));
        store.add_item(&product(1, "A", 1.5));
        store.add_item(&product(2, "B", 2.0));
        store.set_quantity(1, 4);

        let reloaded = CartStore::load(storage.clone());
        assert_eq!(reloaded.items(), store.items());
        let ids: Vec<u64> = reloaded.items().iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![3, 1, 2]);
        assert!(approx(reloaded.total(), store.total()));
    }

    #[test]
    fn test_clear_persists_empty_collection() {
        let (storage, mut store) = empty_store();
        store.add_item(&product(1, "A", 1.0));
        store.clear();

        assert_eq!(store.item_count(), 0);
        assert_eq!(storage.get(CART_STORAGE_KEY).unwrap(), Some(b"[]".to_vec()));
        assert!(CartStore::load(storage).is_empty());
    }

    #[test]
    fn test_corrupt_storage_loads_empty() {
        let storage = Arc::new(MemoryKv::with_entry(CART_STORAGE_KEY, "{not json"));
        let store = CartStore::load(storage);
        assert!(store.is_empty());
        assert_eq!(store.total(), 0.0);
    }

    #[test]
    fn test_loaded_lines_are_sanitized() {
        let raw = r#"[
            {"id": 1, "title": "A", "price": 2.0, "image": "", "quantity": 2},
            {"id": 2, "title": "B", "price": 3.0, "image": "", "quantity": 0},
            {"id": 1, "title": "A", "price": 2.0, "image": "", "quantity": 1}
        ]"#;
        let store = CartStore::load(Arc::new(MemoryKv::with_entry(CART_STORAGE_KEY, raw)));
        assert_eq!(store.items().len(), 1);
        assert_eq!(store.items()[0].quantity, 3);
        assert!(approx(store.total(), 6.0));
    }

    #[test]
    fn test_storage_failures_do_not_break_cart() {
        let mut store = CartStore::load(Arc::new(BrokenKv));
        assert!(store.is_empty());

        store.add_item(&product(1, "A", 4.0));
        store.add_item(&product(1, "A", 4.0));
        assert_eq!(store.item_count(), 2);
        assert!(approx(store.total(), 8.0));
    }

    #[test]
    fn test_checkout_clears_and_acknowledges() {
        let (storage, mut store) = empty_store();
        assert!(store.checkout().is_none());

        store.add_item(&product(1, "A", 2.5));
        store.set_quantity(1, 2);
        store.add_item(&product(2, "B", 1.0));

        let receipt = store.checkout().unwrap();
        assert_eq!(receipt.lines, 2);
        assert_eq!(receipt.item_count, 3);
        assert!(approx(receipt.total, 6.0));
        assert!(store.is_empty());
        assert!(CartStore::load(storage).is_empty());
    }

    #[test]
    fn test_visibility_is_not_persisted() {
        let (storage, mut store) = empty_store();
        store.toggle_visibility();
        assert!(store.is_open());
        store.set_visibility(false);
        assert!(!store.is_open());
        store.toggle_visibility();

        assert_eq!(storage.get(CART_STORAGE_KEY).unwrap(), None);
        assert!(!CartStore::load(storage).is_open());
    }

    #[test]
    fn test_subscribers_see_every_change() {
        let (_storage, mut store) = empty_store();
        let mut rx = store.subscribe();
        assert!(!rx.has_changed().unwrap());

        store.add_item(&product(1, "A", 1.0));
        assert!(rx.has_changed().unwrap());
        let snapshot = rx.borrow_and_update().clone();
        assert_eq!(snapshot.item_count, 1);
        assert!(approx(snapshot.total, 1.0));

        store.set_visibility(true);
        assert!(rx.borrow_and_update().is_open);
    }
}
