//! ============================================================================
//! Test Support - Fixtures and Fake Catalog
//! ============================================================================
//! In-memory catalog used by the store and session tests.
//! ============================================================================

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

use crate::catalog::{CatalogApi, ProductPage, ProductQuery};
use crate::types::{Category, CategoryId, FetchError, Product, ProductCategory};

pub fn product(id: u64, title: &str, category: u64, price: f64) -> Product {
    Product {
        id,
        title: title.to_string(),
        price,
        description: format!("{} description", title),
        category: ProductCategory {
            id: category,
            name: format!("Category {}", category),
            image: None,
        },
        images: vec![format!("https://i.imgur.com/{}.jpeg", id)],
    }
}

/// `count` products alternating between "Shirt" (category 1) and "Shoe"
/// (category 2), ids starting at 1
pub fn catalog_of(count: u64) -> Vec<Product> {
    (1..=count)
        .map(|id| {
            if id % 2 == 1 {
                product(id, &format!("Shirt {}", id), 1, 10.0)
            } else {
                product(id, &format!("Shoe {}", id), 2, 25.0)
            }
        })
        .collect()
}

/// Serves listings out of a fixed product list, with knobs for failures and
/// for holding requests in flight
pub struct FakeCatalog {
    products: Vec<Product>,
    categories: Mutex<Result<Vec<Category>, FetchError>>,
    product_failure: Mutex<Option<FetchError>>,
    held_titles: Mutex<HashMap<String, Arc<Notify>>>,
    calls: AtomicUsize,
    queries: Mutex<Vec<ProductQuery>>,
}

impl FakeCatalog {
    pub fn new(products: Vec<Product>) -> Self {
        Self {
            products,
            categories: Mutex::new(Ok(vec![
                Category {
                    id: CategoryId::Id(1),
                    name: "Clothes".to_string(),
                    image: None,
                },
                Category {
                    id: CategoryId::Id(2),
                    name: "Shoes".to_string(),
                    image: None,
                },
            ])),
            product_failure: Mutex::new(None),
            held_titles: Mutex::new(HashMap::new()),
            calls: AtomicUsize::new(0),
            queries: Mutex::new(Vec::new()),
        }
    }

    /// Every product request fails with `error` until cleared
    pub fn fail_products(&self, error: Option<FetchError>) {
        *self.product_failure.lock().unwrap() = error;
    }

    pub fn set_categories(&self, result: Result<Vec<Category>, FetchError>) {
        *self.categories.lock().unwrap() = result;
    }

    /// Requests whose title filter equals `title` wait until the returned
    /// handle is notified
    pub fn hold_title(&self, title: &str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.held_titles
            .lock()
            .unwrap()
            .insert(title.to_lowercase(), gate.clone());
        gate
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn queries(&self) -> Vec<ProductQuery> {
        self.queries.lock().unwrap().clone()
    }

    /// Yield until at least `n` product requests have arrived
    pub async fn wait_for_calls(&self, n: usize) {
        while self.calls() < n {
            tokio::task::yield_now().await;
        }
    }

    fn matching(&self, query: &ProductQuery) -> Vec<Product> {
        let title = query.title.as_deref().map(str::to_lowercase);
        self.products
            .iter()
            .filter(|p| match &title {
                Some(t) => p.title.to_lowercase().contains(t.as_str()),
                None => true,
            })
            .filter(|p| match query.category.as_filter() {
                Some(id) => p.category.id == id,
                None => true,
            })
            .skip(query.offset)
            .take(query.limit)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl CatalogApi for FakeCatalog {
    async fn fetch_products(&self, query: &ProductQuery) -> Result<ProductPage, FetchError> {
        self.queries.lock().unwrap().push(query.clone());
        let gate = query
            .title
            .as_deref()
            .and_then(|t| self.held_titles.lock().unwrap().get(&t.to_lowercase()).cloned());
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(gate) = gate {
            gate.notified().await;
        }

        let failure = self.product_failure.lock().unwrap().clone();
        if let Some(error) = failure {
            return Err(error);
        }
        Ok(ProductPage::from_raw(self.matching(query)))
    }

    async fn fetch_product(&self, id: u64) -> Result<Product, FetchError> {
        self.products
            .iter()
            .find(|p| p.id == id)
            .cloned()
            .ok_or(FetchError::Http { status: 404 })
    }

    async fn try_fetch_categories(&self) -> Result<Vec<Category>, FetchError> {
        self.categories.lock().unwrap().clone()
    }
}
