//! ============================================================================
//! Catalog Client - Remote Product API
//! ============================================================================
//! Read-only access to the catalog REST API:
//! - Paginated product listing with title and category filters
//! - Single product lookup
//! - Category listing (non-critical, failures degrade to an empty list)
//!
//! One round trip per call. No retries and no caching; callers own that.
//! ============================================================================

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::StorefrontConfig;
use crate::types::{
    is_displayable_image, normalize_image_url, Category, CategoryId, FetchError, Product,
};

/// Filters and window for a product listing
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProductQuery {
    pub offset: usize,
    pub limit: usize,
    pub category: CategoryId,
    pub title: Option<String>,
}

impl ProductQuery {
    pub fn page(offset: usize, limit: usize) -> Self {
        Self {
            offset,
            limit,
            ..Self::default()
        }
    }

    pub fn with_category(mut self, category: CategoryId) -> Self {
        self.category = category;
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Query string pairs. `title` and `categoryId` are left out entirely
    /// when they would not constrain the listing.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("offset", self.offset.to_string()),
            ("limit", self.limit.to_string()),
        ];
        if let Some(title) = self.title.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            pairs.push(("title", title.to_string()));
        }
        if let Some(id) = self.category.as_filter() {
            pairs.push(("categoryId", id.to_string()));
        }
        pairs
    }
}

/// One page of products after the image filter
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProductPage {
    pub products: Vec<Product>,
    /// How many products the catalog returned before filtering. Pagination
    /// decisions use this, not `products.len()`.
    pub received: usize,
}

impl ProductPage {
    /// Build a page from a raw catalog response, applying the image filter
    pub fn from_raw(raw: Vec<Product>) -> Self {
        let received = raw.len();
        Self {
            products: filter_valid_products(raw),
            received,
        }
    }
}

/// Seam between the stores and the network
#[async_trait]
pub trait CatalogApi: Send + Sync {
    async fn fetch_products(&self, query: &ProductQuery) -> Result<ProductPage, FetchError>;

    async fn fetch_product(&self, id: u64) -> Result<Product, FetchError>;

    async fn try_fetch_categories(&self) -> Result<Vec<Category>, FetchError>;

    /// Categories are an enhancement; a failure yields an empty list
    async fn fetch_categories(&self) -> Vec<Category> {
        match self.try_fetch_categories().await {
            Ok(categories) => categories,
            Err(e) => {
                warn!("Error fetching categories: {}", e);
                Vec::new()
            }
        }
    }
}

/// HTTP implementation of [`CatalogApi`]
#[derive(Clone)]
pub struct CatalogClient {
    client: reqwest::Client,
    base_url: String,
}

impl CatalogClient {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(concat!("storefront/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                warn!("Failed to build catalog HTTP client, using defaults without timeout: {}", e);
                reqwest::Client::new()
            });

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn from_config(config: &StorefrontConfig) -> Self {
        Self::new(&config.api_url, config.http_timeout())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&'static str, String)],
    ) -> Result<T, FetchError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("GET {} {:?}", url, query);

        let response = self
            .client
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            warn!("Catalog returned {} for {}", status, url);
            return Err(FetchError::Http {
                status: status.as_u16(),
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| FetchError::Transport(format!("Invalid catalog response: {}", e)))
    }
}

#[async_trait]
impl CatalogApi for CatalogClient {
    async fn fetch_products(&self, query: &ProductQuery) -> Result<ProductPage, FetchError> {
        let raw: Vec<Product> = self.get_json("/products", &query.query_pairs()).await?;
        let page = ProductPage::from_raw(raw);

        info!(
            "Fetched {} products at offset {} ({} kept)",
            page.received,
            query.offset,
            page.products.len()
        );
        Ok(page)
    }

    async fn fetch_product(&self, id: u64) -> Result<Product, FetchError> {
        let mut product: Product = self.get_json(&format!("/products/{}", id), &[]).await?;
        product.images = product.images.iter().map(|img| normalize_image_url(img)).collect();
        Ok(product)
    }

    async fn try_fetch_categories(&self) -> Result<Vec<Category>, FetchError> {
        let categories: Vec<Category> = self.get_json("/categories", &[]).await?;
        debug!("Fetched {} categories", categories.len());
        Ok(categories)
    }
}

/// Drop products without a single displayable image, and broken entries
/// from the image lists of the products that remain
pub fn filter_valid_products(products: Vec<Product>) -> Vec<Product> {
    products
        .into_iter()
        .filter_map(|mut product| {
            product.images = product
                .images
                .iter()
                .filter(|img| is_displayable_image(img))
                .map(|img| normalize_image_url(img))
                .collect();
            if product.images.is_empty() {
                debug!("Dropping product {} without a usable image", product.id);
                None
            } else {
                Some(product)
            }
        })
        .collect()
}

fn transport_error(e: reqwest::Error) -> FetchError {
    match e.status() {
        Some(status) => FetchError::Http {
            status: status.as_u16(),
        },
        None => FetchError::Transport(e.to_string()),
    }
}
