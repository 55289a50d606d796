//! ============================================================================
//! Core Types for the Storefront
//! ============================================================================
//! Catalog records as they arrive from the remote API, cart lines as they are
//! persisted locally, and the error type shared by every catalog call.
//! ============================================================================

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use url::Url;

/// Hosts known to serve broken placeholder images in the upstream feed
const PLACEHOLDER_IMAGE_HOSTS: &[&str] = &["placeimg.com"];

// ============================================================================
// Catalog Types
// ============================================================================

/// Category reference embedded in every product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductCategory {
    pub id: u64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

/// A product as returned by `GET /products`.
/// Extra upstream fields (slug, timestamps) are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: u64,
    pub title: String,
    pub price: f64,
    #[serde(default)]
    pub description: String,
    pub category: ProductCategory,
    #[serde(default)]
    pub images: Vec<String>,
}

impl Product {
    /// Image URLs that can actually be shown, in catalog order
    pub fn displayable_images(&self) -> impl Iterator<Item = &str> {
        self.images
            .iter()
            .map(String::as_str)
            .filter(|img| is_displayable_image(img))
    }

    pub fn has_displayable_image(&self) -> bool {
        self.displayable_images().next().is_some()
    }

    /// First displayable image, falling back to the first raw entry
    pub fn primary_image(&self) -> Option<&str> {
        self.displayable_images()
            .next()
            .or_else(|| self.images.first().map(String::as_str))
    }
}

/// Category identity: either the "no filter" sentinel or a catalog id.
/// Serialized as the string `"all"` or as a bare number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CategoryId {
    #[default]
    All,
    Id(u64),
}

impl CategoryId {
    pub fn is_all(&self) -> bool {
        matches!(self, CategoryId::All)
    }

    /// Numeric id to send upstream; `None` for the sentinel
    pub fn as_filter(&self) -> Option<u64> {
        match self {
            CategoryId::All => None,
            CategoryId::Id(id) => Some(*id),
        }
    }
}

impl fmt::Display for CategoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CategoryId::All => write!(f, "all"),
            CategoryId::Id(id) => write!(f, "{}", id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid category id '{0}': expected 'all' or a number")]
pub struct InvalidCategoryId(pub String);

impl FromStr for CategoryId {
    type Err = InvalidCategoryId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("all") {
            return Ok(CategoryId::All);
        }
        trimmed
            .parse::<u64>()
            .map(CategoryId::Id)
            .map_err(|_| InvalidCategoryId(s.to_string()))
    }
}

impl From<u64> for CategoryId {
    fn from(id: u64) -> Self {
        CategoryId::Id(id)
    }
}

impl Serialize for CategoryId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            CategoryId::All => serializer.serialize_str("all"),
            CategoryId::Id(id) => serializer.serialize_u64(*id),
        }
    }
}

impl<'de> Deserialize<'de> for CategoryId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(u64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Number(id) => Ok(CategoryId::Id(id)),
            Raw::Text(text) => text.parse().map_err(serde::de::Error::custom),
        }
    }
}

/// A category as returned by `GET /categories`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl Category {
    /// The synthetic "no filter" entry shown first in the category bar
    pub fn all() -> Self {
        Self {
            id: CategoryId::All,
            name: "All".to_string(),
            image: None,
        }
    }
}

// ============================================================================
// Cart Types
// ============================================================================

/// A single cart line. Snapshotted from a product when first added; later
/// catalog changes never touch it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    pub id: u64,
    pub title: String,
    pub price: f64,
    #[serde(default)]
    pub image: String,
    pub quantity: u32,
}

impl CartItem {
    pub fn from_product(product: &Product) -> Self {
        Self {
            id: product.id,
            title: product.title.clone(),
            price: product.price,
            image: product.primary_image().unwrap_or_default().to_string(),
            quantity: 1,
        }
    }

    pub fn line_total(&self) -> f64 {
        self.price * f64::from(self.quantity)
    }
}

/// Acknowledgement returned by a simulated checkout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckoutReceipt {
    /// Number of distinct lines that were in the cart
    pub lines: usize,
    pub item_count: u64,
    pub total: f64,
    pub completed_at: i64,
}

// ============================================================================
// Errors
// ============================================================================

/// Failure of a single catalog round trip
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum FetchError {
    #[error("HTTP error! status: {status}")]
    Http { status: u16 },

    #[error("Failed to reach the catalog: {0}")]
    Transport(String),
}

impl FetchError {
    /// HTTP status, when the server answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::Http { status } => Some(*status),
            FetchError::Transport(_) => None,
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Strip the wrapping the upstream feed sometimes leaves around image URLs,
/// e.g. `["https://i.imgur.com/x.jpeg"]`
pub fn normalize_image_url(raw: &str) -> String {
    raw.trim()
        .trim_matches(|c: char| matches!(c, '[' | ']' | '"' | '\''))
        .trim()
        .to_string()
}

/// Absolute http(s) URL, not served by a placeholder host
pub fn is_displayable_image(raw: &str) -> bool {
    let candidate = normalize_image_url(raw);
    let Ok(parsed) = Url::parse(&candidate) else {
        return false;
    };
    if !matches!(parsed.scheme(), "http" | "https") {
        return false;
    }
    match parsed.host_str() {
        Some(host) => !PLACEHOLDER_IMAGE_HOSTS
            .iter()
            .any(|blocked| host == *blocked || host.ends_with(&format!(".{}", blocked))),
        None => false,
    }
}

/// Format a price as US dollars, e.g. `$1,234.50`
pub fn format_price(amount: f64) -> String {
    let cents = (amount.abs() * 100.0).round() as u64;
    let dollars = (cents / 100).to_string();
    let mut grouped = String::with_capacity(dollars.len() + dollars.len() / 3);
    for (i, ch) in dollars.chars().enumerate() {
        if i > 0 && (dollars.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    let sign = if amount < 0.0 && cents > 0 { "-" } else { "" };
    format!("{}${}.{:02}", sign, grouped, cents % 100)
}
