//! Catalog product and stock records.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{Price, ProductId};

/// A product as returned by `GET /products/{id}`.
///
/// Fields the storefront does not model are kept in [`Product::extra`] so
/// they survive a round trip through the stored cart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub title: String,
    pub price: Price,
    /// Image URL.
    pub image: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Product {
    /// Create a product with no extra fields.
    #[must_use]
    pub fn new(id: ProductId, title: impl Into<String>, price: Price, image: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            price,
            image: image.into(),
            extra: Map::new(),
        }
    }
}

/// Available quantity for a product, as returned by `GET /stock/{id}`.
///
/// The endpoint also echoes the product id; it is not needed and ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stock {
    pub amount: u32,
}

impl Stock {
    #[must_use]
    pub const fn new(amount: u32) -> Self {
        Self { amount }
    }

    /// Whether `requested` units can be taken from this stock.
    #[must_use]
    pub const fn covers(&self, requested: u32) -> bool {
        self.amount >= requested
    }
}
