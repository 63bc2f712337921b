//! Product and stock lookups against the remote catalog API.
//!
//! # Architecture
//!
//! - The catalog is the source of truth for product details and stock
//! - Stock is fetched per operation and never cached
//! - [`HttpCatalog`] talks to the REST API, [`MemoryCatalog`] backs tests
//!
//! # Endpoints
//!
//! ```text
//! GET /products/{id}  -> { "id", "title", "price", "image", ... }
//! GET /stock/{id}     -> { "id", "amount" }
//! ```

mod http;
mod memory;

pub use http::HttpCatalog;
pub use memory::MemoryCatalog;

use async_trait::async_trait;
use thiserror::Error;

use rocket_shoes_core::{Product, ProductId, Stock};

/// Errors that can occur when reading from the catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// HTTP request failed (connection, timeout, body read).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned a non-success status.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Response body did not match the expected shape.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Request URL could not be built.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Product is unknown to the catalog.
    #[error("Product not found: {0}")]
    NotFound(ProductId),
}

/// Read access to product details and stock levels.
#[async_trait]
pub trait ProductCatalog: Send + Sync {
    /// Fetch product details by id.
    async fn get_product(&self, id: ProductId) -> Result<Product, CatalogError>;

    /// Fetch the current stock level for a product.
    async fn get_stock(&self, id: ProductId) -> Result<Stock, CatalogError>;
}
