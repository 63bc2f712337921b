//! In-memory catalog for tests and offline demos.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;

use rocket_shoes_core::{Product, ProductId, Stock};

use super::{CatalogError, ProductCatalog};

/// Catalog holding products and stock levels in memory.
///
/// Stock can be changed at any time with [`MemoryCatalog::set_stock`], and the
/// whole catalog can be switched offline to simulate network failures.
#[derive(Debug, Default)]
pub struct MemoryCatalog {
    products: RwLock<HashMap<ProductId, Product>>,
    stock: RwLock<HashMap<ProductId, Stock>>,
    offline: AtomicBool,
}

impl MemoryCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a product together with its stock level.
    pub fn insert(&self, product: Product, stock: u32) {
        let id = product.id;
        self.products.write().insert(id, product);
        self.stock.write().insert(id, Stock::new(stock));
    }

    /// Builder form of [`MemoryCatalog::insert`].
    #[must_use]
    pub fn with_product(self, product: Product, stock: u32) -> Self {
        self.insert(product, stock);
        self
    }

    pub fn set_stock(&self, id: ProductId, amount: u32) {
        self.stock.write().insert(id, Stock::new(amount));
    }

    /// Make every lookup fail as if the API were unreachable.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn check_online(&self) -> Result<(), CatalogError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(CatalogError::Api {
                status: 503,
                message: "catalog offline".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ProductCatalog for MemoryCatalog {
    async fn get_product(&self, id: ProductId) -> Result<Product, CatalogError> {
        self.check_online()?;
        self.products
            .read()
            .get(&id)
            .cloned()
            .ok_or(CatalogError::NotFound(id))
    }

    async fn get_stock(&self, id: ProductId) -> Result<Stock, CatalogError> {
        self.check_online()?;
        self.stock
            .read()
            .get(&id)
            .copied()
            .ok_or(CatalogError::NotFound(id))
    }
}
