//! Application state shared across handlers.

use std::sync::Arc;

use crate::cart::CartManager;
use crate::catalog::{CatalogError, HttpCatalog};
use crate::config::StorefrontConfig;
use crate::notify::TracingNotifier;
use crate::storage::FileStore;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc`. The cart manager is owned
/// here and handed to handlers explicitly; there is no global cart.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    cart: CartManager,
}

impl AppState {
    /// Wrap an existing cart manager.
    #[must_use]
    pub fn new(cart: CartManager) -> Self {
        Self {
            inner: Arc::new(AppStateInner { cart }),
        }
    }

    /// Build the production state: REST catalog, file-backed cart, notices
    /// logged through `tracing`.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog HTTP client cannot be built.
    pub fn from_config(config: &StorefrontConfig) -> Result<Self, CatalogError> {
        let catalog = HttpCatalog::new(&config.catalog)?;
        let store = FileStore::new(&config.storage_dir);
        let cart = CartManager::new(Arc::new(catalog), Arc::new(store), Arc::new(TracingNotifier));
        Ok(Self::new(cart))
    }

    /// Get a reference to the cart manager.
    #[must_use]
    pub fn cart(&self) -> &CartManager {
        &self.inner.cart
    }
}
