//! Stock-checked cart state.
//!
//! [`CartManager`] owns the shopper's cart, checks every quantity change
//! against the catalog, and writes the cart through to the persistent store
//! after each successful mutation.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use rocket_shoes_storefront::cart::{CartManager, CartOutcome, UpdateProductAmount};
//!
//! let manager = CartManager::new(catalog, store, notifier);
//!
//! match manager.add_product(ProductId::new(1)).await {
//!     CartOutcome::Applied(cart) => println!("{} items", cart.item_count()),
//!     CartOutcome::OutOfStock { .. } => {}
//!     CartOutcome::Failed { error, .. } => tracing::error!("{error}"),
//! }
//! ```

mod manager;
mod outcome;

pub use manager::{CartManager, UpdateProductAmount};
pub use outcome::{CartError, CartOperation, CartOutcome};
