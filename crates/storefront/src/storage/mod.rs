//! Durable key-value storage for the cart.
//!
//! The cart is kept as one JSON array under [`CART_STORAGE_KEY`]. It is read
//! once at start-up and rewritten wholesale after every successful mutation.
//! There is no schema versioning: a payload that does not decode is treated
//! as an empty cart.

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use thiserror::Error;
use tracing::{debug, warn};

use rocket_shoes_core::Cart;

/// Key the serialized cart is stored under.
pub const CART_STORAGE_KEY: &str = "@RocketShoes:cart";

/// Errors that can occur when reading or writing the store.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Filesystem operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Cart could not be serialized.
    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Store refused the operation.
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// Synchronous string key-value store.
pub trait PersistentStore: Send + Sync {
    /// Read the value under `key`, `Ok(None)` if it was never written.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Write `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
}

/// Load the persisted cart.
///
/// Returns an empty cart when nothing is stored, the store cannot be read,
/// or the stored payload is not a valid cart.
pub fn load_cart(store: &dyn PersistentStore) -> Cart {
    let raw = match store.get(CART_STORAGE_KEY) {
        Ok(Some(raw)) => raw,
        Ok(None) => {
            debug!("No stored cart, starting empty");
            return Cart::new();
        }
        Err(e) => {
            warn!(error = %e, "Failed to read stored cart, starting empty");
            return Cart::new();
        }
    };

    match serde_json::from_str::<Cart>(&raw) {
        Ok(cart) => {
            debug!(items = cart.len(), "Loaded stored cart");
            cart
        }
        Err(e) => {
            warn!(error = %e, "Stored cart is invalid, starting empty");
            Cart::new()
        }
    }
}

/// Write the full cart to the store.
///
/// # Errors
///
/// Returns `StorageError` if serialization or the write fails.
pub fn save_cart(store: &dyn PersistentStore, cart: &Cart) -> Result<(), StorageError> {
    let raw = serde_json::to_string(cart)?;
    store.set(CART_STORAGE_KEY, &raw)
}
