//! Results of cart operations.

use thiserror::Error;

use rocket_shoes_core::{Cart, CartDataError, ProductId};

use crate::catalog::CatalogError;
use crate::notify::Notice;
use crate::storage::StorageError;

/// Why a cart operation could not be applied.
///
/// The shopper only ever sees the generic notice for the operation; this
/// type keeps the cause for logs and callers.
#[derive(Debug, Error)]
pub enum CartError {
    /// Product or stock lookup failed.
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// Writing the cart failed.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Cart transition was structurally invalid.
    #[error("Cart data error: {0}")]
    Data(#[from] CartDataError),
}

/// The mutating cart operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CartOperation {
    Add,
    Remove,
    Update,
}

impl CartOperation {
    /// Notice emitted when this operation fails for a reason other than stock.
    #[must_use]
    pub const fn failure_notice(self) -> Notice {
        match self {
            Self::Add => Notice::AddFailed,
            Self::Remove => Notice::RemoveFailed,
            Self::Update => Notice::UpdateFailed,
        }
    }
}

/// Outcome of a cart mutation.
///
/// Every variant carries the cart as it stood when the operation finished,
/// taken while the operation still held the mutation lock.
#[derive(Debug)]
#[must_use]
pub enum CartOutcome {
    /// The operation succeeded (or was a no-op); holds the cart after it.
    Applied(Cart),
    /// Not enough stock for the requested quantity; cart unchanged.
    OutOfStock { product_id: ProductId, cart: Cart },
    /// Lookup or storage failure; cart unchanged.
    Failed {
        operation: CartOperation,
        error: CartError,
        cart: Cart,
    },
}

impl CartOutcome {
    #[must_use]
    pub const fn is_applied(&self) -> bool {
        matches!(self, Self::Applied(_))
    }

    #[must_use]
    pub const fn is_out_of_stock(&self) -> bool {
        matches!(self, Self::OutOfStock { .. })
    }

    /// The cart after the operation, if it was applied.
    #[must_use]
    pub const fn cart(&self) -> Option<&Cart> {
        match self {
            Self::Applied(cart) => Some(cart),
            _ => None,
        }
    }

    /// The cart when the operation finished, whether or not it applied.
    #[must_use]
    pub const fn current_cart(&self) -> &Cart {
        match self {
            Self::Applied(cart) | Self::OutOfStock { cart, .. } | Self::Failed { cart, .. } => cart,
        }
    }

    /// The notice shown to the shopper for this outcome, if any.
    #[must_use]
    pub const fn notice(&self) -> Option<Notice> {
        match self {
            Self::Applied(_) => None,
            Self::OutOfStock { .. } => Some(Notice::OutOfStock),
            Self::Failed { operation, .. } => Some(operation.failure_notice()),
        }
    }
}
