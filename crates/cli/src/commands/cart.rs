//! Cart commands.
//!
//! # Usage
//!
//! ```bash
//! # Show the persisted cart
//! rs-cli show
//!
//! # Add one unit of product 3
//! rs-cli add 3
//!
//! # Set product 3 to 2 units
//! rs-cli update 3 2
//!
//! # Remove product 3
//! rs-cli remove 3
//! ```
//!
//! # Environment Variables
//!
//! - `ROCKETSHOES_API_URL` - Product/stock API base URL
//! - `ROCKETSHOES_API_TOKEN` - Optional bearer token
//! - `ROCKETSHOES_STORAGE_DIR` - Directory holding the persisted cart

use std::fmt::Write as _;
use std::sync::Arc;

use thiserror::Error;

use rocket_shoes_core::{Cart, CurrencyCode, ProductId};
use rocket_shoes_storefront::cart::{CartManager, CartOutcome, UpdateProductAmount};
use rocket_shoes_storefront::catalog::{CatalogError, HttpCatalog};
use rocket_shoes_storefront::config::{ConfigError, StorefrontConfig};
use rocket_shoes_storefront::notify::{Notice, TracingNotifier};
use rocket_shoes_storefront::storage::FileStore;

/// Errors that can occur while running a cart command.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Catalog client could not be built.
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// The operation did not change the cart.
    #[error("{0}")]
    NotApplied(Notice),
}

/// Print the persisted cart. Does not contact the catalog.
pub fn show() -> Result<(), CommandError> {
    let manager = open_manager()?;
    print_cart(&manager.cart());
    Ok(())
}

/// Add one unit of `product_id`.
pub async fn add(product_id: ProductId) -> Result<(), CommandError> {
    let manager = open_manager()?;
    report(manager.add_product(product_id).await)
}

/// Remove `product_id`'s line.
pub async fn remove(product_id: ProductId) -> Result<(), CommandError> {
    let manager = open_manager()?;
    report(manager.remove_product(product_id).await)
}

/// Set `product_id` to exactly `amount` units.
pub async fn update(product_id: ProductId, amount: i64) -> Result<(), CommandError> {
    let manager = open_manager()?;
    report(
        manager
            .update_product_amount(UpdateProductAmount { product_id, amount })
            .await,
    )
}

fn open_manager() -> Result<CartManager, CommandError> {
    let config = StorefrontConfig::from_env()?;
    let catalog = HttpCatalog::new(&config.catalog)?;
    tracing::debug!(storage_dir = %config.storage_dir.display(), "Opening cart");

    Ok(CartManager::new(
        Arc::new(catalog),
        Arc::new(FileStore::new(&config.storage_dir)),
        Arc::new(TracingNotifier),
    ))
}

fn report(outcome: CartOutcome) -> Result<(), CommandError> {
    match (outcome.cart(), outcome.notice()) {
        (Some(cart), _) => {
            print_cart(cart);
            Ok(())
        }
        (None, Some(notice)) => Err(CommandError::NotApplied(notice)),
        (None, None) => Ok(()),
    }
}

#[allow(clippy::print_stdout)]
fn print_cart(cart: &Cart) {
    print!("{}", render_cart(cart, CurrencyCode::default()));
}

/// Render the cart as a plain-text table.
pub fn render_cart(cart: &Cart, currency: CurrencyCode) -> String {
    if cart.is_empty() {
        return "Cart is empty\n".to_string();
    }

    let mut out = String::new();
    let _ = writeln!(out, "{:>6}  {:<40}  {:>5}  {:>14}", "ID", "PRODUCT", "QTY", "SUBTOTAL");
    for item in cart {
        let _ = writeln!(
            out,
            "{:>6}  {:<40}  {:>5}  {:>14}",
            item.id(),
            truncate(&item.product.title, 40),
            item.amount(),
            item.line_total().display(currency),
        );
    }
    let _ = writeln!(
        out,
        "{:>6}  {:<40}  {:>5}  {:>14}",
        "",
        "TOTAL",
        cart.item_count(),
        cart.subtotal().display(currency),
    );
    out
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut cut: String = s.chars().take(max.saturating_sub(3)).collect();
    cut.push_str("...");
    cut
}
