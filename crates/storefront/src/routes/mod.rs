//! HTTP route handlers for the storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health                 - Health check (registered in main)
//!
//! # Cart (JSON)
//! GET    /cart                   - Cart view
//! GET    /cart/count             - Number of units in the cart
//! POST   /cart/items             - Add one unit   { "product_id": 1 }
//! PATCH  /cart/items/{id}        - Set amount     { "amount": 3 }
//! DELETE /cart/items/{id}        - Remove line
//! ```

pub mod cart;

use axum::{
    Router,
    routing::{get, patch, post},
};

use crate::state::AppState;

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show))
        .route("/count", get(cart::count))
        .route("/items", post(cart::add))
        .route("/items/{id}", patch(cart::update).delete(cart::remove))
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new().nest("/cart", cart_routes())
}
