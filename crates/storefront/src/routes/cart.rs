//! Cart route handlers.
//!
//! Every mutation answers with the cart as it stands afterwards plus the
//! notice shown to the shopper, if any. The status code tells the outcome
//! apart: 200 applied, 409 out of stock, 502 catalog failure, 500 other
//! failure.

use axum::{
    Json,
    extract::{
        Path, State,
        rejection::{JsonRejection, PathRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use rocket_shoes_core::{Cart, CartItem, CurrencyCode, ProductId};

use crate::cart::{CartError, CartOutcome, UpdateProductAmount};
use crate::error::Result;
use crate::notify::Notice;
use crate::state::AppState;

/// Cart line display data.
#[derive(Debug, Clone, Serialize)]
pub struct CartItemView {
    #[serde(flatten)]
    pub item: CartItem,
    pub price_formatted: String,
    pub subtotal: String,
}

/// Cart display data.
#[derive(Debug, Clone, Serialize)]
pub struct CartView {
    pub items: Vec<CartItemView>,
    pub item_count: u64,
    pub total: String,
}

impl CartView {
    /// Build the view with prices formatted in `currency`.
    #[must_use]
    pub fn new(cart: &Cart, currency: CurrencyCode) -> Self {
        Self {
            items: cart
                .iter()
                .map(|item| CartItemView {
                    item: item.clone(),
                    price_formatted: item.product.price.display(currency),
                    subtotal: item.line_total().display(currency),
                })
                .collect(),
            item_count: cart.item_count(),
            total: cart.subtotal().display(currency),
        }
    }
}

impl From<&Cart> for CartView {
    fn from(cart: &Cart) -> Self {
        Self::new(cart, CurrencyCode::default())
    }
}

/// Notice display data.
#[derive(Debug, Clone, Serialize)]
pub struct NoticeView {
    pub kind: Notice,
    pub message: &'static str,
}

impl From<Notice> for NoticeView {
    fn from(notice: Notice) -> Self {
        Self {
            kind: notice,
            message: notice.message(),
        }
    }
}

/// Response body for cart mutations.
#[derive(Debug, Serialize)]
pub struct CartResponse {
    pub cart: CartView,
    pub notice: Option<NoticeView>,
}

/// Cart count response body.
#[derive(Debug, Serialize)]
pub struct CartCountResponse {
    pub count: u64,
}

/// Add to cart request body.
#[derive(Debug, Deserialize)]
pub struct AddToCartRequest {
    pub product_id: ProductId,
}

/// Update amount request body.
#[derive(Debug, Deserialize)]
pub struct UpdateAmountRequest {
    pub amount: i64,
}

/// Render an outcome together with the cart it finished on.
fn outcome_response(outcome: &CartOutcome) -> Response {
    let status = match outcome {
        CartOutcome::Applied(_) => StatusCode::OK,
        CartOutcome::OutOfStock { .. } => StatusCode::CONFLICT,
        CartOutcome::Failed {
            error: CartError::Catalog(_),
            ..
        } => StatusCode::BAD_GATEWAY,
        CartOutcome::Failed { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    };

    (
        status,
        Json(CartResponse {
            cart: CartView::from(outcome.current_cart()),
            notice: outcome.notice().map(NoticeView::from),
        }),
    )
        .into_response()
}

/// Display the cart.
#[instrument(skip(state))]
pub async fn show(State(state): State<AppState>) -> Json<CartView> {
    Json(CartView::from(&state.cart().cart()))
}

/// Number of units in the cart (for the header badge).
#[instrument(skip(state))]
pub async fn count(State(state): State<AppState>) -> Json<CartCountResponse> {
    Json(CartCountResponse {
        count: state.cart().cart().item_count(),
    })
}

/// Add one unit of a product.
#[instrument(skip(state, payload))]
pub async fn add(
    State(state): State<AppState>,
    payload: std::result::Result<Json<AddToCartRequest>, JsonRejection>,
) -> Result<Response> {
    let Json(request) = payload?;
    let outcome = state.cart().add_product(request.product_id).await;
    Ok(outcome_response(&outcome))
}

/// Set a line to an exact amount.
#[instrument(skip(state, id, payload))]
pub async fn update(
    State(state): State<AppState>,
    id: std::result::Result<Path<ProductId>, PathRejection>,
    payload: std::result::Result<Json<UpdateAmountRequest>, JsonRejection>,
) -> Result<Response> {
    let Path(product_id) = id?;
    let Json(request) = payload?;
    let outcome = state
        .cart()
        .update_product_amount(UpdateProductAmount {
            product_id,
            amount: request.amount,
        })
        .await;
    Ok(outcome_response(&outcome))
}

/// Remove a product's line.
#[instrument(skip(state, id))]
pub async fn remove(
    State(state): State<AppState>,
    id: std::result::Result<Path<ProductId>, PathRejection>,
) -> Result<Response> {
    let Path(product_id) = id?;
    let outcome = state.cart().remove_product(product_id).await;
    Ok(outcome_response(&outcome))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Method, Request, header};
    use rocket_shoes_core::{Price, Product};
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;
    use crate::cart::CartManager;
    use crate::catalog::MemoryCatalog;
    use crate::notify::RecordingNotifier;
    use crate::routes::routes;
    use crate::storage::MemoryStore;

    fn app(catalog: Arc<MemoryCatalog>, store: Arc<MemoryStore>) -> axum::Router {
        let manager = CartManager::new(catalog, store, Arc::new(RecordingNotifier::new()));
        routes().with_state(AppState::new(manager))
    }

    fn catalog() -> Arc<MemoryCatalog> {
        Arc::new(
            MemoryCatalog::new()
                .with_product(
                    Product::new(
                        ProductId::new(1),
                        "Tênis de Caminhada Leve Confortável",
                        Price::from_cents(17990),
                        "https://img/1.jpg",
                    ),
                    2,
                )
                .with_product(
                    Product::new(
                        ProductId::new(2),
                        "Tênis VR Caminhada Confortável",
                        Price::from_cents(13990),
                        "https://img/2.jpg",
                    ),
                    0,
                ),
        )
    }

    async fn send(
        app: &axum::Router,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        let response = app
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_show_empty_cart() {
        let app = app(catalog(), Arc::new(MemoryStore::new()));

        let (status, body) = send(&app, Method::GET, "/cart", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["items"], serde_json::json!([]));
        assert_eq!(body["item_count"], 0);
        assert_eq!(body["total"], "R$ 0,00");
    }

    #[tokio::test]
    async fn test_add_then_show() {
        let app = app(catalog(), Arc::new(MemoryStore::new()));

        let (status, body) = send(
            &app,
            Method::POST,
            "/cart/items",
            Some(serde_json::json!({ "product_id": 1 })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["notice"].is_null());
        assert_eq!(body["cart"]["items"][0]["id"], 1);
        assert_eq!(body["cart"]["items"][0]["amount"], 1);
        assert_eq!(body["cart"]["items"][0]["price_formatted"], "R$ 179,90");

        let _ = send(
            &app,
            Method::POST,
            "/cart/items",
            Some(serde_json::json!({ "product_id": 1 })),
        )
        .await;

        let (_, cart) = send(&app, Method::GET, "/cart", None).await;
        assert_eq!(cart["items"][0]["amount"], 2);
        assert_eq!(cart["items"][0]["subtotal"], "R$ 359,80");
        assert_eq!(cart["total"], "R$ 359,80");

        let (_, count) = send(&app, Method::GET, "/cart/count", None).await;
        assert_eq!(count["count"], 2);
    }

    #[tokio::test]
    async fn test_add_out_of_stock_is_conflict() {
        let app = app(catalog(), Arc::new(MemoryStore::new()));

        let (status, body) = send(
            &app,
            Method::POST,
            "/cart/items",
            Some(serde_json::json!({ "product_id": 2 })),
        )
        .await;

        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["notice"]["kind"], "out_of_stock");
        assert_eq!(
            body["notice"]["message"],
            "Quantidade solicitada fora de estoque"
        );
        assert_eq!(body["cart"]["items"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn test_add_with_catalog_down_is_bad_gateway() {
        let catalog = catalog();
        catalog.set_offline(true);
        let app = app(catalog, Arc::new(MemoryStore::new()));

        let (status, body) = send(
            &app,
            Method::POST,
            "/cart/items",
            Some(serde_json::json!({ "product_id": 1 })),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["notice"]["kind"], "add_failed");
        assert_eq!(body["notice"]["message"], "Erro na adição do produto");
    }

    #[tokio::test]
    async fn test_add_with_malformed_body_is_bad_request() {
        let app = app(catalog(), Arc::new(MemoryStore::new()));

        let (status, body) = send(
            &app,
            Method::POST,
            "/cart/items",
            Some(serde_json::json!({ "id": 1 })),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().starts_with("Bad request"));
    }

    #[tokio::test]
    async fn test_update_amount() {
        let app = app(catalog(), Arc::new(MemoryStore::new()));
        let _ = send(
            &app,
            Method::POST,
            "/cart/items",
            Some(serde_json::json!({ "product_id": 1 })),
        )
        .await;

        let (status, body) = send(
            &app,
            Method::PATCH,
            "/cart/items/1",
            Some(serde_json::json!({ "amount": 2 })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["cart"]["items"][0]["amount"], 2);

        let (status, body) = send(
            &app,
            Method::PATCH,
            "/cart/items/1",
            Some(serde_json::json!({ "amount": 3 })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["cart"]["items"][0]["amount"], 2);
    }

    #[tokio::test]
    async fn test_update_with_bad_id_is_bad_request() {
        let app = app(catalog(), Arc::new(MemoryStore::new()));

        let (status, _) = send(
            &app,
            Method::PATCH,
            "/cart/items/abc",
            Some(serde_json::json!({ "amount": 1 })),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_remove() {
        let store = Arc::new(MemoryStore::new());
        let app = app(catalog(), store.clone());
        let _ = send(
            &app,
            Method::POST,
            "/cart/items",
            Some(serde_json::json!({ "product_id": 1 })),
        )
        .await;

        let (status, body) = send(&app, Method::DELETE, "/cart/items/1", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["cart"]["items"], serde_json::json!([]));

        let (status, _) = send(&app, Method::DELETE, "/cart/items/9", None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_remove_with_storage_down_is_internal_error() {
        let store = Arc::new(MemoryStore::new());
        let app = app(catalog(), store.clone());
        let _ = send(
            &app,
            Method::POST,
            "/cart/items",
            Some(serde_json::json!({ "product_id": 1 })),
        )
        .await;
        store.set_read_only(true);

        let (status, body) = send(&app, Method::DELETE, "/cart/items/1", None).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["notice"]["kind"], "remove_failed");
        assert_eq!(body["cart"]["items"][0]["id"], 1);
    }
}
