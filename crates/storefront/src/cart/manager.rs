//! The cart manager.

use std::sync::Arc;

use parking_lot::RwLock;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument};

use rocket_shoes_core::{Cart, ProductId};

use super::{CartError, CartOperation, CartOutcome};
use crate::catalog::{CatalogError, ProductCatalog};
use crate::notify::{Notice, Notifier};
use crate::storage::{self, PersistentStore, StorageError};

/// Request to set a cart line to an exact amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct UpdateProductAmount {
    pub product_id: ProductId,
    /// Values of 0 or less are ignored.
    pub amount: i64,
}

/// Result of the check phase of a mutation, before anything is committed.
enum Plan {
    Commit(Cart),
    OutOfStock,
}

/// Owns the shopper's cart.
///
/// All mutations run one at a time: the mutation lock is held across the
/// catalog lookups, the stock check, and the write, so overlapping calls can
/// never act on a stale cart. [`CartManager::cart`] does not wait for that
/// lock and always returns the last committed cart.
pub struct CartManager {
    catalog: Arc<dyn ProductCatalog>,
    store: Arc<dyn PersistentStore>,
    notifier: Arc<dyn Notifier>,
    cart: RwLock<Cart>,
    mutation: Mutex<()>,
}

impl CartManager {
    /// Create a manager, loading the cart from `store`.
    ///
    /// A missing or unreadable stored cart starts the session empty.
    pub fn new(
        catalog: Arc<dyn ProductCatalog>,
        store: Arc<dyn PersistentStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let cart = storage::load_cart(store.as_ref());
        info!(items = cart.len(), units = cart.item_count(), "Cart loaded");

        Self {
            catalog,
            store,
            notifier,
            cart: RwLock::new(cart),
            mutation: Mutex::new(()),
        }
    }

    /// Snapshot of the current cart.
    #[must_use]
    pub fn cart(&self) -> Cart {
        self.cart.read().clone()
    }

    /// Add one unit of a product.
    ///
    /// Appends a new line with amount 1, or increments the existing line in
    /// place, provided the catalog has stock for the resulting amount.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn add_product(&self, product_id: ProductId) -> CartOutcome {
        let _guard = self.mutation.lock().await;
        let plan = self.plan_add(product_id).await;
        self.finish(CartOperation::Add, product_id, plan)
    }

    /// Remove a product's line. Removing a product that is not in the cart
    /// is not an error.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn remove_product(&self, product_id: ProductId) -> CartOutcome {
        let _guard = self.mutation.lock().await;

        let mut next = self.cart();
        if next.remove(product_id).is_none() {
            debug!("Product not in cart");
        }
        self.finish(CartOperation::Remove, product_id, Ok(Plan::Commit(next)))
    }

    /// Set a line to an exact amount, provided the catalog has that much stock.
    ///
    /// Amounts of 0 or less are ignored: nothing is fetched, written, or
    /// reported, and the current cart is returned as applied.
    #[instrument(skip(self, request), fields(product_id = %request.product_id, amount = request.amount))]
    pub async fn update_product_amount(&self, request: UpdateProductAmount) -> CartOutcome {
        if request.amount <= 0 {
            debug!("Ignoring non-positive amount");
            return CartOutcome::Applied(self.cart());
        }

        let _guard = self.mutation.lock().await;
        let plan = self.plan_update(request).await;
        self.finish(CartOperation::Update, request.product_id, plan)
    }

    async fn plan_add(&self, product_id: ProductId) -> Result<Plan, CartError> {
        let product = self.catalog.get_product(product_id).await?;
        if product.id != product_id {
            return Err(CatalogError::Parse(format!(
                "requested product {product_id}, catalog returned {}",
                product.id
            ))
            .into());
        }
        let stock = self.catalog.get_stock(product_id).await?;

        let mut next = self.cart();
        let requested = next.amount_of(product_id).saturating_add(1);
        if !stock.covers(requested) {
            debug!(requested, available = stock.amount, "Insufficient stock");
            return Ok(Plan::OutOfStock);
        }

        if requested == 1 {
            next.push(product)?;
        } else {
            next.set_amount(product_id, requested)?;
        }
        Ok(Plan::Commit(next))
    }

    async fn plan_update(&self, request: UpdateProductAmount) -> Result<Plan, CartError> {
        let stock = self.catalog.get_stock(request.product_id).await?;

        // Anything beyond u32 can never be covered by a stock level
        let Ok(amount) = u32::try_from(request.amount) else {
            return Ok(Plan::OutOfStock);
        };
        if !stock.covers(amount) {
            debug!(available = stock.amount, "Insufficient stock");
            return Ok(Plan::OutOfStock);
        }

        let mut next = self.cart();
        if !next.set_amount(request.product_id, amount)? {
            debug!("Product not in cart, nothing to update");
        }
        Ok(Plan::Commit(next))
    }

    /// Commit a plan and turn it into an outcome, emitting the notice for
    /// anything that did not apply.
    fn finish(
        &self,
        operation: CartOperation,
        product_id: ProductId,
        plan: Result<Plan, CartError>,
    ) -> CartOutcome {
        let outcome = match plan {
            Ok(Plan::Commit(next)) => match self.commit(next) {
                Ok(cart) => {
                    info!(
                        ?operation,
                        items = cart.len(),
                        units = cart.item_count(),
                        "Cart updated"
                    );
                    CartOutcome::Applied(cart)
                }
                Err(e) => CartOutcome::Failed {
                    operation,
                    error: e.into(),
                    cart: self.cart(),
                },
            },
            Ok(Plan::OutOfStock) => CartOutcome::OutOfStock {
                product_id,
                cart: self.cart(),
            },
            Err(error) => CartOutcome::Failed {
                operation,
                error,
                cart: self.cart(),
            },
        };

        if let CartOutcome::Failed { error, .. } = &outcome {
            error!(?operation, error = %error, "Cart operation failed");
        }
        if let Some(notice) = outcome.notice() {
            self.notify(notice);
        }
        outcome
    }

    /// Persist `next`, then make it the current cart. Readers never see a
    /// cart that has not been written.
    fn commit(&self, next: Cart) -> Result<Cart, StorageError> {
        storage::save_cart(self.store.as_ref(), &next)?;
        *self.cart.write() = next.clone();
        Ok(next)
    }

    fn notify(&self, notice: Notice) {
        self.notifier.notify(notice);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use rocket_shoes_core::{Price, Product, Stock};

    use super::*;
    use crate::catalog::MemoryCatalog;
    use crate::notify::RecordingNotifier;
    use crate::storage::{CART_STORAGE_KEY, MemoryStore, StorageError};

    fn product(id: i32) -> Product {
        Product::new(
            ProductId::new(id),
            format!("Tênis {id}"),
            Price::from_cents(17990),
            format!("https://img/{id}.jpg"),
        )
    }

    struct Harness {
        catalog: Arc<MemoryCatalog>,
        store: Arc<MemoryStore>,
        notifier: Arc<RecordingNotifier>,
        manager: CartManager,
    }

    fn harness_with(catalog: MemoryCatalog, store: MemoryStore) -> Harness {
        let catalog = Arc::new(catalog);
        let store = Arc::new(store);
        let notifier = Arc::new(RecordingNotifier::new());
        let manager = CartManager::new(catalog.clone(), store.clone(), notifier.clone());
        Harness {
            catalog,
            store,
            notifier,
            manager,
        }
    }

    fn harness(stock: &[(i32, u32)]) -> Harness {
        let catalog = MemoryCatalog::new();
        for &(id, amount) in stock {
            catalog.insert(product(id), amount);
        }
        harness_with(catalog, MemoryStore::new())
    }

    fn stored(store: &MemoryStore) -> Cart {
        let raw = store.get(CART_STORAGE_KEY).unwrap().unwrap();
        serde_json::from_str(&raw).unwrap()
    }

    fn amounts(cart: &Cart) -> Vec<(i32, u32)> {
        cart.iter().map(|i| (i.id().as_i32(), i.amount())).collect()
    }

    #[tokio::test]
    async fn test_add_to_empty_cart() {
        let h = harness(&[(1, 5)]);

        let outcome = h.manager.add_product(ProductId::new(1)).await;

        assert!(outcome.is_applied());
        assert_eq!(amounts(&h.manager.cart()), vec![(1, 1)]);
        assert_eq!(stored(&h.store), h.manager.cart());
        assert!(h.notifier.notices().is_empty());
    }

    #[tokio::test]
    async fn test_add_twice_increments() {
        let h = harness(&[(1, 5)]);

        let _ = h.manager.add_product(ProductId::new(1)).await;
        let outcome = h.manager.add_product(ProductId::new(1)).await;

        assert_eq!(amounts(outcome.cart().unwrap()), vec![(1, 2)]);
        assert_eq!(stored(&h.store), h.manager.cart());
    }

    #[tokio::test]
    async fn test_add_increments_in_place() {
        let h = harness(&[(1, 5), (2, 5)]);

        let _ = h.manager.add_product(ProductId::new(1)).await;
        let _ = h.manager.add_product(ProductId::new(2)).await;
        let _ = h.manager.add_product(ProductId::new(1)).await;

        assert_eq!(amounts(&h.manager.cart()), vec![(1, 2), (2, 1)]);
    }

    #[tokio::test]
    async fn test_add_without_stock() {
        let h = harness(&[(1, 0)]);

        let outcome = h.manager.add_product(ProductId::new(1)).await;

        assert!(outcome.is_out_of_stock());
        assert!(h.manager.cart().is_empty());
        assert_eq!(h.store.get(CART_STORAGE_KEY).unwrap(), None);
        assert_eq!(h.notifier.notices(), vec![Notice::OutOfStock]);
    }

    #[tokio::test]
    async fn test_add_beyond_stock() {
        let h = harness(&[(1, 1)]);

        let _ = h.manager.add_product(ProductId::new(1)).await;
        let before = stored(&h.store);
        let outcome = h.manager.add_product(ProductId::new(1)).await;

        assert!(outcome.is_out_of_stock());
        assert_eq!(amounts(&h.manager.cart()), vec![(1, 1)]);
        assert_eq!(stored(&h.store), before);
        assert_eq!(h.notifier.notices(), vec![Notice::OutOfStock]);
    }

    #[tokio::test]
    async fn test_add_unknown_product_fails() {
        let h = harness(&[]);

        let outcome = h.manager.add_product(ProductId::new(7)).await;

        assert!(matches!(
            outcome,
            CartOutcome::Failed {
                operation: CartOperation::Add,
                error: CartError::Catalog(CatalogError::NotFound(_)),
                ..
            }
        ));
        assert!(h.manager.cart().is_empty());
        assert_eq!(h.notifier.notices(), vec![Notice::AddFailed]);
    }

    #[tokio::test]
    async fn test_add_while_catalog_offline() {
        let h = harness(&[(1, 5)]);
        let _ = h.manager.add_product(ProductId::new(1)).await;
        h.catalog.set_offline(true);

        let outcome = h.manager.add_product(ProductId::new(1)).await;

        assert_eq!(outcome.notice(), Some(Notice::AddFailed));
        assert_eq!(amounts(&h.manager.cart()), vec![(1, 1)]);
        assert_eq!(amounts(&stored(&h.store)), vec![(1, 1)]);
    }

    #[tokio::test]
    async fn test_add_storage_failure_leaves_cart() {
        let h = harness(&[(1, 5)]);
        let _ = h.manager.add_product(ProductId::new(1)).await;
        h.store.set_read_only(true);

        let outcome = h.manager.add_product(ProductId::new(1)).await;

        assert!(matches!(
            outcome,
            CartOutcome::Failed {
                error: CartError::Storage(_),
                ..
            }
        ));
        assert_eq!(amounts(&h.manager.cart()), vec![(1, 1)]);
        assert_eq!(stored(&h.store), h.manager.cart());
        assert_eq!(h.notifier.notices(), vec![Notice::AddFailed]);
    }

    #[tokio::test]
    async fn test_remove_product() {
        let h = harness(&[(1, 5), (2, 5)]);
        let _ = h.manager.add_product(ProductId::new(1)).await;
        let _ = h.manager.add_product(ProductId::new(2)).await;

        let outcome = h.manager.remove_product(ProductId::new(1)).await;

        assert_eq!(amounts(outcome.cart().unwrap()), vec![(2, 1)]);
        assert_eq!(stored(&h.store), h.manager.cart());
    }

    #[tokio::test]
    async fn test_remove_missing_product_is_silent() {
        let h = harness(&[(1, 5)]);
        let _ = h.manager.add_product(ProductId::new(1)).await;

        let outcome = h.manager.remove_product(ProductId::new(9)).await;

        assert!(outcome.is_applied());
        assert_eq!(amounts(&h.manager.cart()), vec![(1, 1)]);
        assert!(h.notifier.notices().is_empty());
    }

    #[tokio::test]
    async fn test_remove_does_not_touch_catalog() {
        let h = harness(&[(1, 5)]);
        let _ = h.manager.add_product(ProductId::new(1)).await;
        h.catalog.set_offline(true);

        let outcome = h.manager.remove_product(ProductId::new(1)).await;

        assert!(outcome.is_applied());
        assert!(h.manager.cart().is_empty());
    }

    #[tokio::test]
    async fn test_remove_storage_failure() {
        let h = harness(&[(1, 5)]);
        let _ = h.manager.add_product(ProductId::new(1)).await;
        h.store.set_read_only(true);

        let outcome = h.manager.remove_product(ProductId::new(1)).await;

        assert_eq!(outcome.notice(), Some(Notice::RemoveFailed));
        assert_eq!(amounts(&h.manager.cart()), vec![(1, 1)]);
        assert_eq!(stored(&h.store), h.manager.cart());
    }

    #[tokio::test]
    async fn test_update_amount() {
        let store = MemoryStore::new();
        store
            .set(
                CART_STORAGE_KEY,
                r#"[{"id":2,"title":"Tênis 2","price":179.9,"image":"b.jpg","amount":3}]"#,
            )
            .unwrap();
        let catalog = MemoryCatalog::new().with_product(product(2), 10);
        let h = harness_with(catalog, store);

        let outcome = h
            .manager
            .update_product_amount(UpdateProductAmount {
                product_id: ProductId::new(2),
                amount: 7,
            })
            .await;

        assert_eq!(amounts(outcome.cart().unwrap()), vec![(2, 7)]);
        assert_eq!(stored(&h.store), h.manager.cart());
    }

    #[tokio::test]
    async fn test_update_non_positive_amount_is_noop() {
        let h = harness(&[(1, 5)]);
        let _ = h.manager.add_product(ProductId::new(1)).await;
        h.catalog.set_offline(true);
        h.store.set_read_only(true);

        for amount in [0, -3] {
            let outcome = h
                .manager
                .update_product_amount(UpdateProductAmount {
                    product_id: ProductId::new(1),
                    amount,
                })
                .await;
            assert!(outcome.is_applied());
        }

        assert_eq!(amounts(&h.manager.cart()), vec![(1, 1)]);
        assert!(h.notifier.notices().is_empty());
    }

    #[tokio::test]
    async fn test_update_beyond_stock() {
        let h = harness(&[(1, 3)]);
        let _ = h.manager.add_product(ProductId::new(1)).await;

        let outcome = h
            .manager
            .update_product_amount(UpdateProductAmount {
                product_id: ProductId::new(1),
                amount: 4,
            })
            .await;

        assert!(outcome.is_out_of_stock());
        assert_eq!(amounts(&h.manager.cart()), vec![(1, 1)]);
        assert_eq!(h.notifier.notices(), vec![Notice::OutOfStock]);
    }

    #[tokio::test]
    async fn test_update_huge_amount_is_out_of_stock() {
        let h = harness(&[(1, u32::MAX)]);
        let _ = h.manager.add_product(ProductId::new(1)).await;

        let outcome = h
            .manager
            .update_product_amount(UpdateProductAmount {
                product_id: ProductId::new(1),
                amount: i64::from(u32::MAX) + 1,
            })
            .await;

        assert!(outcome.is_out_of_stock());
    }

    #[tokio::test]
    async fn test_update_product_not_in_cart_leaves_cart() {
        let h = harness(&[(1, 5), (2, 5)]);
        let _ = h.manager.add_product(ProductId::new(1)).await;

        let outcome = h
            .manager
            .update_product_amount(UpdateProductAmount {
                product_id: ProductId::new(2),
                amount: 2,
            })
            .await;

        assert!(outcome.is_applied());
        assert_eq!(amounts(&h.manager.cart()), vec![(1, 1)]);
    }

    #[tokio::test]
    async fn test_update_while_catalog_offline() {
        let h = harness(&[(1, 5)]);
        let _ = h.manager.add_product(ProductId::new(1)).await;
        h.catalog.set_offline(true);

        let outcome = h
            .manager
            .update_product_amount(UpdateProductAmount {
                product_id: ProductId::new(1),
                amount: 2,
            })
            .await;

        assert_eq!(outcome.notice(), Some(Notice::UpdateFailed));
        assert_eq!(amounts(&h.manager.cart()), vec![(1, 1)]);
    }

    #[tokio::test]
    async fn test_loads_persisted_cart() {
        let h = harness(&[(1, 5)]);
        let _ = h.manager.add_product(ProductId::new(1)).await;
        let _ = h.manager.add_product(ProductId::new(1)).await;

        let reloaded = CartManager::new(
            h.catalog.clone(),
            h.store.clone(),
            Arc::new(RecordingNotifier::new()),
        );

        assert_eq!(reloaded.cart(), h.manager.cart());
    }

    #[tokio::test]
    async fn test_corrupt_store_starts_empty() {
        let store = MemoryStore::new();
        store.set(CART_STORAGE_KEY, "not json").unwrap();
        let h = harness_with(MemoryCatalog::new(), store);

        assert!(h.manager.cart().is_empty());
    }

    /// Catalog that yields before answering, so overlapping calls interleave.
    struct SlowCatalog(MemoryCatalog);

    #[async_trait]
    impl ProductCatalog for SlowCatalog {
        async fn get_product(&self, id: ProductId) -> Result<Product, CatalogError> {
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.0.get_product(id).await
        }

        async fn get_stock(&self, id: ProductId) -> Result<Stock, CatalogError> {
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.0.get_stock(id).await
        }
    }

    fn slow_manager(stock: u32) -> (CartManager, Arc<RecordingNotifier>) {
        let catalog = SlowCatalog(MemoryCatalog::new().with_product(product(1), stock));
        let notifier = Arc::new(RecordingNotifier::new());
        let manager = CartManager::new(
            Arc::new(catalog),
            Arc::new(MemoryStore::new()),
            notifier.clone(),
        );
        (manager, notifier)
    }

    #[tokio::test]
    async fn test_concurrent_adds_do_not_lose_updates() {
        let (manager, notifier) = slow_manager(5);

        let (a, b) = tokio::join!(
            manager.add_product(ProductId::new(1)),
            manager.add_product(ProductId::new(1))
        );

        assert!(a.is_applied());
        assert!(b.is_applied());
        assert_eq!(amounts(&manager.cart()), vec![(1, 2)]);
        assert!(notifier.notices().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_adds_respect_stock() {
        let (manager, notifier) = slow_manager(1);

        let (a, b) = tokio::join!(
            manager.add_product(ProductId::new(1)),
            manager.add_product(ProductId::new(1))
        );

        assert_eq!(
            [a.is_applied(), b.is_applied()].iter().filter(|x| **x).count(),
            1
        );
        assert_eq!(amounts(&manager.cart()), vec![(1, 1)]);
        assert_eq!(notifier.notices(), vec![Notice::OutOfStock]);
    }

    /// Store whose writes block for a while and then fail.
    #[derive(Default)]
    struct SlowFailingStore {
        writing: AtomicBool,
    }

    impl PersistentStore for SlowFailingStore {
        fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
            Ok(None)
        }

        fn set(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
            self.writing.store(true, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(200));
            Err(StorageError::Unavailable("disk full".to_string()))
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_readers_never_see_unsaved_cart() {
        let store = Arc::new(SlowFailingStore::default());
        let manager = Arc::new(CartManager::new(
            Arc::new(MemoryCatalog::new().with_product(product(1), 5)),
            store.clone(),
            Arc::new(RecordingNotifier::new()),
        ));

        let writer = tokio::spawn({
            let manager = manager.clone();
            async move { manager.add_product(ProductId::new(1)).await }
        });
        while !store.writing.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }

        assert!(manager.cart().is_empty());
        let outcome = writer.await.unwrap();
        assert!(!outcome.is_applied());
        assert!(outcome.current_cart().is_empty());
        assert!(manager.cart().is_empty());
    }

    /// Catalog that answers every product lookup with product 2.
    struct WrongIdCatalog(MemoryCatalog);

    #[async_trait]
    impl ProductCatalog for WrongIdCatalog {
        async fn get_product(&self, _id: ProductId) -> Result<Product, CatalogError> {
            self.0.get_product(ProductId::new(2)).await
        }

        async fn get_stock(&self, id: ProductId) -> Result<Stock, CatalogError> {
            self.0.get_stock(id).await
        }
    }

    #[tokio::test]
    async fn test_add_rejects_mismatched_catalog_product() {
        let catalog = MemoryCatalog::new()
            .with_product(product(1), 5)
            .with_product(product(2), 5);
        let store = Arc::new(MemoryStore::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let manager = CartManager::new(
            Arc::new(WrongIdCatalog(catalog)),
            store.clone(),
            notifier.clone(),
        );

        let outcome = manager.add_product(ProductId::new(1)).await;

        assert!(matches!(
            outcome,
            CartOutcome::Failed {
                error: CartError::Catalog(CatalogError::Parse(_)),
                ..
            }
        ));
        assert!(manager.cart().is_empty());
        assert_eq!(store.get(CART_STORAGE_KEY).unwrap(), None);
        assert_eq!(notifier.notices(), vec![Notice::AddFailed]);
    }

    #[tokio::test]
    async fn test_out_of_stock_outcome_carries_current_cart() {
        let h = harness(&[(1, 1)]);
        let _ = h.manager.add_product(ProductId::new(1)).await;

        let outcome = h.manager.add_product(ProductId::new(1)).await;

        assert!(outcome.is_out_of_stock());
        assert_eq!(amounts(outcome.current_cart()), vec![(1, 1)]);
    }
}
