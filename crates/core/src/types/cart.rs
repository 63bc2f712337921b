//! Cart line items and the cart itself.
//!
//! A [`Cart`] is an ordered list of [`CartItem`]s, unique by product id.
//! Both types serialize exactly the way the cart is kept in client storage:
//! a JSON array of product objects, each with an extra `amount` field.

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use super::{Price, Product, ProductId};

/// Structural problems with cart data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CartDataError {
    #[error("cart item amount must be at least 1")]
    ZeroAmount,
    #[error("product {0} appears more than once in the cart")]
    DuplicateItem(ProductId),
}

/// One product line in the cart with the quantity the shopper wants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    #[serde(flatten)]
    pub product: Product,
    #[serde(deserialize_with = "deserialize_amount")]
    amount: u32,
}

/// Key the line amount is stored under, next to the product fields.
const AMOUNT_KEY: &str = "amount";

impl CartItem {
    /// A new line for `product` with an amount of 1.
    ///
    /// Any `amount` the catalog sent as an extra product field is dropped;
    /// the line amount takes its place.
    #[must_use]
    pub fn new(mut product: Product) -> Self {
        product.extra.remove(AMOUNT_KEY);
        Self { product, amount: 1 }
    }

    /// A line with an explicit amount.
    ///
    /// # Errors
    ///
    /// Returns `CartDataError::ZeroAmount` if `amount` is 0.
    pub fn with_amount(product: Product, amount: u32) -> Result<Self, CartDataError> {
        if amount == 0 {
            return Err(CartDataError::ZeroAmount);
        }
        Ok(Self {
            amount,
            ..Self::new(product)
        })
    }

    #[must_use]
    pub const fn id(&self) -> ProductId {
        self.product.id
    }

    #[must_use]
    pub const fn amount(&self) -> u32 {
        self.amount
    }

    /// Unit price times amount.
    #[must_use]
    pub fn line_total(&self) -> Price {
        self.product.price * self.amount
    }
}

fn deserialize_amount<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    let amount = u32::deserialize(deserializer)?;
    if amount == 0 {
        return Err(serde::de::Error::custom(CartDataError::ZeroAmount));
    }
    Ok(amount)
}

/// Ordered list of cart lines, unique by product id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<CartItem>", into = "Vec<CartItem>")]
pub struct Cart {
    items: Vec<CartItem>,
}

impl Cart {
    /// An empty cart.
    #[must_use]
    pub const fn new() -> Self {
        Self { items: Vec::new() }
    }

    #[must_use]
    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CartItem> {
        self.items.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// The line for `id`, if present.
    #[must_use]
    pub fn get(&self, id: ProductId) -> Option<&CartItem> {
        self.items.iter().find(|item| item.id() == id)
    }

    /// Current amount of `id` in the cart (0 if absent).
    #[must_use]
    pub fn amount_of(&self, id: ProductId) -> u32 {
        self.get(id).map_or(0, CartItem::amount)
    }

    /// Total number of units across all lines.
    #[must_use]
    pub fn item_count(&self) -> u64 {
        self.items.iter().map(|item| u64::from(item.amount)).sum()
    }

    /// Sum of all line totals.
    #[must_use]
    pub fn subtotal(&self) -> Price {
        self.items.iter().map(CartItem::line_total).sum()
    }

    /// Append a new line with amount 1.
    ///
    /// # Errors
    ///
    /// Returns `CartDataError::DuplicateItem` if the product is already in the
    /// cart; use [`Cart::set_amount`] to change an existing line.
    pub fn push(&mut self, product: Product) -> Result<(), CartDataError> {
        if self.get(product.id).is_some() {
            return Err(CartDataError::DuplicateItem(product.id));
        }
        self.items.push(CartItem::new(product));
        Ok(())
    }

    /// Set the amount of an existing line in place.
    ///
    /// Returns `Ok(false)` if `id` is not in the cart; the cart is left as is.
    ///
    /// # Errors
    ///
    /// Returns `CartDataError::ZeroAmount` if `amount` is 0.
    pub fn set_amount(&mut self, id: ProductId, amount: u32) -> Result<bool, CartDataError> {
        if amount == 0 {
            return Err(CartDataError::ZeroAmount);
        }
        Ok(self
            .items
            .iter_mut()
            .find(|item| item.id() == id)
            .map(|item| item.amount = amount)
            .is_some())
    }

    /// Remove the line for `id`, returning it if it was present.
    pub fn remove(&mut self, id: ProductId) -> Option<CartItem> {
        let index = self.items.iter().position(|item| item.id() == id)?;
        Some(self.items.remove(index))
    }
}

impl TryFrom<Vec<CartItem>> for Cart {
    type Error = CartDataError;

    fn try_from(items: Vec<CartItem>) -> Result<Self, Self::Error> {
        for (i, item) in items.iter().enumerate() {
            if items.iter().skip(i + 1).any(|other| other.id() == item.id()) {
                return Err(CartDataError::DuplicateItem(item.id()));
            }
        }
        Ok(Self { items })
    }
}

impl From<Cart> for Vec<CartItem> {
    fn from(cart: Cart) -> Self {
        cart.items
    }
}

impl<'a> IntoIterator for &'a Cart {
    type Item = &'a CartItem;
    type IntoIter = std::slice::Iter<'a, CartItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
