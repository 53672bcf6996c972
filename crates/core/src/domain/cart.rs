use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::bundle::Bundle;
use crate::domain::product::{Product, ProductId};
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CartBundleItemId(pub String);

/// A regular cart line. Quantity is always at least 1; decrementing past 1
/// removes the line instead of storing a zero quantity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub product_id: ProductId,
    pub quantity: u32,
}

impl CartItem {
    pub fn new(product_id: ProductId, quantity: u32) -> Result<Self, DomainError> {
        if quantity == 0 {
            return Err(DomainError::QuantityBelowMinimum);
        }
        Ok(Self { product_id, quantity })
    }

    pub fn incremented(mut self) -> Self {
        self.quantity = self.quantity.saturating_add(1);
        self
    }

    /// Returns `None` when the decrement would drop the quantity below 1,
    /// meaning the line must be removed.
    pub fn decremented(self) -> Option<Self> {
        if self.quantity <= 1 {
            return None;
        }
        Some(Self { quantity: self.quantity - 1, ..self })
    }
}

/// A materialized bundle line. Prices are snapshots taken at add-time and
/// are never recomputed from the catalog afterwards.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CartBundleItem {
    pub id: CartBundleItemId,
    pub bundle_id: crate::domain::bundle::BundleId,
    pub product_id: ProductId,
    pub original_price: Decimal,
    pub discounted_price: Decimal,
    pub discount_amount: Decimal,
    pub quantity: u32,
}

impl CartBundleItem {
    /// Snapshot the member product's current retail price under the bundle's
    /// discount. The invariant `discounted_price + discount_amount ==
    /// original_price` holds by construction: the discount is rounded to
    /// cents and the discounted price is derived by subtraction.
    pub fn locked(bundle: &Bundle, product: &Product, quantity: u32) -> Result<Self, DomainError> {
        if quantity == 0 {
            return Err(DomainError::QuantityBelowMinimum);
        }
        bundle.validate()?;

        let original_price = product.retail_price;
        let discount_amount =
            (original_price * bundle.discount_percentage / Decimal::from(100)).round_dp(2);
        let discounted_price = original_price - discount_amount;

        Ok(Self {
            id: CartBundleItemId(uuid::Uuid::new_v4().to_string()),
            bundle_id: bundle.id.clone(),
            product_id: product.id.clone(),
            original_price,
            discounted_price,
            discount_amount,
            quantity,
        })
    }
}
