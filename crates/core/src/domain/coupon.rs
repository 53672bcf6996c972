use std::collections::HashSet;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::customer::CustomerId;
use crate::domain::product::{CategoryId, Product, ProductId};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CouponId(pub String);

/// Discount semantics, one variant per coupon kind. Optional caps and limits
/// are explicit `Option`s: absence means "unlimited", never a sentinel zero.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CouponDiscount {
    Percentage { value: Decimal, max_discount: Option<Decimal> },
    Fixed { value: Decimal },
    /// Waives the shipping fee up to `value`; the aggregator clamps it at
    /// the actual shipping cost.
    ShippingWaiver { value: Decimal },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CouponAudience {
    All,
    New,
    Existing,
}

impl CouponAudience {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::New => "new",
            Self::Existing => "existing",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "all" => Some(Self::All),
            "new" => Some(Self::New),
            "existing" => Some(Self::Existing),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Coupon {
    pub id: CouponId,
    /// Always stored and compared uppercase.
    pub code: String,
    pub discount: CouponDiscount,
    pub min_order_amount: Decimal,
    pub usage_limit: Option<u32>,
    pub used_count: u32,
    pub audience: CouponAudience,
    pub new_user_days: u32,
    pub valid_from: DateTime<Utc>,
    pub valid_until: Option<DateTime<Utc>>,
    pub is_active: bool,
    /// Empty restriction sets mean the coupon applies to the whole order.
    pub product_ids: HashSet<ProductId>,
    pub category_ids: HashSet<CategoryId>,
}

impl Coupon {
    /// Canonical form of a user-entered code.
    pub fn normalize_code(code: &str) -> String {
        code.trim().to_uppercase()
    }

    pub fn is_restricted(&self) -> bool {
        !self.product_ids.is_empty() || !self.category_ids.is_empty()
    }

    /// Whether this coupon's discount covers the given line item.
    pub fn applies_to(&self, product: &Product) -> bool {
        if !self.is_restricted() {
            return true;
        }
        if self.product_ids.contains(&product.id) {
            return true;
        }
        product.category_id.as_ref().is_some_and(|category| self.category_ids.contains(category))
    }
}

/// Ledger entry recorded exactly once per successful redemption. Any row for
/// a (coupon, customer) pair blocks reuse regardless of `usage_limit`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CouponUsage {
    pub coupon_id: CouponId,
    pub customer_id: CustomerId,
    pub order_id: String,
    pub discount_amount: Decimal,
    pub used_at: DateTime<Utc>,
}
