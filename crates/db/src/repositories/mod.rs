use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use thiserror::Error;

use tally_core::domain::bundle::{Bundle, BundleId};
use tally_core::domain::cart::{CartBundleItem, CartItem};
use tally_core::domain::coupon::{Coupon, CouponId, CouponUsage};
use tally_core::domain::customer::{Customer, CustomerId};
use tally_core::domain::product::{Product, ProductId};
use tally_core::domain::shipping::ShippingMethod;

pub mod bundle;
pub mod cart;
pub mod coupon;
pub mod customer;
pub mod memory;
pub mod product;
pub mod shipping;

pub use bundle::SqlBundleRepository;
pub use cart::SqlCartRepository;
pub use coupon::SqlCouponRepository;
pub use customer::SqlCustomerRepository;
pub use memory::{
    InMemoryBundleRepository, InMemoryCartRepository, InMemoryCouponRepository,
    InMemoryCustomerRepository, InMemoryProductRepository, InMemoryShippingMethodRepository,
};
pub use product::SqlProductRepository;
pub use shipping::SqlShippingMethodRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

#[async_trait]
pub trait ProductRepository: Send + Sync {
    async fn find_by_id(&self, id: &ProductId) -> Result<Option<Product>, RepositoryError>;
    /// The storefront catalog: published products only.
    async fn list_published(&self) -> Result<Vec<Product>, RepositoryError>;
    async fn save(&self, product: Product) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait CustomerRepository: Send + Sync {
    async fn find_by_id(&self, id: &CustomerId) -> Result<Option<Customer>, RepositoryError>;
    async fn save(&self, customer: Customer) -> Result<(), RepositoryError>;
}

/// Per-customer cart state: regular lines keyed by product, plus
/// price-locked bundle lines keyed by their own id.
#[async_trait]
pub trait CartRepository: Send + Sync {
    async fn items_for(&self, customer: &CustomerId) -> Result<Vec<CartItem>, RepositoryError>;
    /// Insert or replace the line for the item's product.
    async fn save_item(&self, customer: &CustomerId, item: CartItem)
        -> Result<(), RepositoryError>;
    async fn remove_item(
        &self,
        customer: &CustomerId,
        product_id: &ProductId,
    ) -> Result<(), RepositoryError>;

    async fn bundle_items_for(
        &self,
        customer: &CustomerId,
    ) -> Result<Vec<CartBundleItem>, RepositoryError>;
    async fn add_bundle_items(
        &self,
        customer: &CustomerId,
        items: Vec<CartBundleItem>,
    ) -> Result<(), RepositoryError>;
    async fn remove_bundle(
        &self,
        customer: &CustomerId,
        bundle_id: &BundleId,
    ) -> Result<(), RepositoryError>;

    async fn clear(&self, customer: &CustomerId) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait BundleRepository: Send + Sync {
    async fn list_active(&self) -> Result<Vec<Bundle>, RepositoryError>;
    async fn save(&self, bundle: Bundle) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait CouponRepository: Send + Sync {
    /// Lookup by user-entered code; the code is normalized to uppercase
    /// before comparison.
    async fn find_by_code(&self, code: &str) -> Result<Option<Coupon>, RepositoryError>;
    /// Whether a ledger row exists for this (coupon, customer) pair.
    async fn has_usage(
        &self,
        coupon_id: &CouponId,
        customer_id: &CustomerId,
    ) -> Result<bool, RepositoryError>;
    /// Ledger insert plus `used_count` increment as one transaction. Called
    /// by the order-placement collaborator after order creation succeeds;
    /// the validator itself never writes.
    async fn record_usage(&self, usage: CouponUsage) -> Result<(), RepositoryError>;
    async fn save(&self, coupon: Coupon) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait ShippingMethodRepository: Send + Sync {
    /// Active methods in declaration (`position`) order; the order is the
    /// tie-break for equally cheap methods.
    async fn list_active(&self) -> Result<Vec<ShippingMethod>, RepositoryError>;
    async fn save(&self, method: ShippingMethod) -> Result<(), RepositoryError>;
}

// Column decode helpers shared by the SQL implementations. Money columns
// are TEXT holding canonical decimal strings.

pub(crate) fn decimal_column(row: &SqliteRow, column: &str) -> Result<Decimal, RepositoryError> {
    let raw: String = row.try_get(column)?;
    raw.parse::<Decimal>()
        .map_err(|error| RepositoryError::Decode(format!("column `{column}`: {error}")))
}

pub(crate) fn optional_decimal_column(
    row: &SqliteRow,
    column: &str,
) -> Result<Option<Decimal>, RepositoryError> {
    let raw: Option<String> = row.try_get(column)?;
    raw.map(|value| {
        value
            .parse::<Decimal>()
            .map_err(|error| RepositoryError::Decode(format!("column `{column}`: {error}")))
    })
    .transpose()
}

pub(crate) fn u32_column(row: &SqliteRow, column: &str) -> Result<u32, RepositoryError> {
    let raw: i64 = row.try_get(column)?;
    u32::try_from(raw)
        .map_err(|_| RepositoryError::Decode(format!("column `{column}`: {raw} out of range")))
}

pub(crate) fn optional_u32_column(
    row: &SqliteRow,
    column: &str,
) -> Result<Option<u32>, RepositoryError> {
    let raw: Option<i64> = row.try_get(column)?;
    raw.map(|value| {
        u32::try_from(value).map_err(|_| {
            RepositoryError::Decode(format!("column `{column}`: {value} out of range"))
        })
    })
    .transpose()
}
