pub mod catalog;
pub mod config;
pub mod domain;
pub mod errors;
pub mod pricing;

pub use catalog::Catalog;
pub use domain::bundle::{Bundle, BundleId};
pub use domain::cart::{CartBundleItem, CartBundleItemId, CartItem};
pub use domain::coupon::{Coupon, CouponAudience, CouponDiscount, CouponId, CouponUsage};
pub use domain::customer::{Customer, CustomerId};
pub use domain::product::{Category, CategoryId, Product, ProductId, ProductStatus};
pub use domain::shipping::{ShippingKind, ShippingMethod, ShippingMethodId};
pub use errors::DomainError;
pub use pricing::bundle::BundleOffer;
pub use pricing::cart::{BundleLine, CartLine, CartTotals};
pub use pricing::coupon::{CouponContext, CouponDecision, CouponEvaluation, CouponRejection};
pub use pricing::shipping::{FreeShippingProgress, ShippingQuote};
