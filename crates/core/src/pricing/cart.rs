use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::cart::CartBundleItem;
use crate::domain::coupon::{Coupon, CouponDiscount};
use crate::domain::product::Product;
use crate::domain::shipping::ShippingMethod;
use crate::pricing::coupon::discount_amount;
use crate::pricing::shipping::{cheapest, free_shipping_progress, FreeShippingProgress, ShippingQuote};

/// A selected regular line, resolved against the current catalog snapshot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CartLine {
    pub product: Product,
    pub quantity: u32,
}

/// A selected bundle line: the price-locked item plus its resolved product
/// (needed for coupon restriction checks, never for re-pricing).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BundleLine {
    pub item: CartBundleItem,
    pub product: Product,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CartTotals {
    pub subtotal: Decimal,
    /// `None` is the "no shipping available" state, not an error.
    pub shipping: Option<ShippingQuote>,
    pub shipping_cost: Decimal,
    pub coupon_discount: Decimal,
    pub total: Decimal,
    pub free_shipping: Option<FreeShippingProgress>,
}

/// Combine selected regular lines, selected bundle lines, the cheapest
/// applicable shipping method, and an already-validated coupon into the
/// payable total.
///
/// Regular lines price at the catalog's retail price; bundle lines price at
/// their locked discounted price. A restricted coupon discounts only the
/// eligible lines' subtotal. Discounts clamp at what they target (subtotal
/// for percentage/fixed, shipping cost for waivers) so the total can never
/// go negative.
pub fn price_cart(
    lines: &[CartLine],
    bundle_lines: &[BundleLine],
    methods: &[ShippingMethod],
    coupon: Option<&Coupon>,
) -> CartTotals {
    let regular: Decimal = lines
        .iter()
        .map(|line| line.product.retail_price * Decimal::from(line.quantity))
        .sum();
    let bundled: Decimal = bundle_lines
        .iter()
        .map(|line| line.item.discounted_price * Decimal::from(line.item.quantity))
        .sum();
    let subtotal = regular + bundled;

    let shipping = cheapest(subtotal, methods);
    let shipping_cost = shipping.as_ref().map_or(Decimal::ZERO, |quote| quote.cost);

    let coupon_discount = coupon
        .map(|coupon| clamped_discount(coupon, lines, bundle_lines, subtotal, shipping_cost))
        .unwrap_or(Decimal::ZERO);

    let total = (subtotal + shipping_cost - coupon_discount).max(Decimal::ZERO);

    CartTotals {
        subtotal,
        shipping,
        shipping_cost,
        coupon_discount,
        total,
        free_shipping: free_shipping_progress(subtotal, methods),
    }
}

/// The eligible discount base under the coupon's product/category
/// restrictions, computed line-by-line.
pub fn discountable_subtotal(
    coupon: &Coupon,
    lines: &[CartLine],
    bundle_lines: &[BundleLine],
) -> Decimal {
    let regular: Decimal = lines
        .iter()
        .filter(|line| coupon.applies_to(&line.product))
        .map(|line| line.product.retail_price * Decimal::from(line.quantity))
        .sum();
    let bundled: Decimal = bundle_lines
        .iter()
        .filter(|line| coupon.applies_to(&line.product))
        .map(|line| line.item.discounted_price * Decimal::from(line.item.quantity))
        .sum();
    regular + bundled
}

fn clamped_discount(
    coupon: &Coupon,
    lines: &[CartLine],
    bundle_lines: &[BundleLine],
    subtotal: Decimal,
    shipping_cost: Decimal,
) -> Decimal {
    let base = if coupon.is_restricted() {
        discountable_subtotal(coupon, lines, bundle_lines)
    } else {
        subtotal
    };

    let raw = discount_amount(&coupon.discount, base);
    match coupon.discount {
        // A waiver reduces the shipping fee only.
        CouponDiscount::ShippingWaiver { .. } => raw.min(shipping_cost),
        // Item discounts reduce the (eligible) subtotal only.
        _ => raw.min(base),
    }
    .max(Decimal::ZERO)
}
