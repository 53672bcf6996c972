use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::catalog::Catalog;
use crate::domain::bundle::Bundle;
use crate::domain::product::{Product, ProductId};

/// A priced bundle offer. The identity
/// `total_discounted_price + total_discount == total_original_price`
/// holds by construction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BundleOffer {
    pub bundle: Bundle,
    pub products: Vec<Product>,
    pub total_original_price: Decimal,
    pub total_discount: Decimal,
    pub total_discounted_price: Decimal,
}

/// Evaluate offers over the given bundles against a catalog snapshot.
///
/// With a product context only bundles mentioning that product (as member or
/// suggestion) are considered. Member references that no longer resolve in
/// the catalog are silently dropped; a bundle whose member set resolves to
/// nothing yields no offer at all, so a dangling row can never surface a
/// zero-priced deal or break the page.
pub fn offers(
    bundles: &[Bundle],
    catalog: &Catalog,
    context: Option<&ProductId>,
) -> Vec<BundleOffer> {
    bundles
        .iter()
        .filter(|bundle| bundle.is_active)
        .filter(|bundle| context.map_or(true, |product_id| bundle.mentions(product_id)))
        .filter_map(|bundle| price_offer(bundle, catalog))
        .collect()
}

fn price_offer(bundle: &Bundle, catalog: &Catalog) -> Option<BundleOffer> {
    let products: Vec<Product> = bundle
        .member_product_ids
        .iter()
        .filter_map(|member| catalog.find(member).cloned())
        .collect();

    if products.is_empty() {
        return None;
    }

    let total_original_price: Decimal =
        products.iter().map(|product| product.retail_price).sum();
    let total_discount =
        (total_original_price * bundle.discount_percentage / Decimal::from(100)).round_dp(2);
    let total_discounted_price = total_original_price - total_discount;

    Some(BundleOffer {
        bundle: bundle.clone(),
        products,
        total_original_price,
        total_discount,
        total_discounted_price,
    })
}
