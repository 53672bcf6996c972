use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::shipping::ShippingMethod;

/// Percentage shown while a threshold is not yet reached is capped below
/// 100 so the UI never flashes a premature "free" badge.
const PROGRESS_CAP: Decimal = Decimal::from_parts(999, 0, 0, false, 1); // 99.9

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ShippingQuote {
    pub method: ShippingMethod,
    pub cost: Decimal,
    pub is_free: bool,
    pub estimated_days: Option<u32>,
}

/// Progress toward the nearest free-shipping threshold.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FreeShippingProgress {
    pub threshold: Decimal,
    pub remaining: Decimal,
    pub percent: Decimal,
}

/// Quote every available method at the given subtotal, in declaration order.
pub fn quote_methods(subtotal: Decimal, methods: &[ShippingMethod]) -> Vec<ShippingQuote> {
    methods
        .iter()
        .filter(|method| method.is_available(subtotal))
        .map(|method| quote(subtotal, method))
        .collect()
}

/// The single cheapest available method, by effective cost. Ties go to the
/// first-listed method; `None` means no shipping is available at this
/// subtotal, a state the caller must surface rather than treat as an error.
pub fn cheapest(subtotal: Decimal, methods: &[ShippingMethod]) -> Option<ShippingQuote> {
    let mut best: Option<ShippingQuote> = None;

    for method in methods.iter().filter(|method| method.is_available(subtotal)) {
        let candidate = quote(subtotal, method);
        // Strict comparison keeps the earlier method on equal cost.
        match &best {
            Some(current) if candidate.cost >= current.cost => {}
            _ => best = Some(candidate),
        }
    }

    best
}

/// Progress toward free shipping across all active thresholded methods:
/// the nearest not-yet-reached threshold is the target; once every
/// threshold is met, the highest achieved one is reported as complete.
/// `None` when no active method carries a threshold.
pub fn free_shipping_progress(
    subtotal: Decimal,
    methods: &[ShippingMethod],
) -> Option<FreeShippingProgress> {
    let thresholds: Vec<Decimal> = methods
        .iter()
        .filter(|method| method.is_active)
        .filter_map(|method| method.free_shipping_threshold)
        .collect();

    let next = thresholds.iter().copied().filter(|threshold| subtotal < *threshold).min();

    match next {
        Some(threshold) => {
            let raw = if threshold.is_zero() {
                PROGRESS_CAP
            } else {
                subtotal / threshold * Decimal::from(100)
            };
            Some(FreeShippingProgress {
                threshold,
                remaining: threshold - subtotal,
                percent: raw.min(PROGRESS_CAP).round_dp(1),
            })
        }
        None => thresholds.into_iter().max().map(|threshold| FreeShippingProgress {
            threshold,
            remaining: Decimal::ZERO,
            percent: Decimal::from(100),
        }),
    }
}

fn quote(subtotal: Decimal, method: &ShippingMethod) -> ShippingQuote {
    let cost = method.effective_cost(subtotal);
    ShippingQuote {
        cost,
        is_free: cost.is_zero() && method.free_shipping_threshold.is_some(),
        estimated_days: method.estimated_days,
        method: method.clone(),
    }
}
