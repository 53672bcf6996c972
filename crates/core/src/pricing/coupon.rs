use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::coupon::{Coupon, CouponAudience, CouponDiscount};
use crate::domain::customer::Customer;

/// User-facing rejection reasons. These are expected validation outcomes,
/// returned as data and rendered directly to the shopper, never raised as
/// an error through the application layers.
#[derive(Clone, Debug, Error, PartialEq, Serialize, Deserialize)]
pub enum CouponRejection {
    #[error("invalid or expired coupon code")]
    NotFound,
    #[error("this coupon has expired")]
    Expired,
    #[error("this coupon is not valid yet")]
    NotYetValid,
    #[error("this coupon has reached its usage limit")]
    UsageLimitReached,
    #[error("a minimum order amount of {minimum} is required for this coupon")]
    MinimumNotMet { minimum: Decimal },
    #[error("this coupon was already used on a previous order")]
    AlreadyUsed,
    #[error("this coupon is limited to {audience} customers")]
    AudienceMismatch { audience: String },
}

/// Everything the validator needs besides the coupon itself. The amounts are
/// computed by the aggregator over the *selected* lines: `order_amount` is
/// the full selected subtotal (minimum-order checks), `discountable_amount`
/// is the portion eligible under the coupon's restrictions (discount base).
#[derive(Clone, Debug, PartialEq)]
pub struct CouponContext {
    pub now: DateTime<Utc>,
    pub order_amount: Decimal,
    pub discountable_amount: Decimal,
    /// Whether a usage ledger row exists for this (coupon, customer) pair.
    pub prior_use: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CouponEvaluation {
    pub coupon: Coupon,
    pub discount_amount: Decimal,
}

pub type CouponDecision = Result<CouponEvaluation, CouponRejection>;

/// Validate a looked-up coupon for a customer and order, short-circuiting on
/// the first failure. Check order follows the redemption contract: temporal
/// windows, then shared usage limit, then order minimum, then the hard
/// one-use-per-customer rule, then audience eligibility.
///
/// The validator only ever reads `used_count`; recording a redemption is the
/// order-placement transaction's job.
pub fn validate(coupon: Option<&Coupon>, customer: &Customer, ctx: &CouponContext) -> CouponDecision {
    let coupon = match coupon {
        Some(coupon) if coupon.is_active => coupon,
        _ => return Err(CouponRejection::NotFound),
    };

    // `valid_until == now` is still valid; the boundary is inclusive of now.
    if coupon.valid_until.is_some_and(|until| until < ctx.now) {
        return Err(CouponRejection::Expired);
    }
    if coupon.valid_from > ctx.now {
        return Err(CouponRejection::NotYetValid);
    }
    if coupon.usage_limit.is_some_and(|limit| coupon.used_count >= limit) {
        return Err(CouponRejection::UsageLimitReached);
    }
    if ctx.order_amount < coupon.min_order_amount {
        return Err(CouponRejection::MinimumNotMet { minimum: coupon.min_order_amount });
    }
    if ctx.prior_use {
        return Err(CouponRejection::AlreadyUsed);
    }

    match coupon.audience {
        CouponAudience::All => {}
        CouponAudience::New if customer.is_new(ctx.now, coupon.new_user_days) => {}
        CouponAudience::Existing if !customer.is_new(ctx.now, coupon.new_user_days) => {}
        audience => {
            return Err(CouponRejection::AudienceMismatch {
                audience: audience.as_str().to_string(),
            })
        }
    }

    let discount_amount = discount_amount(&coupon.discount, ctx.discountable_amount);
    Ok(CouponEvaluation { coupon: coupon.clone(), discount_amount })
}

/// Raw discount per variant, exhaustively matched. Shipping waivers return
/// the flat value; clamping against the actual shipping cost (and against
/// the subtotal for the other variants) is the aggregator's responsibility.
pub fn discount_amount(discount: &CouponDiscount, base: Decimal) -> Decimal {
    match discount {
        CouponDiscount::Percentage { value, max_discount } => {
            let raw = (base * *value / Decimal::from(100)).round_dp(2);
            match max_discount {
                Some(cap) => raw.min(*cap),
                None => raw,
            }
        }
        CouponDiscount::Fixed { value } => *value,
        CouponDiscount::ShippingWaiver { value } => *value,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use chrono::{Duration, Utc};
    use rust_decimal::Decimal;

    use crate::domain::coupon::{Coupon, CouponAudience, CouponDiscount, CouponId};
    use crate::domain::customer::{Customer, CustomerId};

    use super::{validate, CouponContext, CouponRejection};

    fn coupon(discount: CouponDiscount) -> Coupon {
        Coupon {
            id: CouponId("cpn-1".to_string()),
            code: "SAVE10".to_string(),
            discount,
            min_order_amount: Decimal::ZERO,
            usage_limit: None,
            used_count: 0,
            audience: CouponAudience::All,
            new_user_days: 30,
            valid_from: Utc::now() - Duration::days(1),
            valid_until: None,
            is_active: true,
            product_ids: HashSet::new(),
            category_ids: HashSet::new(),
        }
    }

    fn customer(days_registered: i64) -> Customer {
        Customer {
            id: CustomerId("c-1".to_string()),
            registered_at: Utc::now() - Duration::days(days_registered),
        }
    }

    fn context(order_amount: u32) -> CouponContext {
        CouponContext {
            now: Utc::now(),
            order_amount: Decimal::from(order_amount),
            discountable_amount: Decimal::from(order_amount),
            prior_use: false,
        }
    }

    #[test]
    fn missing_or_inactive_coupon_is_not_found() {
        let decision = validate(None, &customer(90), &context(100));
        assert_eq!(decision.expect_err("missing coupon"), CouponRejection::NotFound);

        let mut inactive = coupon(CouponDiscount::Fixed { value: Decimal::TEN });
        inactive.is_active = false;
        let decision = validate(Some(&inactive), &customer(90), &context(100));
        assert_eq!(decision.expect_err("inactive coupon"), CouponRejection::NotFound);
    }

    #[test]
    fn expiry_boundary_is_inclusive_of_now() {
        let now = Utc::now();
        let mut expiring = coupon(CouponDiscount::Fixed { value: Decimal::TEN });

        expiring.valid_until = Some(now - Duration::seconds(1));
        let ctx = CouponContext { now, ..context(100) };
        assert_eq!(
            validate(Some(&expiring), &customer(90), &ctx).expect_err("just expired"),
            CouponRejection::Expired
        );

        expiring.valid_until = Some(now + Duration::seconds(1));
        assert!(validate(Some(&expiring), &customer(90), &ctx).is_ok());
    }

    #[test]
    fn future_start_date_is_not_yet_valid() {
        let mut upcoming = coupon(CouponDiscount::Fixed { value: Decimal::TEN });
        upcoming.valid_from = Utc::now() + Duration::days(1);
        assert_eq!(
            validate(Some(&upcoming), &customer(90), &context(100)).expect_err("future coupon"),
            CouponRejection::NotYetValid
        );
    }

    #[test]
    fn exhausted_usage_limit_is_rejected() {
        let mut drained = coupon(CouponDiscount::Fixed { value: Decimal::TEN });
        drained.usage_limit = Some(5);
        drained.used_count = 5;
        assert_eq!(
            validate(Some(&drained), &customer(90), &context(100)).expect_err("limit reached"),
            CouponRejection::UsageLimitReached
        );
    }

    #[test]
    fn minimum_order_rejection_embeds_the_minimum() {
        let mut gated = coupon(CouponDiscount::Fixed { value: Decimal::TEN });
        gated.min_order_amount = Decimal::from(250);

        let rejection =
            validate(Some(&gated), &customer(90), &context(100)).expect_err("below minimum");
        assert_eq!(rejection, CouponRejection::MinimumNotMet { minimum: Decimal::from(250) });
        assert!(rejection.to_string().contains("250"));
    }

    #[test]
    fn prior_usage_blocks_reuse_regardless_of_limit() {
        let unlimited = coupon(CouponDiscount::Fixed { value: Decimal::TEN });
        let ctx = CouponContext { prior_use: true, ..context(100) };
        assert_eq!(
            validate(Some(&unlimited), &customer(90), &ctx).expect_err("second redemption"),
            CouponRejection::AlreadyUsed
        );
    }

    #[test]
    fn audience_gating_follows_registration_window() {
        let mut newcomers_only = coupon(CouponDiscount::Fixed { value: Decimal::TEN });
        newcomers_only.audience = CouponAudience::New;
        newcomers_only.new_user_days = 30;

        assert!(validate(Some(&newcomers_only), &customer(7), &context(100)).is_ok());
        assert!(matches!(
            validate(Some(&newcomers_only), &customer(90), &context(100)),
            Err(CouponRejection::AudienceMismatch { .. })
        ));

        let mut regulars_only = newcomers_only.clone();
        regulars_only.audience = CouponAudience::Existing;
        assert!(validate(Some(&regulars_only), &customer(90), &context(100)).is_ok());
        assert!(validate(Some(&regulars_only), &customer(7), &context(100)).is_err());
    }

    #[test]
    fn percentage_discount_respects_the_cap() {
        let capped = coupon(CouponDiscount::Percentage {
            value: Decimal::from(20),
            max_discount: Some(Decimal::from(15)),
        });

        let evaluation =
            validate(Some(&capped), &customer(90), &context(200)).expect("valid coupon");
        // 20% of 200 is 40, capped at 15.
        assert_eq!(evaluation.discount_amount, Decimal::from(15));

        let evaluation =
            validate(Some(&capped), &customer(90), &context(50)).expect("valid coupon");
        assert_eq!(evaluation.discount_amount, Decimal::TEN);
    }

    #[test]
    fn restricted_discount_uses_the_eligible_base() {
        let percent =
            coupon(CouponDiscount::Percentage { value: Decimal::from(10), max_discount: None });
        let ctx = CouponContext {
            discountable_amount: Decimal::from(60),
            ..context(200)
        };

        let evaluation = validate(Some(&percent), &customer(90), &ctx).expect("valid coupon");
        assert_eq!(evaluation.discount_amount, Decimal::from(6));
    }

    #[test]
    fn shipping_waiver_returns_the_flat_value() {
        let waiver = coupon(CouponDiscount::ShippingWaiver { value: Decimal::from(25) });
        let evaluation =
            validate(Some(&waiver), &customer(90), &context(100)).expect("valid coupon");
        assert_eq!(evaluation.discount_amount, Decimal::from(25));
    }
}
