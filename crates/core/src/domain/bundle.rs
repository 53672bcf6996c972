use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::product::ProductId;
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BundleId(pub String);

/// A named group of member products sold together at a percentage discount.
/// Suggested products are triggers: viewing one surfaces the bundle as an
/// offer without being part of the discounted set.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Bundle {
    pub id: BundleId,
    pub name: String,
    pub discount_percentage: Decimal,
    pub is_active: bool,
    pub member_product_ids: Vec<ProductId>,
    pub suggested_product_ids: Vec<ProductId>,
}

impl Bundle {
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.discount_percentage < Decimal::ZERO
            || self.discount_percentage > Decimal::from(100)
        {
            return Err(DomainError::DiscountPercentageOutOfRange(
                self.discount_percentage.to_string(),
            ));
        }
        Ok(())
    }

    /// A bundle is relevant to a product when it appears in either the member
    /// set or the suggestion set.
    pub fn mentions(&self, product_id: &ProductId) -> bool {
        self.member_product_ids.contains(product_id)
            || self.suggested_product_ids.contains(product_id)
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use crate::domain::product::ProductId;
    use crate::errors::DomainError;

    use super::{Bundle, BundleId};

    fn bundle(percentage: Decimal) -> Bundle {
        Bundle {
            id: BundleId("bdl-1".to_string()),
            name: "Starter Kit".to_string(),
            discount_percentage: percentage,
            is_active: true,
            member_product_ids: vec![ProductId("hub".to_string())],
            suggested_product_ids: vec![ProductId("sensor".to_string())],
        }
    }

    #[test]
    fn percentage_outside_range_fails_validation() {
        let error = bundle(Decimal::from(120)).validate().expect_err("120% must fail");
        assert!(matches!(error, DomainError::DiscountPercentageOutOfRange(_)));
        assert!(bundle(Decimal::from(20)).validate().is_ok());
    }

    #[test]
    fn relevance_covers_members_and_suggestions() {
        let bundle = bundle(Decimal::from(10));
        assert!(bundle.mentions(&ProductId("hub".to_string())));
        assert!(bundle.mentions(&ProductId("sensor".to_string())));
        assert!(!bundle.mentions(&ProductId("camera".to_string())));
    }
}
