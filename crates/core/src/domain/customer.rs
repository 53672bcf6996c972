use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CustomerId(pub String);

/// Minimal shopper read model. `registered_at` drives coupon audience
/// classification (new vs existing customers).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    pub registered_at: DateTime<Utc>,
}

impl Customer {
    /// A customer counts as "new" while within `window_days` of registration,
    /// inclusive of the boundary day.
    pub fn is_new(&self, now: DateTime<Utc>, window_days: u32) -> bool {
        now.signed_duration_since(self.registered_at) <= chrono::Duration::days(i64::from(window_days))
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::{Customer, CustomerId};

    #[test]
    fn customer_within_window_is_new() {
        let now = Utc::now();
        let customer =
            Customer { id: CustomerId("c-1".to_string()), registered_at: now - Duration::days(7) };

        assert!(customer.is_new(now, 30));
        assert!(!customer.is_new(now, 3));
    }
}
