use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ShippingMethodId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShippingKind {
    Home,
    Pickup,
    Express,
}

impl ShippingKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Home => "home",
            Self::Pickup => "pickup",
            Self::Express => "express",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "home" => Some(Self::Home),
            "pickup" => Some(Self::Pickup),
            "express" => Some(Self::Express),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ShippingMethod {
    pub id: ShippingMethodId,
    pub kind: ShippingKind,
    pub min_order_amount: Decimal,
    /// Absent means no upper bound.
    pub max_order_amount: Option<Decimal>,
    pub shipping_cost: Decimal,
    /// Subtotal at or above which the method ships free. Absent means the
    /// method never becomes free.
    pub free_shipping_threshold: Option<Decimal>,
    pub estimated_days: Option<u32>,
    pub is_active: bool,
    /// Declaration order; the tie-break for equally cheap methods.
    pub position: u32,
}

impl ShippingMethod {
    /// Availability window check: active and min ≤ subtotal ≤ max-or-∞.
    pub fn is_available(&self, subtotal: Decimal) -> bool {
        if !self.is_active || subtotal < self.min_order_amount {
            return false;
        }
        self.max_order_amount.map_or(true, |max| subtotal <= max)
    }

    /// Zero once the free-shipping threshold is reached, otherwise the
    /// configured cost.
    pub fn effective_cost(&self, subtotal: Decimal) -> Decimal {
        match self.free_shipping_threshold {
            Some(threshold) if subtotal >= threshold => Decimal::ZERO,
            _ => self.shipping_cost,
        }
    }
}
