use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("quantity must be at least 1")]
    QuantityBelowMinimum,
    #[error("discount percentage {0} is outside 0..=100")]
    DiscountPercentageOutOfRange(String),
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}
