//! Checkout session layer.
//!
//! Sits between the storefront surface and the pure pricing evaluators:
//! holds per-customer selection state, orchestrates fresh repository reads
//! for every pricing pass, and guards against a slow pass overwriting the
//! result of a newer one.

pub mod service;
pub mod session;

pub use service::{CheckoutError, CheckoutRepositories, CheckoutService, PricedCart};
pub use session::{SelectionView, SessionStore};
