//! The pricing/discount evaluation engine: pure computation over read
//! models fetched by the caller. Nothing in this module performs I/O.

pub mod bundle;
pub mod cart;
pub mod coupon;
pub mod shipping;
