pub mod bundle;
pub mod cart;
pub mod coupon;
pub mod customer;
pub mod product;
pub mod shipping;
