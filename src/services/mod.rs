pub mod cart_service;
pub mod checkout_machine;
pub mod checkout_service;
pub mod coupon;
pub mod order_factory;
pub mod order_service;
pub mod pricing;
pub mod shipping;
