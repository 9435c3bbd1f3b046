pub mod cart_service;
pub mod coupon_service;
pub mod order_service;
pub mod pricing;
pub mod stock_service;
pub mod wallet_service;
