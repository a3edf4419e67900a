pub mod addresses;
pub mod carts;
pub mod checkout;
pub mod orders;
pub mod otp;
pub mod payment_gateway;
pub mod status_resolver;
pub mod status_updater;
