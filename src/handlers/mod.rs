pub mod addresses;
pub mod checkout;
pub mod common;
pub mod health;
pub mod orders;
pub mod payments;
pub mod status_updates;

use std::sync::Arc;

use sea_orm::DatabaseConnection;

use crate::config::AppConfig;
use crate::events::EventSender;
use crate::services::{
    addresses::AddressService,
    carts::CartService,
    checkout::CheckoutService,
    orders::OrderService,
    otp::OtpService,
    payment_gateway::{GatewayClient, PaymentGatewayService},
    status_updater::StatusUpdaterService,
};

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub carts: Arc<CartService>,
    pub addresses: Arc<AddressService>,
    pub orders: Arc<OrderService>,
    pub checkout: Arc<CheckoutService>,
    pub status_updater: Arc<StatusUpdaterService>,
}

impl AppServices {
    /// Wires the service graph. The checkout wizard sits on top of the
    /// cart, address, order, OTP, and gateway collaborators; handlers
    /// reach the lower layers through it or directly for reads.
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: Option<Arc<EventSender>>,
        gateway_client: Arc<dyn GatewayClient>,
        config: &AppConfig,
    ) -> Self {
        let carts = Arc::new(CartService::new(db.clone()));
        let addresses = Arc::new(AddressService::new(db.clone()));
        let orders = Arc::new(OrderService::new(
            db.clone(),
            carts.clone(),
            event_sender.clone(),
        ));
        let otp = Arc::new(OtpService::new(&config.checkout));
        let gateway = Arc::new(PaymentGatewayService::new(gateway_client, &config.gateway));
        let checkout = Arc::new(CheckoutService::new(
            carts.clone(),
            addresses.clone(),
            orders.clone(),
            otp,
            gateway,
            event_sender.clone(),
            config.checkout.clone(),
        ));
        let status_updater = Arc::new(StatusUpdaterService::new(db, event_sender));

        Self {
            carts,
            addresses,
            orders,
            checkout,
            status_updater,
        }
    }
}
