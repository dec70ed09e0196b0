pub mod addresses;
pub mod cart;
pub mod health;
pub mod orders;
pub mod webhooks;

use std::sync::Arc;

use sea_orm::DatabaseConnection;

use crate::auth::AuthService;
use crate::events::EventSender;
use crate::services::addresses::AddressService;
use crate::services::checkout::CheckoutService;
use crate::services::orders::OrderService;
use crate::services::payments::PaymentGateway;
use crate::services::products::ProductService;
use crate::services::shipping::{PostalLookup, ShippingService};

pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers.
#[derive(Clone)]
pub struct AppServices {
    pub auth: Arc<AuthService>,
    pub products: Arc<ProductService>,
    pub shipping: Arc<ShippingService>,
    pub orders: Arc<OrderService>,
    pub addresses: Arc<AddressService>,
    pub checkout: Arc<CheckoutService>,
}

impl AppServices {
    /// Wires the service graph. The postal registry and payment gateway
    /// come in as trait objects so tests can swap in fakes.
    pub fn new(
        db: Arc<DatabaseConnection>,
        events: EventSender,
        auth: Arc<AuthService>,
        postal_lookup: Arc<dyn PostalLookup>,
        gateway: Arc<dyn PaymentGateway>,
    ) -> Self {
        let products = Arc::new(ProductService::new(db.clone()));
        let shipping = Arc::new(ShippingService::new(postal_lookup));
        let orders = Arc::new(OrderService::new(db.clone(), events.clone()));
        let addresses = Arc::new(AddressService::new(db));
        let checkout = Arc::new(CheckoutService::new(
            products.clone(),
            shipping.clone(),
            orders.clone(),
            addresses.clone(),
            gateway,
            events,
        ));

        Self {
            auth,
            products,
            shipping,
            orders,
            addresses,
            checkout,
        }
    }
}
