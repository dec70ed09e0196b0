//! Checkout orchestration: resolve the cart, quote shipping, persist the
//! order, and hand off to the payment gateway. Also the retry and refund
//! flows, which operate on already-persisted orders.

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use validator::Validate;

use crate::entities::{order, OrderStatus};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::services::addresses::AddressService;
use crate::services::orders::{OrderService, ShippingDestination, TransitionOutcome};
use crate::services::payments::{PaymentGateway, SessionLine};
use crate::services::products::{CartLine, ProductService};
use crate::services::shipping::ShippingService;

/// One cart line as submitted by the storefront.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CartItemInput {
    #[validate(range(min = 1))]
    pub product_id: i32,
    #[validate(range(min = 1, max = 999))]
    pub quantity: i32,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FinishCartRequest {
    #[validate(length(min = 1))]
    #[validate]
    pub cart: Vec<CartItemInput>,
    #[validate(range(min = 1))]
    pub address_id: i32,
}

/// Successful checkout handoff: where to send the buyer, plus how many
/// submitted lines referenced products that no longer exist.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutResponse {
    pub order_id: i32,
    pub url: String,
    pub dropped_items: usize,
}

pub struct CheckoutService {
    products: Arc<ProductService>,
    shipping: Arc<ShippingService>,
    orders: Arc<OrderService>,
    addresses: Arc<AddressService>,
    gateway: Arc<dyn PaymentGateway>,
    events: EventSender,
}

impl CheckoutService {
    pub fn new(
        products: Arc<ProductService>,
        shipping: Arc<ShippingService>,
        orders: Arc<OrderService>,
        addresses: Arc<AddressService>,
        gateway: Arc<dyn PaymentGateway>,
        events: EventSender,
    ) -> Self {
        Self {
            products,
            shipping,
            orders,
            addresses,
            gateway,
            events,
        }
    }

    /// Turns a cart into a pending order and a gateway redirect URL.
    ///
    /// Cart lines naming unknown products are dropped and counted; a cart
    /// with no resolvable lines is rejected. A gateway failure after the
    /// order is persisted leaves the pending order in place so the buyer
    /// can retry payment later.
    #[instrument(skip(self, request))]
    pub async fn finish_cart(
        &self,
        user_id: i32,
        request: FinishCartRequest,
    ) -> Result<CheckoutResponse, ServiceError> {
        request.validate()?;

        // Address must belong to the buyer; a foreign address reads as absent.
        let address = self
            .addresses
            .find_for_user(request.address_id, user_id)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Address {} not found", request.address_id))
            })?;

        let quote = self
            .shipping
            .quote(&address.zipcode)
            .await?
            .ok_or_else(|| {
                ServiceError::ServiceUnavailable(
                    "shipping quote unavailable for this address".to_string(),
                )
            })?;

        let mut lines: Vec<(CartLine, i32)> = Vec::with_capacity(request.cart.len());
        let mut dropped_items = 0usize;
        for item in &request.cart {
            match self.products.get_product(item.product_id).await? {
                Some(product) => lines.push((CartLine::from(product), item.quantity)),
                None => {
                    warn!(product_id = item.product_id, "Dropping cart line for unknown product");
                    dropped_items += 1;
                }
            }
        }

        if lines.is_empty() {
            return Err(ServiceError::ValidationError(
                "no cart items could be resolved".to_string(),
            ));
        }

        let destination = ShippingDestination {
            zipcode: address.zipcode.clone(),
            street: address.street.clone(),
            number: address.number.clone(),
            city: address.city.clone(),
            state: address.state.clone(),
            country: address.country.clone(),
            complement: address.complement.clone(),
        };

        let order = self
            .orders
            .create_order(user_id, &lines, quote.cost, quote.days, &destination)
            .await?;

        let session_lines: Vec<SessionLine> = lines
            .iter()
            .map(|(line, qty)| SessionLine {
                label: line.label.clone(),
                price: line.price,
                quantity: *qty,
            })
            .collect();

        let session = self
            .create_session(order.id, &session_lines, quote.cost)
            .await?;

        info!(order_id = order.id, user_id, dropped_items, "Checkout session created");

        Ok(CheckoutResponse {
            order_id: order.id,
            url: session.url,
            dropped_items,
        })
    }

    /// Creates a fresh gateway session for an order the buyer never paid.
    /// Lines are rebuilt from the order's own snapshots, not the catalog.
    pub async fn retry_payment(
        &self,
        order_id: i32,
        user_id: i32,
    ) -> Result<CheckoutResponse, ServiceError> {
        let order = self.orders.get_order_for_user(order_id, user_id).await?;

        if order.status != OrderStatus::Pending {
            return Err(ServiceError::BadRequest(format!(
                "Order {} is not pending",
                order_id
            )));
        }

        let items = self.orders.items_for_order(order_id).await?;
        let session_lines: Vec<SessionLine> = items
            .iter()
            .map(|item| SessionLine {
                label: item.product_label.clone(),
                price: item.price,
                quantity: item.quantity,
            })
            .collect();

        let session = self
            .create_session(order_id, &session_lines, order.shipping_cost)
            .await?;

        Ok(CheckoutResponse {
            order_id,
            url: session.url,
            dropped_items: 0,
        })
    }

    /// Marks a paid order refunded. The money movement itself happens in
    /// the gateway dashboard; this only records the state change.
    pub async fn refund(&self, order_id: i32, user_id: i32) -> Result<order::Model, ServiceError> {
        let order = self.orders.get_order_for_user(order_id, user_id).await?;

        if order.status != OrderStatus::Paid {
            return Err(ServiceError::BadRequest(format!(
                "Order {} is not paid",
                order_id
            )));
        }

        let outcome = self
            .orders
            .transition_status(order_id, OrderStatus::Paid, OrderStatus::Refunded)
            .await?;

        match outcome {
            TransitionOutcome::Applied | TransitionOutcome::AlreadyApplied => {
                warn!(order_id, "Order marked refunded; issue the gateway refund manually");
                self.orders.get_order_for_user(order_id, user_id).await
            }
            TransitionOutcome::Superseded { current } => Err(ServiceError::Conflict(format!(
                "Order {} moved to {} before the refund was recorded",
                order_id, current
            ))),
        }
    }

    /// Resolves a gateway session id to the buyer's own order.
    pub async fn order_for_session(
        &self,
        session_id: &str,
        user_id: i32,
    ) -> Result<order::Model, ServiceError> {
        let order_id = self
            .gateway
            .order_id_for_session(session_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Order not found for session".to_string()))?;

        self.orders.get_order_for_user(order_id, user_id).await
    }

    async fn create_session(
        &self,
        order_id: i32,
        lines: &[SessionLine],
        shipping_cost: Decimal,
    ) -> Result<crate::services::payments::GatewaySession, ServiceError> {
        let session = self
            .gateway
            .create_checkout_session(order_id, lines, shipping_cost)
            .await
            .map_err(|e| {
                warn!(order_id, error = %e, "Payment session creation failed; order stays pending");
                ServiceError::PaymentFailed(format!(
                    "could not create a payment session for order {}",
                    order_id
                ))
            })?;

        self.events
            .send(Event::PaymentSessionCreated {
                order_id,
                session_id: session.id.clone(),
            })
            .await;

        Ok(session)
    }
}
