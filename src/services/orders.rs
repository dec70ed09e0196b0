//! Order persistence: creation with line snapshots, owner-scoped reads,
//! and compare-and-swap status transitions driven by webhook delivery.

use std::sync::Arc;

use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use tracing::{info, warn};

use crate::entities::{order, order_item, OrderStatus};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::services::products::CartLine;

/// Snapshot of the delivery address captured at order creation.
#[derive(Debug, Clone)]
pub struct ShippingDestination {
    pub zipcode: String,
    pub street: String,
    pub number: String,
    pub city: String,
    pub state: String,
    pub country: String,
    pub complement: Option<String>,
}

/// Outcome of a conditional status transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// The expected status matched and the row was updated.
    Applied,
    /// The order already carries the target status. Redeliveries land here.
    AlreadyApplied,
    /// Another writer moved the order first.
    Superseded { current: OrderStatus },
}

pub struct OrderService {
    db: Arc<DatabaseConnection>,
    events: EventSender,
}

impl OrderService {
    pub fn new(db: Arc<DatabaseConnection>, events: EventSender) -> Self {
        Self { db, events }
    }

    /// Persists a pending order with its line snapshots in one transaction.
    ///
    /// Line prices and labels are copied out of the catalog so later
    /// retries bill what the buyer saw, not the current catalog.
    pub async fn create_order(
        &self,
        user_id: i32,
        lines: &[(CartLine, i32)],
        shipping_cost: Decimal,
        shipping_days: i32,
        destination: &ShippingDestination,
    ) -> Result<order::Model, ServiceError> {
        let subtotal: Decimal = lines
            .iter()
            .map(|(line, qty)| line.price * Decimal::from(*qty))
            .sum();
        let total = subtotal + shipping_cost;

        let txn = self.db.begin().await?;

        let created = order::ActiveModel {
            user_id: Set(user_id),
            status: Set(OrderStatus::Pending),
            total: Set(total),
            shipping_cost: Set(shipping_cost),
            shipping_days: Set(shipping_days),
            shipping_zipcode: Set(destination.zipcode.clone()),
            shipping_street: Set(destination.street.clone()),
            shipping_number: Set(destination.number.clone()),
            shipping_city: Set(destination.city.clone()),
            shipping_state: Set(destination.state.clone()),
            shipping_country: Set(destination.country.clone()),
            shipping_complement: Set(destination.complement.clone()),
            created_at: Set(chrono::Utc::now()),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        for (line, quantity) in lines {
            order_item::ActiveModel {
                order_id: Set(created.id),
                product_id: Set(line.id),
                product_label: Set(line.label.clone()),
                quantity: Set(*quantity),
                price: Set(line.price),
                ..Default::default()
            }
            .insert(&txn)
            .await?;
        }

        txn.commit().await?;

        info!(order_id = created.id, user_id, %total, "Order created");
        self.events
            .send(Event::OrderCreated {
                order_id: created.id,
                user_id,
                total,
            })
            .await;

        Ok(created)
    }

    /// Fetches an order scoped to its owner. A mismatched owner reads the
    /// same as a missing order.
    pub async fn get_order_for_user(
        &self,
        order_id: i32,
        user_id: i32,
    ) -> Result<order::Model, ServiceError> {
        order::Entity::find_by_id(order_id)
            .filter(order::Column::UserId.eq(user_id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))
    }

    /// Lists a user's orders, newest first.
    pub async fn list_orders_for_user(
        &self,
        user_id: i32,
    ) -> Result<Vec<order::Model>, ServiceError> {
        Ok(order::Entity::find()
            .filter(order::Column::UserId.eq(user_id))
            .order_by_desc(order::Column::CreatedAt)
            .all(&*self.db)
            .await?)
    }

    pub async fn items_for_order(
        &self,
        order_id: i32,
    ) -> Result<Vec<order_item::Model>, ServiceError> {
        Ok(order_item::Entity::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .all(&*self.db)
            .await?)
    }

    pub async fn find_order(&self, order_id: i32) -> Result<Option<order::Model>, ServiceError> {
        Ok(order::Entity::find_by_id(order_id).one(&*self.db).await?)
    }

    /// Moves an order from `expected` to `target` iff it still carries
    /// `expected`, using a conditional UPDATE so concurrent deliveries
    /// cannot both win.
    pub async fn transition_status(
        &self,
        order_id: i32,
        expected: OrderStatus,
        target: OrderStatus,
    ) -> Result<TransitionOutcome, ServiceError> {
        if !expected.can_transition_to(target) {
            return Err(ServiceError::InvalidStatus(format!(
                "cannot move an order from {} to {}",
                expected, target
            )));
        }

        let result = order::Entity::update_many()
            .col_expr(order::Column::Status, Expr::value(target))
            .filter(order::Column::Id.eq(order_id))
            .filter(order::Column::Status.eq(expected))
            .exec(&*self.db)
            .await?;

        if result.rows_affected > 0 {
            info!(order_id, from = %expected, to = %target, "Order status transitioned");
            self.events
                .send(Event::OrderStatusChanged {
                    order_id,
                    old_status: expected,
                    new_status: target,
                })
                .await;
            return Ok(TransitionOutcome::Applied);
        }

        // The conditional update missed: someone else moved the row, the
        // transition already happened, or the order does not exist.
        let current = self
            .find_order(order_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?
            .status;

        if current == target {
            Ok(TransitionOutcome::AlreadyApplied)
        } else {
            warn!(order_id, %current, attempted = %target, "Order status transition superseded");
            Ok(TransitionOutcome::Superseded { current })
        }
    }
}
