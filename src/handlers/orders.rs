use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::auth::AuthUser;
use crate::entities::{order, order_item, OrderStatus};
use crate::services::checkout::{CheckoutResponse, FinishCartRequest};
use crate::{ApiResponse, AppState, ServiceError};

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderItemResponse {
    pub product_id: i32,
    pub label: String,
    pub quantity: i32,
    pub price: Decimal,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderResponse {
    pub id: i32,
    pub status: OrderStatus,
    pub total: Decimal,
    pub shipping_cost: Decimal,
    pub shipping_days: i32,
    pub shipping_city: String,
    pub shipping_state: String,
    pub shipping_zipcode: String,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<OrderItemResponse>>,
}

fn map_order(order: &order::Model, items: Option<&[order_item::Model]>) -> OrderResponse {
    OrderResponse {
        id: order.id,
        status: order.status,
        total: order.total,
        shipping_cost: order.shipping_cost,
        shipping_days: order.shipping_days,
        shipping_city: order.shipping_city.clone(),
        shipping_state: order.shipping_state.clone(),
        shipping_zipcode: order.shipping_zipcode.clone(),
        created_at: order.created_at,
        items: items.map(|items| {
            items
                .iter()
                .map(|item| OrderItemResponse {
                    product_id: item.product_id,
                    label: item.product_label.clone(),
                    quantity: item.quantity,
                    price: item.price,
                })
                .collect()
        }),
    }
}

/// Finish the cart: persist a pending order and return the payment URL.
#[utoipa::path(
    post,
    path = "/cart/finish",
    summary = "Finish cart",
    request_body = FinishCartRequest,
    responses(
        (status = 201, description = "Order created, payment pending", body = ApiResponse<CheckoutResponse>),
        (status = 400, description = "Invalid or unresolvable cart", body = crate::errors::ErrorResponse),
        (status = 402, description = "Payment session creation failed", body = crate::errors::ErrorResponse),
        (status = 404, description = "Address not found", body = crate::errors::ErrorResponse),
        (status = 503, description = "Shipping quote unavailable", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "checkout"
)]
pub async fn finish_cart(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(request): Json<FinishCartRequest>,
) -> Result<(StatusCode, Json<ApiResponse<CheckoutResponse>>), ServiceError> {
    let response = state
        .services
        .checkout
        .finish_cart(auth_user.user_id, request)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(response))))
}

/// List the caller's orders, newest first.
#[utoipa::path(
    get,
    path = "/orders",
    summary = "List my orders",
    responses(
        (status = 200, description = "Orders", body = ApiResponse<Vec<OrderResponse>>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "orders"
)]
pub async fn list_orders(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> Result<Json<ApiResponse<Vec<OrderResponse>>>, ServiceError> {
    let orders = state
        .services
        .orders
        .list_orders_for_user(auth_user.user_id)
        .await?;
    let response = orders.iter().map(|o| map_order(o, None)).collect();
    Ok(Json(ApiResponse::success(response)))
}

/// Fetch one of the caller's orders with its line items.
#[utoipa::path(
    get,
    path = "/orders/{id}",
    summary = "Get order",
    params(("id" = i32, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order", body = ApiResponse<OrderResponse>),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    auth_user: AuthUser,
) -> Result<Json<ApiResponse<OrderResponse>>, ServiceError> {
    let order = state
        .services
        .orders
        .get_order_for_user(id, auth_user.user_id)
        .await?;
    let items = state.services.orders.items_for_order(order.id).await?;
    Ok(Json(ApiResponse::success(map_order(&order, Some(&items)))))
}

/// Record a refund for a paid order.
#[utoipa::path(
    post,
    path = "/orders/{id}/refund",
    summary = "Refund order",
    params(("id" = i32, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order refunded", body = ApiResponse<OrderResponse>),
        (status = 400, description = "Order is not paid", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Concurrent status change", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "orders"
)]
pub async fn refund_order(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    auth_user: AuthUser,
) -> Result<Json<ApiResponse<OrderResponse>>, ServiceError> {
    let order = state
        .services
        .checkout
        .refund(id, auth_user.user_id)
        .await?;
    Ok(Json(ApiResponse::success(map_order(&order, None))))
}

/// Create a fresh payment session for a pending order.
#[utoipa::path(
    post,
    path = "/orders/{id}/retry",
    summary = "Retry payment",
    params(("id" = i32, Path, description = "Order id")),
    responses(
        (status = 200, description = "New payment session", body = ApiResponse<CheckoutResponse>),
        (status = 400, description = "Order is not pending", body = crate::errors::ErrorResponse),
        (status = 402, description = "Payment session creation failed", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "orders"
)]
pub async fn retry_payment(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    auth_user: AuthUser,
) -> Result<Json<ApiResponse<CheckoutResponse>>, ServiceError> {
    let response = state
        .services
        .checkout
        .retry_payment(id, auth_user.user_id)
        .await?;
    Ok(Json(ApiResponse::success(response)))
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct SessionQuery {
    pub session_id: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionOrderResponse {
    pub order_id: i32,
}

/// Resolve a gateway checkout session back to the caller's order id.
/// Backs the post-payment success page.
#[utoipa::path(
    get,
    path = "/orders/session",
    summary = "Get order by payment session",
    params(SessionQuery),
    responses(
        (status = 200, description = "Order id for the session", body = ApiResponse<SessionOrderResponse>),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "orders"
)]
pub async fn order_by_session(
    State(state): State<AppState>,
    Query(query): Query<SessionQuery>,
    auth_user: AuthUser,
) -> Result<Json<ApiResponse<SessionOrderResponse>>, ServiceError> {
    let order = state
        .services
        .checkout
        .order_for_session(&query.session_id, auth_user.user_id)
        .await?;
    Ok(Json(ApiResponse::success(SessionOrderResponse {
        order_id: order.id,
    })))
}
