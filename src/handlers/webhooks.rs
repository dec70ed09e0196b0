//! Gateway webhook intake. The only writer that moves orders out of
//! pending, so it has to be idempotent under redelivery and safe under
//! concurrent delivery of conflicting events.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::Json,
};
use bytes::Bytes;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::entities::OrderStatus;
use crate::services::orders::TransitionOutcome;
use crate::services::payments::construct_event;
use crate::{AppState, ServiceError};

/// Stripe webhook endpoint. Verifies the signature against the raw body
/// bytes before any parsing.
#[utoipa::path(
    post,
    path = "/webhook/stripe",
    summary = "Stripe webhook",
    request_body(content = Vec<u8>, content_type = "application/octet-stream"),
    responses(
        (status = 200, description = "Event processed or acknowledged"),
        (status = 400, description = "Missing or invalid correlation metadata", body = crate::errors::ErrorResponse),
        (status = 401, description = "Signature verification failed", body = crate::errors::ErrorResponse)
    ),
    tag = "webhooks"
)]
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<Value>), ServiceError> {
    let signature = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ServiceError::Unauthorized("missing stripe-signature header".to_string()))?;

    let event = construct_event(
        &body,
        signature,
        &state.config.stripe_webhook_secret,
        state.config.stripe_webhook_tolerance_secs,
    )?;

    let target = match event.event_type.as_str() {
        "checkout.session.completed" | "checkout.session.async_payment_succeeded" => {
            OrderStatus::Paid
        }
        "checkout.session.expired" | "checkout.session.async_payment_failed" => {
            OrderStatus::Cancelled
        }
        other => {
            info!(event_type = other, "Ignoring unhandled webhook event type");
            return Ok((StatusCode::OK, Json(json!({ "received": true }))));
        }
    };

    let order_id = event.order_id().ok_or_else(|| {
        ServiceError::BadRequest("webhook event carries no usable order id".to_string())
    })?;

    match state
        .services
        .orders
        .transition_status(order_id, OrderStatus::Pending, target)
        .await
    {
        Ok(TransitionOutcome::Applied) => {
            info!(order_id, status = %target, "Webhook applied order status");
        }
        Ok(TransitionOutcome::AlreadyApplied) => {
            info!(order_id, status = %target, "Webhook redelivery, status already applied");
        }
        Ok(TransitionOutcome::Superseded { current }) => {
            warn!(order_id, %current, attempted = %target, "Webhook lost the status race");
        }
        // An id that verifies but matches no order: acknowledge so the
        // gateway stops redelivering, and leave a trace for operators.
        Err(ServiceError::NotFound(_)) => {
            warn!(order_id, event_type = %event.event_type, "Webhook referenced an unknown order");
        }
        Err(e) => return Err(e),
    }

    Ok((StatusCode::OK, Json(json!({ "received": true }))))
}
