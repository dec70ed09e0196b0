//! Payment gateway adapter: Stripe Checkout sessions and signed webhook
//! events. The gateway sits behind the [`PaymentGateway`] trait so the
//! checkout orchestrator can be exercised with a fake in tests.

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::Value;
use sha2::Sha256;
use tracing::{error, warn};

use crate::errors::ServiceError;

type HmacSha256 = Hmac<Sha256>;

/// One gateway line item, built from order line snapshots.
#[derive(Debug, Clone)]
pub struct SessionLine {
    pub label: String,
    pub price: Decimal,
    pub quantity: i32,
}

/// A created checkout session: the gateway id and the redirect URL.
#[derive(Debug, Clone)]
pub struct GatewaySession {
    pub id: String,
    pub url: String,
}

/// External payment gateway seam.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Creates a checkout session tagged with the order id as correlation
    /// metadata and returns the redirect URL.
    async fn create_checkout_session(
        &self,
        order_id: i32,
        lines: &[SessionLine],
        shipping_cost: Decimal,
    ) -> Result<GatewaySession, ServiceError>;

    /// Translates a gateway session id back to the internal order id.
    /// `Ok(None)` when the session has no usable correlation metadata.
    async fn order_id_for_session(&self, session_id: &str) -> Result<Option<i32>, ServiceError>;
}

/// Stripe REST client (form-encoded API, bearer-authenticated).
pub struct StripeGateway {
    http: reqwest::Client,
    secret_key: String,
    base_url: String,
    frontend_url: String,
}

impl StripeGateway {
    pub fn new(secret_key: String, base_url: String, frontend_url: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            secret_key,
            base_url,
            frontend_url,
        }
    }

    fn to_cents(amount: Decimal) -> Result<i64, ServiceError> {
        (amount * Decimal::from(100))
            .round()
            .to_i64()
            .ok_or_else(|| ServiceError::InternalError("amount out of range".to_string()))
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn create_checkout_session(
        &self,
        order_id: i32,
        lines: &[SessionLine],
        shipping_cost: Decimal,
    ) -> Result<GatewaySession, ServiceError> {
        let mut form: Vec<(String, String)> = vec![
            ("mode".into(), "payment".into()),
            ("metadata[orderId]".into(), order_id.to_string()),
            (
                "success_url".into(),
                format!(
                    "{}/cart/success?session_id={{CHECKOUT_SESSION_ID}}",
                    self.frontend_url
                ),
            ),
            ("cancel_url".into(), format!("{}/my-orders", self.frontend_url)),
        ];

        for (i, line) in lines.iter().enumerate() {
            form.push((
                format!("line_items[{i}][price_data][currency]"),
                "brl".into(),
            ));
            form.push((
                format!("line_items[{i}][price_data][product_data][name]"),
                line.label.clone(),
            ));
            form.push((
                format!("line_items[{i}][price_data][unit_amount]"),
                Self::to_cents(line.price)?.to_string(),
            ));
            form.push((format!("line_items[{i}][quantity]"), line.quantity.to_string()));
        }

        if shipping_cost > Decimal::ZERO {
            let i = lines.len();
            form.push((
                format!("line_items[{i}][price_data][currency]"),
                "brl".into(),
            ));
            form.push((
                format!("line_items[{i}][price_data][product_data][name]"),
                "Frete".into(),
            ));
            form.push((
                format!("line_items[{i}][price_data][unit_amount]"),
                Self::to_cents(shipping_cost)?.to_string(),
            ));
            form.push((format!("line_items[{i}][quantity]"), "1".into()));
        }

        let response = self
            .http
            .post(format!("{}/v1/checkout/sessions", self.base_url))
            .bearer_auth(&self.secret_key)
            .form(&form)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, order_id, "Stripe checkout session request failed");
                ServiceError::ExternalServiceError(format!("stripe: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!(%status, order_id, body, "Stripe rejected checkout session");
            return Err(ServiceError::ExternalServiceError(format!(
                "stripe returned {}",
                status
            )));
        }

        let session: Value = response.json().await.map_err(|e| {
            error!(error = %e, order_id, "Stripe returned an unparseable session");
            ServiceError::ExternalServiceError(format!("stripe: {}", e))
        })?;

        let id = session
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| ServiceError::ExternalServiceError("stripe session missing id".into()))?
            .to_string();
        let url = session
            .get("url")
            .and_then(Value::as_str)
            .ok_or_else(|| ServiceError::ExternalServiceError("stripe session missing url".into()))?
            .to_string();

        Ok(GatewaySession { id, url })
    }

    async fn order_id_for_session(&self, session_id: &str) -> Result<Option<i32>, ServiceError> {
        let response = self
            .http
            .get(format!("{}/v1/checkout/sessions/{}", self.base_url, session_id))
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, session_id, "Stripe session lookup failed");
                ServiceError::ExternalServiceError(format!("stripe: {}", e))
            })?;

        if !response.status().is_success() {
            warn!(status = %response.status(), session_id, "Stripe session lookup rejected");
            return Ok(None);
        }

        let session: Value = response.json().await.map_err(|e| {
            ServiceError::ExternalServiceError(format!("stripe: {}", e))
        })?;

        Ok(extract_order_id(&session))
    }
}

/// A parsed, signature-verified webhook event.
#[derive(Debug, Clone)]
pub struct WebhookEvent {
    pub event_type: String,
    pub data: Value,
}

impl WebhookEvent {
    /// Extracts the internal order id from the event's correlation
    /// metadata. `None` when absent, non-numeric, or non-positive.
    pub fn order_id(&self) -> Option<i32> {
        self.data
            .get("data")
            .and_then(|d| d.get("object"))
            .and_then(extract_order_id)
    }
}

fn extract_order_id(object: &Value) -> Option<i32> {
    let id: i32 = object
        .get("metadata")
        .and_then(|m| m.get("orderId"))
        .and_then(Value::as_str)?
        .parse()
        .ok()?;
    if id > 0 {
        Some(id)
    } else {
        None
    }
}

/// Verifies the `stripe-signature` header against the exact raw request
/// bytes and parses the event. Fails closed on any verification error.
pub fn construct_event(
    payload: &[u8],
    signature_header: &str,
    secret: &str,
    tolerance_secs: u64,
) -> Result<WebhookEvent, ServiceError> {
    if !verify_signature(payload, signature_header, secret, tolerance_secs) {
        return Err(ServiceError::Unauthorized(
            "invalid webhook signature".to_string(),
        ));
    }

    let data: Value = serde_json::from_slice(payload)
        .map_err(|e| ServiceError::BadRequest(format!("invalid webhook payload: {}", e)))?;

    let event_type = data
        .get("type")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    Ok(WebhookEvent { event_type, data })
}

/// Stripe signature scheme: header `t=<ts>,v1=<hex>`, HMAC-SHA256 over
/// `"{ts}.{raw body}"`, compared in constant time, with a bounded
/// timestamp tolerance against replay.
pub fn verify_signature(
    payload: &[u8],
    signature_header: &str,
    secret: &str,
    tolerance_secs: u64,
) -> bool {
    let mut ts = "";
    let mut v1 = "";
    for part in signature_header.split(',') {
        let mut it = part.trim().splitn(2, '=');
        match (it.next(), it.next()) {
            (Some("t"), Some(val)) => ts = val,
            (Some("v1"), Some(val)) => v1 = val,
            _ => {}
        }
    }

    if ts.is_empty() || v1.is_empty() {
        return false;
    }

    if let Ok(ts_i) = ts.parse::<i64>() {
        let now = chrono::Utc::now().timestamp();
        if (now - ts_i).unsigned_abs() > tolerance_secs {
            return false;
        }
    } else {
        return false;
    }

    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return false,
    };
    mac.update(ts.as_bytes());
    mac.update(b".");
    mac.update(payload);
    let expected = hex::encode(mac.finalize().into_bytes());

    constant_time_eq(&expected, v1)
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut res = 0u8;
    for (x, y) in a.as_bytes().iter().zip(b.as_bytes()) {
        res |= x ^ y;
    }
    res == 0
}

/// Builds a valid `stripe-signature` header for a payload. Test support.
pub fn sign_payload(payload: &[u8], secret: &str, timestamp: i64) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("hmac accepts any key size");
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    format!("t={},v1={}", timestamp, hex::encode(mac.finalize().into_bytes()))
}
