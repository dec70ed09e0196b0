pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod openapi;
pub mod services;

use std::sync::Arc;

use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::{Extension, Router};
use sea_orm::DatabaseConnection;
use serde::Serialize;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::ToSchema;

use crate::auth::AuthRouterExt;
pub use crate::errors::ServiceError;

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: Arc<config::AppConfig>,
    pub event_sender: events::EventSender,
    pub services: handlers::AppServices,
}

/// Uniform success envelope for API responses.
#[derive(Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
        }
    }

    pub fn success_with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: Some(message.into()),
        }
    }
}

/// Builds the full application router, layered with CORS, request tracing,
/// and the Swagger UI.
pub fn app(state: AppState) -> Router {
    let auth_service = state.services.auth.clone();

    let public = Router::new()
        .route("/health", get(handlers::health::health))
        .route("/status", get(handlers::health::status))
        .route("/cart/mount", post(handlers::cart::mount_cart))
        .route("/cart/shipping", get(handlers::cart::shipping_quote))
        .route("/webhook/stripe", post(handlers::webhooks::stripe_webhook))
        .nest("/auth", auth::auth_routes());

    let protected = Router::new()
        .route("/cart/finish", post(handlers::orders::finish_cart))
        .route("/orders", get(handlers::orders::list_orders))
        .route("/orders/session", get(handlers::orders::order_by_session))
        .route("/orders/:id", get(handlers::orders::get_order))
        .route("/orders/:id/refund", post(handlers::orders::refund_order))
        .route("/orders/:id/retry", post(handlers::orders::retry_payment))
        .route(
            "/user/addresses",
            post(handlers::addresses::create_address).get(handlers::addresses::list_addresses),
        )
        .with_auth();

    Router::new()
        .merge(public)
        .merge(protected)
        .merge(openapi::swagger_ui())
        .layer(Extension(auth_service))
        .layer(cors_layer(&state.config.cors_origins()))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    if allowed_origins.iter().any(|o| o == "*") {
        base.allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> = allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        base.allow_origin(AllowOrigin::list(origins))
    }
}
