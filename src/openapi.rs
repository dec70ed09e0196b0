use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Storefront API",
        description = "E-commerce backend: cart assembly, shipping quotes, \
checkout via Stripe, and webhook-driven order reconciliation. \
Authenticated endpoints expect `Authorization: Bearer <jwt>`."
    ),
    tags(
        (name = "Auth", description = "Registration and login"),
        (name = "cart", description = "Cart assembly and shipping quotes"),
        (name = "checkout", description = "Cart to order handoff"),
        (name = "orders", description = "Order history and lifecycle"),
        (name = "addresses", description = "User address book"),
        (name = "webhooks", description = "Payment gateway callbacks"),
        (name = "health", description = "Probes")
    ),
    paths(
        crate::handlers::cart::mount_cart,
        crate::handlers::cart::shipping_quote,
        crate::handlers::orders::finish_cart,
        crate::handlers::orders::list_orders,
        crate::handlers::orders::get_order,
        crate::handlers::orders::refund_order,
        crate::handlers::orders::retry_payment,
        crate::handlers::orders::order_by_session,
        crate::handlers::addresses::create_address,
        crate::handlers::addresses::list_addresses,
        crate::handlers::webhooks::stripe_webhook,
        crate::handlers::health::health,
        crate::handlers::health::status,
    ),
    components(
        schemas(
            crate::ApiResponse<serde_json::Value>,
            crate::auth::RegisterRequest,
            crate::auth::LoginRequest,
            crate::auth::TokenResponse,
            crate::auth::UserResponse,
            crate::entities::OrderStatus,
            crate::handlers::cart::MountCartRequest,
            crate::handlers::orders::OrderResponse,
            crate::handlers::orders::OrderItemResponse,
            crate::handlers::orders::SessionOrderResponse,
            crate::handlers::addresses::AddressResponse,
            crate::handlers::health::HealthResponse,
            crate::services::addresses::NewAddress,
            crate::services::checkout::CartItemInput,
            crate::services::checkout::FinishCartRequest,
            crate::services::checkout::CheckoutResponse,
            crate::services::products::CartLine,
            crate::services::shipping::ShippingQuote,
            crate::errors::ErrorResponse
        )
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi())
}
