use axum::{
    extract::{Query, State},
    response::Json,
};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::services::products::CartLine;
use crate::services::shipping::{normalize_zipcode, ShippingQuote};
use crate::{ApiResponse, AppState, ServiceError};

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct MountCartRequest {
    #[validate(length(min = 1, max = 100))]
    pub ids: Vec<i32>,
}

/// Resolve a list of product ids into displayable cart lines. Unknown ids
/// are skipped rather than failing the whole cart.
#[utoipa::path(
    post,
    path = "/cart/mount",
    summary = "Mount cart",
    request_body = MountCartRequest,
    responses(
        (status = 200, description = "Resolved cart lines", body = ApiResponse<Vec<CartLine>>),
        (status = 400, description = "Invalid request data", body = crate::errors::ErrorResponse)
    ),
    tag = "cart"
)]
pub async fn mount_cart(
    State(state): State<AppState>,
    Json(request): Json<MountCartRequest>,
) -> Result<Json<ApiResponse<Vec<CartLine>>>, ServiceError> {
    request.validate()?;
    let lines = state.services.products.mount_cart(&request.ids).await?;
    Ok(Json(ApiResponse::success(lines)))
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ShippingQuery {
    pub zipcode: String,
}

/// Quote shipping cost and lead time for a postal code.
#[utoipa::path(
    get,
    path = "/cart/shipping",
    summary = "Quote shipping",
    params(ShippingQuery),
    responses(
        (status = 200, description = "Shipping quote", body = ApiResponse<ShippingQuote>),
        (status = 400, description = "Malformed zipcode", body = crate::errors::ErrorResponse),
        (status = 503, description = "Quote unavailable", body = crate::errors::ErrorResponse)
    ),
    tag = "cart"
)]
pub async fn shipping_quote(
    State(state): State<AppState>,
    Query(query): Query<ShippingQuery>,
) -> Result<Json<ApiResponse<ShippingQuote>>, ServiceError> {
    // Reject malformed codes up front so the caller can distinguish bad
    // input from registry downtime.
    if normalize_zipcode(&query.zipcode).is_none() {
        return Err(ServiceError::ValidationError(
            "zipcode must contain exactly 8 digits".to_string(),
        ));
    }

    match state.services.shipping.quote(&query.zipcode).await? {
        Some(quote) => Ok(Json(ApiResponse::success(quote))),
        None => Err(ServiceError::ServiceUnavailable(
            "shipping quote unavailable".to_string(),
        )),
    }
}
