use axum::{extract::State, http::StatusCode, response::Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::auth::AuthUser;
use crate::entities::address;
use crate::services::addresses::NewAddress;
use crate::{ApiResponse, AppState, ServiceError};

#[derive(Debug, Serialize, ToSchema)]
pub struct AddressResponse {
    pub id: i32,
    pub street: String,
    pub number: String,
    pub city: String,
    pub state: String,
    pub country: String,
    pub zipcode: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub complement: Option<String>,
}

impl From<address::Model> for AddressResponse {
    fn from(model: address::Model) -> Self {
        Self {
            id: model.id,
            street: model.street,
            number: model.number,
            city: model.city,
            state: model.state,
            country: model.country,
            zipcode: model.zipcode,
            complement: model.complement,
        }
    }
}

/// Add an address to the caller's address book.
#[utoipa::path(
    post,
    path = "/user/addresses",
    summary = "Create address",
    request_body = NewAddress,
    responses(
        (status = 201, description = "Address created", body = ApiResponse<AddressResponse>),
        (status = 400, description = "Invalid address", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "addresses"
)]
pub async fn create_address(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(request): Json<NewAddress>,
) -> Result<(StatusCode, Json<ApiResponse<AddressResponse>>), ServiceError> {
    let created = state
        .services
        .addresses
        .create_for_user(auth_user.user_id, request)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(created.into())),
    ))
}

/// List the caller's addresses.
#[utoipa::path(
    get,
    path = "/user/addresses",
    summary = "List addresses",
    responses(
        (status = 200, description = "Addresses", body = ApiResponse<Vec<AddressResponse>>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "addresses"
)]
pub async fn list_addresses(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> Result<Json<ApiResponse<Vec<AddressResponse>>>, ServiceError> {
    let addresses = state
        .services
        .addresses
        .list_for_user(auth_user.user_id)
        .await?;
    let response = addresses.into_iter().map(AddressResponse::from).collect();
    Ok(Json(ApiResponse::success(response)))
}
