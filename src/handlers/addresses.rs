use std::sync::Arc;

use axum::{extract::State, response::IntoResponse, Json};

use crate::{
    auth::AuthenticatedUser,
    errors::ApiError,
    handlers::common::{created_response, success_response, validate_input},
    services::addresses::CreateAddressRequest,
    ApiResponse, AppState,
};

#[utoipa::path(
    get,
    path = "/api/v1/addresses",
    responses(
        (status = 200, description = "Customer's address book", body = crate::ApiResponse<Vec<crate::entities::customer_address::Model>>)
    ),
    security(("bearer_auth" = [])),
    tag = "Addresses"
)]
pub async fn list_addresses(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
) -> Result<impl IntoResponse, ApiError> {
    let addresses = state.services.addresses.list_addresses(user.id).await?;
    Ok(success_response(ApiResponse::success(addresses)))
}

#[utoipa::path(
    post,
    path = "/api/v1/addresses",
    request_body = CreateAddressRequest,
    responses(
        (status = 201, description = "Address created", body = crate::ApiResponse<crate::entities::customer_address::Model>),
        (status = 400, description = "Validation failed", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Addresses"
)]
pub async fn create_address(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Json(request): Json<CreateAddressRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&request)?;
    let address = state
        .services
        .addresses
        .create_address(user.id, request)
        .await?;
    Ok(created_response(ApiResponse::success(address)))
}
