use std::sync::Arc;

use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use uuid::Uuid;

use crate::{
    auth::AuthenticatedUser,
    errors::ApiError,
    handlers::common::{created_response, success_response, validate_input},
    services::status_updater::{AppendStatusRequest, BulkAppendStatusRequest},
    ApiResponse, AppState,
};

#[utoipa::path(
    post,
    path = "/api/v1/admin/orders/{order_id}/status-updates",
    params(("order_id" = Uuid, Path, description = "Order ID")),
    request_body = AppendStatusRequest,
    responses(
        (status = 201, description = "Status appended", body = crate::ApiResponse<crate::entities::order_status_update::Model>),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn append_status(
    State(state): State<Arc<AppState>>,
    _user: AuthenticatedUser,
    Path(order_id): Path<Uuid>,
    Json(request): Json<AppendStatusRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&request)?;
    let update = state
        .services
        .status_updater
        .append_status(order_id, request)
        .await?;
    Ok(created_response(ApiResponse::success(update)))
}

/// Bulk append: one title applied to many orders, each settled
/// independently. The response always carries a per-order outcome, so
/// a partial failure is visible and retryable order by order.
#[utoipa::path(
    post,
    path = "/api/v1/admin/orders/status-updates/bulk",
    request_body = BulkAppendStatusRequest,
    responses(
        (status = 200, description = "Per-order outcomes", body = crate::ApiResponse<crate::services::status_updater::BulkAppendResponse>)
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn bulk_append_status(
    State(state): State<Arc<AppState>>,
    _user: AuthenticatedUser,
    Json(request): Json<BulkAppendStatusRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&request)?;
    let response = state
        .services
        .status_updater
        .bulk_append_status(request)
        .await?;
    Ok(success_response(ApiResponse::success(response)))
}
