use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
};
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

use crate::{
    auth::AuthenticatedUser,
    errors::ApiError,
    handlers::common::{default_page, default_per_page, success_response},
    services::status_resolver::StatusTag,
    ApiResponse, AppState,
};

#[derive(Debug, Deserialize, IntoParams)]
pub struct OrderListQuery {
    /// Derived-status filter ("shipped", "paid", ...). Matching happens
    /// on the resolved tag, so the filter always agrees with the badge.
    pub status: Option<StatusTag>,
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_per_page")]
    pub per_page: u64,
}

#[utoipa::path(
    get,
    path = "/api/v1/orders",
    params(OrderListQuery),
    responses(
        (status = 200, description = "Customer's orders, newest first", body = crate::ApiResponse<crate::services::orders::OrderListResponse>)
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn list_orders(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Query(query): Query<OrderListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let response = state
        .services
        .orders
        .list_orders(
            Some(user.id),
            query.status,
            query.page,
            query.per_page,
        )
        .await?;
    Ok(success_response(ApiResponse::success(response)))
}

/// Admin view over every customer's orders, with the same derived
/// status filter the storefront list uses.
#[utoipa::path(
    get,
    path = "/api/v1/admin/orders",
    params(OrderListQuery),
    responses(
        (status = 200, description = "All orders, newest first", body = crate::ApiResponse<crate::services::orders::OrderListResponse>)
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn list_all_orders(
    State(state): State<Arc<AppState>>,
    _user: AuthenticatedUser,
    Query(query): Query<OrderListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let response = state
        .services
        .orders
        .list_orders(
            None,
            query.status,
            query.page,
            query.per_page,
        )
        .await?;
    Ok(success_response(ApiResponse::success(response)))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders/{order_id}",
    params(("order_id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Order with items, history, and derived status", body = crate::ApiResponse<crate::services::orders::OrderDetail>),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn get_order(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(order_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let detail = state.services.orders.get_order(order_id).await?;
    if detail.order.customer_id != user.id {
        // Not the caller's order; report it the same as a missing one.
        return Err(ApiError::NotFound(format!("Order {} not found", order_id)));
    }
    Ok(success_response(ApiResponse::success(detail)))
}
