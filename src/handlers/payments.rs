use std::sync::Arc;

use axum::{extract::State, response::IntoResponse, Json};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    auth::AuthenticatedUser,
    errors::ApiError,
    handlers::common::{created_response, success_response},
    services::checkout::GatewayCallbackOutcome,
    services::payment_gateway::PaymentIntent,
    ApiResponse, AppState,
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateIntentRequest {
    pub session_id: Uuid,
    /// Client-declared amount, checked against the server-side
    /// recomputation; never trusted on its own.
    pub amount: Decimal,
}

/// Callback payload posted after the hosted widget completes. The
/// signature is the only thing that decides success.
#[derive(Debug, Deserialize, ToSchema)]
pub struct GatewayCallbackRequest {
    pub gateway_order_id: String,
    pub payment_id: String,
    pub signature: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CallbackResponse {
    OrderPaid { order: crate::entities::order::Model },
    DepositPaid { session_id: Uuid },
}

#[utoipa::path(
    post,
    path = "/api/v1/payments/intents",
    request_body = CreateIntentRequest,
    responses(
        (status = 201, description = "Payment intent created", body = crate::ApiResponse<PaymentIntent>),
        (status = 400, description = "Amount mismatch", body = crate::errors::ErrorResponse),
        (status = 502, description = "Gateway unavailable", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Payments"
)]
pub async fn create_intent(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Json(request): Json<CreateIntentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let intent = state
        .services
        .checkout
        .create_payment_intent(request.session_id, user.id, request.amount)
        .await?;
    Ok(created_response(ApiResponse::success(intent)))
}

/// Gateway completion callback. Unauthenticated by design: the HMAC
/// signature authenticates the gateway, not a bearer token.
#[utoipa::path(
    post,
    path = "/api/v1/payments/callback",
    request_body = GatewayCallbackRequest,
    responses(
        (status = 200, description = "Payment verified", body = crate::ApiResponse<CallbackResponse>),
        (status = 401, description = "Signature invalid", body = crate::errors::ErrorResponse),
        (status = 404, description = "Unknown payment intent", body = crate::errors::ErrorResponse)
    ),
    tag = "Payments"
)]
pub async fn gateway_callback(
    State(state): State<Arc<AppState>>,
    Json(request): Json<GatewayCallbackRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let outcome = state
        .services
        .checkout
        .handle_gateway_callback(
            &request.gateway_order_id,
            &request.payment_id,
            &request.signature,
        )
        .await?;

    let response = match outcome {
        GatewayCallbackOutcome::OrderPaid { order } => CallbackResponse::OrderPaid { order },
        GatewayCallbackOutcome::DepositPaid { session_id } => {
            CallbackResponse::DepositPaid { session_id }
        }
    };
    Ok(success_response(ApiResponse::success(response)))
}
