use std::sync::Arc;

use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    auth::AuthenticatedUser,
    errors::ApiError,
    handlers::common::{created_response, no_content_response, success_response},
    services::checkout::{CheckoutSession, PaymentType},
    services::otp::OtpIssued,
    ApiResponse, AppState,
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct SelectAddressRequest {
    pub address_id: Uuid,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct VerifyOtpRequest {
    pub ticket_id: Uuid,
    pub code: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SelectPaymentRequest {
    pub payment_type: PaymentType,
    /// Card / wallet brand for gateway payments; checked against the
    /// disabled list before the widget is offered.
    pub brand: Option<String>,
}

#[derive(Debug, serde::Serialize, ToSchema)]
pub struct ConfirmSummaryResponse {
    pub session: CheckoutSession,
    /// Present only when this confirmation triggered the first OTP send.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub otp: Option<OtpIssued>,
}

/// Start a checkout session for the authenticated customer's cart.
#[utoipa::path(
    post,
    path = "/api/v1/checkout/sessions",
    responses(
        (status = 201, description = "Checkout session created", body = crate::ApiResponse<CheckoutSession>),
        (status = 400, description = "Cart empty or unreadable", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Checkout"
)]
pub async fn start_session(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
) -> Result<impl IntoResponse, ApiError> {
    let session = state.services.checkout.start(&user).await?;
    Ok(created_response(ApiResponse::success(session)))
}

#[utoipa::path(
    get,
    path = "/api/v1/checkout/sessions/{session_id}",
    params(("session_id" = Uuid, Path, description = "Checkout session ID")),
    responses(
        (status = 200, description = "Session state", body = crate::ApiResponse<CheckoutSession>),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Checkout"
)]
pub async fn get_session(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(session_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let session = state.services.checkout.get_session(session_id, user.id)?;
    Ok(success_response(ApiResponse::success(session)))
}

/// Step back one wizard step. Collected state is retained.
#[utoipa::path(
    post,
    path = "/api/v1/checkout/sessions/{session_id}/back",
    params(("session_id" = Uuid, Path, description = "Checkout session ID")),
    responses(
        (status = 200, description = "Session state", body = crate::ApiResponse<CheckoutSession>)
    ),
    security(("bearer_auth" = [])),
    tag = "Checkout"
)]
pub async fn step_back(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(session_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let session = state.services.checkout.back(session_id, user.id)?;
    Ok(success_response(ApiResponse::success(session)))
}

/// Abandon the wizard. No partial order is left behind.
#[utoipa::path(
    delete,
    path = "/api/v1/checkout/sessions/{session_id}",
    params(("session_id" = Uuid, Path, description = "Checkout session ID")),
    responses((status = 204, description = "Session discarded")),
    security(("bearer_auth" = [])),
    tag = "Checkout"
)]
pub async fn abandon_session(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(session_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state.services.checkout.abandon(session_id, user.id)?;
    Ok(no_content_response())
}

#[utoipa::path(
    post,
    path = "/api/v1/checkout/sessions/{session_id}/address",
    params(("session_id" = Uuid, Path, description = "Checkout session ID")),
    request_body = SelectAddressRequest,
    responses(
        (status = 200, description = "Address selected", body = crate::ApiResponse<CheckoutSession>),
        (status = 400, description = "No addresses on the account", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Checkout"
)]
pub async fn select_address(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(session_id): Path<Uuid>,
    Json(request): Json<SelectAddressRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let session = state
        .services
        .checkout
        .select_address(session_id, user.id, request.address_id)
        .await?;
    Ok(success_response(ApiResponse::success(session)))
}

/// Live cart totals for the order summary step.
#[utoipa::path(
    get,
    path = "/api/v1/checkout/sessions/{session_id}/summary",
    params(("session_id" = Uuid, Path, description = "Checkout session ID")),
    responses(
        (status = 200, description = "Cart snapshot", body = crate::ApiResponse<crate::services::carts::CartSnapshot>)
    ),
    security(("bearer_auth" = [])),
    tag = "Checkout"
)]
pub async fn order_summary(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(session_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let snapshot = state
        .services
        .checkout
        .summary(session_id, user.id)
        .await?;
    Ok(success_response(ApiResponse::success(snapshot)))
}

/// Confirm the summary and enter the OTP step. The code is sent on
/// first entry only.
#[utoipa::path(
    post,
    path = "/api/v1/checkout/sessions/{session_id}/confirm",
    params(("session_id" = Uuid, Path, description = "Checkout session ID")),
    responses(
        (status = 200, description = "Moved to OTP verification", body = crate::ApiResponse<ConfirmSummaryResponse>)
    ),
    security(("bearer_auth" = [])),
    tag = "Checkout"
)]
pub async fn confirm_summary(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(session_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let (session, otp) = state
        .services
        .checkout
        .confirm_summary(session_id, user.id)
        .await?;
    Ok(success_response(ApiResponse::success(
        ConfirmSummaryResponse { session, otp },
    )))
}

#[utoipa::path(
    post,
    path = "/api/v1/checkout/sessions/{session_id}/otp/resend",
    params(("session_id" = Uuid, Path, description = "Checkout session ID")),
    responses(
        (status = 200, description = "Code resent", body = crate::ApiResponse<OtpIssued>),
        (status = 429, description = "Resend cooldown active", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Checkout"
)]
pub async fn resend_otp(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(session_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let issued = state
        .services
        .checkout
        .resend_otp(session_id, user.id)
        .await?;
    Ok(success_response(ApiResponse::success(issued)))
}

#[utoipa::path(
    post,
    path = "/api/v1/checkout/sessions/{session_id}/otp/verify",
    params(("session_id" = Uuid, Path, description = "Checkout session ID")),
    request_body = VerifyOtpRequest,
    responses(
        (status = 200, description = "Code accepted", body = crate::ApiResponse<CheckoutSession>),
        (status = 400, description = "Code rejected", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Checkout"
)]
pub async fn verify_otp(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(session_id): Path<Uuid>,
    Json(request): Json<VerifyOtpRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let session = state
        .services
        .checkout
        .verify_otp(session_id, user.id, request.ticket_id, &request.code)
        .await?;
    Ok(success_response(ApiResponse::success(session)))
}

#[utoipa::path(
    post,
    path = "/api/v1/checkout/sessions/{session_id}/payment-method",
    params(("session_id" = Uuid, Path, description = "Checkout session ID")),
    request_body = SelectPaymentRequest,
    responses(
        (status = 200, description = "Payment method selected", body = crate::ApiResponse<CheckoutSession>),
        (status = 422, description = "Payment method unavailable", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Checkout"
)]
pub async fn select_payment_method(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(session_id): Path<Uuid>,
    Json(request): Json<SelectPaymentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let session = state
        .services
        .checkout
        .select_payment_method(
            session_id,
            user.id,
            request.payment_type,
            request.brand.as_deref(),
        )
        .await?;
    Ok(success_response(ApiResponse::success(session)))
}

/// Place a cash-on-delivery order. Gateway orders are placed by the
/// verified payment callback instead.
#[utoipa::path(
    post,
    path = "/api/v1/checkout/sessions/{session_id}/place",
    params(("session_id" = Uuid, Path, description = "Checkout session ID")),
    responses(
        (status = 201, description = "Order placed", body = crate::ApiResponse<crate::entities::order::Model>),
        (status = 400, description = "Wizard not ready to place", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Checkout"
)]
pub async fn place_order(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(session_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let order = state
        .services
        .checkout
        .place_cod_order(session_id, user.id)
        .await?;
    Ok(created_response(ApiResponse::success(order)))
}
