//! Storefront order-lifecycle API.
//!
//! Four cooperating pieces: the checkout wizard (a strictly sequential
//! state machine with an OTP gate and a COD safety-deposit sub-flow),
//! the payment-gateway adapter (HMAC-verified callbacks, server-side
//! amount recomputation), order persistence (atomic placement,
//! idempotent on a receipt key), and status derivation (one resolver
//! shared by every view, fed by an append-only update history).

pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod observability;
pub mod openapi;
pub mod services;

use std::sync::Arc;

use axum::{
    routing::{delete, get, post},
    Router,
};
use chrono::Utc;
use sea_orm::DatabaseConnection;
use serde::Serialize;
use utoipa::ToSchema;

// App state definition
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub event_sender: Option<Arc<events::EventSender>>,
    pub services: handlers::AppServices,
}

// Common response wrappers
#[derive(Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResponseMeta>,
}

#[derive(Serialize, ToSchema)]
pub struct ResponseMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub timestamp: String,
}

impl ResponseMeta {
    fn capture() -> Self {
        Self {
            request_id: observability::current_request_id().map(|rid| rid.as_str().to_string()),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            meta: Some(ResponseMeta::capture()),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message),
            meta: Some(ResponseMeta::capture()),
        }
    }
}

/// Everything under `/api/v1`.
pub fn api_v1_routes() -> Router<Arc<AppState>> {
    let checkout = Router::new()
        .route("/checkout/sessions", post(handlers::checkout::start_session))
        .route(
            "/checkout/sessions/:session_id",
            get(handlers::checkout::get_session),
        )
        .route(
            "/checkout/sessions/:session_id",
            delete(handlers::checkout::abandon_session),
        )
        .route(
            "/checkout/sessions/:session_id/back",
            post(handlers::checkout::step_back),
        )
        .route(
            "/checkout/sessions/:session_id/address",
            post(handlers::checkout::select_address),
        )
        .route(
            "/checkout/sessions/:session_id/summary",
            get(handlers::checkout::order_summary),
        )
        .route(
            "/checkout/sessions/:session_id/confirm",
            post(handlers::checkout::confirm_summary),
        )
        .route(
            "/checkout/sessions/:session_id/otp/resend",
            post(handlers::checkout::resend_otp),
        )
        .route(
            "/checkout/sessions/:session_id/otp/verify",
            post(handlers::checkout::verify_otp),
        )
        .route(
            "/checkout/sessions/:session_id/payment-method",
            post(handlers::checkout::select_payment_method),
        )
        .route(
            "/checkout/sessions/:session_id/place",
            post(handlers::checkout::place_order),
        );

    let payments = Router::new()
        .route("/payments/intents", post(handlers::payments::create_intent))
        .route(
            "/payments/callback",
            post(handlers::payments::gateway_callback),
        );

    let addresses = Router::new()
        .route("/addresses", get(handlers::addresses::list_addresses))
        .route("/addresses", post(handlers::addresses::create_address));

    let orders = Router::new()
        .route("/orders", get(handlers::orders::list_orders))
        .route("/orders/:order_id", get(handlers::orders::get_order));

    let admin = Router::new()
        .route("/admin/orders", get(handlers::orders::list_all_orders))
        .route(
            "/admin/orders/:order_id/status-updates",
            post(handlers::status_updates::append_status),
        )
        .route(
            "/admin/orders/status-updates/bulk",
            post(handlers::status_updates::bulk_append_status),
        );

    Router::new()
        .merge(checkout)
        .merge(payments)
        .merge(addresses)
        .merge(orders)
        .merge(admin)
}

/// Health endpoints live outside `/api/v1` so probes need no version.
pub fn health_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(handlers::health::liveness))
        .route("/health/ready", get(handlers::health::readiness))
}
