use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Storefront API",
        version = "0.1.0",
        description = r#"
# Storefront Order Lifecycle API

Checkout wizard, payment-gateway verification, order placement, and
admin status updates for an online storefront.

## Authentication

Customer and admin endpoints require a JWT bearer token:

```
Authorization: Bearer <your-jwt-token>
```

The payment callback endpoint is unauthenticated; the gateway's HMAC
signature is what authenticates it.

## Error Handling

Failing endpoints return a consistent envelope:

```json
{
  "error": "Bad Request",
  "message": "Validation failed",
  "request_id": "2f9c...",
  "timestamp": "2026-01-01T00:00:00Z"
}
```
        "#,
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "Checkout", description = "Checkout wizard endpoints"),
        (name = "Payments", description = "Payment intent and callback endpoints"),
        (name = "Addresses", description = "Customer address book"),
        (name = "Orders", description = "Customer order views"),
        (name = "Admin", description = "Administrative endpoints")
    ),
    paths(
        // Checkout wizard
        crate::handlers::checkout::start_session,
        crate::handlers::checkout::get_session,
        crate::handlers::checkout::abandon_session,
        crate::handlers::checkout::step_back,
        crate::handlers::checkout::select_address,
        crate::handlers::checkout::order_summary,
        crate::handlers::checkout::confirm_summary,
        crate::handlers::checkout::resend_otp,
        crate::handlers::checkout::verify_otp,
        crate::handlers::checkout::select_payment_method,
        crate::handlers::checkout::place_order,

        // Payments
        crate::handlers::payments::create_intent,
        crate::handlers::payments::gateway_callback,

        // Addresses
        crate::handlers::addresses::list_addresses,
        crate::handlers::addresses::create_address,

        // Orders
        crate::handlers::orders::list_orders,
        crate::handlers::orders::get_order,

        // Admin
        crate::handlers::orders::list_all_orders,
        crate::handlers::status_updates::append_status,
        crate::handlers::status_updates::bulk_append_status,
    ),
    components(
        schemas(
            // Common types
            crate::ApiResponse<serde_json::Value>,
            crate::errors::ErrorResponse,

            // Checkout types
            crate::services::checkout::CheckoutSession,
            crate::services::checkout::CheckoutStep,
            crate::services::checkout::PaymentType,
            crate::services::carts::CartSnapshot,
            crate::services::carts::CartLine,
            crate::services::otp::OtpIssued,
            crate::handlers::checkout::SelectAddressRequest,
            crate::handlers::checkout::VerifyOtpRequest,
            crate::handlers::checkout::SelectPaymentRequest,
            crate::handlers::checkout::ConfirmSummaryResponse,

            // Payment types
            crate::services::payment_gateway::PaymentIntent,
            crate::services::payment_gateway::IntentPurpose,
            crate::handlers::payments::CreateIntentRequest,
            crate::handlers::payments::GatewayCallbackRequest,
            crate::handlers::payments::CallbackResponse,

            // Order types
            crate::entities::order::Model,
            crate::entities::order::PaymentStatus,
            crate::entities::order_item::Model,
            crate::entities::order_status_update::Model,
            crate::entities::customer_address::Model,
            crate::services::orders::OrderDetail,
            crate::services::orders::OrderListItem,
            crate::services::orders::OrderListResponse,
            crate::services::orders::AddressSnapshot,
            crate::services::status_resolver::StatusTag,
            crate::services::addresses::CreateAddressRequest,

            // Admin types
            crate::services::status_updater::AppendStatusRequest,
            crate::services::status_updater::BulkAppendStatusRequest,
            crate::services::status_updater::BulkAppendOutcome,
            crate::services::status_updater::BulkAppendResponse,
        )
    )
)]
pub struct ApiDocV1;

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDocV1::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_document_includes_core_paths() {
        let openapi = ApiDocV1::openapi();
        let json = serde_json::to_string_pretty(&openapi).unwrap();
        assert!(json.contains("Storefront API"));
        assert!(json.contains("/api/v1/checkout/sessions"));
        assert!(json.contains("/api/v1/payments/callback"));
        assert!(json.contains("/api/v1/admin/orders/status-updates/bulk"));
    }

    // Path templates must use brace placeholders so the documented
    // segments bind to the declared params.
    #[test]
    fn path_parameters_use_brace_templates() {
        let openapi = ApiDocV1::openapi();
        let paths: Vec<&String> = openapi.paths.paths.keys().collect();
        assert!(paths
            .iter()
            .any(|p| p.as_str() == "/api/v1/orders/{order_id}"));
        assert!(paths
            .iter()
            .any(|p| p.as_str() == "/api/v1/checkout/sessions/{session_id}/otp/verify"));
        assert!(paths.iter().all(|p| !p.contains("/:")));
    }
}
