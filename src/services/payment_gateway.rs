use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use hmac::{Hmac, Mac};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    config::GatewayConfig,
    errors::ServiceError,
    services::carts::CartSnapshot,
};

type HmacSha256 = Hmac<Sha256>;

/// What a payment intent is for: the order itself, or the small COD
/// safety deposit collected from low-history customers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum IntentPurpose {
    OrderPayment,
    CodDeposit,
}

/// Gateway-side pending payment. Lives in memory between intent
/// creation and callback verification; an abandoned widget leaves the
/// intent to age out past its TTL.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PaymentIntent {
    pub gateway_order_id: String,
    pub session_id: Uuid,
    pub amount: Decimal,
    pub currency: String,
    pub purpose: IntentPurpose,
    pub created_at: DateTime<Utc>,
}

/// Transport seam to the hosted-checkout gateway.
#[async_trait]
pub trait GatewayClient: Send + Sync {
    /// Availability probe, run before handing the client a widget
    /// reference. A blocked or unreachable gateway must surface as an
    /// explicit error, never a silent no-op.
    async fn is_available(&self) -> bool;

    /// Creates a gateway-side order and returns its identifier.
    async fn create_gateway_order(
        &self,
        amount: Decimal,
        currency: &str,
        receipt: &str,
    ) -> Result<String, ServiceError>;
}

/// Production client for the hosted gateway's REST API.
pub struct HostedGatewayClient {
    http: reqwest::Client,
    base_url: String,
    key_id: String,
    secret: String,
}

impl HostedGatewayClient {
    pub fn new(cfg: &GatewayConfig) -> Result<Self, ServiceError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .map_err(|e| ServiceError::ExternalServiceError(format!("http client: {}", e)))?;
        Ok(Self {
            http,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            key_id: cfg.key_id.clone(),
            secret: cfg.secret.clone(),
        })
    }
}

#[derive(Debug, Serialize)]
struct GatewayOrderRequest<'a> {
    amount: Decimal,
    currency: &'a str,
    receipt: &'a str,
}

#[derive(Debug, Deserialize)]
struct GatewayOrderResponse {
    id: String,
}

#[async_trait]
impl GatewayClient for HostedGatewayClient {
    async fn is_available(&self) -> bool {
        match self
            .http
            .get(format!("{}/v1/health", self.base_url))
            .send()
            .await
        {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }

    async fn create_gateway_order(
        &self,
        amount: Decimal,
        currency: &str,
        receipt: &str,
    ) -> Result<String, ServiceError> {
        let response = self
            .http
            .post(format!("{}/v1/orders", self.base_url))
            .basic_auth(&self.key_id, Some(&self.secret))
            .json(&GatewayOrderRequest {
                amount,
                currency,
                receipt,
            })
            .send()
            .await
            .map_err(|_| ServiceError::GatewayUnavailable)?;

        if !response.status().is_success() {
            warn!(status = %response.status(), "gateway order creation rejected");
            return Err(ServiceError::ExternalServiceError(format!(
                "gateway returned {}",
                response.status()
            )));
        }

        let body: GatewayOrderResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::ExternalServiceError(format!("gateway response: {}", e)))?;
        Ok(body.id)
    }
}

/// Computes the callback signature for a gateway order / payment pair.
pub fn compute_signature(gateway_order_id: &str, payment_id: &str, secret: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(format!("{}|{}", gateway_order_id, payment_id).as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut res = 0u8;
    for (x, y) in a.as_bytes().iter().zip(b.as_bytes()) {
        res |= x ^ y;
    }
    res == 0
}

/// Adapter to the external payment gateway: intent creation with
/// server-recomputed amounts, callback signature verification, and the
/// disabled-brand short-circuit.
pub struct PaymentGatewayService {
    client: Arc<dyn GatewayClient>,
    secret: String,
    disabled_brands: Vec<String>,
    intents: DashMap<String, PaymentIntent>,
    intent_ttl_secs: u64,
}

impl PaymentGatewayService {
    pub fn new(client: Arc<dyn GatewayClient>, cfg: &GatewayConfig) -> Self {
        Self {
            client,
            secret: cfg.secret.clone(),
            disabled_brands: cfg
                .disabled_brands
                .iter()
                .map(|b| b.to_lowercase())
                .collect(),
            intents: DashMap::new(),
            intent_ttl_secs: cfg.intent_ttl_secs,
        }
    }

    fn is_expired(&self, intent: &PaymentIntent) -> bool {
        Utc::now() >= intent.created_at + chrono::Duration::seconds(self.intent_ttl_secs as i64)
    }

    /// Brands listed in the UI but switched off never reach the
    /// gateway; the caller gets a deliberately generic error.
    pub fn ensure_brand_enabled(&self, brand: &str) -> Result<(), ServiceError> {
        if self.disabled_brands.contains(&brand.to_lowercase()) {
            return Err(ServiceError::PaymentBrandDisabled);
        }
        Ok(())
    }

    /// Creates a payment intent for the session. The amount is
    /// recomputed server-side from the cart snapshot; the
    /// client-declared value is only checked against it.
    #[instrument(skip(self, cart), fields(session_id = %session_id, purpose = ?purpose))]
    pub async fn create_intent(
        &self,
        session_id: Uuid,
        cart: &CartSnapshot,
        declared_amount: Decimal,
        purpose: IntentPurpose,
        deposit_amount: Decimal,
        receipt_key: &str,
    ) -> Result<PaymentIntent, ServiceError> {
        let computed = match purpose {
            IntentPurpose::OrderPayment => cart
                .lines
                .iter()
                .map(|l| l.unit_price * Decimal::from(l.quantity))
                .sum(),
            IntentPurpose::CodDeposit => deposit_amount,
        };

        if computed != declared_amount {
            warn!(declared = %declared_amount, computed = %computed, "intent amount mismatch");
            return Err(ServiceError::AmountMismatch {
                declared: declared_amount,
                computed,
            });
        }

        if !self.client.is_available().await {
            return Err(ServiceError::GatewayUnavailable);
        }

        let gateway_order_id = self
            .client
            .create_gateway_order(computed, &cart.currency, receipt_key)
            .await?;

        let intent = PaymentIntent {
            gateway_order_id: gateway_order_id.clone(),
            session_id,
            amount: computed,
            currency: cart.currency.clone(),
            purpose,
            created_at: Utc::now(),
        };
        self.intents.insert(gateway_order_id.clone(), intent.clone());

        info!(gateway_order_id = %gateway_order_id, amount = %computed, "payment intent created");
        Ok(intent)
    }

    /// Verifies a gateway callback against the stored intent. The
    /// signature is recomputed from the shared secret; a
    /// client-asserted success flag is never part of the decision. The
    /// intent stays stored until the caller finishes its side of the
    /// money movement and calls `consume_intent`, so a gateway retry
    /// after a failed follow-up still finds it.
    #[instrument(skip(self, signature), fields(gateway_order_id = %gateway_order_id))]
    pub fn verify_callback(
        &self,
        gateway_order_id: &str,
        payment_id: &str,
        signature: &str,
    ) -> Result<PaymentIntent, ServiceError> {
        let expected = compute_signature(gateway_order_id, payment_id, &self.secret);
        if !constant_time_eq(&expected, signature) {
            warn!("callback signature mismatch");
            return Err(ServiceError::SignatureInvalid);
        }

        let intent = self
            .intents
            .get(gateway_order_id)
            .map(|i| i.clone())
            .ok_or_else(|| ServiceError::NotFound("Unknown payment intent".to_string()))?;

        if self.is_expired(&intent) {
            self.intents.remove(gateway_order_id);
            return Err(ServiceError::NotFound(
                "Unknown payment intent".to_string(),
            ));
        }

        info!(session_id = %intent.session_id, "callback verified");
        Ok(intent)
    }

    /// Drops a settled intent. Called once the verified payment has
    /// been fully applied; replays of the same callback then get
    /// `NotFound` instead of a second application.
    pub fn consume_intent(&self, gateway_order_id: &str) {
        self.intents.remove(gateway_order_id);
    }

    /// Evicts intents past their TTL. Run periodically; abandoned
    /// widgets are the only way intents outlive their session.
    pub fn sweep_expired(&self) -> usize {
        let before = self.intents.len();
        self.intents.retain(|_, intent| {
            Utc::now() < intent.created_at + chrono::Duration::seconds(self.intent_ttl_secs as i64)
        });
        before - self.intents.len()
    }

    #[cfg(test)]
    fn intent_count(&self) -> usize {
        self.intents.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::carts::CartLine;
    use assert_matches::assert_matches;
    use rust_decimal_macros::dec;

    struct StubClient {
        available: bool,
    }

    #[async_trait]
    impl GatewayClient for StubClient {
        async fn is_available(&self) -> bool {
            self.available
        }

        async fn create_gateway_order(
            &self,
            _amount: Decimal,
            _currency: &str,
            receipt: &str,
        ) -> Result<String, ServiceError> {
            Ok(format!("gw_{}", receipt))
        }
    }

    fn config() -> GatewayConfig {
        GatewayConfig {
            secret: "test_gateway_secret_0123456789".to_string(),
            disabled_brands: vec!["paylater".to_string()],
            ..GatewayConfig::default()
        }
    }

    fn cart() -> CartSnapshot {
        let lines = vec![
            CartLine {
                product_id: Uuid::new_v4(),
                product_name: "Desk lamp".to_string(),
                quantity: 2,
                unit_price: dec!(450.00),
                line_total: dec!(900.00),
            },
            CartLine {
                product_id: Uuid::new_v4(),
                product_name: "Cable".to_string(),
                quantity: 1,
                unit_price: dec!(300.00),
                line_total: dec!(300.00),
            },
        ];
        CartSnapshot {
            cart_id: Uuid::new_v4(),
            currency: "INR".to_string(),
            subtotal: dec!(1200.00),
            total: dec!(1200.00),
            lines,
        }
    }

    fn service(available: bool) -> PaymentGatewayService {
        PaymentGatewayService::new(Arc::new(StubClient { available }), &config())
    }

    #[tokio::test]
    async fn create_intent_recomputes_amount_server_side() {
        let svc = service(true);
        let err = svc
            .create_intent(
                Uuid::new_v4(),
                &cart(),
                dec!(900.00), // tampered client total
                IntentPurpose::OrderPayment,
                dec!(50),
                "rcpt-1",
            )
            .await
            .unwrap_err();
        assert_matches!(err, ServiceError::AmountMismatch { computed, .. } if computed == dec!(1200.00));
    }

    #[tokio::test]
    async fn unreachable_gateway_is_an_explicit_error() {
        let svc = service(false);
        let err = svc
            .create_intent(
                Uuid::new_v4(),
                &cart(),
                dec!(1200.00),
                IntentPurpose::OrderPayment,
                dec!(50),
                "rcpt-2",
            )
            .await
            .unwrap_err();
        assert_matches!(err, ServiceError::GatewayUnavailable);
        assert_eq!(svc.intent_count(), 0);
    }

    #[tokio::test]
    async fn forged_signature_never_verifies() {
        let svc = service(true);
        let intent = svc
            .create_intent(
                Uuid::new_v4(),
                &cart(),
                dec!(1200.00),
                IntentPurpose::OrderPayment,
                dec!(50),
                "rcpt-3",
            )
            .await
            .unwrap();

        let err = svc
            .verify_callback(&intent.gateway_order_id, "pay_123", "deadbeef")
            .unwrap_err();
        assert_matches!(err, ServiceError::SignatureInvalid);
        // Intent survives a failed verification for retry.
        assert_eq!(svc.intent_count(), 1);
    }

    #[tokio::test]
    async fn intent_survives_until_explicitly_consumed() {
        let svc = service(true);
        let session_id = Uuid::new_v4();
        let intent = svc
            .create_intent(
                session_id,
                &cart(),
                dec!(1200.00),
                IntentPurpose::OrderPayment,
                dec!(50),
                "rcpt-4",
            )
            .await
            .unwrap();

        let signature = compute_signature(
            &intent.gateway_order_id,
            "pay_123",
            "test_gateway_secret_0123456789",
        );
        let verified = svc
            .verify_callback(&intent.gateway_order_id, "pay_123", &signature)
            .unwrap();
        assert_eq!(verified.session_id, session_id);
        assert_eq!(verified.amount, dec!(1200.00));

        // Verification alone does not settle the intent: a gateway
        // retry after a failed follow-up must still find it.
        assert_eq!(svc.intent_count(), 1);
        assert!(svc
            .verify_callback(&intent.gateway_order_id, "pay_123", &signature)
            .is_ok());

        svc.consume_intent(&intent.gateway_order_id);
        assert_eq!(svc.intent_count(), 0);

        // Replaying after settlement fails: the intent is gone.
        let err = svc
            .verify_callback(&intent.gateway_order_id, "pay_123", &signature)
            .unwrap_err();
        assert_matches!(err, ServiceError::NotFound(_));
    }

    #[tokio::test]
    async fn expired_intents_are_not_verifiable() {
        let cfg = GatewayConfig {
            intent_ttl_secs: 0,
            ..config()
        };
        let svc = PaymentGatewayService::new(Arc::new(StubClient { available: true }), &cfg);
        let intent = svc
            .create_intent(
                Uuid::new_v4(),
                &cart(),
                dec!(1200.00),
                IntentPurpose::OrderPayment,
                dec!(50),
                "rcpt-7",
            )
            .await
            .unwrap();

        let signature = compute_signature(
            &intent.gateway_order_id,
            "pay_123",
            "test_gateway_secret_0123456789",
        );
        let err = svc
            .verify_callback(&intent.gateway_order_id, "pay_123", &signature)
            .unwrap_err();
        assert_matches!(err, ServiceError::NotFound(_));
        assert_eq!(svc.intent_count(), 0);
    }

    #[tokio::test]
    async fn sweep_evicts_aged_intents() {
        let cfg = GatewayConfig {
            intent_ttl_secs: 0,
            ..config()
        };
        let svc = PaymentGatewayService::new(Arc::new(StubClient { available: true }), &cfg);
        svc.create_intent(
            Uuid::new_v4(),
            &cart(),
            dec!(1200.00),
            IntentPurpose::OrderPayment,
            dec!(50),
            "rcpt-8",
        )
        .await
        .unwrap();

        assert_eq!(svc.sweep_expired(), 1);
        assert_eq!(svc.intent_count(), 0);
    }

    #[tokio::test]
    async fn deposit_intent_uses_the_configured_amount() {
        let svc = service(true);
        let err = svc
            .create_intent(
                Uuid::new_v4(),
                &cart(),
                dec!(1200.00),
                IntentPurpose::CodDeposit,
                dec!(50),
                "rcpt-5",
            )
            .await
            .unwrap_err();
        assert_matches!(err, ServiceError::AmountMismatch { computed, .. } if computed == dec!(50));

        let intent = svc
            .create_intent(
                Uuid::new_v4(),
                &cart(),
                dec!(50),
                IntentPurpose::CodDeposit,
                dec!(50),
                "rcpt-6",
            )
            .await
            .unwrap();
        assert_eq!(intent.amount, dec!(50));
        assert_eq!(intent.purpose, IntentPurpose::CodDeposit);
    }

    #[test]
    fn disabled_brand_short_circuits() {
        let svc = service(true);
        assert_matches!(
            svc.ensure_brand_enabled("PayLater"),
            Err(ServiceError::PaymentBrandDisabled)
        );
        assert!(svc.ensure_brand_enabled("card").is_ok());
    }
}
