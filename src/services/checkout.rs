use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    auth::AuthenticatedUser,
    config::CheckoutConfig,
    entities::order,
    entities::order::PaymentStatus,
    errors::ServiceError,
    events::{Event, EventSender},
    services::addresses::AddressService,
    services::carts::{CartService, CartSnapshot},
    services::orders::{AddressSnapshot, OrderService, PlaceOrderRequest},
    services::otp::{OtpChannel, OtpIssued, OtpService},
    services::payment_gateway::{IntentPurpose, PaymentGatewayService, PaymentIntent},
};

/// Wizard steps, in forward order. `CodSafetyDeposit` is entered only
/// for cash-on-delivery with a low-history customer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum CheckoutStep {
    AddressSelect,
    OrderSummary,
    OtpVerify,
    PaymentSelect,
    CodSafetyDeposit,
    Complete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PaymentType {
    CashOnDelivery,
    Gateway,
}

/// One checkout attempt. Lives only in memory; abandoning the wizard
/// leaves no partial order because the only write happens at
/// `Complete`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CheckoutSession {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub customer_email: String,
    pub step: CheckoutStep,
    pub selected_address: Option<AddressSnapshot>,
    pub payment_type: Option<PaymentType>,
    pub otp_verified: bool,
    pub cod_deposit_required: bool,
    pub cod_deposit_paid: bool,
    /// Idempotency key for order placement. Minted once here and
    /// reused for every retry; never regenerated per submit.
    pub receipt_key: String,
    pub created_at: DateTime<Utc>,
    #[serde(skip)]
    otp_sent_once: bool,
    #[serde(skip)]
    placed_order_id: Option<Uuid>,
}

fn previous_step(step: CheckoutStep) -> Option<CheckoutStep> {
    match step {
        CheckoutStep::AddressSelect => None,
        CheckoutStep::OrderSummary => Some(CheckoutStep::AddressSelect),
        CheckoutStep::OtpVerify => Some(CheckoutStep::OrderSummary),
        CheckoutStep::PaymentSelect => Some(CheckoutStep::OtpVerify),
        CheckoutStep::CodSafetyDeposit => Some(CheckoutStep::PaymentSelect),
        CheckoutStep::Complete => None,
    }
}

/// The checkout wizard. Drives one strictly sequential state machine
/// per session, orchestrating the OTP gate, the COD safety-deposit
/// sub-flow, and the payment gateway adapter.
pub struct CheckoutService {
    sessions: DashMap<Uuid, CheckoutSession>,
    cart_service: Arc<CartService>,
    address_service: Arc<AddressService>,
    order_service: Arc<OrderService>,
    otp_service: Arc<OtpService>,
    gateway: Arc<PaymentGatewayService>,
    event_sender: Option<Arc<EventSender>>,
    cfg: CheckoutConfig,
}

impl CheckoutService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        cart_service: Arc<CartService>,
        address_service: Arc<AddressService>,
        order_service: Arc<OrderService>,
        otp_service: Arc<OtpService>,
        gateway: Arc<PaymentGatewayService>,
        event_sender: Option<Arc<EventSender>>,
        cfg: CheckoutConfig,
    ) -> Self {
        Self {
            sessions: DashMap::new(),
            cart_service,
            address_service,
            order_service,
            otp_service,
            gateway,
            event_sender,
            cfg,
        }
    }

    /// Starts a checkout attempt for the authenticated customer. Fails
    /// with a retryable error when the cart cannot be read or is empty.
    #[instrument(skip(self, user), fields(customer_id = %user.id))]
    pub async fn start(&self, user: &AuthenticatedUser) -> Result<CheckoutSession, ServiceError> {
        let cart = self.cart_service.get_cart_snapshot(user.id).await?;
        if cart.is_empty() {
            return Err(ServiceError::InvalidOperation(
                "Your cart is empty".to_string(),
            ));
        }

        let session = CheckoutSession {
            id: Uuid::new_v4(),
            customer_id: user.id,
            customer_email: user.email.clone(),
            step: CheckoutStep::AddressSelect,
            selected_address: None,
            payment_type: None,
            otp_verified: false,
            cod_deposit_required: false,
            cod_deposit_paid: false,
            receipt_key: format!("rcpt-{}", Uuid::new_v4().simple()),
            created_at: Utc::now(),
            otp_sent_once: false,
            placed_order_id: None,
        };
        self.sessions.insert(session.id, session.clone());

        if let Some(sender) = &self.event_sender {
            let _ = sender
                .send(Event::CheckoutStarted {
                    session_id: session.id,
                    customer_id: user.id,
                })
                .await;
        }

        info!(session_id = %session.id, "checkout started");
        Ok(session)
    }

    /// Fetches the caller's session. Sessions belonging to other
    /// customers, and sessions past their TTL, are indistinguishable
    /// from missing ones.
    pub fn get_session(
        &self,
        session_id: Uuid,
        customer_id: Uuid,
    ) -> Result<CheckoutSession, ServiceError> {
        let session = self
            .sessions
            .get(&session_id)
            .map(|s| s.clone())
            .ok_or_else(|| ServiceError::NotFound("Checkout session not found".to_string()))?;
        if self.session_expired(&session) {
            self.sessions.remove(&session_id);
            self.otp_service.discard(session_id);
            return Err(ServiceError::NotFound(
                "Checkout session not found".to_string(),
            ));
        }
        if session.customer_id != customer_id {
            return Err(ServiceError::NotFound(
                "Checkout session not found".to_string(),
            ));
        }
        Ok(session)
    }

    /// Explicit "Back". Always permitted, never resets collected state:
    /// address selection and OTP verification survive.
    pub fn back(
        &self,
        session_id: Uuid,
        customer_id: Uuid,
    ) -> Result<CheckoutSession, ServiceError> {
        let mut entry = self.session_entry(session_id, customer_id)?;
        if let Some(prev) = previous_step(entry.step) {
            entry.step = prev;
        }
        Ok(entry.clone())
    }

    /// Drops the session and its OTP ticket. No order rows exist to
    /// clean up; placement is atomic at `Complete`.
    pub fn abandon(&self, session_id: Uuid, customer_id: Uuid) -> Result<(), ServiceError> {
        let session = self.get_session(session_id, customer_id)?;
        self.sessions.remove(&session.id);
        self.otp_service.discard(session.id);
        Ok(())
    }

    /// Selects a delivery address and advances to the order summary.
    /// Blocked with a user-facing error when the account has none.
    #[instrument(skip(self), fields(session_id = %session_id))]
    pub async fn select_address(
        &self,
        session_id: Uuid,
        customer_id: Uuid,
        address_id: Uuid,
    ) -> Result<CheckoutSession, ServiceError> {
        let addresses = self.address_service.list_addresses(customer_id).await?;
        if addresses.is_empty() {
            return Err(ServiceError::ValidationError(
                "Add a delivery address to continue".to_string(),
            ));
        }
        let chosen = addresses
            .into_iter()
            .find(|a| a.id == address_id)
            .ok_or_else(|| ServiceError::NotFound("Address not found".to_string()))?;

        let mut entry = self.session_entry(session_id, customer_id)?;
        self.require_step(&entry, CheckoutStep::AddressSelect)?;
        entry.selected_address = Some(AddressSnapshot::from(chosen));
        entry.step = CheckoutStep::OrderSummary;
        Ok(entry.clone())
    }

    /// Read-only totals straight from the live cart.
    pub async fn summary(
        &self,
        session_id: Uuid,
        customer_id: Uuid,
    ) -> Result<CartSnapshot, ServiceError> {
        let session = self.get_session(session_id, customer_id)?;
        self.require_step(&session, CheckoutStep::OrderSummary)?;
        self.cart_service.get_cart_snapshot(customer_id).await
    }

    /// Confirms the summary and enters the OTP gate. The send fires on
    /// first entry only; re-entering after "Back" does not resend.
    #[instrument(skip(self), fields(session_id = %session_id))]
    pub async fn confirm_summary(
        &self,
        session_id: Uuid,
        customer_id: Uuid,
    ) -> Result<(CheckoutSession, Option<OtpIssued>), ServiceError> {
        // Mutate under the map guard, release it before any await.
        let (session, issued) = {
            let mut entry = self.session_entry(session_id, customer_id)?;
            self.require_step(&entry, CheckoutStep::OrderSummary)?;

            let issued = if entry.otp_sent_once {
                None
            } else {
                let destination = entry.customer_email.clone();
                let issued =
                    self.otp_service
                        .send_otp(entry.id, OtpChannel::Email, &destination)?;
                entry.otp_sent_once = true;
                Some(issued)
            };

            entry.step = CheckoutStep::OtpVerify;
            (entry.clone(), issued)
        };

        if issued.is_some() {
            if let Some(sender) = &self.event_sender {
                let _ = sender
                    .send(Event::OtpIssued {
                        session_id: session.id,
                    })
                    .await;
            }
        }
        Ok((session, issued))
    }

    /// Resends the code, replacing the previous ticket. Cooldown is
    /// enforced by the OTP gate regardless of any client countdown.
    pub async fn resend_otp(
        &self,
        session_id: Uuid,
        customer_id: Uuid,
    ) -> Result<OtpIssued, ServiceError> {
        let session = self.get_session(session_id, customer_id)?;
        self.require_step(&session, CheckoutStep::OtpVerify)?;
        self.otp_service
            .send_otp(session.id, OtpChannel::Email, &session.customer_email)
    }

    /// Verifies the code. Failure is recoverable: the session stays at
    /// `OtpVerify` and the user may retry or resend.
    #[instrument(skip(self, code), fields(session_id = %session_id))]
    pub async fn verify_otp(
        &self,
        session_id: Uuid,
        customer_id: Uuid,
        ticket_id: Uuid,
        code: &str,
    ) -> Result<CheckoutSession, ServiceError> {
        let session = {
            let mut entry = self.session_entry(session_id, customer_id)?;
            self.require_step(&entry, CheckoutStep::OtpVerify)?;

            if !self.otp_service.verify_otp(entry.id, ticket_id, code) {
                return Err(ServiceError::OtpRejected);
            }

            entry.otp_verified = true;
            entry.step = CheckoutStep::PaymentSelect;
            entry.clone()
        };

        if let Some(sender) = &self.event_sender {
            let _ = sender
                .send(Event::OtpVerified {
                    session_id: session.id,
                })
                .await;
        }
        Ok(session)
    }

    /// Selects the payment method. COD routes low-history customers
    /// into the safety-deposit sub-step; gateway brands are validated
    /// against the disabled list before anything reaches the adapter.
    #[instrument(skip(self), fields(session_id = %session_id))]
    pub async fn select_payment_method(
        &self,
        session_id: Uuid,
        customer_id: Uuid,
        payment_type: PaymentType,
        brand: Option<&str>,
    ) -> Result<CheckoutSession, ServiceError> {
        {
            let entry = self.session_entry(session_id, customer_id)?;
            self.require_step(&entry, CheckoutStep::PaymentSelect)?;
            if !entry.otp_verified {
                return Err(ServiceError::InvalidOperation(
                    "Verify the one-time code first".to_string(),
                ));
            }
        }

        if payment_type == PaymentType::Gateway {
            if let Some(brand) = brand {
                self.gateway.ensure_brand_enabled(brand)?;
            }
        }

        let deposit_required = if payment_type == PaymentType::CashOnDelivery {
            let history = self
                .order_service
                .count_orders_for_customer(customer_id)
                .await?;
            history <= self.cfg.cod_history_threshold
        } else {
            false
        };

        let mut entry = self.session_entry(session_id, customer_id)?;
        entry.payment_type = Some(payment_type);
        entry.cod_deposit_required = deposit_required;
        if deposit_required && !entry.cod_deposit_paid {
            entry.step = CheckoutStep::CodSafetyDeposit;
        }
        Ok(entry.clone())
    }

    /// Creates the gateway intent for this session: the order amount at
    /// `PaymentSelect`, or the fixed safety deposit at
    /// `CodSafetyDeposit`. The widget round-trip that follows is
    /// user-paced; abandoning it leaves the session exactly here.
    #[instrument(skip(self), fields(session_id = %session_id))]
    pub async fn create_payment_intent(
        &self,
        session_id: Uuid,
        customer_id: Uuid,
        declared_amount: Decimal,
    ) -> Result<PaymentIntent, ServiceError> {
        let session = self.get_session(session_id, customer_id)?;

        let (purpose, receipt) = match session.step {
            CheckoutStep::PaymentSelect => {
                if session.payment_type != Some(PaymentType::Gateway) {
                    return Err(ServiceError::InvalidOperation(
                        "Select an online payment method first".to_string(),
                    ));
                }
                (IntentPurpose::OrderPayment, session.receipt_key.clone())
            }
            CheckoutStep::CodSafetyDeposit => (
                IntentPurpose::CodDeposit,
                format!("{}-deposit", session.receipt_key),
            ),
            _ => {
                return Err(ServiceError::InvalidOperation(
                    "No payment is due at this step".to_string(),
                ))
            }
        };

        let cart = self.cart_service.get_cart_snapshot(customer_id).await?;
        let intent = self
            .gateway
            .create_intent(
                session.id,
                &cart,
                declared_amount,
                purpose,
                self.cfg.cod_deposit_amount,
                &receipt,
            )
            .await?;

        if let Some(sender) = &self.event_sender {
            let _ = sender
                .send(Event::PaymentIntentCreated {
                    session_id: session.id,
                    gateway_order_id: intent.gateway_order_id.clone(),
                })
                .await;
        }
        Ok(intent)
    }

    /// Handles the gateway callback: verifies the signature, then
    /// either finalizes the order (payment intents) or marks the COD
    /// deposit paid (deposit intents). Order creation, cart clearing,
    /// and the `Paid` status are one transactional unit; a forged
    /// callback changes nothing.
    #[instrument(skip(self, signature), fields(gateway_order_id = %gateway_order_id))]
    pub async fn handle_gateway_callback(
        &self,
        gateway_order_id: &str,
        payment_id: &str,
        signature: &str,
    ) -> Result<GatewayCallbackOutcome, ServiceError> {
        let intent = self
            .gateway
            .verify_callback(gateway_order_id, payment_id, signature)?;

        match intent.purpose {
            IntentPurpose::CodDeposit => {
                {
                    let mut entry =
                        self.sessions.get_mut(&intent.session_id).ok_or_else(|| {
                            ServiceError::NotFound("Checkout session not found".to_string())
                        })?;
                    entry.cod_deposit_paid = true;
                }
                self.gateway.consume_intent(gateway_order_id);
                if let Some(sender) = &self.event_sender {
                    let _ = sender
                        .send(Event::CodDepositPaid {
                            session_id: intent.session_id,
                        })
                        .await;
                }
                Ok(GatewayCallbackOutcome::DepositPaid {
                    session_id: intent.session_id,
                })
            }
            IntentPurpose::OrderPayment => {
                let session = self
                    .sessions
                    .get(&intent.session_id)
                    .map(|s| s.clone())
                    .ok_or_else(|| {
                        ServiceError::NotFound("Checkout session not found".to_string())
                    })?;

                // The intent is consumed only after the order lands, so
                // a failed finalize leaves the verified payment
                // claimable by the gateway's retry.
                let order = self
                    .finalize(&session, PaymentStatus::Paid, Some(intent.amount))
                    .await?;
                self.gateway.consume_intent(gateway_order_id);

                if let Some(sender) = &self.event_sender {
                    let _ = sender
                        .send(Event::PaymentVerified {
                            order_id: order.id,
                            gateway_order_id: gateway_order_id.to_string(),
                        })
                        .await;
                }
                Ok(GatewayCallbackOutcome::OrderPaid { order })
            }
        }
    }

    /// Places a cash-on-delivery order. Permitted once the method is
    /// COD and the deposit gate (when required) has been passed.
    /// Replays with the same session return the same order.
    #[instrument(skip(self), fields(session_id = %session_id))]
    pub async fn place_cod_order(
        &self,
        session_id: Uuid,
        customer_id: Uuid,
    ) -> Result<order::Model, ServiceError> {
        let session = self.get_session(session_id, customer_id)?;

        if session.step == CheckoutStep::Complete {
            // Retry after completion: resolve through the receipt key.
            if let Some(existing) = self
                .order_service
                .find_by_receipt_key(&session.receipt_key)
                .await?
            {
                return Ok(existing);
            }
        }

        if session.payment_type != Some(PaymentType::CashOnDelivery) {
            return Err(ServiceError::InvalidOperation(
                "Select cash on delivery first".to_string(),
            ));
        }
        match session.step {
            // A paid deposit keeps its force across "Back" round-trips.
            CheckoutStep::PaymentSelect
                if !session.cod_deposit_required || session.cod_deposit_paid => {}
            CheckoutStep::CodSafetyDeposit if session.cod_deposit_paid => {}
            CheckoutStep::CodSafetyDeposit => {
                return Err(ServiceError::InvalidOperation(
                    "Pay the safety deposit to continue".to_string(),
                ))
            }
            _ => {
                return Err(ServiceError::InvalidOperation(
                    "Order cannot be placed at this step".to_string(),
                ))
            }
        }

        self.finalize(&session, PaymentStatus::CashOnDelivery, None)
            .await
    }

    /// The single write of the wizard: snapshot the cart into an order,
    /// clear the cart, and mark the session complete. When the payment
    /// was verified against a fixed amount, a cart that drifted during
    /// the widget round-trip is rejected rather than booked at a total
    /// that was never paid.
    async fn finalize(
        &self,
        session: &CheckoutSession,
        payment_status: PaymentStatus,
        verified_amount: Option<Decimal>,
    ) -> Result<order::Model, ServiceError> {
        let address = session.selected_address.clone().ok_or_else(|| {
            ServiceError::InvalidOperation("No delivery address selected".to_string())
        })?;
        let cart = self
            .cart_service
            .get_cart_snapshot(session.customer_id)
            .await?;

        if let Some(verified) = verified_amount {
            let live: Decimal = cart
                .lines
                .iter()
                .map(|l| l.unit_price * Decimal::from(l.quantity))
                .sum();
            if live != verified {
                warn!(verified = %verified, live = %live, "cart changed after payment verification");
                return Err(ServiceError::AmountMismatch {
                    declared: verified,
                    computed: live,
                });
            }
        }

        let deposit = if payment_status == PaymentStatus::CashOnDelivery
            && session.cod_deposit_required
        {
            Some(self.cfg.cod_deposit_amount)
        } else {
            None
        };

        let order = self
            .order_service
            .place_order(PlaceOrderRequest {
                customer_id: session.customer_id,
                receipt_key: session.receipt_key.clone(),
                cart,
                address,
                payment_status,
                cod_deposit_amount: deposit,
            })
            .await?;

        if let Some(mut entry) = self.sessions.get_mut(&session.id) {
            entry.step = CheckoutStep::Complete;
            entry.placed_order_id = Some(order.id);
        }
        self.otp_service.discard(session.id);

        Ok(order)
    }

    fn session_entry(
        &self,
        session_id: Uuid,
        customer_id: Uuid,
    ) -> Result<dashmap::mapref::one::RefMut<'_, Uuid, CheckoutSession>, ServiceError> {
        let entry = self
            .sessions
            .get_mut(&session_id)
            .ok_or_else(|| ServiceError::NotFound("Checkout session not found".to_string()))?;
        if self.session_expired(&entry) {
            drop(entry);
            self.sessions.remove(&session_id);
            self.otp_service.discard(session_id);
            return Err(ServiceError::NotFound(
                "Checkout session not found".to_string(),
            ));
        }
        if entry.customer_id != customer_id {
            warn!(session_id = %session_id, "session ownership mismatch");
            return Err(ServiceError::NotFound(
                "Checkout session not found".to_string(),
            ));
        }
        Ok(entry)
    }

    fn session_expired(&self, session: &CheckoutSession) -> bool {
        Utc::now()
            >= session.created_at + chrono::Duration::seconds(self.cfg.session_ttl_secs as i64)
    }

    /// Evicts sessions past their TTL (and their OTP tickets), then
    /// delegates to the gateway adapter's intent sweep. Driven by a
    /// periodic task at startup.
    pub fn sweep_expired(&self) -> usize {
        let expired: Vec<Uuid> = self
            .sessions
            .iter()
            .filter(|entry| self.session_expired(entry.value()))
            .map(|entry| *entry.key())
            .collect();
        for session_id in &expired {
            self.sessions.remove(session_id);
            self.otp_service.discard(*session_id);
        }
        expired.len() + self.gateway.sweep_expired()
    }

    fn require_step(
        &self,
        session: &CheckoutSession,
        expected: CheckoutStep,
    ) -> Result<(), ServiceError> {
        if session.step != expected {
            return Err(ServiceError::InvalidOperation(format!(
                "This action belongs to the {:?} step",
                expected
            )));
        }
        Ok(())
    }
}

/// Result of a verified gateway callback.
#[derive(Debug)]
pub enum GatewayCallbackOutcome {
    OrderPaid { order: order::Model },
    DepositPaid { session_id: Uuid },
}
