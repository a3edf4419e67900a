use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::config::CheckoutConfig;
use crate::errors::ServiceError;

/// Delivery channel for one-time codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum OtpChannel {
    Sms,
    Email,
}

/// Handle returned to the caller after a send. The code itself never
/// leaves the server except through the delivery channel.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OtpIssued {
    pub ticket_id: Uuid,
    pub channel: OtpChannel,
    /// Cosmetic hint for client countdowns; enforcement is server-side.
    pub resend_after_secs: u64,
}

#[derive(Debug, Clone)]
struct OtpTicket {
    id: Uuid,
    code: String,
    channel: OtpChannel,
    destination: String,
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

/// OTP gate for the checkout wizard. At most one active ticket per
/// session; resending replaces the previous ticket; verification fails
/// closed and consumes the ticket on success. Expiry and resend
/// throttling live here, server-side — client timers are advisory.
pub struct OtpService {
    tickets: DashMap<Uuid, OtpTicket>,
    code_length: usize,
    ttl: Duration,
    resend_cooldown: Duration,
}

impl OtpService {
    pub fn new(cfg: &CheckoutConfig) -> Self {
        Self {
            tickets: DashMap::new(),
            code_length: cfg.otp_length,
            ttl: Duration::from_secs(cfg.otp_ttl_secs),
            resend_cooldown: Duration::from_secs(cfg.otp_resend_cooldown_secs),
        }
    }

    /// Issues a code for the session, replacing any previous ticket.
    #[instrument(skip(self, destination), fields(session_id = %session_id))]
    pub fn send_otp(
        &self,
        session_id: Uuid,
        channel: OtpChannel,
        destination: &str,
    ) -> Result<OtpIssued, ServiceError> {
        if destination.trim().is_empty() {
            return Err(ServiceError::ValidationError(
                "OTP destination is required".to_string(),
            ));
        }

        let now = Utc::now();
        if let Some(existing) = self.tickets.get(&session_id) {
            let since_issue = now
                .signed_duration_since(existing.issued_at)
                .to_std()
                .unwrap_or_default();
            if since_issue < self.resend_cooldown {
                warn!(session_id = %session_id, "OTP resend throttled");
                return Err(ServiceError::OtpResendThrottled);
            }
        }

        let ticket = OtpTicket {
            id: Uuid::new_v4(),
            code: self.generate_code(),
            channel,
            destination: destination.to_string(),
            issued_at: now,
            expires_at: now + chrono::Duration::from_std(self.ttl).unwrap_or_default(),
        };
        let ticket_id = ticket.id;

        // Delivery is a collaborator concern; the lifecycle service
        // only records that a send happened.
        info!(
            session_id = %session_id,
            ticket_id = %ticket_id,
            channel = ?channel,
            "OTP issued"
        );

        self.tickets.insert(session_id, ticket);

        Ok(OtpIssued {
            ticket_id,
            channel,
            resend_after_secs: self.resend_cooldown.as_secs(),
        })
    }

    /// Verifies a code against the session's active ticket. Any
    /// mismatch — wrong code, expired ticket, unknown session, foreign
    /// ticket id — returns `false` with no further detail, and a
    /// successful verification consumes the ticket.
    #[instrument(skip(self, code), fields(session_id = %session_id))]
    pub fn verify_otp(&self, session_id: Uuid, ticket_id: Uuid, code: &str) -> bool {
        let matches = match self.tickets.get(&session_id) {
            Some(ticket) => {
                ticket.id == ticket_id
                    && ticket.expires_at > Utc::now()
                    && constant_time_eq(&ticket.code, code)
            }
            None => false,
        };

        if matches {
            self.tickets.remove(&session_id);
            info!(session_id = %session_id, "OTP verified");
        }
        matches
    }

    /// Drops any ticket belonging to the session (checkout completed or
    /// abandoned).
    pub fn discard(&self, session_id: Uuid) {
        self.tickets.remove(&session_id);
    }

    fn generate_code(&self) -> String {
        let bound = 10u32.pow(self.code_length as u32);
        let value = rand::thread_rng().gen_range(0..bound);
        format!("{:0width$}", value, width = self.code_length)
    }

    #[cfg(test)]
    pub(crate) fn peek_code(&self, session_id: Uuid) -> Option<String> {
        self.tickets.get(&session_id).map(|t| t.code.clone())
    }
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

#[cfg(test)]
mod tests {
    use super::*;

    fn service(ttl_secs: u64, cooldown_secs: u64) -> OtpService {
        let cfg = CheckoutConfig {
            otp_ttl_secs: ttl_secs,
            otp_resend_cooldown_secs: cooldown_secs,
            ..CheckoutConfig::default()
        };
        OtpService::new(&cfg)
    }

    #[test]
    fn code_is_accepted_at_most_once() {
        let svc = service(300, 0);
        let session = Uuid::new_v4();
        let issued = svc.send_otp(session, OtpChannel::Sms, "+911234567890").unwrap();
        let code = svc.peek_code(session).unwrap();

        assert!(svc.verify_otp(session, issued.ticket_id, &code));
        assert!(!svc.verify_otp(session, issued.ticket_id, &code));
    }

    #[test]
    fn resend_invalidates_previous_code() {
        let svc = service(300, 0);
        let session = Uuid::new_v4();
        let first = svc.send_otp(session, OtpChannel::Sms, "+911234567890").unwrap();
        let first_code = svc.peek_code(session).unwrap();

        let second = svc.send_otp(session, OtpChannel::Sms, "+911234567890").unwrap();
        let second_code = svc.peek_code(session).unwrap();

        assert!(!svc.verify_otp(session, first.ticket_id, &first_code));
        assert!(svc.verify_otp(session, second.ticket_id, &second_code));
    }

    #[test]
    fn expired_ticket_is_invalid() {
        let svc = service(0, 0);
        let session = Uuid::new_v4();
        let issued = svc.send_otp(session, OtpChannel::Email, "a@example.com").unwrap();
        let code = svc.peek_code(session).unwrap();
        assert!(!svc.verify_otp(session, issued.ticket_id, &code));
    }

    #[test]
    fn foreign_ticket_is_invalid() {
        let svc = service(300, 0);
        let session = Uuid::new_v4();
        let other_session = Uuid::new_v4();
        let issued = svc.send_otp(session, OtpChannel::Sms, "+911234567890").unwrap();
        let code = svc.peek_code(session).unwrap();

        assert!(!svc.verify_otp(other_session, issued.ticket_id, &code));
        assert!(!svc.verify_otp(session, Uuid::new_v4(), &code));
    }

    #[test]
    fn resend_is_throttled_by_cooldown() {
        let svc = service(300, 3600);
        let session = Uuid::new_v4();
        svc.send_otp(session, OtpChannel::Sms, "+911234567890").unwrap();
        let err = svc
            .send_otp(session, OtpChannel::Sms, "+911234567890")
            .unwrap_err();
        assert!(matches!(err, ServiceError::OtpResendThrottled));
    }

    #[test]
    fn wrong_code_fails_closed() {
        let svc = service(300, 0);
        let session = Uuid::new_v4();
        let issued = svc.send_otp(session, OtpChannel::Sms, "+911234567890").unwrap();
        assert!(!svc.verify_otp(session, issued.ticket_id, "000000x"));
        assert!(!svc.verify_otp(session, issued.ticket_id, ""));
    }

    #[test]
    fn generated_codes_have_configured_length() {
        let svc = service(300, 0);
        let session = Uuid::new_v4();
        svc.send_otp(session, OtpChannel::Sms, "+911234567890").unwrap();
        let code = svc.peek_code(session).unwrap();
        assert_eq!(code.len(), 6);
        assert!(code.chars().all(|c| c.is_ascii_digit()));
    }
}
