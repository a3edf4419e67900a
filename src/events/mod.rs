use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info};
use uuid::Uuid;

/// Events emitted by the order lifecycle. Delivery is fire-and-forget:
/// a failed send is logged by the caller and never fails the request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    CheckoutStarted {
        session_id: Uuid,
        customer_id: Uuid,
    },
    OtpIssued {
        session_id: Uuid,
    },
    OtpVerified {
        session_id: Uuid,
    },
    PaymentIntentCreated {
        session_id: Uuid,
        gateway_order_id: String,
    },
    PaymentVerified {
        order_id: Uuid,
        gateway_order_id: String,
    },
    CodDepositPaid {
        session_id: Uuid,
    },
    OrderCreated(Uuid),
    OrderStatusAppended {
        order_id: Uuid,
        title: String,
    },
    CartCleared {
        cart_id: Uuid,
    },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }
}

/// Drains the event channel, logging each event. A real deployment
/// would forward these to a message bus; in-process logging keeps the
/// lifecycle observable without one.
pub async fn process_events(mut receiver: mpsc::Receiver<Event>) {
    info!("event processor started");
    while let Some(event) = receiver.recv().await {
        match &event {
            Event::OrderCreated(order_id) => {
                info!(order_id = %order_id, "order created");
            }
            Event::PaymentVerified {
                order_id,
                gateway_order_id,
            } => {
                info!(order_id = %order_id, gateway_order_id = %gateway_order_id, "payment verified");
            }
            Event::OrderStatusAppended { order_id, title } => {
                info!(order_id = %order_id, title = %title, "status appended");
            }
            other => {
                debug!(event = ?other, "lifecycle event");
            }
        }
    }
    info!("event processor stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_delivers_to_receiver() {
        let (tx, mut rx) = mpsc::channel(4);
        let sender = EventSender::new(tx);
        let order_id = Uuid::new_v4();
        sender.send(Event::OrderCreated(order_id)).await.unwrap();
        match rx.recv().await {
            Some(Event::OrderCreated(id)) => assert_eq!(id, order_id),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn send_fails_when_receiver_dropped() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let sender = EventSender::new(tx);
        assert!(sender.send(Event::OrderCreated(Uuid::new_v4())).await.is_err());
    }
}
