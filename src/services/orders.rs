use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    entities::{customer_address, order, order_item, order_status_update},
    entities::order::PaymentStatus,
    errors::ServiceError,
    events::{Event, EventSender},
    services::carts::{CartService, CartSnapshot},
    services::status_resolver::{self, StatusTag},
};

/// Delivery address copied into the order at placement.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AddressSnapshot {
    pub recipient_name: String,
    pub address_line_1: String,
    pub address_line_2: Option<String>,
    pub city: String,
    pub province: String,
    pub country_code: String,
    pub postal_code: String,
    pub phone: Option<String>,
}

impl From<customer_address::Model> for AddressSnapshot {
    fn from(model: customer_address::Model) -> Self {
        Self {
            recipient_name: model.recipient_name,
            address_line_1: model.address_line_1,
            address_line_2: model.address_line_2,
            city: model.city,
            province: model.province,
            country_code: model.country_code,
            postal_code: model.postal_code,
            phone: model.phone,
        }
    }
}

/// Everything needed to turn a checkout session into an order row.
#[derive(Debug, Clone)]
pub struct PlaceOrderRequest {
    pub customer_id: Uuid,
    /// Client-generated idempotency key, minted once per checkout
    /// session and reused across retries.
    pub receipt_key: String,
    pub cart: CartSnapshot,
    pub address: AddressSnapshot,
    pub payment_status: PaymentStatus,
    pub cod_deposit_amount: Option<Decimal>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderDetail {
    pub order: order::Model,
    pub items: Vec<order_item::Model>,
    pub status_updates: Vec<order_status_update::Model>,
    pub status: StatusTag,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderListItem {
    pub order: order::Model,
    pub status: StatusTag,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderListResponse {
    pub orders: Vec<OrderListItem>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

/// Order persistence: atomic placement with server-side total
/// recomputation, idempotent on the receipt key, plus the read side
/// used by the storefront and the admin console.
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DatabaseConnection>,
    cart_service: Arc<CartService>,
    event_sender: Option<Arc<EventSender>>,
}

impl OrderService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        cart_service: Arc<CartService>,
        event_sender: Option<Arc<EventSender>>,
    ) -> Self {
        Self {
            db,
            cart_service,
            event_sender,
        }
    }

    /// Creates the order, its line-item snapshots, and clears the cart
    /// in one transaction. Submitting the same receipt key again
    /// returns the already-created order instead of writing a second
    /// one; the unique constraint backstops concurrent replays.
    #[instrument(skip(self, request), fields(customer_id = %request.customer_id, receipt_key = %request.receipt_key))]
    pub async fn place_order(
        &self,
        request: PlaceOrderRequest,
    ) -> Result<order::Model, ServiceError> {
        if request.cart.is_empty() {
            return Err(ServiceError::InvalidOperation(
                "Cannot place an order from an empty cart".to_string(),
            ));
        }

        if let Some(existing) = self.find_by_receipt_key(&request.receipt_key).await? {
            info!(order_id = %existing.id, "duplicate placement suppressed by receipt key");
            return Ok(existing);
        }

        // Client-declared totals are untrusted; the order total is the
        // recomputed line sum.
        let subtotal: Decimal = request
            .cart
            .lines
            .iter()
            .map(|l| l.unit_price * Decimal::from(l.quantity))
            .sum();
        let total = subtotal;

        let now = Utc::now();
        let order_id = Uuid::new_v4();
        let address_json = serde_json::to_value(&request.address)
            .map_err(|e| ServiceError::ValidationError(format!("invalid address: {}", e)))?;

        let txn = self.db.begin().await?;

        let order_model = order::ActiveModel {
            id: Set(order_id),
            order_number: Set(format!(
                "ORD-{}",
                order_id.to_string()[..8].to_uppercase()
            )),
            customer_id: Set(request.customer_id),
            receipt_key: Set(request.receipt_key.clone()),
            subtotal: Set(subtotal),
            total: Set(total),
            currency: Set(request.cart.currency.clone()),
            payment_status: Set(request.payment_status),
            shipping_address: Set(address_json),
            cod_deposit_amount: Set(request.cod_deposit_amount),
            created_at: Set(now),
        };

        let inserted = match order_model.insert(&txn).await {
            Ok(model) => model,
            Err(err) => {
                // A concurrent replay may have won the unique race on
                // receipt_key; surface that order instead of the error.
                drop(txn);
                if let Some(existing) = self.find_by_receipt_key(&request.receipt_key).await? {
                    warn!(order_id = %existing.id, "placement race resolved to existing order");
                    return Ok(existing);
                }
                error!(error = %err, "order insert failed");
                return Err(ServiceError::DatabaseError(err));
            }
        };

        for line in &request.cart.lines {
            let item = order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order_id),
                product_id: Set(line.product_id),
                product_name: Set(line.product_name.clone()),
                quantity: Set(line.quantity),
                unit_price: Set(line.unit_price),
                line_total: Set(line.unit_price * Decimal::from(line.quantity)),
                created_at: Set(now),
            };
            item.insert(&txn).await?;
        }

        self.cart_service
            .clear_cart(&txn, request.cart.cart_id)
            .await?;

        txn.commit().await?;

        info!(order_id = %order_id, total = %total, "order placed");

        if let Some(sender) = &self.event_sender {
            if let Err(e) = sender.send(Event::OrderCreated(order_id)).await {
                warn!(error = %e, order_id = %order_id, "failed to send order created event");
            }
            if let Err(e) = sender
                .send(Event::CartCleared {
                    cart_id: request.cart.cart_id,
                })
                .await
            {
                warn!(error = %e, "failed to send cart cleared event");
            }
        }

        Ok(inserted)
    }

    pub async fn find_by_receipt_key(
        &self,
        receipt_key: &str,
    ) -> Result<Option<order::Model>, ServiceError> {
        Ok(order::Entity::find()
            .filter(order::Column::ReceiptKey.eq(receipt_key))
            .one(&*self.db)
            .await?)
    }

    /// Completed-order count used by the COD safety-deposit gate.
    #[instrument(skip(self), fields(customer_id = %customer_id))]
    pub async fn count_orders_for_customer(&self, customer_id: Uuid) -> Result<u64, ServiceError> {
        Ok(order::Entity::find()
            .filter(order::Column::CustomerId.eq(customer_id))
            .count(&*self.db)
            .await?)
    }

    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn get_order(&self, order_id: Uuid) -> Result<OrderDetail, ServiceError> {
        let order = order::Entity::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        let items = order_item::Entity::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .all(&*self.db)
            .await?;

        let status_updates = order_status_update::Entity::find()
            .filter(order_status_update::Column::OrderId.eq(order_id))
            .order_by_asc(order_status_update::Column::CreatedAt)
            .all(&*self.db)
            .await?;

        let status = status_resolver::resolve_order(&order, &status_updates);

        Ok(OrderDetail {
            order,
            items,
            status_updates,
            status,
        })
    }

    /// Lists orders with an optional derived-status filter. The filter
    /// works on the resolved tag, not on any stored column, so every
    /// view agrees with the badge shown on the order itself.
    #[instrument(skip(self))]
    pub async fn list_orders(
        &self,
        customer_id: Option<Uuid>,
        status_filter: Option<StatusTag>,
        page: u64,
        per_page: u64,
    ) -> Result<OrderListResponse, ServiceError> {
        let mut query = order::Entity::find().order_by_desc(order::Column::CreatedAt);
        if let Some(customer_id) = customer_id {
            query = query.filter(order::Column::CustomerId.eq(customer_id));
        }
        let orders = query.all(&*self.db).await?;

        let mut updates_by_order: HashMap<Uuid, Vec<order_status_update::Model>> = HashMap::new();
        if !orders.is_empty() {
            let ids: Vec<Uuid> = orders.iter().map(|o| o.id).collect();
            let updates = order_status_update::Entity::find()
                .filter(order_status_update::Column::OrderId.is_in(ids))
                .order_by_asc(order_status_update::Column::CreatedAt)
                .all(&*self.db)
                .await?;
            for update in updates {
                updates_by_order.entry(update.order_id).or_default().push(update);
            }
        }

        let resolved: Vec<OrderListItem> = orders
            .into_iter()
            .map(|order| {
                let empty = Vec::new();
                let updates = updates_by_order.get(&order.id).unwrap_or(&empty);
                let status = status_resolver::resolve_order(&order, updates);
                OrderListItem { order, status }
            })
            .filter(|item| status_filter.map_or(true, |tag| item.status == tag))
            .collect();

        let total = resolved.len() as u64;
        let start = page.saturating_sub(1).saturating_mul(per_page) as usize;
        let orders = resolved
            .into_iter()
            .skip(start)
            .take(per_page as usize)
            .collect();

        Ok(OrderListResponse {
            orders,
            total,
            page,
            per_page,
        })
    }
}
